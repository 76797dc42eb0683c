use service_core::Registry;
use service_freebsd::RcDSystem;
use service_linux::{SysvSystem, SystemdSystem};
use service_macos::LaunchdSystem;
use service_platform::{Result, System};
use service_windows::WindowsSystem;

/// Every family this binary knows, in detection order. systemd has to
/// come before SysV since most systemd hosts still carry /etc/init.d.
pub fn candidates() -> Vec<Box<dyn System>> {
    vec![
        Box::new(LaunchdSystem::native()),
        Box::new(SystemdSystem::native()),
        Box::new(SysvSystem::native()),
        Box::new(RcDSystem::native()),
        Box::new(WindowsSystem::native()),
    ]
}

/// Detect the host's family and publish it for the rest of the process.
pub fn register() -> Result<&'static Registry> {
    service_core::registry::install_global(Registry::detect(candidates())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_order() {
        let names: Vec<&str> = candidates().iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![
                "darwin-launchd",
                "linux-systemd",
                "linux-sysv",
                "freebsd-rcd",
                "windows-service"
            ]
        );
    }

    #[test]
    fn test_at_most_one_os_family_matches_off_linux() {
        // launchd, rc.d and the SCM are keyed on the target OS alone
        let os_only = ["darwin-launchd", "freebsd-rcd", "windows-service"];
        let matched = candidates()
            .into_iter()
            .filter(|s| os_only.contains(&s.name()) && s.detect())
            .count();
        assert!(matched <= 1);
    }
}
