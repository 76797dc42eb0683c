//! launchd property lists: agents for the user, daemons for the system.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use regex::Regex;

use service_core::interactive::parent_probe;
use service_core::{
    DescriptorService, Host, Interactivity, Manager, ManagerCommand, Probe, Unit,
};
use service_platform::options::LAUNCHD_CONFIG;
use service_platform::{CommandOutput, Config, Interface, Result, Service, System};

const PLATFORM: &str = "darwin-launchd";

const DAEMON_DIR: &str = "/Library/LaunchDaemons";
const AGENT_DIR: &str = "Library/LaunchAgents";

/// `launchctl list` exit code for labels it does not know.
const UNKNOWN_LABEL_EXIT: i32 = 113;

const PLIST_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Label</key>
    <string>{{ name|xml }}</string>
    <key>ProgramArguments</key>
    <array>
        <string>{{ path|xml }}</string>
{%- for arg in arguments %}
        <string>{{ arg|xml }}</string>
{%- endfor %}
    </array>
{%- if user_name %}
    <key>UserName</key>
    <string>{{ user_name|xml }}</string>
{%- endif %}
{%- if working_directory %}
    <key>WorkingDirectory</key>
    <string>{{ working_directory|xml }}</string>
{%- endif %}
    <key>SessionCreate</key>
    <{{ session_create|bool }}/>
    <key>KeepAlive</key>
    <{{ keep_alive|bool }}/>
    <key>RunAtLoad</key>
    <{{ run_at_load|bool }}/>
    <key>Disabled</key>
    <false/>
</dict>
</plist>
"#;

fn pid_pattern() -> &'static Regex {
    static PID: OnceLock<Regex> = OnceLock::new();
    PID.get_or_init(|| Regex::new(r#""PID" = ([0-9]+);"#).expect("PID pattern compiles"))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Launchd;

impl Manager for Launchd {
    fn platform(&self) -> &'static str {
        PLATFORM
    }

    fn descriptor_path(&self, host: &Host, name: &str, user: bool) -> Result<PathBuf> {
        let file = format!("{}.plist", name);
        if user {
            return Ok(host.home_dir()?.join(AGENT_DIR).join(file));
        }
        Ok(host.system_path(DAEMON_DIR).join(file))
    }

    fn template_option(&self) -> &'static str {
        LAUNCHD_CONFIG
    }

    fn default_template(&self) -> &'static str {
        PLIST_TEMPLATE
    }

    fn start_command(&self, unit: &Unit<'_>) -> ManagerCommand {
        ManagerCommand::new("launchctl", ["load".to_string(), unit.path.display().to_string()])
    }

    fn stop_command(&self, unit: &Unit<'_>) -> ManagerCommand {
        ManagerCommand::new("launchctl", ["unload".to_string(), unit.path.display().to_string()])
    }

    fn status_command(&self, unit: &Unit<'_>) -> ManagerCommand {
        ManagerCommand::new("launchctl", ["list", unit.name])
    }

    fn probe(&self, output: &CommandOutput) -> Probe {
        if output.success() {
            if pid_pattern().is_match(&output.output) {
                return Probe::Running;
            }
            return Probe::NotRunning;
        }
        if output.exit_code == Some(UNKNOWN_LABEL_EXIT)
            || output.output.contains("Could not find service")
        {
            return Probe::UnknownService;
        }
        Probe::Failed
    }
}

pub struct LaunchdSystem {
    host: Host,
    interactivity: Arc<Interactivity>,
}

impl LaunchdSystem {
    pub fn new(host: Host) -> Self {
        Self {
            host,
            interactivity: Arc::new(Interactivity::new(parent_probe)),
        }
    }

    pub fn native() -> Self {
        Self::new(Host::native())
    }
}

impl System for LaunchdSystem {
    fn name(&self) -> &'static str {
        PLATFORM
    }

    fn detect(&self) -> bool {
        cfg!(target_os = "macos")
    }

    fn interactive(&self) -> Result<bool> {
        self.interactivity.get()
    }

    fn new_service(&self, workload: Arc<dyn Interface>, config: Config) -> Result<Box<dyn Service>> {
        let service = DescriptorService::new(
            Launchd,
            self.host.clone(),
            Arc::clone(&self.interactivity),
            workload,
            config,
        )?;
        Ok(Box::new(service))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use service_core::testing::{FakeRunner, NoopWorkload};
    use service_platform::options::{KEEP_ALIVE, RUN_AT_LOAD, USER_SERVICE};
    use service_platform::{Error, Options, Status};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const LIST_RUNNING: &str = r#"{
	"LimitLoadToSessionType" = "Aqua";
	"Label" = "com.example.demo";
	"OnDemand" = false;
	"LastExitStatus" = 0;
	"PID" = 4312;
	"Program" = "/usr/local/bin/demo";
};"#;

    const LIST_LOADED: &str = r#"{
	"Label" = "com.example.demo";
	"LastExitStatus" = 256;
};"#;

    fn out(code: i32, text: &str) -> CommandOutput {
        CommandOutput {
            exit_code: Some(code),
            output: text.to_string(),
        }
    }

    #[test]
    fn test_probe_launchctl_list() {
        let m = Launchd;
        assert_eq!(m.probe(&out(0, LIST_RUNNING)), Probe::Running);
        assert_eq!(m.probe(&out(0, LIST_LOADED)), Probe::NotRunning);
        assert_eq!(
            m.probe(&out(113, "Could not find service \"com.example.demo\" in domain for port")),
            Probe::UnknownService
        );
        assert_eq!(m.probe(&out(1, "Operation not permitted")), Probe::Failed);
    }

    #[test]
    fn test_commands_use_plist_path() {
        let unit = Unit {
            name: "com.example.demo",
            path: Path::new("/Library/LaunchDaemons/com.example.demo.plist"),
            user: false,
            run_at_load: false,
        };
        assert_eq!(
            Launchd.start_command(&unit),
            ManagerCommand::new(
                "launchctl",
                ["load", "/Library/LaunchDaemons/com.example.demo.plist"]
            )
        );
        assert_eq!(
            Launchd.stop_command(&unit).args[0],
            "unload"
        );
        assert_eq!(
            Launchd.status_command(&unit),
            ManagerCommand::new("launchctl", ["list", "com.example.demo"])
        );
    }

    #[test]
    fn test_plist_rendering() {
        let mut config = Config::new("com.example.demo");
        config.arguments = vec!["run".into(), "a&b".into()];
        config.options = Options::new()
            .with(KEEP_ALIVE, false)
            .with(RUN_AT_LOAD, true);
        let svc = DescriptorService::new(
            Launchd,
            Host::native(),
            Arc::new(Interactivity::new(|| Ok(true))),
            Arc::new(NoopWorkload::default()),
            config,
        )
        .unwrap();

        let plist = svc.render(Path::new("/usr/local/bin/demo")).unwrap();
        assert!(plist.contains(
            "    <array>\n        <string>/usr/local/bin/demo</string>\n        <string>run</string>\n        <string>a&amp;b</string>\n    </array>\n    <key>SessionCreate</key>"
        ));
        assert!(plist.contains("<key>KeepAlive</key>\n    <false/>"));
        assert!(plist.contains("<key>RunAtLoad</key>\n    <true/>"));
        assert!(!plist.contains("UserName"));
        assert_eq!(plist, svc.render(Path::new("/usr/local/bin/demo")).unwrap());
    }

    #[test]
    fn test_user_agent_lifecycle() {
        let home = TempDir::new().unwrap();
        let runner = Arc::new(FakeRunner::new());
        runner.respond("launchctl list", 113, "Could not find service");

        let system = LaunchdSystem::new(Host::new(runner.clone()).with_home(home.path()));
        let mut config = Config::new("com.example.demo");
        config.executable = Some("/usr/local/bin/demo".into());
        config.options = Options::new().with(USER_SERVICE, true);
        let svc = system
            .new_service(Arc::new(NoopWorkload::default()), config)
            .unwrap();

        assert!(matches!(svc.status(), Err(Error::NotInstalled)));
        svc.install().unwrap();
        let plist = home.path().join("Library/LaunchAgents/com.example.demo.plist");
        assert!(plist.is_file());
        assert_eq!(svc.status().unwrap(), Status::Stopped);

        svc.restart().unwrap();
        let load = format!("launchctl load {}", plist.display());
        let unload = format!("launchctl unload {}", plist.display());
        let calls = runner.calls();
        assert_eq!(&calls[2..], &[unload, load]);

        fs::write(&plist, "edited").unwrap();
        assert!(matches!(svc.install(), Err(Error::AlreadyInstalled(_))));
        assert_eq!(fs::read_to_string(&plist).unwrap(), "edited");
    }
}
