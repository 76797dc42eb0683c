use std::sync::OnceLock;

use service_platform::Result;

/// Lazily computed "started from a user session" flag.
///
/// A failed probe is returned to the caller and retried on the next call;
/// only a successful answer is cached.
pub struct Interactivity {
    probe: fn() -> Result<bool>,
    cached: OnceLock<bool>,
}

impl Interactivity {
    pub const fn new(probe: fn() -> Result<bool>) -> Self {
        Self {
            probe,
            cached: OnceLock::new(),
        }
    }

    pub fn get(&self) -> Result<bool> {
        if let Some(value) = self.cached.get() {
            return Ok(*value);
        }
        let value = (self.probe)()?;
        Ok(*self.cached.get_or_init(|| value))
    }
}

/// True when the parent process is PID 1, i.e. the init system or
/// launchd spawned us.
#[cfg(unix)]
pub fn parent_is_init() -> bool {
    nix::unistd::getppid() == nix::unistd::Pid::from_raw(1)
}

#[cfg(not(unix))]
pub fn parent_is_init() -> bool {
    false
}

/// Probe shared by the Unix families without a better signal.
pub fn parent_probe() -> Result<bool> {
    Ok(!parent_is_init())
}
