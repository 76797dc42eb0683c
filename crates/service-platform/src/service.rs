use std::fmt::Display;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::logger::Logger;
use crate::status::Status;

/// Pause between stop and start so managers that reuse one control
/// socket do not see the load before the unload finished.
pub const RESTART_SETTLE: Duration = Duration::from_millis(50);

/// The embedding program's workload.
pub trait Interface: Send + Sync {
    /// Start the workload. Must return quickly; long running work belongs
    /// on a thread the implementation spawns.
    fn start(&self, service: &dyn Service) -> anyhow::Result<()>;

    /// Request shutdown. May block briefly to drain.
    fn stop(&self, service: &dyn Service) -> anyhow::Result<()>;
}

/// One service manager family (launchd, systemd, SCM, ...).
pub trait System: Send + Sync {
    /// Short family name, e.g. "linux-systemd"
    fn name(&self) -> &'static str;

    /// Whether this family is the one managing services on this host
    fn detect(&self) -> bool;

    /// Whether the process was started from a user session rather than
    /// by the service manager. Memoized after the first success.
    fn interactive(&self) -> Result<bool>;

    /// Bind a workload and config to this family. Performs no I/O.
    fn new_service(&self, workload: Arc<dyn Interface>, config: Config)
        -> Result<Box<dyn Service>>;
}

/// Lifecycle of one installed program.
pub trait Service: Display + Send + Sync {
    fn platform(&self) -> &'static str;

    /// Write the service descriptor. Fails if one already exists.
    fn install(&self) -> Result<()>;

    /// Stop (best effort) and remove the descriptor. Missing is fine.
    fn uninstall(&self) -> Result<()>;

    /// Query the manager. `Err(NotInstalled)` when there is nothing to query.
    fn status(&self) -> Result<Status>;

    fn start(&self) -> Result<()>;

    fn stop(&self) -> Result<()>;

    fn restart(&self) -> Result<()> {
        self.stop()?;
        std::thread::sleep(RESTART_SETTLE);
        self.start()
    }

    /// Run the workload until a termination request arrives.
    fn run(&self) -> Result<()>;

    /// Console logger when interactive, system logger otherwise.
    fn logger(&self, errs: Option<Sender<Error>>) -> Result<Box<dyn Logger>>;

    fn system_logger(&self, errs: Option<Sender<Error>>) -> Result<Box<dyn Logger>>;
}
