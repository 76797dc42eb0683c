use std::sync::OnceLock;

use tracing::info;

use service_platform::{Error, Result, System};

/// Holds the one service system chosen for this process.
pub struct Registry {
    system: Box<dyn System>,
}

impl Registry {
    /// Pick the first candidate whose `detect` matches. Order matters when
    /// several families share an OS (systemd before SysV).
    pub fn detect(candidates: Vec<Box<dyn System>>) -> Result<Self> {
        let system = candidates
            .into_iter()
            .find(|system| system.detect())
            .ok_or(Error::NoSystem)?;
        info!("service system: {}", system.name());
        Ok(Self { system })
    }

    pub fn system(&self) -> &dyn System {
        self.system.as_ref()
    }
}

static GLOBAL: OnceLock<Registry> = OnceLock::new();

/// Publish `registry` process-wide. Only the first call succeeds.
pub fn install_global(registry: Registry) -> Result<&'static Registry> {
    let mut installed = false;
    let global = GLOBAL.get_or_init(|| {
        installed = true;
        registry
    });
    if installed {
        Ok(global)
    } else {
        Err(Error::AlreadyRegistered)
    }
}

pub fn global() -> Option<&'static Registry> {
    GLOBAL.get()
}
