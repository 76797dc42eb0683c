use std::path::{Path, PathBuf};
use std::sync::Arc;

use service_platform::{CommandRunner, Error, Result};

use crate::process::ProcessRunner;

#[derive(Debug, Clone)]
enum HomeDir {
    Detect,
    Fixed(PathBuf),
    Unavailable,
}

/// The machine a service is managed on: how commands run and where the
/// filesystem lives. Everything a family touches goes through here.
#[derive(Clone)]
pub struct Host {
    runner: Arc<dyn CommandRunner>,
    root: PathBuf,
    home: HomeDir,
}

impl Host {
    /// The real machine: processes via `std::process`, paths from `/`.
    pub fn native() -> Self {
        Self::new(Arc::new(ProcessRunner))
    }

    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            root: PathBuf::from("/"),
            home: HomeDir::Detect,
        }
    }

    /// Prefix applied to system-wide descriptor paths.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = HomeDir::Fixed(home.into());
        self
    }

    /// Behave as if the user has no resolvable home directory.
    pub fn without_home(mut self) -> Self {
        self.home = HomeDir::Unavailable;
        self
    }

    pub fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map an absolute system path (e.g. `/etc/init.d`) under the root.
    pub fn system_path(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    pub fn home_dir(&self) -> Result<PathBuf> {
        match &self.home {
            HomeDir::Fixed(home) => Ok(home.clone()),
            HomeDir::Unavailable => Err(Error::HomeDirectoryUnavailable),
            HomeDir::Detect => directories::BaseDirs::new()
                .map(|dirs| dirs.home_dir().to_path_buf())
                .or_else(|| {
                    std::env::var_os("HOME")
                        .filter(|home| !home.is_empty())
                        .map(PathBuf::from)
                })
                .ok_or(Error::HomeDirectoryUnavailable),
        }
    }
}
