use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by the service lifecycle operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A descriptor already exists where install would write one.
    #[error("service already installed: {0}")]
    AlreadyInstalled(String),

    /// Neither a descriptor nor a manager record exists for the service.
    #[error("service is not installed")]
    NotInstalled,

    #[error("failed to render service descriptor: {0}")]
    Template(String),

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The service manager command ran and reported a failure.
    #[error("{program} failed (exit code {}): {}", .exit_code.map(|c| c.to_string()).unwrap_or_else(|| "none".into()), .output.trim())]
    Command {
        program: String,
        exit_code: Option<i32>,
        output: String,
    },

    #[error("user home directory not found")]
    HomeDirectoryUnavailable,

    #[error("option {name} must be {expected}")]
    InvalidOption { name: String, expected: &'static str },

    #[error("invalid service config: {0}")]
    InvalidConfig(String),

    #[error("{0} does not support user services")]
    UnsupportedScope(&'static str),

    #[error("no service system detected for this platform")]
    NoSystem,

    #[error("a service system is already registered")]
    AlreadyRegistered,

    #[error("failed to wait for termination signal: {0}")]
    Signal(#[source] std::io::Error),

    #[error("failed to write log entry: {0}")]
    Log(String),

    #[error("service dispatcher failed: {0}")]
    Dispatcher(String),

    /// Error returned by the workload's start or stop hook.
    #[error(transparent)]
    Workload(#[from] anyhow::Error),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
