// Platform-neutral service traits and types

pub mod config;
pub mod error;
pub mod logger;
pub mod options;
pub mod runner;
pub mod service;
pub mod status;

pub use config::Config;
pub use error::{Error, Result};
pub use logger::Logger;
pub use options::{OptionValue, Options};
pub use runner::{CommandOutput, CommandRunner};
pub use service::{Interface, Service, System};
pub use status::Status;
