// Windows service family: the Service Control Manager

pub mod scm;
pub mod session;

#[cfg(windows)]
mod dispatcher;

pub use scm::{WindowsService, WindowsSystem};
