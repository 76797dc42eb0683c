// macOS service family
pub mod launchd;

pub use launchd::{Launchd, LaunchdSystem};
