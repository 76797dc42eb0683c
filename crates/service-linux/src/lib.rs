// Linux service families: systemd first, SysV init as the fallback

pub mod systemd;
pub mod sysv;

pub use systemd::{Systemd, SystemdSystem};
pub use sysv::{Sysv, SysvSystem};
