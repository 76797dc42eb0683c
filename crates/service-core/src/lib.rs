// Service lifecycle machinery shared by the platform families

pub mod descriptor;
pub mod host;
pub mod interactive;
pub mod logging;
pub mod process;
pub mod registry;
pub mod run;
pub mod template;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use descriptor::{DescriptorService, Manager, ManagerCommand, Probe, Unit};
pub use host::Host;
pub use interactive::Interactivity;
pub use process::ProcessRunner;
pub use registry::Registry;
