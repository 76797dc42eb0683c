use crate::error::Result;

/// Log sink handed to the workload.
pub trait Logger: Send + Sync {
    fn error(&self, msg: &str) -> Result<()>;
    fn warning(&self, msg: &str) -> Result<()>;
    fn info(&self, msg: &str) -> Result<()>;
}
