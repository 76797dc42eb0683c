use crate::error::{Error, Result};

/// Result of a manager command that ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    /// stdout followed by stderr
    pub output: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Executes service manager commands.
pub trait CommandRunner: Send + Sync {
    /// Run a program and capture its output. A non-zero exit is not an
    /// error here; only failing to launch the program is.
    fn run_with_output(&self, program: &str, args: &[&str]) -> Result<CommandOutput>;

    /// Run a program, turning a non-zero exit into `Error::Command`.
    fn run(&self, program: &str, args: &[&str]) -> Result<()> {
        let out = self.run_with_output(program, args)?;
        if !out.success() {
            return Err(Error::Command {
                program: program.to_string(),
                exit_code: out.exit_code,
                output: out.output,
            });
        }
        Ok(())
    }
}
