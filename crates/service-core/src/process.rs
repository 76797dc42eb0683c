use std::process::Command;

use tracing::debug;

use service_platform::{CommandOutput, CommandRunner, Error, Result};

/// Runs manager commands as child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run_with_output(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        debug!("running: {} {}", program, args.join(" "));

        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| Error::io(program, e))?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        debug!("{} exited with {:?}", program, output.status.code());
        Ok(CommandOutput {
            exit_code: output.status.code(),
            output: combined,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_captures_output_and_exit_code() {
        let out = ProcessRunner
            .run_with_output("sh", &["-c", "echo out; echo err >&2; exit 3"])
            .unwrap();
        assert_eq!(out.exit_code, Some(3));
        assert!(out.output.contains("out"));
        assert!(out.output.contains("err"));
    }

    #[test]
    fn test_run_maps_nonzero_exit_to_command_error() {
        let err = ProcessRunner.run("sh", &["-c", "echo nope; exit 1"]).unwrap_err();
        match err {
            Error::Command {
                program,
                exit_code,
                output,
            } => {
                assert_eq!(program, "sh");
                assert_eq!(exit_code, Some(1));
                assert_eq!(output.trim(), "nope");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_program_is_io_error() {
        let err = ProcessRunner
            .run_with_output("definitely-not-a-real-program-xyz", &[])
            .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
