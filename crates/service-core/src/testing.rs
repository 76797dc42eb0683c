//! Test doubles shared by the family crates.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Mutex;

use service_platform::{
    CommandOutput, CommandRunner, Error, Interface, Logger, Result, Service, Status,
};

/// Records every command and answers from a table of canned responses.
///
/// A response matches when the rendered command line starts with its
/// prefix; unmatched commands succeed with empty output.
#[derive(Default)]
pub struct FakeRunner {
    calls: Mutex<Vec<String>>,
    responses: Mutex<Vec<(String, CommandOutput)>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, prefix: &str, exit_code: i32, output: &str) {
        self.responses.lock().unwrap().push((
            prefix.to_string(),
            CommandOutput {
                exit_code: Some(exit_code),
                output: output.to_string(),
            },
        ));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandRunner for FakeRunner {
    fn run_with_output(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let line = if args.is_empty() {
            program.to_string()
        } else {
            format!("{} {}", program, args.join(" "))
        };
        self.calls.lock().unwrap().push(line.clone());

        let responses = self.responses.lock().unwrap();
        let out = responses
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, out)| out.clone())
            .unwrap_or(CommandOutput {
                exit_code: Some(0),
                output: String::new(),
            });
        Ok(out)
    }
}

/// Workload that counts calls and can be told to fail.
#[derive(Default)]
pub struct NoopWorkload {
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    fail_start: bool,
    fail_stop: bool,
}

impl NoopWorkload {
    pub fn failing_start() -> Self {
        Self {
            fail_start: true,
            ..Self::default()
        }
    }

    pub fn failing_stop() -> Self {
        Self {
            fail_stop: true,
            ..Self::default()
        }
    }
}

impl Interface for NoopWorkload {
    fn start(&self, _service: &dyn Service) -> anyhow::Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            anyhow::bail!("start failed");
        }
        Ok(())
    }

    fn stop(&self, _service: &dyn Service) -> anyhow::Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if self.fail_stop {
            anyhow::bail!("stop failed");
        }
        Ok(())
    }
}

/// Service handle for exercising the run loop on its own.
pub struct StubService;

impl fmt::Display for StubService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("stub")
    }
}

impl Service for StubService {
    fn platform(&self) -> &'static str {
        "stub"
    }

    fn install(&self) -> Result<()> {
        Ok(())
    }

    fn uninstall(&self) -> Result<()> {
        Ok(())
    }

    fn status(&self) -> Result<Status> {
        Ok(Status::Unknown)
    }

    fn start(&self) -> Result<()> {
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        Ok(())
    }

    fn run(&self) -> Result<()> {
        Ok(())
    }

    fn logger(&self, _errs: Option<Sender<Error>>) -> Result<Box<dyn Logger>> {
        Ok(Box::new(crate::logging::ConsoleLogger))
    }

    fn system_logger(&self, _errs: Option<Sender<Error>>) -> Result<Box<dyn Logger>> {
        Ok(Box::new(crate::logging::ConsoleLogger))
    }
}
