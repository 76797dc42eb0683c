//! Windows Service Control Manager (SCM): install/uninstall/start/stop via sc.exe.
//!
//! The SCM database is the descriptor here: `install` registers the
//! service with `sc.exe create` and there is no file on disk.

use std::fmt;
use std::path::Path;
use std::sync::mpsc::Sender;
use std::sync::Arc;

use tracing::{debug, info, warn};

use service_core::descriptor::{executable_path, validate_config};
use service_core::{logging, run, template, Host, Interactivity};
use service_platform::options::{
    KEEP_ALIVE, KEEP_ALIVE_DEFAULT, START_TYPE, START_TYPE_DEFAULT, USER_SERVICE,
    USER_SERVICE_DEFAULT, WINDOWS_BIN_PATH,
};
use service_platform::{
    CommandOutput, Config, Error, Interface, Logger, Result, Service, Status, System,
};

use crate::session;

pub(crate) const PLATFORM: &str = "windows-service";

const SC: &str = "sc.exe";

/// ERROR_SERVICE_DOES_NOT_EXIST
const SERVICE_DOES_NOT_EXIST: &str = "1060";
/// ERROR_SERVICE_NOT_ACTIVE
const SERVICE_NOT_ACTIVE: &str = "1062";

const BIN_PATH_TEMPLATE: &str = r#""{{ path }}"{% for arg in arguments %} {% if " " in arg %}"{{ arg }}"{% else %}{{ arg }}{% endif %}{% endfor %}"#;

/// Restart after 10s, 30s, then 60s; reset the failure count daily.
const RECOVERY_ACTIONS: [&str; 4] = [
    "reset=",
    "86400",
    "actions=",
    "restart/10000/restart/30000/restart/60000",
];

fn sc_start_type(value: &str) -> Result<&'static str> {
    match value {
        "automatic" => Ok("auto"),
        "manual" => Ok("demand"),
        "disabled" => Ok("disabled"),
        _ => Err(Error::InvalidOption {
            name: START_TYPE.to_string(),
            expected: "one of automatic, manual, disabled",
        }),
    }
}

fn not_installed(out: &CommandOutput) -> bool {
    out.exit_code == Some(1060) || out.output.contains(SERVICE_DOES_NOT_EXIST)
}

fn command_error(out: CommandOutput) -> Error {
    Error::Command {
        program: SC.to_string(),
        exit_code: out.exit_code,
        output: out.output,
    }
}

/// Reads the `STATE : 4  RUNNING` line of `sc.exe query`.
fn parse_state(output: &str) -> Status {
    let Some(line) = output.lines().find(|l| l.trim_start().starts_with("STATE")) else {
        return Status::Unknown;
    };
    if line.contains("RUNNING") {
        Status::Running
    } else if line.contains("STOPPED") {
        Status::Stopped
    } else {
        Status::Unknown
    }
}

struct Inner {
    host: Host,
    interactivity: Arc<Interactivity>,
    workload: Arc<dyn Interface>,
    config: Config,
}

/// A service registered with the SCM.
#[derive(Clone)]
pub struct WindowsService {
    inner: Arc<Inner>,
}

impl WindowsService {
    pub fn new(
        host: Host,
        interactivity: Arc<Interactivity>,
        workload: Arc<dyn Interface>,
        config: Config,
    ) -> Result<Self> {
        validate_config(&config)?;
        if config.options.bool(USER_SERVICE, USER_SERVICE_DEFAULT) {
            return Err(Error::UnsupportedScope(PLATFORM));
        }
        sc_start_type(&config.options.string(START_TYPE, START_TYPE_DEFAULT))?;
        Ok(Self {
            inner: Arc::new(Inner {
                host,
                interactivity,
                workload,
                config,
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub(crate) fn workload(&self) -> &dyn Interface {
        self.inner.workload.as_ref()
    }

    fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// The command line the SCM launches, rendered like any other descriptor.
    pub fn render(&self, executable: &Path) -> Result<String> {
        let custom = self.inner.config.options.string(WINDOWS_BIN_PATH, "");
        let source = if custom.is_empty() {
            BIN_PATH_TEMPLATE
        } else {
            custom.as_str()
        };
        template::render(source, &template::DescriptorData::new(&self.inner.config, executable))
    }

    fn sc(&self, args: &[&str]) -> Result<CommandOutput> {
        self.inner.host.runner().run_with_output(SC, args)
    }

    fn create_args(&self, bin_path: String) -> Result<Vec<String>> {
        let config = &self.inner.config;
        let start = sc_start_type(&config.options.string(START_TYPE, START_TYPE_DEFAULT))?;
        let mut args = vec![
            "create".to_string(),
            config.name.clone(),
            "binPath=".into(),
            bin_path,
            "DisplayName=".into(),
            config.display_name().to_string(),
            "start=".into(),
            start.into(),
        ];
        if !config.user_name.is_empty() {
            args.push("obj=".into());
            args.push(config.user_name.clone());
        }
        if !config.dependencies.is_empty() {
            args.push("depend=".into());
            args.push(config.dependencies.join("/"));
        }
        Ok(args)
    }

    /// Start or stop through sc.exe, mapping "no such service".
    fn control(&self, verb: &str) -> Result<CommandOutput> {
        let out = self.sc(&[verb, self.name()])?;
        if out.success() {
            return Ok(out);
        }
        if not_installed(&out) {
            return Err(Error::NotInstalled);
        }
        Err(command_error(out))
    }
}

impl fmt::Display for WindowsService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.inner.config.display_name())
    }
}

impl Service for WindowsService {
    fn platform(&self) -> &'static str {
        PLATFORM
    }

    fn install(&self) -> Result<()> {
        info!("installing Windows service: {}", self.name());

        let query = self.sc(&["query", self.name()])?;
        if query.success() {
            return Err(Error::AlreadyInstalled(self.name().to_string()));
        }
        if !not_installed(&query) {
            return Err(command_error(query));
        }

        let bin_path = self.render(&executable_path(&self.inner.config)?)?;
        let args = self.create_args(bin_path)?;
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.inner.host.runner().run(SC, &args)?;

        let description = &self.inner.config.description;
        if !description.is_empty() {
            let args = ["description", self.name(), description.as_str()];
            if let Err(e) = self.inner.host.runner().run(SC, &args) {
                warn!("failed to set service description: {}", e);
            }
        }

        if self.inner.config.options.bool(KEEP_ALIVE, KEEP_ALIVE_DEFAULT) {
            let mut args = vec!["failure", self.name()];
            args.extend(RECOVERY_ACTIONS);
            if let Err(e) = self.inner.host.runner().run(SC, &args) {
                warn!("failed to configure service recovery: {}", e);
            }
        }

        info!("service installed: {}", self.name());
        Ok(())
    }

    fn uninstall(&self) -> Result<()> {
        info!("uninstalling Windows service: {}", self.name());

        if let Err(e) = self.stop() {
            debug!("stop before uninstall failed, continuing: {}", e);
        }

        let out = self.sc(&["delete", self.name()])?;
        if out.success() || not_installed(&out) {
            info!("service uninstalled: {}", self.name());
            return Ok(());
        }
        Err(command_error(out))
    }

    fn status(&self) -> Result<Status> {
        let out = self.sc(&["query", self.name()])?;
        if out.success() {
            return Ok(parse_state(&out.output));
        }
        if not_installed(&out) {
            return Err(Error::NotInstalled);
        }
        Err(command_error(out))
    }

    fn start(&self) -> Result<()> {
        info!("starting service: {}", self.name());
        self.control("start").map(drop)
    }

    fn stop(&self) -> Result<()> {
        info!("stopping service: {}", self.name());
        match self.control("stop") {
            // not an error if already stopped
            Err(Error::Command { output, .. }) if output.contains(SERVICE_NOT_ACTIVE) => Ok(()),
            other => other.map(drop),
        }
    }

    fn run(&self) -> Result<()> {
        #[cfg(windows)]
        if !self.inner.interactivity.get()? {
            return crate::dispatcher::run(self.clone());
        }
        run::run_workload(self, self.workload(), &self.inner.config.options)
    }

    fn logger(&self, errs: Option<Sender<Error>>) -> Result<Box<dyn Logger>> {
        if self.inner.interactivity.get()? {
            return Ok(Box::new(logging::ConsoleLogger));
        }
        self.system_logger(errs)
    }

    fn system_logger(&self, errs: Option<Sender<Error>>) -> Result<Box<dyn Logger>> {
        logging::system_logger(self.name(), errs)
    }
}

pub struct WindowsSystem {
    host: Host,
    interactivity: Arc<Interactivity>,
}

impl WindowsSystem {
    pub fn new(host: Host) -> Self {
        Self {
            host,
            interactivity: Arc::new(Interactivity::new(session::probe_interactive)),
        }
    }

    pub fn native() -> Self {
        Self::new(Host::native())
    }
}

impl System for WindowsSystem {
    fn name(&self) -> &'static str {
        PLATFORM
    }

    fn detect(&self) -> bool {
        cfg!(windows)
    }

    fn interactive(&self) -> Result<bool> {
        self.interactivity.get()
    }

    fn new_service(&self, workload: Arc<dyn Interface>, config: Config) -> Result<Box<dyn Service>> {
        let service = WindowsService::new(
            self.host.clone(),
            Arc::clone(&self.interactivity),
            workload,
            config,
        )?;
        Ok(Box::new(service))
    }
}
