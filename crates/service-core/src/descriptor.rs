//! File-backed services: launchd plists, systemd units, init scripts.
//!
//! The lifecycle is identical across those managers; a [`Manager`] only
//! supplies where the descriptor lives, its default template, the three
//! control commands and how to read the status output.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use tracing::{debug, info};

use service_platform::options::{USER_SERVICE, USER_SERVICE_DEFAULT};
use service_platform::{
    CommandOutput, Config, Error, Interface, Logger, Result, Service, Status,
};

use crate::host::Host;
use crate::interactive::Interactivity;
use crate::logging;
use crate::run;
use crate::template::{self, DescriptorData};

/// What a manager command needs to know about the service.
#[derive(Debug, Clone, Copy)]
pub struct Unit<'a> {
    pub name: &'a str,
    pub path: &'a Path,
    pub user: bool,
    pub run_at_load: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerCommand {
    pub program: &'static str,
    pub args: Vec<String>,
}

impl ManagerCommand {
    pub fn new<I, S>(program: &'static str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program,
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    fn run_with_output(&self, host: &Host) -> Result<CommandOutput> {
        let args: Vec<&str> = self.args.iter().map(String::as_str).collect();
        host.runner().run_with_output(self.program, &args)
    }

    fn run(&self, host: &Host) -> Result<()> {
        let args: Vec<&str> = self.args.iter().map(String::as_str).collect();
        host.runner().run(self.program, &args)
    }
}

/// How a manager's status output reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// A live process id was reported
    Running,
    /// The manager knows the service but nothing is running
    NotRunning,
    /// The manager has no record of the name
    UnknownService,
    /// Anything else: permissions, broken manager, ...
    Failed,
}

/// One file-based service manager family.
pub trait Manager: Send + Sync + 'static {
    fn platform(&self) -> &'static str;

    fn descriptor_path(&self, host: &Host, name: &str, user: bool) -> Result<PathBuf>;

    /// Option holding a caller-supplied template.
    fn template_option(&self) -> &'static str;

    fn default_template(&self) -> &'static str;

    /// Init scripts need the executable bit.
    fn executable_descriptor(&self) -> bool {
        false
    }

    fn start_command(&self, unit: &Unit<'_>) -> ManagerCommand;

    fn stop_command(&self, unit: &Unit<'_>) -> ManagerCommand;

    fn status_command(&self, unit: &Unit<'_>) -> ManagerCommand;

    fn probe(&self, output: &CommandOutput) -> Probe;
}

pub struct DescriptorService<M: Manager> {
    manager: M,
    host: Host,
    interactivity: Arc<Interactivity>,
    workload: Arc<dyn Interface>,
    config: Config,
    user_service: bool,
}

/// Structural checks shared by every family's `new`.
pub fn validate_config(config: &Config) -> Result<()> {
    if config.name.trim().is_empty() {
        return Err(Error::InvalidConfig("service name is empty".into()));
    }
    if config.name.contains(['/', '\\']) {
        return Err(Error::InvalidConfig(format!(
            "service name {:?} contains a path separator",
            config.name
        )));
    }
    config.options.validate()
}

/// Executable the manager should launch. A relative `executable` is
/// resolved against the current directory, since the manager runs it
/// from elsewhere.
pub fn executable_path(config: &Config) -> Result<PathBuf> {
    match &config.executable {
        Some(path) if path.is_absolute() => Ok(path.clone()),
        Some(path) => std::path::absolute(path).map_err(|e| Error::io(path, e)),
        None => std::env::current_exe().map_err(|e| Error::io("<current executable>", e)),
    }
}

impl<M: Manager> DescriptorService<M> {
    pub fn new(
        manager: M,
        host: Host,
        interactivity: Arc<Interactivity>,
        workload: Arc<dyn Interface>,
        config: Config,
    ) -> Result<Self> {
        validate_config(&config)?;
        let user_service = config.options.bool(USER_SERVICE, USER_SERVICE_DEFAULT);
        Ok(Self {
            manager,
            host,
            interactivity,
            workload,
            config,
            user_service,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn descriptor_path(&self) -> Result<PathBuf> {
        self.manager
            .descriptor_path(&self.host, &self.config.name, self.user_service)
    }

    /// Render the descriptor for the given executable without touching disk.
    pub fn render(&self, executable: &Path) -> Result<String> {
        let custom = self
            .config
            .options
            .string(self.manager.template_option(), "");
        let source = if custom.is_empty() {
            self.manager.default_template()
        } else {
            custom.as_str()
        };
        template::render(source, &DescriptorData::new(&self.config, executable))
    }

    fn unit<'a>(&'a self, path: &'a Path) -> Unit<'a> {
        Unit {
            name: &self.config.name,
            path,
            user: self.user_service,
            run_at_load: self.config.options.bool(
                service_platform::options::RUN_AT_LOAD,
                service_platform::options::RUN_AT_LOAD_DEFAULT,
            ),
        }
    }

    fn installed_path(&self) -> Result<PathBuf> {
        let path = self.descriptor_path()?;
        if !exists(&path)? {
            return Err(Error::NotInstalled);
        }
        Ok(path)
    }
}

fn exists(path: &Path) -> Result<bool> {
    path.try_exists().map_err(|e| Error::io(path, e))
}

/// Write `contents` to `path` only if nothing is there yet. The file is
/// staged next to the target and hard-linked into place, so readers never
/// see a partial descriptor and an existing one is never replaced.
fn write_new(path: &Path, contents: &str, executable: bool) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let staged = dir.join(format!(".{}.{}.tmp", file_name, std::process::id()));

    fs::write(&staged, contents).map_err(|e| Error::io(&staged, e))?;

    #[cfg(unix)]
    if executable {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = fs::set_permissions(&staged, fs::Permissions::from_mode(0o755)) {
            let _ = fs::remove_file(&staged);
            return Err(Error::io(&staged, e));
        }
    }
    #[cfg(not(unix))]
    let _ = executable;

    let linked = fs::hard_link(&staged, path);
    let _ = fs::remove_file(&staged);
    match linked {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            Err(Error::AlreadyInstalled(path.display().to_string()))
        }
        Err(e) => Err(Error::io(path, e)),
    }
}

impl<M: Manager> fmt::Display for DescriptorService<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config.display_name())
    }
}

impl<M: Manager> Service for DescriptorService<M> {
    fn platform(&self) -> &'static str {
        self.manager.platform()
    }

    fn install(&self) -> Result<()> {
        let path = self.descriptor_path()?;
        info!("installing {} service: {}", self.platform(), path.display());

        if exists(&path)? {
            return Err(Error::AlreadyInstalled(path.display().to_string()));
        }

        if self.user_service {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }
        }

        let executable = executable_path(&self.config)?;
        let descriptor = self.render(&executable)?;
        write_new(&path, &descriptor, self.manager.executable_descriptor())?;

        info!("service installed: {}", self.config.name);
        Ok(())
    }

    fn uninstall(&self) -> Result<()> {
        info!("uninstalling {} service: {}", self.platform(), self.config.name);

        if let Err(e) = self.stop() {
            debug!("stop before uninstall failed, continuing: {}", e);
        }

        let path = self.descriptor_path()?;
        match fs::remove_file(&path) {
            Ok(()) => {
                info!("service uninstalled: {}", self.config.name);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no descriptor at {}, nothing to remove", path.display());
                Ok(())
            }
            Err(e) => Err(Error::io(&path, e)),
        }
    }

    fn status(&self) -> Result<Status> {
        let path = self.descriptor_path()?;
        let cmd = self.manager.status_command(&self.unit(&path));
        let out = cmd.run_with_output(&self.host)?;

        match self.manager.probe(&out) {
            Probe::Running => return Ok(Status::Running),
            Probe::NotRunning | Probe::UnknownService => {}
            Probe::Failed => {
                return Err(Error::Command {
                    program: cmd.program.to_string(),
                    exit_code: out.exit_code,
                    output: out.output,
                })
            }
        }

        if exists(&path)? {
            Ok(Status::Stopped)
        } else {
            Err(Error::NotInstalled)
        }
    }

    fn start(&self) -> Result<()> {
        let path = self.installed_path()?;
        info!("starting service: {}", self.config.name);
        self.manager
            .start_command(&self.unit(&path))
            .run(&self.host)
    }

    fn stop(&self) -> Result<()> {
        let path = self.installed_path()?;
        info!("stopping service: {}", self.config.name);
        self.manager
            .stop_command(&self.unit(&path))
            .run(&self.host)
    }

    fn run(&self) -> Result<()> {
        run::run_workload(self, self.workload.as_ref(), &self.config.options)
    }

    fn logger(&self, errs: Option<Sender<Error>>) -> Result<Box<dyn Logger>> {
        if self.interactivity.get()? {
            return Ok(Box::new(logging::ConsoleLogger));
        }
        self.system_logger(errs)
    }

    fn system_logger(&self, errs: Option<Sender<Error>>) -> Result<Box<dyn Logger>> {
        logging::system_logger(&self.config.name, errs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeRunner, NoopWorkload};
    use service_platform::Options;
    use tempfile::TempDir;

    /// Minimal manager speaking a made-up `fakectl` protocol.
    struct FakeManager;

    impl Manager for FakeManager {
        fn platform(&self) -> &'static str {
            "fake"
        }
        fn descriptor_path(&self, host: &Host, name: &str, user: bool) -> Result<PathBuf> {
            if user {
                Ok(host.home_dir()?.join(".fake").join(format!("{}.conf", name)))
            } else {
                Ok(host.system_path("/etc/fake").join(format!("{}.conf", name)))
            }
        }
        fn template_option(&self) -> &'static str {
            "FakeConfig"
        }
        fn default_template(&self) -> &'static str {
            "name={{ name }}\nexec={{ path }}\nkeep_alive={{ keep_alive|bool }}\n"
        }
        fn executable_descriptor(&self) -> bool {
            true
        }
        fn start_command(&self, unit: &Unit<'_>) -> ManagerCommand {
            ManagerCommand::new("fakectl", ["start", unit.name])
        }
        fn stop_command(&self, unit: &Unit<'_>) -> ManagerCommand {
            ManagerCommand::new("fakectl", ["stop", unit.name])
        }
        fn status_command(&self, unit: &Unit<'_>) -> ManagerCommand {
            ManagerCommand::new("fakectl", ["status", unit.name])
        }
        fn probe(&self, output: &CommandOutput) -> Probe {
            match output.exit_code {
                Some(0) if output.output.starts_with("pid=") => Probe::Running,
                Some(0) => Probe::NotRunning,
                Some(4) => Probe::UnknownService,
                _ => Probe::Failed,
            }
        }
    }

    struct Fixture {
        root: TempDir,
        runner: Arc<FakeRunner>,
    }

    impl Fixture {
        fn new() -> Self {
            let root = TempDir::new().unwrap();
            fs::create_dir_all(root.path().join("etc/fake")).unwrap();
            Self {
                root,
                runner: Arc::new(FakeRunner::new()),
            }
        }

        fn host(&self) -> Host {
            Host::new(self.runner.clone())
                .with_root(self.root.path())
                .with_home(self.root.path().join("home"))
        }

        fn service_with(&self, options: Options) -> DescriptorService<FakeManager> {
            let mut config = Config::new("demo");
            config.executable = Some(PathBuf::from("/usr/local/bin/demo"));
            config.options = options;
            DescriptorService::new(
                FakeManager,
                self.host(),
                Arc::new(Interactivity::new(|| Ok(true))),
                Arc::new(NoopWorkload::default()),
                config,
            )
            .unwrap()
        }

        fn service(&self) -> DescriptorService<FakeManager> {
            self.service_with(Options::new())
        }

        fn descriptor(&self) -> PathBuf {
            self.root.path().join("etc/fake/demo.conf")
        }
    }

    #[test]
    fn test_install_writes_rendered_descriptor() {
        let fx = Fixture::new();
        fx.service().install().unwrap();

        let written = fs::read_to_string(fx.descriptor()).unwrap();
        assert_eq!(
            written,
            "name=demo\nexec=/usr/local/bin/demo\nkeep_alive=true\n"
        );
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(fx.descriptor()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
        // no manager command on install
        assert!(fx.runner.calls().is_empty());
    }

    #[test]
    fn test_install_refuses_to_overwrite() {
        let fx = Fixture::new();
        fs::write(fx.descriptor(), "hand written").unwrap();

        let err = fx.service().install().unwrap_err();
        assert!(matches!(err, Error::AlreadyInstalled(_)));
        assert_eq!(fs::read_to_string(fx.descriptor()).unwrap(), "hand written");
    }

    #[test]
    fn test_install_twice_fails_second_time() {
        let fx = Fixture::new();
        let svc = fx.service();
        svc.install().unwrap();
        assert!(matches!(svc.install(), Err(Error::AlreadyInstalled(_))));
    }

    #[test]
    fn test_install_system_scope_needs_existing_parent() {
        let fx = Fixture::new();
        fs::remove_dir_all(fx.root.path().join("etc/fake")).unwrap();
        let err = fx.service().install().unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_install_user_scope_creates_parent() {
        let fx = Fixture::new();
        let svc = fx.service_with(Options::new().with(USER_SERVICE, true));
        svc.install().unwrap();
        assert!(fx.root.path().join("home/.fake/demo.conf").is_file());
    }

    #[test]
    fn test_user_scope_without_home() {
        let fx = Fixture::new();
        let mut config = Config::new("demo");
        config.options = Options::new().with(USER_SERVICE, true);
        let svc = DescriptorService::new(
            FakeManager,
            fx.host().without_home(),
            Arc::new(Interactivity::new(|| Ok(true))),
            Arc::new(NoopWorkload::default()),
            config,
        )
        .unwrap();
        assert!(matches!(svc.install(), Err(Error::HomeDirectoryUnavailable)));
        assert!(matches!(svc.status(), Err(Error::HomeDirectoryUnavailable)));
    }

    #[test]
    fn test_template_override_and_failure() {
        let fx = Fixture::new();
        let svc = fx.service_with(Options::new().with("FakeConfig", "custom {{ name }}"));
        svc.install().unwrap();
        assert_eq!(fs::read_to_string(fx.descriptor()).unwrap(), "custom demo");

        let fx = Fixture::new();
        let svc = fx.service_with(Options::new().with("FakeConfig", "{{ nope }}"));
        assert!(matches!(svc.install(), Err(Error::Template(_))));
        assert!(!fx.descriptor().exists());
    }

    #[test]
    fn test_render_is_byte_identical() {
        let fx = Fixture::new();
        let svc = fx.service();
        let exe = Path::new("/opt/demo");
        assert_eq!(svc.render(exe).unwrap(), svc.render(exe).unwrap());
    }

    #[test]
    fn test_uninstall_is_idempotent() {
        let fx = Fixture::new();
        let svc = fx.service();
        svc.install().unwrap();
        svc.uninstall().unwrap();
        assert!(!fx.descriptor().exists());
        svc.uninstall().unwrap();
    }

    #[test]
    fn test_uninstall_ignores_stop_failure() {
        let fx = Fixture::new();
        fx.runner.respond("fakectl stop", 1, "not loaded");
        let svc = fx.service();
        svc.install().unwrap();
        svc.uninstall().unwrap();
        assert!(!fx.descriptor().exists());
        assert_eq!(fx.runner.calls(), vec!["fakectl stop demo"]);
    }

    #[test]
    fn test_install_then_status_is_stopped() {
        let fx = Fixture::new();
        fx.runner.respond("fakectl status", 0, "");
        let svc = fx.service();
        svc.install().unwrap();
        assert_eq!(svc.status().unwrap(), Status::Stopped);
    }

    #[test]
    fn test_status_mapping() {
        // running pid
        let fx = Fixture::new();
        fx.runner.respond("fakectl status", 0, "pid=42");
        assert_eq!(fx.service().status().unwrap(), Status::Running);

        // unknown service, no descriptor
        let fx = Fixture::new();
        fx.runner.respond("fakectl status", 4, "no such service");
        assert!(matches!(fx.service().status(), Err(Error::NotInstalled)));

        // unknown service, descriptor present
        let fx = Fixture::new();
        fx.runner.respond("fakectl status", 4, "no such service");
        fs::write(fx.descriptor(), "x").unwrap();
        assert_eq!(fx.service().status().unwrap(), Status::Stopped);

        // other failure
        let fx = Fixture::new();
        fx.runner.respond("fakectl status", 1, "permission denied");
        fs::write(fx.descriptor(), "x").unwrap();
        match fx.service().status() {
            Err(Error::Command {
                program, output, ..
            }) => {
                assert_eq!(program, "fakectl");
                assert_eq!(output, "permission denied");
            }
            other => panic!("unexpected status: {:?}", other),
        }
    }

    #[test]
    fn test_start_stop_require_descriptor() {
        let fx = Fixture::new();
        let svc = fx.service();
        assert!(matches!(svc.start(), Err(Error::NotInstalled)));
        assert!(matches!(svc.stop(), Err(Error::NotInstalled)));
        assert!(fx.runner.calls().is_empty());
    }

    #[test]
    fn test_start_propagates_command_error() {
        let fx = Fixture::new();
        fx.runner.respond("fakectl start", 5, "already loaded");
        let svc = fx.service();
        svc.install().unwrap();
        match svc.start() {
            Err(Error::Command { exit_code, .. }) => assert_eq!(exit_code, Some(5)),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(fx.runner.calls(), vec!["fakectl start demo"]);
    }

    #[test]
    fn test_restart_sequencing() {
        let fx = Fixture::new();
        let svc = fx.service();
        svc.install().unwrap();
        svc.restart().unwrap();
        assert_eq!(
            fx.runner.calls(),
            vec!["fakectl stop demo", "fakectl start demo"]
        );

        let fx = Fixture::new();
        fx.runner.respond("fakectl stop", 1, "busy");
        let svc = fx.service();
        svc.install().unwrap();
        assert!(matches!(svc.restart(), Err(Error::Command { .. })));
        assert_eq!(fx.runner.calls(), vec!["fakectl stop demo"]);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let fx = Fixture::new();
        let bad_option = {
            let mut c = Config::new("demo");
            c.options = Options::new().with(USER_SERVICE, 1i64);
            c
        };
        let empty_name = Config::new("  ");
        for config in [bad_option, empty_name] {
            let res = DescriptorService::new(
                FakeManager,
                fx.host(),
                Arc::new(Interactivity::new(|| Ok(true))),
                Arc::new(NoopWorkload::default()),
                config,
            );
            assert!(res.is_err());
        }
    }

    #[test]
    fn test_interactive_logger_is_console() {
        let fx = Fixture::new();
        let logger = fx.service().logger(None).unwrap();
        logger.info("hello from the test").unwrap();
    }

    #[test]
    fn test_relative_executable_is_made_absolute() {
        let mut config = Config::new("demo");
        config.executable = Some(PathBuf::from("bin/demo"));
        let path = executable_path(&config).unwrap();
        assert!(path.is_absolute());
        assert_eq!(path, std::env::current_dir().unwrap().join("bin/demo"));

        config.executable = Some(path.clone());
        assert_eq!(executable_path(&config).unwrap(), path);
    }
}
