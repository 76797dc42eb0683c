//! FreeBSD rc.d scripts, supervised by daemon(8).

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use regex::Regex;

use service_core::interactive::parent_probe;
use service_core::{
    DescriptorService, Host, Interactivity, Manager, ManagerCommand, Probe, Unit,
};
use service_platform::options::RC_SCRIPT;
use service_platform::{CommandOutput, Config, Error, Interface, Result, Service, System};

const PLATFORM: &str = "freebsd-rcd";
const RC_DIR: &str = "/usr/local/etc/rc.d";

const SCRIPT_TEMPLATE: &str = r#"#!/bin/sh
#
# PROVIDE: {{ name }}
# REQUIRE: LOGIN{% for dep in dependencies %} {{ dep }}{% endfor %}
# KEYWORD: shutdown
#
# {{ display_name }}{% if description %}: {{ description }}{% endif %}

. /etc/rc.subr

name={{ name|shell }}
rcvar="${name}_enable"

load_rc_config "$name"
: ${ {{- name }}_enable:="{{ run_at_load|yes_no }}"}
{%- if working_directory %}
{{ name }}_chdir={{ working_directory|shell }}
{%- endif %}

pidfile="/var/run/${name}.pid"
procname="/usr/sbin/daemon"
command="/usr/sbin/daemon"
command_args="-f -P ${pidfile}{% if keep_alive %} -r{% endif %}{% if user_name %} -u {{ user_name|shell }}{% endif %} -- {{ path|shell }}{% for arg in arguments %} {{ arg|shell }}{% endfor %}"

run_rc_command "$1"
"#;

fn running_pattern() -> &'static Regex {
    static RUNNING: OnceLock<Regex> = OnceLock::new();
    RUNNING.get_or_init(|| Regex::new(r"is running as pid (\d+)").expect("pid pattern compiles"))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RcD;

impl Manager for RcD {
    fn platform(&self) -> &'static str {
        PLATFORM
    }

    fn descriptor_path(&self, host: &Host, name: &str, user: bool) -> Result<PathBuf> {
        if user {
            return Err(Error::UnsupportedScope(PLATFORM));
        }
        Ok(host.system_path(RC_DIR).join(name))
    }

    fn template_option(&self) -> &'static str {
        RC_SCRIPT
    }

    fn default_template(&self) -> &'static str {
        SCRIPT_TEMPLATE
    }

    fn executable_descriptor(&self) -> bool {
        true
    }

    // The one* verbs work whether or not the rcvar is enabled.
    fn start_command(&self, unit: &Unit<'_>) -> ManagerCommand {
        ManagerCommand::new("service", [unit.name, "onestart"])
    }

    fn stop_command(&self, unit: &Unit<'_>) -> ManagerCommand {
        ManagerCommand::new("service", [unit.name, "onestop"])
    }

    fn status_command(&self, unit: &Unit<'_>) -> ManagerCommand {
        ManagerCommand::new("service", [unit.name, "onestatus"])
    }

    fn probe(&self, output: &CommandOutput) -> Probe {
        let text = output.output.as_str();
        if running_pattern().is_match(text) {
            Probe::Running
        } else if text.contains("is not running") {
            Probe::NotRunning
        } else if text.contains("does not exist") {
            Probe::UnknownService
        } else {
            Probe::Failed
        }
    }
}

pub struct RcDSystem {
    host: Host,
    interactivity: Arc<Interactivity>,
}

impl RcDSystem {
    pub fn new(host: Host) -> Self {
        Self {
            host,
            interactivity: Arc::new(Interactivity::new(parent_probe)),
        }
    }

    pub fn native() -> Self {
        Self::new(Host::native())
    }
}

impl System for RcDSystem {
    fn name(&self) -> &'static str {
        PLATFORM
    }

    fn detect(&self) -> bool {
        cfg!(target_os = "freebsd")
    }

    fn interactive(&self) -> Result<bool> {
        self.interactivity.get()
    }

    fn new_service(&self, workload: Arc<dyn Interface>, config: Config) -> Result<Box<dyn Service>> {
        let service = DescriptorService::new(
            RcD,
            self.host.clone(),
            Arc::clone(&self.interactivity),
            workload,
            config,
        )?;
        Ok(Box::new(service))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use service_core::testing::{FakeRunner, NoopWorkload};
    use service_platform::options::{KEEP_ALIVE, RUN_AT_LOAD};
    use service_platform::{Options, Status};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn out(code: i32, text: &str) -> CommandOutput {
        CommandOutput {
            exit_code: Some(code),
            output: text.to_string(),
        }
    }

    fn service(config: Config) -> DescriptorService<RcD> {
        DescriptorService::new(
            RcD,
            Host::native(),
            Arc::new(Interactivity::new(|| Ok(false))),
            Arc::new(NoopWorkload::default()),
            config,
        )
        .unwrap()
    }

    #[test]
    fn test_probe_onestatus() {
        let m = RcD;
        assert_eq!(m.probe(&out(0, "demo is running as pid 1201.")), Probe::Running);
        assert_eq!(m.probe(&out(1, "demo is not running.")), Probe::NotRunning);
        assert_eq!(
            m.probe(&out(
                1,
                "demo does not exist in /etc/rc.d or the local startup\ndirectories (/usr/local/etc/rc.d)"
            )),
            Probe::UnknownService
        );
        assert_eq!(m.probe(&out(2, "service: permission denied")), Probe::Failed);
    }

    #[test]
    fn test_paths_and_commands() {
        let host = Host::native().with_root("/jail");
        assert_eq!(
            RcD.descriptor_path(&host, "demo", false).unwrap(),
            PathBuf::from("/jail/usr/local/etc/rc.d/demo")
        );
        assert!(matches!(
            RcD.descriptor_path(&host, "demo", true),
            Err(Error::UnsupportedScope(PLATFORM))
        ));

        let unit = Unit {
            name: "demo",
            path: Path::new("/usr/local/etc/rc.d/demo"),
            user: false,
            run_at_load: false,
        };
        assert_eq!(
            RcD.start_command(&unit),
            ManagerCommand::new("service", ["demo", "onestart"])
        );
        assert_eq!(
            RcD.stop_command(&unit),
            ManagerCommand::new("service", ["demo", "onestop"])
        );
    }

    #[test]
    fn test_script_rendering() {
        let mut config = Config::new("demo");
        config.arguments = vec!["run".into()];
        config.user_name = "www".into();
        config.working_directory = Some("/var/db/demo".into());
        config.options = Options::new().with(RUN_AT_LOAD, true);
        let script = service(config)
            .render(Path::new("/usr/local/bin/demo"))
            .unwrap();

        assert!(script.starts_with("#!/bin/sh\n#\n# PROVIDE: demo\n"));
        assert!(script.contains("load_rc_config \"$name\"\n: ${demo_enable:=\"YES\"}\ndemo_chdir='/var/db/demo'\n"));
        assert!(script.contains(
            "command_args=\"-f -P ${pidfile} -r -u 'www' -- '/usr/local/bin/demo' 'run'\""
        ));
        assert!(script.ends_with("run_rc_command \"$1\"\n"));
    }

    #[test]
    fn test_script_defaults_without_keep_alive() {
        let mut config = Config::new("demo");
        config.options = Options::new().with(KEEP_ALIVE, false);
        let script = service(config).render(Path::new("/bin/demo")).unwrap();
        assert!(script.contains(": ${demo_enable:=\"NO\"}\n\npidfile="));
        assert!(script.contains("command_args=\"-f -P ${pidfile} -- '/bin/demo'\""));
    }

    #[test]
    fn test_install_and_status() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("usr/local/etc/rc.d")).unwrap();
        let runner = Arc::new(FakeRunner::new());
        runner.respond("service demo onestatus", 1, "demo is not running.");

        let system = RcDSystem::new(Host::new(runner.clone()).with_root(root.path()));
        let mut config = Config::new("demo");
        config.executable = Some("/usr/local/bin/demo".into());
        let svc = system
            .new_service(Arc::new(NoopWorkload::default()), config)
            .unwrap();

        assert!(matches!(svc.status(), Err(Error::NotInstalled)));
        svc.install().unwrap();
        assert!(root.path().join("usr/local/etc/rc.d/demo").is_file());
        assert_eq!(svc.status().unwrap(), Status::Stopped);
        svc.start().unwrap();
        assert_eq!(runner.calls().last().unwrap(), "service demo onestart");
    }
}
