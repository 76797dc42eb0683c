//! systemd units, controlled through systemctl.

use std::path::PathBuf;
use std::sync::Arc;

use service_core::interactive::parent_probe;
use service_core::{
    DescriptorService, Host, Interactivity, Manager, ManagerCommand, Probe, Unit,
};
use service_platform::options::SYSTEMD_SCRIPT;
use service_platform::{CommandOutput, Config, Interface, Result, Service, System};

const PLATFORM: &str = "linux-systemd";

const SYSTEM_UNIT_DIR: &str = "/etc/systemd/system";
const USER_UNIT_DIR: &str = ".config/systemd/user";

const UNIT_TEMPLATE: &str = r#"[Unit]
Description={% if description %}{{ description }}{% else %}{{ display_name }}{% endif %}
ConditionFileIsExecutable={{ path }}
{%- for dep in dependencies %}
After={{ dep }}
Wants={{ dep }}
{%- endfor %}

[Service]
StartLimitInterval=5
StartLimitBurst=10
ExecStart={{ path|shell }}{% for arg in arguments %} {{ arg|shell }}{% endfor %}
{%- if working_directory %}
WorkingDirectory={{ working_directory }}
{%- endif %}
{%- if user_name and not user_service %}
User={{ user_name }}
{%- endif %}
{%- if keep_alive %}
Restart={{ restart }}
RestartSec=120
{%- endif %}

[Install]
WantedBy={% if user_service %}default.target{% else %}multi-user.target{% endif %}
"#;

/// Unit-file family driven by `systemctl`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Systemd;

impl Systemd {
    fn systemctl(unit: &Unit<'_>, verb: &[&str]) -> ManagerCommand {
        let mut args: Vec<String> = Vec::new();
        if unit.user {
            args.push("--user".into());
        }
        args.extend(verb.iter().map(|v| v.to_string()));
        args.push(format!("{}.service", unit.name));
        ManagerCommand::new("systemctl", args)
    }
}

impl Manager for Systemd {
    fn platform(&self) -> &'static str {
        PLATFORM
    }

    fn descriptor_path(&self, host: &Host, name: &str, user: bool) -> Result<PathBuf> {
        let file = format!("{}.service", name);
        if user {
            return Ok(host.home_dir()?.join(USER_UNIT_DIR).join(file));
        }
        Ok(host.system_path(SYSTEM_UNIT_DIR).join(file))
    }

    fn template_option(&self) -> &'static str {
        SYSTEMD_SCRIPT
    }

    fn default_template(&self) -> &'static str {
        UNIT_TEMPLATE
    }

    // With RunAtLoad the unit is also enabled so it comes back at boot.
    fn start_command(&self, unit: &Unit<'_>) -> ManagerCommand {
        if unit.run_at_load {
            Self::systemctl(unit, &["enable", "--now"])
        } else {
            Self::systemctl(unit, &["start"])
        }
    }

    fn stop_command(&self, unit: &Unit<'_>) -> ManagerCommand {
        if unit.run_at_load {
            Self::systemctl(unit, &["disable", "--now"])
        } else {
            Self::systemctl(unit, &["stop"])
        }
    }

    fn status_command(&self, unit: &Unit<'_>) -> ManagerCommand {
        Self::systemctl(unit, &["show", "--property=MainPID", "--property=LoadState"])
    }

    /// `systemctl show` exits 0 even for unknown units and reports them
    /// as `LoadState=not-found`.
    fn probe(&self, output: &CommandOutput) -> Probe {
        if !output.success() {
            return Probe::Failed;
        }

        let mut main_pid = None;
        let mut load_state = None;
        for line in output.output.lines() {
            if let Some(pid) = line.strip_prefix("MainPID=") {
                main_pid = pid.trim().parse::<u32>().ok();
            } else if let Some(state) = line.strip_prefix("LoadState=") {
                load_state = Some(state.trim());
            }
        }

        match (load_state, main_pid) {
            (Some("not-found"), _) => Probe::UnknownService,
            (_, Some(pid)) if pid > 0 => Probe::Running,
            (None, None) => Probe::Failed,
            _ => Probe::NotRunning,
        }
    }
}

/// True when the parent is a `systemd` process, which covers
/// `systemd --user` managers as well as PID 1.
#[cfg(target_os = "linux")]
fn parent_is_systemd() -> bool {
    let comm = format!("/proc/{}/comm", std::os::unix::process::parent_id());
    std::fs::read_to_string(comm)
        .map(|name| name.trim_end() == "systemd")
        .unwrap_or(false)
}

#[cfg(not(target_os = "linux"))]
fn parent_is_systemd() -> bool {
    false
}

fn probe_interactive() -> Result<bool> {
    Ok(parent_probe()? && !parent_is_systemd())
}

pub struct SystemdSystem {
    host: Host,
    interactivity: Arc<Interactivity>,
}

impl SystemdSystem {
    pub fn new(host: Host) -> Self {
        Self {
            host,
            interactivity: Arc::new(Interactivity::new(probe_interactive)),
        }
    }

    pub fn native() -> Self {
        Self::new(Host::native())
    }
}

impl System for SystemdSystem {
    fn name(&self) -> &'static str {
        PLATFORM
    }

    fn detect(&self) -> bool {
        cfg!(target_os = "linux") && self.host.system_path("/run/systemd/system").is_dir()
    }

    fn interactive(&self) -> Result<bool> {
        self.interactivity.get()
    }

    fn new_service(&self, workload: Arc<dyn Interface>, config: Config) -> Result<Box<dyn Service>> {
        let service = DescriptorService::new(
            Systemd,
            self.host.clone(),
            Arc::clone(&self.interactivity),
            workload,
            config,
        )?;
        Ok(Box::new(service))
    }
}
