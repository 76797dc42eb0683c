//! SysV init scripts for hosts without systemd.

use std::path::PathBuf;
use std::sync::Arc;

use service_core::interactive::parent_probe;
use service_core::{
    DescriptorService, Host, Interactivity, Manager, ManagerCommand, Probe, Unit,
};
use service_platform::options::SYSV_SCRIPT;
use service_platform::{CommandOutput, Config, Error, Interface, Result, Service, System};

const PLATFORM: &str = "linux-sysv";
const INIT_DIR: &str = "/etc/init.d";

const SCRIPT_TEMPLATE: &str = r#"#!/bin/sh
# For RedHat and cousins:
# chkconfig: - 99 01
# description: {{ description }}
# processname: {{ path }}

### BEGIN INIT INFO
# Provides:          {{ name }}
# Required-Start:    $remote_fs $syslog{% for dep in dependencies %} {{ dep }}{% endfor %}
# Required-Stop:     $remote_fs $syslog{% for dep in dependencies %} {{ dep }}{% endfor %}
# Default-Start:     2 3 4 5
# Default-Stop:      0 1 6
# Short-Description: {{ display_name }}
# Description:       {{ description }}
### END INIT INFO

name={{ name|shell }}
pid_file="/var/run/$name.pid"
stdout_log="/var/log/$name.log"
stderr_log="/var/log/$name.err"

get_pid() {
    cat "$pid_file"
}

is_running() {
    [ -f "$pid_file" ] && kill -0 "$(get_pid)" > /dev/null 2>&1
}

case "$1" in
    start)
        if is_running; then
            echo "Already started"
        else
            echo "Starting $name"
{%- if working_directory %}
            cd {{ working_directory|shell }} || exit 1
{%- endif %}
            {{ path|shell }}{% for arg in arguments %} {{ arg|shell }}{% endfor %} >> "$stdout_log" 2>> "$stderr_log" &
            echo $! > "$pid_file"
            if ! is_running; then
                echo "Unable to start, see $stdout_log and $stderr_log"
                exit 1
            fi
        fi
    ;;
    stop)
        if is_running; then
            echo "Stopping $name"
            kill "$(get_pid)"
            for i in 1 2 3 4 5 6 7 8 9 10; do
                is_running || break
                sleep 1
            done
            if is_running; then
                echo "Not stopped; may still be shutting down or shutdown may have failed"
                exit 1
            fi
            echo "Stopped"
            rm -f "$pid_file"
        else
            echo "Not running"
        fi
    ;;
    restart)
        $0 stop
        if is_running; then
            echo "Unable to stop, will not attempt to start"
            exit 1
        fi
        $0 start
    ;;
    status)
        if is_running; then
            echo "Running (pid $(get_pid))"
        else
            echo "Stopped"
            exit 3
        fi
    ;;
    *)
        echo "Usage: $0 {start|stop|restart|status}"
        exit 1
    ;;
esac
exit 0
"#;

/// Init-script family driven by `service(8)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sysv;

impl Manager for Sysv {
    fn platform(&self) -> &'static str {
        PLATFORM
    }

    fn descriptor_path(&self, host: &Host, name: &str, user: bool) -> Result<PathBuf> {
        if user {
            return Err(Error::UnsupportedScope(PLATFORM));
        }
        Ok(host.system_path(INIT_DIR).join(name))
    }

    fn template_option(&self) -> &'static str {
        SYSV_SCRIPT
    }

    fn default_template(&self) -> &'static str {
        SCRIPT_TEMPLATE
    }

    fn executable_descriptor(&self) -> bool {
        true
    }

    fn start_command(&self, unit: &Unit<'_>) -> ManagerCommand {
        ManagerCommand::new("service", [unit.name, "start"])
    }

    fn stop_command(&self, unit: &Unit<'_>) -> ManagerCommand {
        ManagerCommand::new("service", [unit.name, "stop"])
    }

    fn status_command(&self, unit: &Unit<'_>) -> ManagerCommand {
        ManagerCommand::new("service", [unit.name, "status"])
    }

    /// LSB status codes: 0 running, 1-3 not running, 4 unknown. `service`
    /// itself prints "unrecognized service" for names it cannot find.
    fn probe(&self, output: &CommandOutput) -> Probe {
        if output.output.contains("unrecognized service") {
            return Probe::UnknownService;
        }
        match output.exit_code {
            Some(0) => Probe::Running,
            Some(1..=3) => Probe::NotRunning,
            Some(4) => Probe::UnknownService,
            _ => Probe::Failed,
        }
    }
}

pub struct SysvSystem {
    host: Host,
    interactivity: Arc<Interactivity>,
}

impl SysvSystem {
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

impl System for SysvSystem {
    fn name(&self) -> &'static str {
        PLATFORM
    }

    fn detect(&self) -> bool {
        cfg!(target_os = "linux") && self.host.system_path(INIT_DIR).is_dir()
    }

    fn interactive(&self) -> Result<bool> {
        self.interactivity.get()
    }

    fn new_service(&self, workload: Arc<dyn Interface>, config: Config) -> Result<Box<dyn Service>> {
        let service = DescriptorService::new(
            Sysv,
            self.host.clone(),
            Arc::clone(&self.interactivity),
            workload,
            config,
        )?;
        Ok(Box::new(service))
    }
}
