//! Hands the process to the SCM when it was started as a service.
//!
//! The SCM calls back into `service_main` on its own thread, so the
//! service handle and the outcome travel through process-wide slots.

use std::ffi::OsString;
use std::sync::mpsc::{self, SyncSender};
use std::sync::Mutex;
use std::time::Duration;

use tracing::{debug, error, info};
use windows_service::service::{
    ServiceControl, ServiceControlAccept, ServiceExitCode, ServiceState, ServiceStatus,
    ServiceType,
};
use windows_service::service_control_handler::{self, ServiceControlHandlerResult, ServiceStatusHandle};
use windows_service::{define_windows_service, service_dispatcher};

use service_core::run::SIGNAL_BUFFER;
use service_platform::{Error, Result};

use crate::scm::WindowsService;

static SERVICE: Mutex<Option<WindowsService>> = Mutex::new(None);
static OUTCOME: Mutex<Option<Result<()>>> = Mutex::new(None);

define_windows_service!(ffi_service_main, service_main);

/// Block in the SCM dispatcher until the service stops.
pub fn run(service: WindowsService) -> Result<()> {
    let name = service.config().name.clone();
    store(&SERVICE, Some(service));

    service_dispatcher::start(&name, ffi_service_main)
        .map_err(|e| Error::Dispatcher(e.to_string()))?;

    take(&OUTCOME).unwrap_or_else(|| Err(Error::Dispatcher("service main never ran".into())))
}

fn store<T>(slot: &Mutex<Option<T>>, value: Option<T>) {
    match slot.lock() {
        Ok(mut guard) => *guard = value,
        Err(poisoned) => *poisoned.into_inner() = value,
    }
}

fn take<T>(slot: &Mutex<Option<T>>) -> Option<T> {
    match slot.lock() {
        Ok(mut guard) => guard.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    }
}

fn service_main(_arguments: Vec<OsString>) {
    let outcome = match take(&SERVICE) {
        Some(service) => run_service(&service),
        None => Err(Error::Dispatcher("no service registered for dispatch".into())),
    };
    if let Err(e) = &outcome {
        error!("service exited with error: {}", e);
    }
    store(&OUTCOME, Some(outcome));
}

fn set_state(
    handle: &ServiceStatusHandle,
    state: ServiceState,
    exit_code: u32,
) -> Result<()> {
    let controls_accepted = if state == ServiceState::Running {
        ServiceControlAccept::STOP | ServiceControlAccept::SHUTDOWN
    } else {
        ServiceControlAccept::empty()
    };
    handle
        .set_service_status(ServiceStatus {
            service_type: ServiceType::OWN_PROCESS,
            current_state: state,
            controls_accepted,
            exit_code: ServiceExitCode::Win32(exit_code),
            checkpoint: 0,
            wait_hint: Duration::from_secs(10),
            process_id: None,
        })
        .map_err(|e| Error::Dispatcher(e.to_string()))
}

fn run_service(service: &WindowsService) -> Result<()> {
    let (tx, rx) = mpsc::sync_channel::<&'static str>(SIGNAL_BUFFER);
    let handle = register(service, tx)?;

    if let Err(e) = service.workload().start(service) {
        set_state(&handle, ServiceState::Stopped, 1)?;
        return Err(e.into());
    }
    set_state(&handle, ServiceState::Running, 0)?;
    info!("{} started", service);

    match rx.recv() {
        Ok(control) => info!("received {} request", control),
        Err(_) => debug!("control handler went away"),
    }

    set_state(&handle, ServiceState::StopPending, 0)?;
    info!("stopping {}", service);
    let stopped = service.workload().stop(service).map_err(Error::from);
    let exit_code = if stopped.is_ok() { 0 } else { 1 };
    set_state(&handle, ServiceState::Stopped, exit_code)?;
    stopped
}

fn register(service: &WindowsService, tx: SyncSender<&'static str>) -> Result<ServiceStatusHandle> {
    let handler = move |control: ServiceControl| {
        let label = match control {
            ServiceControl::Stop => "stop",
            ServiceControl::Shutdown => "shutdown",
            ServiceControl::Interrogate => return ServiceControlHandlerResult::NoError,
            _ => return ServiceControlHandlerResult::NotImplemented,
        };
        if tx.try_send(label).is_err() {
            debug!("control buffer full, dropping {}", label);
        }
        ServiceControlHandlerResult::NoError
    };
    service_control_handler::register(&service.config().name, handler)
        .map_err(|e| Error::Dispatcher(e.to_string()))
}
