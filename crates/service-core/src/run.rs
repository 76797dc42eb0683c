use std::io;

use tokio::runtime::{Builder, Runtime};
use tokio::sync::mpsc;
use tracing::{debug, info};

use service_platform::options::{WaitFn, RUN_WAIT};
use service_platform::{Error, Interface, Options, Result, Service};

/// Capacity of the signal channel; extra deliveries beyond this are dropped.
pub const SIGNAL_BUFFER: usize = 3;

/// Termination listeners registered ahead of the wait. Signals delivered
/// between [`SignalWait::arm`] and [`SignalWait::wait`] stay queued.
pub struct SignalWait {
    rt: Runtime,
    rx: mpsc::Receiver<&'static str>,
}

impl SignalWait {
    pub fn arm() -> Result<Self> {
        let rt = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(Error::Signal)?;
        let (tx, rx) = mpsc::channel::<&'static str>(SIGNAL_BUFFER);
        rt.block_on(async { forward_signals(&tx) })?;
        Ok(Self { rt, rx })
    }

    /// Block until SIGTERM or SIGINT (Ctrl-C / Ctrl-Break on Windows).
    /// Returns the signal's name.
    pub fn wait(self) -> Result<&'static str> {
        let Self { rt, mut rx } = self;
        rt.block_on(async move {
            rx.recv().await.ok_or_else(|| {
                Error::Signal(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "signal listeners exited",
                ))
            })
        })
    }
}

enum Waiter {
    Custom(WaitFn),
    Signals(SignalWait),
}

/// Start the workload, wait for a termination request, stop the workload.
///
/// If `start` fails nothing else happens. The wait is the `RunWait`
/// option when present, otherwise a [`SignalWait`] armed before `start`.
pub fn run_workload(service: &dyn Service, workload: &dyn Interface, options: &Options) -> Result<()> {
    let waiter = match options.wait(RUN_WAIT) {
        Some(wait) => Waiter::Custom(wait),
        None => Waiter::Signals(SignalWait::arm()?),
    };

    workload.start(service)?;
    info!("{} started", service);

    let waited = match waiter {
        Waiter::Custom(wait) => {
            wait();
            Ok(())
        }
        Waiter::Signals(signals) => signals.wait().map(|signal| info!("received {}", signal)),
    };

    info!("stopping {}", service);
    let stopped = workload.stop(service).map_err(Error::from);
    waited?;
    stopped
}

/// Arm the listeners and block until a termination signal arrives.
pub fn wait_for_termination() -> Result<&'static str> {
    SignalWait::arm()?.wait()
}

fn forward(tx: &mpsc::Sender<&'static str>, label: &'static str) {
    if tx.try_send(label).is_err() {
        debug!("signal buffer full, dropping {}", label);
    }
}

#[cfg(unix)]
fn forward_signals(tx: &mpsc::Sender<&'static str>) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    for (kind, label) in [
        (SignalKind::terminate(), "SIGTERM"),
        (SignalKind::interrupt(), "SIGINT"),
    ] {
        let mut stream = signal(kind).map_err(Error::Signal)?;
        let tx = tx.clone();
        tokio::spawn(async move {
            while stream.recv().await.is_some() {
                forward(&tx, label);
            }
        });
    }
    Ok(())
}

#[cfg(windows)]
fn forward_signals(tx: &mpsc::Sender<&'static str>) -> Result<()> {
    use tokio::signal::windows::{ctrl_break, ctrl_c};

    let mut c = ctrl_c().map_err(Error::Signal)?;
    let mut brk = ctrl_break().map_err(Error::Signal)?;

    let c_tx = tx.clone();
    tokio::spawn(async move {
        while c.recv().await.is_some() {
            forward(&c_tx, "Ctrl-C");
        }
    });
    let brk_tx = tx.clone();
    tokio::spawn(async move {
        while brk.recv().await.is_some() {
            forward(&brk_tx, "Ctrl-Break");
        }
    });
    Ok(())
}
