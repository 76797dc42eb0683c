//! Demo workload run by `servicectl run`: logs a heartbeat until stopped.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::debug;

use service_platform::{Interface, Service};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

struct Worker {
    stop_tx: Sender<()>,
    handle: JoinHandle<u64>,
}

pub struct Heartbeat {
    interval: Duration,
    worker: Mutex<Option<Worker>>,
}

impl Heartbeat {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            worker: Mutex::new(None),
        }
    }
}

impl Interface for Heartbeat {
    fn start(&self, service: &dyn Service) -> Result<()> {
        let mut slot = self
            .worker
            .lock()
            .map_err(|_| anyhow::anyhow!("heartbeat state poisoned"))?;
        if slot.is_some() {
            anyhow::bail!("heartbeat already running");
        }

        let logger = service.logger(None)?;
        logger.info(&format!("{} running on {}", service, service.platform()))?;

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let interval = self.interval;
        let handle = thread::Builder::new()
            .name("heartbeat".into())
            .spawn(move || {
                let mut beats = 0u64;
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            beats += 1;
                            if let Err(e) = logger.info(&format!("heartbeat {}", beats)) {
                                debug!("heartbeat log failed: {}", e);
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                beats
            })
            .context("failed to spawn heartbeat thread")?;

        *slot = Some(Worker { stop_tx, handle });
        Ok(())
    }

    fn stop(&self, service: &dyn Service) -> Result<()> {
        let worker = self
            .worker
            .lock()
            .map_err(|_| anyhow::anyhow!("heartbeat state poisoned"))?
            .take();
        let Some(worker) = worker else {
            return Ok(());
        };

        let _ = worker.stop_tx.send(());
        let beats = worker
            .handle
            .join()
            .map_err(|_| anyhow::anyhow!("heartbeat thread panicked"))?;
        service
            .logger(None)?
            .info(&format!("{} stopping after {} heartbeats", service, beats))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use service_core::testing::StubService;

    #[test]
    fn test_start_then_stop_joins_worker() {
        let hb = Heartbeat::new(Duration::from_millis(5));
        hb.start(&StubService).unwrap();
        thread::sleep(Duration::from_millis(30));
        hb.stop(&StubService).unwrap();
        assert!(hb.worker.lock().unwrap().is_none());
    }

    #[test]
    fn test_double_start_fails() {
        let hb = Heartbeat::new(DEFAULT_INTERVAL);
        hb.start(&StubService).unwrap();
        assert!(hb.start(&StubService).is_err());
        hb.stop(&StubService).unwrap();
    }

    #[test]
    fn test_stop_without_start_is_noop() {
        Heartbeat::new(DEFAULT_INTERVAL).stop(&StubService).unwrap();
    }
}
