use std::sync::mpsc::Sender;

use service_platform::{Error, Logger, Result};

/// Writes through `tracing`, i.e. to whatever subscriber the binary set up.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn error(&self, msg: &str) -> Result<()> {
        tracing::error!("{}", msg);
        Ok(())
    }

    fn warning(&self, msg: &str) -> Result<()> {
        tracing::warn!("{}", msg);
        Ok(())
    }

    fn info(&self, msg: &str) -> Result<()> {
        tracing::info!("{}", msg);
        Ok(())
    }
}

/// Report a logging failure to the sink (if any) and to the caller.
fn fail(errs: &Option<Sender<Error>>, msg: String) -> Result<()> {
    if let Some(errs) = errs {
        let _ = errs.send(Error::Log(msg.clone()));
    }
    Err(Error::Log(msg))
}

#[cfg(unix)]
mod syslog {
    use std::ffi::{CStr, CString};
    use std::sync::mpsc::Sender;
    use std::sync::OnceLock;

    use service_platform::{Error, Logger, Result};

    static IDENT: OnceLock<CString> = OnceLock::new();

    /// Ident passed to `openlog`, once a logger has been created.
    #[cfg(test)]
    pub fn ident() -> Option<&'static CStr> {
        IDENT.get().map(CString::as_c_str)
    }

    /// Forwards to the local syslog daemon under the `daemon` facility.
    ///
    /// The syslog connection is process-wide: the first logger opens it
    /// with its service name as the ident, and later loggers reuse it
    /// whatever name they were given.
    pub struct SyslogLogger {
        errs: Option<Sender<Error>>,
    }

    impl SyslogLogger {
        pub fn new(name: &str, errs: Option<Sender<Error>>) -> Result<Self> {
            let ident = CString::new(name)
                .map_err(|_| Error::InvalidConfig("service name contains a NUL byte".into()))?;
            // openlog keeps the pointer; the CString's buffer does not move
            // when it is stored.
            IDENT.get_or_init(|| {
                unsafe {
                    libc::openlog(ident.as_ptr(), libc::LOG_PID, libc::LOG_DAEMON);
                }
                ident
            });
            Ok(Self { errs })
        }

        fn send(&self, priority: libc::c_int, msg: &str) -> Result<()> {
            let Ok(msg) = CString::new(msg) else {
                return super::fail(&self.errs, "log message contains a NUL byte".into());
            };
            unsafe {
                libc::syslog(priority, b"%s\0".as_ptr() as *const libc::c_char, msg.as_ptr());
            }
            Ok(())
        }
    }

    impl Logger for SyslogLogger {
        fn error(&self, msg: &str) -> Result<()> {
            self.send(libc::LOG_ERR, msg)
        }

        fn warning(&self, msg: &str) -> Result<()> {
            self.send(libc::LOG_WARNING, msg)
        }

        fn info(&self, msg: &str) -> Result<()> {
            self.send(libc::LOG_INFO, msg)
        }
    }
}

#[cfg(unix)]
pub use syslog::SyslogLogger;

/// Tags every entry with the service name; used where no native system
/// log binding exists.
#[cfg(not(unix))]
pub struct TracingSystemLogger {
    name: String,
    errs: Option<Sender<Error>>,
}

#[cfg(not(unix))]
impl TracingSystemLogger {
    fn check(&self, msg: &str) -> Result<()> {
        if msg.contains('\0') {
            return fail(&self.errs, "log message contains a NUL byte".into());
        }
        Ok(())
    }
}

#[cfg(not(unix))]
impl Logger for TracingSystemLogger {
    fn error(&self, msg: &str) -> Result<()> {
        self.check(msg)?;
        tracing::error!(service = %self.name, "{}", msg);
        Ok(())
    }

    fn warning(&self, msg: &str) -> Result<()> {
        self.check(msg)?;
        tracing::warn!(service = %self.name, "{}", msg);
        Ok(())
    }

    fn info(&self, msg: &str) -> Result<()> {
        self.check(msg)?;
        tracing::info!(service = %self.name, "{}", msg);
        Ok(())
    }
}

/// The OS-native logger for a service named `name`.
pub fn system_logger(name: &str, errs: Option<Sender<Error>>) -> Result<Box<dyn Logger>> {
    #[cfg(unix)]
    {
        Ok(Box::new(SyslogLogger::new(name, errs)?))
    }
    #[cfg(not(unix))]
    {
        Ok(Box::new(TracingSystemLogger {
            name: name.to_string(),
            errs,
        }))
    }
}
