// Windows session detection
//
// Services run in session 0, which has no desktop. Anything started from
// a logged-in user lands in session 1 or later.

use service_platform::Result;

#[cfg(windows)]
use windows::Win32::System::RemoteDesktop::ProcessIdToSessionId;
#[cfg(windows)]
use windows::Win32::System::Threading::GetCurrentProcessId;

/// Session ID of the current process.
#[cfg(windows)]
pub fn current_session_id() -> Result<u32> {
    let mut session_id: u32 = 0;
    unsafe {
        ProcessIdToSessionId(GetCurrentProcessId(), &mut session_id).map_err(|e| {
            service_platform::Error::io("ProcessIdToSessionId", std::io::Error::other(e))
        })?;
    }
    Ok(session_id)
}

#[cfg(windows)]
pub fn probe_interactive() -> Result<bool> {
    let session_id = current_session_id()?;
    tracing::debug!(session_id, "windows session detection");
    Ok(session_id != 0)
}

/// Off Windows the SCM family only runs under test; fall back to the
/// parent-process check the Unix families use.
#[cfg(not(windows))]
pub fn probe_interactive() -> Result<bool> {
    service_core::interactive::parent_probe()
}
