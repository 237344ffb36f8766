//! Unix process signaling
//!
//! Signals target the child's pid directly. Children are made session
//! leaders by the PTY spawn path, and forwarding to grandchildren is left
//! to whatever process the child chooses to run — the supervisor makes no
//! guarantee beyond its immediate children.

use crate::{CoreError, Result};
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tracing::debug;

pub mod pty;

/// Send SIGTERM to a child for graceful termination.
///
/// `ESRCH` (no such process) and `EPERM` mean the child is already gone or
/// no longer ours; both are treated as success.
pub fn signal_term(pid: u32) -> Result<()> {
    send(pid, Signal::SIGTERM)
}

/// Send SIGKILL to a child for forced termination.
pub fn signal_kill(pid: u32) -> Result<()> {
    send(pid, Signal::SIGKILL)
}

fn send(pid: u32, signal: Signal) -> Result<()> {
    debug!("sending {} to process {}", signal, pid);
    match kill(Pid::from_raw(pid as i32), signal) {
        Ok(()) => Ok(()),
        Err(Errno::ESRCH) => {
            debug!("process {} already exited", pid);
            Ok(())
        }
        Err(Errno::EPERM) => {
            debug!("permission denied signaling process {} (likely already exited)", pid);
            Ok(())
        }
        Err(e) => Err(CoreError::Signal(format!(
            "failed to send {} to process {}: {}",
            signal, pid, e
        ))),
    }
}

/// Whether a process with this pid currently exists
pub fn is_alive(pid: u32) -> bool {
    kill(Pid::from_raw(pid as i32), None).is_ok()
}
