//! PTY-backed process spawning
//!
//! The supervisor owns the master side of a pseudo-terminal for every child
//! it spawns, so children behave as if attached to a terminal: line
//! buffering and color output are preserved. The child becomes a session
//! leader with the slave as its controlling terminal.
//!
//! ## Ownership
//!
//! The returned [`PtyMaster`] is a scoped resource: whichever task ends up
//! holding it (the log pump) closes the descriptor exactly once by dropping
//! it. Reading `EIO` from a PTY master means every slave descriptor is gone
//! — the child exited — and is reported as end of stream.

// Process setup requires raw libc calls between fork and exec.
#![allow(unsafe_code)]

use crate::{CoreError, Result};
use nix::pty::openpty;
use std::os::fd::{AsRawFd, OwnedFd};
use std::process::Stdio;
use tokio::io::unix::AsyncFd;
use tokio::io::Interest;
use tokio::process::{Child, Command};
use tracing::debug;

/// Master side of a PTY, readable from async tasks
#[derive(Debug)]
pub struct PtyMaster {
    fd: AsyncFd<OwnedFd>,
}

impl PtyMaster {
    fn new(fd: OwnedFd) -> Result<Self> {
        set_nonblocking(&fd)?;
        let fd = AsyncFd::with_interest(fd, Interest::READABLE).map_err(CoreError::Io)?;
        Ok(Self { fd })
    }

    /// Read available bytes, waiting for readiness first.
    ///
    /// Returns `Ok(0)` at end of stream; `EIO` counts as end of stream
    /// because it is how a PTY master reports a vanished slave side.
    pub async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        loop {
            let mut guard = self.fd.readable_mut().await?;
            match guard.try_io(|inner| raw_read(inner.get_ref().as_raw_fd(), buf)) {
                Ok(Ok(n)) => return Ok(n),
                Ok(Err(e)) if e.raw_os_error() == Some(libc::EIO) => return Ok(0),
                Ok(Err(e)) => return Err(e),
                Err(_would_block) => continue,
            }
        }
    }
}

fn raw_read(fd: i32, buf: &mut [u8]) -> std::io::Result<usize> {
    // Safety: the fd is open for the duration of the call and buf is a
    // valid writable region of the stated length.
    let n = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
    if n < 0 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(n as usize)
    }
}

fn set_nonblocking(fd: &OwnedFd) -> Result<()> {
    // Safety: plain fcntl flag manipulation on an owned, open descriptor.
    let res = unsafe {
        let flags = libc::fcntl(fd.as_raw_fd(), libc::F_GETFL);
        if flags < 0 {
            -1
        } else {
            libc::fcntl(fd.as_raw_fd(), libc::F_SETFL, flags | libc::O_NONBLOCK)
        }
    };
    if res < 0 {
        return Err(CoreError::Io(std::io::Error::last_os_error()));
    }
    Ok(())
}

/// Spawn `command args…` attached to a fresh PTY, inheriting the parent
/// environment.
pub fn spawn(command: &str, args: &[String]) -> Result<(Child, PtyMaster)> {
    let mut cmd = Command::new(command);
    cmd.args(args);
    spawn_with_pty(cmd, command)
}

/// Spawn the command under another login via `su -s <shell> -c`, attached
/// to a fresh PTY.
pub fn spawn_as_user(
    command: &str,
    args: &[String],
    user: &str,
    shell: &str,
) -> Result<(Child, PtyMaster)> {
    let mut full_command = command.to_string();
    if !args.is_empty() {
        full_command.push(' ');
        full_command.push_str(&args.join(" "));
    }
    let mut cmd = Command::new("su");
    cmd.args(["-s", shell, "-c", &full_command, user]);
    spawn_with_pty(cmd, command)
}

fn spawn_with_pty(mut cmd: Command, display_name: &str) -> Result<(Child, PtyMaster)> {
    let pty = openpty(None, None)
        .map_err(|e| CoreError::Spawn(format!("openpty failed for '{}': {}", display_name, e)))?;

    let stdin = pty.slave.try_clone().map_err(CoreError::Io)?;
    let stdout = pty.slave.try_clone().map_err(CoreError::Io)?;
    cmd.stdin(Stdio::from(stdin));
    cmd.stdout(Stdio::from(stdout));
    cmd.stderr(Stdio::from(pty.slave));

    // Safety: setsid and ioctl are async-signal-safe; this runs in the
    // child between fork and exec. The slave is on fd 0 at that point, so
    // TIOCSCTTY attaches it as the controlling terminal.
    unsafe {
        cmd.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(std::io::Error::last_os_error());
            }
            if libc::ioctl(0, libc::TIOCSCTTY as libc::c_ulong, 0) == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }

    let child = cmd
        .spawn()
        .map_err(|e| CoreError::Spawn(format!("failed to spawn '{}': {}", display_name, e)))?;
    debug!("spawned '{}' with pid {:?}", display_name, child.id());

    Ok((child, PtyMaster::new(pty.master)?))
}
