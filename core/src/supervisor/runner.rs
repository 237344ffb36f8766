//! Service runner: owns one attempt of a service from spawn to reap
//!
//! The runner spawns the child through a PTY, registers the instance,
//! forwards its output line by line with the padded service-name prefix,
//! and drives the teardown path: on cancellation it sends SIGTERM, waits
//! out the per-service grace period, and falls back to SIGKILL. A service
//! configured with `log_file` is not spawned at all — the file is tailed
//! instead.

use super::service::ServiceProcess;
use super::Supervisor;
use crate::process::pty::{self, PtyMaster};
use crate::process;
use crate::script;
use crate::{CoreError, Result};
use schema::{ServiceSpec, ServiceState};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Polling tick for log-file tail mode
const TAIL_INTERVAL: Duration = Duration::from_secs(1);

/// Run one attempt of `spec` to completion (exit or forced kill).
///
/// The instance is registered while its child is alive and removed on the
/// way out, whichever path gets there first. A non-zero exit while running
/// is reported as an error but never escalated here; the caller decides
/// what a failure means.
pub(crate) async fn run_service(sup: Supervisor, spec: ServiceSpec) -> Result<()> {
    if let Some(log_file) = spec.log_file.clone() {
        info!(
            "service '{}' is configured to use log file: {}",
            spec.name, log_file
        );
        let cancel = sup.cancellation();
        let name = spec.name.clone();
        tokio::spawn(async move { tail_log_file(&log_file, &name, cancel).await });
        return Ok(());
    }

    info!("starting service: {}", spec.name);

    let (mut child, master) = if let Some(user) = &spec.user {
        pty::spawn_as_user(&spec.command, &spec.args, user, script::preferred_shell())?
    } else {
        pty::spawn(&spec.command, &spec.args)?
    };
    let pid = child.id().ok_or_else(|| {
        CoreError::Spawn(format!("spawned child for '{}' has no pid", spec.name))
    })?;

    let proc = Arc::new(ServiceProcess::new(
        spec.clone(),
        pid,
        sup.cancellation().child_token(),
    ));
    sup.insert_active(proc.clone());
    proc.set_state(ServiceState::Running);
    info!("service '{}' started successfully (PID: {})", spec.name, pid);

    let padded = format!("{:<width$}", spec.name, width = sup.name_width());
    tokio::spawn(pump_pty_lines(master, padded));

    let grace = sup.timeouts().service_shutdown_grace();
    // Commit to a path first; acting on the child happens after the
    // select so only one wait future ever borrows it.
    let self_exit = tokio::select! {
        status = child.wait() => Some(status),
        _ = proc.cancelled() => None,
    };

    let result = match self_exit {
        Some(status) => {
            // Self-exit: release the instance token so nothing else
            // waits on an already-dead child.
            proc.cancel();
            match status {
                Ok(st) if st.success() => Ok(()),
                Ok(st) => {
                    proc.set_error(format!("service exited with {}", st));
                    Err(CoreError::Service(format!(
                        "service '{}' exited with {}",
                        spec.name, st
                    )))
                }
                Err(e) => {
                    proc.set_error(format!("wait failed: {}", e));
                    Err(CoreError::Wait(format!(
                        "failed to wait for '{}': {}",
                        spec.name, e
                    )))
                }
            }
        }
        None => {
            proc.set_state(ServiceState::Stopping);
            info!("gracefully stopping service: {}", spec.name);
            if let Err(e) = process::signal_term(pid) {
                proc.set_error(e.to_string());
            }
            match timeout(grace, child.wait()).await {
                Ok(Ok(st)) if st.success() => {
                    info!("service '{}' stopped gracefully", spec.name);
                }
                Ok(Ok(st)) => {
                    proc.set_error(format!("service exited with {}", st));
                }
                Ok(Err(e)) => {
                    proc.set_error(format!("wait failed: {}", e));
                }
                Err(_) => {
                    warn!(
                        "force killing service '{}' after {:?} timeout",
                        spec.name, grace
                    );
                    if let Err(e) = process::signal_kill(pid) {
                        proc.set_error(e.to_string());
                    }
                    let _ = child.wait().await;
                }
            }
            Ok(())
        }
    };

    sup.remove_active(&proc);
    result
}

/// Forward PTY output line by line, prefixed with the padded service name.
///
/// Empty lines are dropped. Each emitted line is a single write to locked
/// stdout so concurrent pumps never interleave within a line. The pump
/// owns the master and closes it by dropping on end of stream.
async fn pump_pty_lines(mut master: PtyMaster, padded_name: String) {
    let mut buf = [0u8; 4096];
    let mut pending: Vec<u8> = Vec::new();
    loop {
        match master.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                pending.extend_from_slice(&buf[..n]);
                for line in drain_lines(&mut pending) {
                    emit_line(&padded_name, &line);
                }
            }
            Err(e) => {
                info!(
                    "error reading logs for service {}: {}",
                    padded_name.trim_end(),
                    e
                );
                break;
            }
        }
    }
    // A final partial line without a newline still belongs to the child.
    if !pending.is_empty() {
        let rest = String::from_utf8_lossy(&pending);
        let rest = rest.trim_end_matches('\r');
        if !rest.is_empty() {
            emit_line(&padded_name, rest);
        }
    }
}

/// Split completed lines out of `pending`, stripping CR and dropping
/// empties.
pub(crate) fn drain_lines(pending: &mut Vec<u8>) -> Vec<String> {
    let mut out = Vec::new();
    while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
        let mut line: Vec<u8> = pending.drain(..=pos).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if line.is_empty() {
            continue;
        }
        out.push(String::from_utf8_lossy(&line).into_owned());
    }
    out
}

fn emit_line(padded_name: &str, line: &str) {
    let rendered = format!("[{}] {}\n", padded_name, line);
    let mut stdout = std::io::stdout().lock();
    let _ = stdout.write_all(rendered.as_bytes());
}

/// Tail a log file in place of running a process: seek to the end, then
/// forward new lines with the service-name prefix until cancellation.
async fn tail_log_file(path: &str, name: &str, cancel: CancellationToken) {
    let mut file = match tokio::fs::File::open(path).await {
        Ok(f) => f,
        Err(e) => {
            info!("error opening log file for service {}: {}", name, e);
            return;
        }
    };
    if let Err(e) = file.seek(std::io::SeekFrom::End(0)).await {
        info!("error seeking log file for service {}: {}", name, e);
        return;
    }

    let mut reader = BufReader::new(file);
    let mut tick = tokio::time::interval(TAIL_INTERVAL);
    let mut line = String::new();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("stopping log tailing for service: {}", name);
                return;
            }
            _ = tick.tick() => {
                loop {
                    line.clear();
                    match reader.read_line(&mut line).await {
                        Ok(0) => break,
                        Ok(_) => {
                            let text = line.trim_end_matches(['\n', '\r']);
                            emit_line(name, text);
                        }
                        Err(e) => {
                            info!("error reading log file for service {}: {}", name, e);
                            return;
                        }
                    }
                }
            }
        }
    }
}
