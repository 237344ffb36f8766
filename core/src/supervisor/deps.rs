//! Dependency gating for service startup
//!
//! A starter calls [`wait_for_dependency`] once per predecessor before its
//! service is handed to the runner. Readiness is keyed off the supervisor's
//! started markers rather than the live registry, so a short-lived
//! predecessor (a one-shot migration, say) still unblocks its dependents
//! after it has exited.

use super::Supervisor;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{error, info};

/// How often the started markers are re-checked while waiting
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Outcome of one dependency wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyWait {
    /// The predecessor has started and the extra delay has elapsed
    Ready,
    /// Global shutdown preempted the wait
    Cancelled,
    /// The deadline passed before the predecessor started
    TimedOut,
}

/// Wait until `dep` has been started, then apply `extra_delay`.
///
/// The deadline spans the calling starter's whole dependency chain, so it
/// is computed once by the caller. Both the poll sleep and the extra delay
/// are preempted by global cancellation.
pub(crate) async fn wait_for_dependency(
    sup: &Supervisor,
    dep: &str,
    extra_delay: Duration,
    deadline: Instant,
) -> DependencyWait {
    let cancel = sup.cancellation();
    loop {
        if cancel.is_cancelled() {
            return DependencyWait::Cancelled;
        }
        if Instant::now() > deadline {
            error!("dependency wait timeout exceeded for '{}'", dep);
            return DependencyWait::TimedOut;
        }

        if sup.has_started(dep) {
            if extra_delay.is_zero() {
                info!("dependency '{}' is ready", dep);
                return DependencyWait::Ready;
            }
            info!(
                "dependency '{}' is up, waiting {}s before starting dependent service",
                dep,
                extra_delay.as_secs()
            );
            tokio::select! {
                _ = sleep(extra_delay) => return DependencyWait::Ready,
                _ = cancel.cancelled() => return DependencyWait::Cancelled,
            }
        }

        info!("waiting for dependency: {}", dep);
        tokio::select! {
            _ = sleep(POLL_INTERVAL) => {}
            _ = cancel.cancelled() => return DependencyWait::Cancelled,
        }
    }
}
