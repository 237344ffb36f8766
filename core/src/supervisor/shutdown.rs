//! Coordinated teardown of the whole service set
//!
//! Shutdown is driven by the supervisor's global cancellation token: once
//! it fires, every runner tears its own child down within the per-service
//! grace period, and the coordinator here waits for the registry to drain
//! under the global budget. Stragglers get a SIGKILL wave and five more
//! seconds; after that the supervisor gives up waiting and returns anyway.
//!
//! Services are stopped concurrently, not in reverse dependency order —
//! the kernel reaps whatever is left when the parent exits.

use super::Supervisor;
use crate::process;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};

/// Extra wait after the SIGKILL wave before giving up on the registry
const KILL_WAVE_GRACE: Duration = Duration::from_secs(5);

impl Supervisor {
    /// Drain the registry to empty, enforcing the global shutdown budget.
    pub(crate) async fn drain_shutdown(&self) {
        info!("starting graceful shutdown process...");
        self.log_status_summary();

        if self.alive_count() == 0 {
            info!("no active services to shutdown");
            return;
        }

        let budget = self.timeouts().global_shutdown_budget();
        match timeout(budget, self.wait_idle()).await {
            Ok(()) => info!("all services stopped gracefully"),
            Err(_) => {
                warn!(
                    "shutdown timeout reached after {:?}, forcing termination...",
                    budget
                );
                self.force_kill_all();
                match timeout(KILL_WAVE_GRACE, self.wait_idle()).await {
                    Ok(()) => info!("all services stopped after force kill"),
                    Err(_) => {
                        warn!("some services may still be running after force kill timeout")
                    }
                }
            }
        }

        info!("graceful shutdown completed");
    }

    fn force_kill_all(&self) {
        for proc in self.snapshot() {
            info!("force killing service: {}", proc.name());
            if let Err(e) = process::signal_kill(proc.pid()) {
                error!("error force killing service {}: {}", proc.name(), e);
            }
        }
    }

    /// Resolves once the alive counter reaches zero
    async fn wait_idle(&self) {
        let mut rx = self.subscribe_alive();
        let _ = rx.wait_for(|count| *count == 0).await;
    }
}
