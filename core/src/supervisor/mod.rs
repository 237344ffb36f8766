//! Service lifecycle supervision
//!
//! This module provides the concurrent state machine at the center of
//! roost: dependency-ordered startup, per-service runners owning children
//! through PTYs, a registry of live instances, and a bounded shutdown.
//!
//! ## Architecture
//!
//! One [`Supervisor`] value owns every piece of cross-service state — the
//! registry of live [`ServiceProcess`] records, the started markers that
//! gate dependents, the global cancellation token, and the alive counter
//! the shutdown coordinator drains against. Tasks receive clones of the
//! supervisor instead of reaching for globals, so tests can run several
//! supervisors side by side.
//!
//! Per service, a *starter* task runs the pre-script, blocks on the
//! dependency gate, and hands the spec to the *runner*
//! ([`runner::run_service`]), which drives one instance through:
//!
//! ```text
//! Pending → Starting → Running → Stopping → Stopped
//! ```
//!
//! `Failed` is sticky from any non-terminal state. The started marker is
//! set right after the hand-off — "has been launched", not "has exited
//! successfully" — so even a short-lived predecessor unblocks dependents.

use crate::process;
use crate::script;
use crate::{CoreError, Result};
use self::deps::DependencyWait;
use schema::{Config, ServiceInfo, ServiceSpec, ServiceState, Timeouts};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub mod deps;
pub mod runner;
pub mod service;
mod shutdown;

#[cfg(test)]
mod integration_tests;

pub use self::service::ServiceProcess;

/// Settle time between cancelling an instance and force-killing it on
/// restart
const RESTART_SETTLE: Duration = Duration::from_secs(2);
/// Pause before the replacement instance is spawned
const RESTART_RESPAWN_DELAY: Duration = Duration::from_secs(1);

/// Registry-wide state counts for the `get_status` verb
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSummary {
    pub total: usize,
    pub running: usize,
    pub failed: usize,
}

/// The supervisor: shared owner of all cross-service runtime state
#[derive(Debug, Clone)]
pub struct Supervisor {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    config: Config,
    registry: RwLock<HashMap<String, Arc<ServiceProcess>>>,
    started: Mutex<HashSet<String>>,
    shutdown: CancellationToken,
    alive: watch::Sender<usize>,
    name_width: usize,
}

impl Supervisor {
    /// Create a supervisor over an already-validated configuration.
    pub fn new(config: Config) -> Self {
        let name_width = config
            .services
            .iter()
            .map(|s| s.name.len())
            .max()
            .unwrap_or(0);
        let (alive, _) = watch::channel(0usize);
        Self {
            shared: Arc::new(Shared {
                config,
                registry: RwLock::new(HashMap::new()),
                started: Mutex::new(HashSet::new()),
                shutdown: CancellationToken::new(),
                alive,
                name_width,
            }),
        }
    }

    pub fn timeouts(&self) -> Timeouts {
        self.shared.config.timeouts
    }

    /// The global cancellation token; fires once on shutdown
    pub fn cancellation(&self) -> CancellationToken {
        self.shared.shutdown.clone()
    }

    /// Broadcast the shutdown signal. Idempotent.
    pub fn trigger_shutdown(&self) {
        self.shared.shutdown.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shared.shutdown.is_cancelled()
    }

    pub(crate) fn name_width(&self) -> usize {
        self.shared.name_width
    }

    /// Run the supervisor to completion: launch a starter per enabled
    /// service, then block until shutdown is triggered and the registry
    /// has drained.
    pub async fn run(&self) -> Result<()> {
        let mut starters = JoinSet::new();
        for spec in &self.shared.config.services {
            if !spec.enabled {
                info!("service '{}' is disabled, skipping", spec.name);
                continue;
            }
            let sup = self.clone();
            let spec = spec.clone();
            starters.spawn(async move { sup.start_service(spec).await });
        }

        // Print the summary once every start attempt has settled.
        let sup = self.clone();
        tokio::spawn(async move {
            while starters.join_next().await.is_some() {}
            sup.log_status_summary();
        });

        self.shared.shutdown.cancelled().await;
        info!("shutdown signal received, stopping all services...");
        self.drain_shutdown().await;
        Ok(())
    }

    /// Per-service starter: pre-script, dependency gate, runner hand-off,
    /// post-script scheduling.
    async fn start_service(&self, spec: ServiceSpec) {
        if self.is_shutting_down() {
            warn!("shutdown signal received, skipping service: {}", spec.name);
            return;
        }

        if !self.run_pre_script(&spec).await {
            return;
        }

        if !self.await_dependencies(&spec).await {
            return;
        }

        let runner = {
            let sup = self.clone();
            let spec = spec.clone();
            tokio::spawn(async move { runner::run_service(sup, spec).await })
        };

        // Launched, not exited: this is what unblocks dependents.
        self.mark_started(&spec.name);

        let post = {
            let sup = self.clone();
            let spec = spec.clone();
            tokio::spawn(async move { sup.run_post_script(spec).await })
        };

        match runner.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.handle_service_error(&spec, &e),
            Err(join_err) => error!("runner task for '{}' panicked: {}", spec.name, join_err),
        }
        let _ = post.await;
    }

    async fn run_pre_script(&self, spec: &ServiceSpec) -> bool {
        let Some(path) = &spec.pre_script else {
            return true;
        };
        info!("running pre-script for service '{}'", spec.name);
        match script::run_script(path).await {
            Ok(()) => {
                info!("pre-script for service '{}' finished", spec.name);
                true
            }
            Err(e) => {
                error!("error executing pre-script for service '{}': {}", spec.name, e);
                if spec.required {
                    error!(
                        "required service '{}' pre-script failed, initiating shutdown",
                        spec.name
                    );
                    self.trigger_shutdown();
                }
                false
            }
        }
    }

    async fn await_dependencies(&self, spec: &ServiceSpec) -> bool {
        if spec.depends_on.is_empty() {
            return true;
        }
        info!(
            "service '{}' waiting for dependencies: {}",
            spec.name,
            spec.depends_on.join(", ")
        );
        let deadline = tokio::time::Instant::now() + self.timeouts().dependency_wait_deadline();
        for dep in &spec.depends_on {
            let extra_delay = Duration::from_secs(spec.wait_after_for(dep));
            match deps::wait_for_dependency(self, dep, extra_delay, deadline).await {
                DependencyWait::Ready => {}
                DependencyWait::Cancelled => {
                    warn!("dependency wait canceled for service: {}", spec.name);
                    return false;
                }
                DependencyWait::TimedOut => {
                    warn!(
                        "abandoning service '{}': dependency '{}' never started",
                        spec.name, dep
                    );
                    return false;
                }
            }
        }
        true
    }

    /// Sleep out the post-script delay, then run the script if one is
    /// configured. Failure is informational only.
    async fn run_post_script(&self, spec: ServiceSpec) {
        tokio::select! {
            _ = tokio::time::sleep(self.timeouts().post_script_delay()) => {}
            _ = self.shared.shutdown.cancelled() => return,
        }

        let Some(path) = &spec.pos_script else {
            return;
        };
        info!("running post-script for service '{}'", spec.name);
        if let Err(e) = script::run_script(path).await {
            warn!(
                "error executing post-script for service '{}': {}",
                spec.name, e
            );
        }
    }

    fn handle_service_error(&self, spec: &ServiceSpec, err: &CoreError) {
        error!("error running service '{}': {}", spec.name, err);
        if spec.required {
            error!(
                "required service '{}' failed, initiating shutdown",
                spec.name
            );
            self.trigger_shutdown();
        }
    }

    /// Stop and respawn a service on behalf of the control channel.
    ///
    /// The old instance is cancelled, given [`RESTART_SETTLE`] to exit,
    /// force-killed if still alive, and removed; the replacement is
    /// spawned in the background after a short pause. Neither the
    /// pre-script nor the dependency gate runs again.
    pub async fn restart_service(&self, name: &str) -> Result<String> {
        let proc = self
            .read_registry()
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::ServiceNotFound(name.to_string()))?;

        info!("restarting service: {}", name);
        proc.set_state(ServiceState::Stopping);
        proc.cancel();

        tokio::time::sleep(RESTART_SETTLE).await;
        if process::is_alive(proc.pid()) {
            if let Err(e) = process::signal_kill(proc.pid()) {
                warn!("error killing service during restart: {}", e);
            }
        }
        self.remove_active(&proc);

        let sup = self.clone();
        let spec = proc.spec().clone();
        let restarted = name.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(RESTART_RESPAWN_DELAY).await;
            if let Err(e) = runner::run_service(sup, spec).await {
                warn!("error restarting service '{}': {}", restarted, e);
            }
        });

        Ok(format!("Service '{}' restart initiated", name))
    }

    // ---- registry and marker plumbing ----

    /// Register a live instance. Sets `Starting` and takes one alive
    /// ticket; [`Self::remove_active`] releases it exactly once.
    pub(crate) fn insert_active(&self, proc: Arc<ServiceProcess>) {
        let mut registry = self.write_registry();
        proc.set_state(ServiceState::Starting);
        registry.insert(proc.name().to_string(), proc);
        self.shared.alive.send_modify(|count| *count += 1);
    }

    /// Remove the given instance from the registry.
    ///
    /// A no-op when the instance was already removed or another instance
    /// has since taken the name (restart), so each registration releases
    /// its ticket exactly once no matter which teardown path wins.
    pub(crate) fn remove_active(&self, proc: &Arc<ServiceProcess>) {
        let mut registry = self.write_registry();
        let is_current = registry
            .get(proc.name())
            .is_some_and(|current| Arc::ptr_eq(current, proc));
        if is_current {
            registry.remove(proc.name());
            proc.set_state(ServiceState::Stopped);
            self.shared.alive.send_modify(|count| *count = count.saturating_sub(1));
        }
    }

    /// Record that a service has been launched at least once
    pub(crate) fn mark_started(&self, name: &str) {
        self.shared
            .started
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string());
    }

    pub(crate) fn has_started(&self, name: &str) -> bool {
        self.shared
            .started
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(name)
    }

    pub(crate) fn alive_count(&self) -> usize {
        *self.shared.alive.borrow()
    }

    pub(crate) fn subscribe_alive(&self) -> watch::Receiver<usize> {
        self.shared.alive.subscribe()
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<ServiceProcess>> {
        self.read_registry().values().cloned().collect()
    }

    /// Snapshot every registered service for the control channel, in
    /// name order.
    pub fn list_services(&self) -> Vec<ServiceInfo> {
        let mut services: Vec<ServiceInfo> =
            self.read_registry().values().map(|p| p.info()).collect();
        services.sort_by(|a, b| a.name.cmp(&b.name));
        services
    }

    /// Registry-wide state counts
    pub fn status_summary(&self) -> StatusSummary {
        let registry = self.read_registry();
        let mut summary = StatusSummary {
            total: registry.len(),
            running: 0,
            failed: 0,
        };
        for proc in registry.values() {
            match proc.state() {
                ServiceState::Running => summary.running += 1,
                ServiceState::Failed => summary.failed += 1,
                _ => {}
            }
        }
        summary
    }

    pub(crate) fn log_status_summary(&self) {
        let services = self.list_services();
        if services.is_empty() {
            return;
        }
        info!("=== service status summary ===");
        for svc in services {
            if svc.last_error.is_empty() {
                info!(
                    "  {:<16} state: {:<8} uptime: {}s",
                    svc.name,
                    svc.state.as_str(),
                    svc.uptime
                );
            } else {
                info!(
                    "  {:<16} state: {:<8} uptime: {}s error: {}",
                    svc.name,
                    svc.state.as_str(),
                    svc.uptime,
                    svc.last_error
                );
            }
        }
    }

    fn read_registry(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<ServiceProcess>>> {
        self.shared.registry.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_registry(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<ServiceProcess>>> {
        self.shared.registry.write().unwrap_or_else(|e| e.into_inner())
    }
}
