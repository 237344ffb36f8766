//! Mutable runtime record for one service instance

use schema::{ServiceInfo, ServiceSpec, ServiceState};
use std::sync::RwLock;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// One attempt at running a service.
///
/// State and last error share a lock so readers always observe a fully
/// applied transition. A restart never reuses a record; it creates a new
/// instance starting back at `Pending`.
#[derive(Debug)]
pub struct ServiceProcess {
    name: String,
    spec: ServiceSpec,
    pid: u32,
    start_time: Instant,
    cancel: CancellationToken,
    inner: RwLock<Inner>,
}

#[derive(Debug)]
struct Inner {
    state: ServiceState,
    last_error: Option<String>,
}

impl ServiceProcess {
    pub(crate) fn new(spec: ServiceSpec, pid: u32, cancel: CancellationToken) -> Self {
        Self {
            name: spec.name.clone(),
            spec,
            pid,
            start_time: Instant::now(),
            cancel,
            inner: RwLock::new(Inner {
                state: ServiceState::Pending,
                last_error: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The spec this instance was launched from; used verbatim on restart
    pub fn spec(&self) -> &ServiceSpec {
        &self.spec
    }

    /// Child process id
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Seconds since this instance was registered
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn state(&self) -> ServiceState {
        self.read_inner().state
    }

    pub fn last_error(&self) -> Option<String> {
        self.read_inner().last_error.clone()
    }

    /// Apply a state transition.
    ///
    /// Terminal states are sticky: once the instance is `Stopped` or
    /// `Failed`, further transitions are ignored.
    pub fn set_state(&self, next: ServiceState) {
        let mut inner = self.write_inner();
        if inner.state.is_terminal() || inner.state == next {
            return;
        }
        let old = inner.state;
        inner.state = next;
        info!("service '{}' state changed from {} to {}", self.name, old, next);
    }

    /// Record a failure for this instance and move it to `Failed`.
    pub fn set_error(&self, message: impl Into<String>) {
        let message = message.into();
        let mut inner = self.write_inner();
        error!("service '{}' failed: {}", self.name, message);
        inner.last_error = Some(message);
        if !inner.state.is_terminal() {
            inner.state = ServiceState::Failed;
        }
    }

    /// Signal this instance's teardown path (shutdown or restart)
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Resolves when this instance has been cancelled
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    /// Snapshot for the control channel
    pub fn info(&self) -> ServiceInfo {
        let inner = self.read_inner();
        ServiceInfo {
            name: self.name.clone(),
            state: inner.state,
            pid: self.pid,
            uptime: self.start_time.elapsed().as_secs(),
            last_error: inner.last_error.clone().unwrap_or_default(),
            required: self.spec.required,
        }
    }

    fn read_inner(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_inner(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_spec() -> ServiceSpec {
        ServiceSpec {
            name: "svc".to_string(),
            command: "echo".to_string(),
            args: vec![],
            log_file: None,
            pre_script: None,
            pos_script: None,
            user: None,
            depends_on: vec![],
            wait_after: None,
            enabled: true,
            required: true,
        }
    }

    #[test]
    fn lifecycle_transitions_apply_in_order() {
        let proc = ServiceProcess::new(test_spec(), 42, CancellationToken::new());
        assert_eq!(proc.state(), ServiceState::Pending);
        proc.set_state(ServiceState::Starting);
        proc.set_state(ServiceState::Running);
        proc.set_state(ServiceState::Stopping);
        proc.set_state(ServiceState::Stopped);
        assert_eq!(proc.state(), ServiceState::Stopped);
    }

    #[test]
    fn failed_is_sticky() {
        let proc = ServiceProcess::new(test_spec(), 42, CancellationToken::new());
        proc.set_state(ServiceState::Running);
        proc.set_error("boom");
        assert_eq!(proc.state(), ServiceState::Failed);
        proc.set_state(ServiceState::Stopped);
        assert_eq!(proc.state(), ServiceState::Failed);
        assert_eq!(proc.last_error().as_deref(), Some("boom"));
    }

    #[test]
    fn stopped_is_terminal() {
        let proc = ServiceProcess::new(test_spec(), 42, CancellationToken::new());
        proc.set_state(ServiceState::Stopped);
        proc.set_state(ServiceState::Running);
        assert_eq!(proc.state(), ServiceState::Stopped);
    }

    #[test]
    fn info_reports_pid_and_required_flag() {
        let proc = ServiceProcess::new(test_spec(), 42, CancellationToken::new());
        let info = proc.info();
        assert_eq!(info.pid, 42);
        assert!(info.required);
        assert!(info.last_error.is_empty());
    }
}
