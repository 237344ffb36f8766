//! Daemon bootstrap: wire the supervisor, control server, and signals
//!
//! `run` is the whole daemon mode: load and validate the configuration,
//! build the supervisor, expose the control socket, install the signal
//! listener, and supervise until shutdown completes. A control-socket
//! bind failure is a warning, not a fatal error — the supervisor still
//! runs, it just cannot be queried.

use crate::Result;
use async_trait::async_trait;
use roost_core::{config, validate, CoreError, Supervisor};
use schema::ServiceInfo;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

/// Environment variable overriding the services file location
pub const SERVICES_ENV: &str = "ROOST_SERVICES";

const DEFAULT_SERVICES_PATH: &str = "/services.toml";

fn services_path() -> PathBuf {
    std::env::var_os(SERVICES_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SERVICES_PATH))
}

/// Control-channel handler backed by the live supervisor
struct SupervisorControl {
    supervisor: Supervisor,
}

#[async_trait]
impl ipc::ControlHandler for SupervisorControl {
    async fn list_services(&self) -> Vec<ServiceInfo> {
        self.supervisor.list_services()
    }

    async fn status_message(&self) -> String {
        let summary = self.supervisor.status_summary();
        format!(
            "Total: {}, Running: {}, Failed: {}",
            summary.total, summary.running, summary.failed
        )
    }

    async fn restart_service(&self, name: &str) -> std::result::Result<String, String> {
        self.supervisor
            .restart_service(name)
            .await
            .map_err(|e| e.to_string())
    }
}

/// Build the control handler for a supervisor; exposed for the end-to-end
/// tests, which wire their own server.
pub fn control_handler(supervisor: Supervisor) -> Arc<dyn ipc::ControlHandler> {
    Arc::new(SupervisorControl { supervisor })
}

/// Run roost as the supervising daemon until shutdown completes.
///
/// Logging is expected to be initialized by the binary entry point.
pub async fn run(debug: bool) -> Result<()> {
    if debug {
        print_environment();
    }

    crate::install::auto_install();

    let config = config::load_config_from_toml_path(services_path())?;
    if let Err(e) = validate::validate_config(&config) {
        if let CoreError::Validation(issues) = &e {
            for issue in issues {
                error!("{}", issue);
            }
        }
        return Err(e.into());
    }
    info!("configuration validated successfully");
    info!(
        "timeouts configured: post_script={}s, service_shutdown={}s, global_shutdown={}s",
        config.timeouts.post_script,
        config.timeouts.service_shutdown,
        config.timeouts.global_shutdown
    );

    let supervisor = Supervisor::new(config);

    let server = ipc::ControlServer::new(
        ipc::socket_path(),
        control_handler(supervisor.clone()),
        supervisor.cancellation(),
    );
    tokio::spawn(async move {
        if let Err(e) = server.serve().await {
            warn!("could not start control server: {}", e);
        }
    });

    spawn_signal_listener(supervisor.clone());

    supervisor.run().await?;
    Ok(())
}

/// Listen for SIGINT, SIGTERM, and SIGHUP; the first one triggers the
/// global shutdown and later ones are logged as already in progress.
fn spawn_signal_listener(supervisor: Supervisor) {
    tokio::spawn(async move {
        let (mut term, mut int, mut hup) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
            signal(SignalKind::hangup()),
        ) {
            (Ok(t), Ok(i), Ok(h)) => (t, i, h),
            _ => {
                error!("failed to install signal handlers");
                return;
            }
        };

        loop {
            tokio::select! {
                _ = term.recv() => info!("received signal: SIGTERM"),
                _ = int.recv() => info!("received signal: SIGINT"),
                _ = hup.recv() => info!("received signal: SIGHUP"),
            }
            if supervisor.is_shutting_down() {
                info!("shutdown already in progress");
                continue;
            }
            info!("initiating graceful shutdown...");
            supervisor.trigger_shutdown();
        }
    });
}

fn print_environment() {
    info!("| ---------------- START - ENVIRONMENT VARS ---------------- |");
    for (key, value) in std::env::vars() {
        println!("{}={}", key, value);
    }
    info!("| ---------------- CLOSE - ENVIRONMENT VARS ---------------- |");
}
