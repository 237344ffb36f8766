//! Core lifecycle engine for the roost supervisor
//!
//! This crate contains everything between the parsed configuration and the
//! operating system: validation of the service graph, PTY-backed process
//! spawning, the per-service state machines, dependency-ordered startup,
//! and the bounded shutdown coordinator. The control-channel surface and
//! the CLI live in their own crates on top of this one.

pub mod config;
pub mod error;
pub mod process;
pub mod script;
pub mod supervisor;
pub mod validate;

pub use error::{CoreError, Result};
pub use supervisor::{ServiceProcess, StatusSummary, Supervisor};

/// Core utilities and helper functions
pub mod utils {
    /// Initialize tracing for the application
    pub fn init_tracing(level: &str) -> crate::Result<()> {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        fmt()
            .with_env_filter(filter)
            .try_init()
            .map_err(|e| crate::CoreError::Initialization(e.to_string()))?;

        Ok(())
    }
}
