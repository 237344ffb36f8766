//! CLI error types

use thiserror::Error;

/// Errors surfaced by the roost binary
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Ipc(#[from] ipc::IpcError),

    #[error(transparent)]
    Core(#[from] roost_core::CoreError),

    #[error("{0}")]
    Daemon(String),
}

/// CLI result type
pub type Result<T> = std::result::Result<T, CliError>;
