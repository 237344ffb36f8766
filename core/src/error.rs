//! Core error types and utilities

use crate::validate::ValidationIssue;
use thiserror::Error;

/// Core-specific error types
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("configuration validation failed: {}", issues_summary(.0))]
    Validation(Vec<ValidationIssue>),

    #[error("initialization error: {0}")]
    Initialization(String),

    #[error("service error: {0}")]
    Service(String),

    #[error("Service '{0}' not found")]
    ServiceNotFound(String),

    #[error("failed to spawn process: {0}")]
    Spawn(String),

    #[error("failed to signal process: {0}")]
    Signal(String),

    #[error("failed to wait for process: {0}")]
    Wait(String),

    #[error("script failed: {0}")]
    Script(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Core-specific result type
pub type Result<T> = std::result::Result<T, CoreError>;

fn issues_summary(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
