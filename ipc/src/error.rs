//! Control-channel error types

use thiserror::Error;

/// Errors raised on either side of the control channel
#[derive(Error, Debug)]
pub enum IpcError {
    #[error("could not connect to roost daemon: {0}")]
    ConnectionFailed(String),

    #[error("failed to send message: {0}")]
    SendFailed(String),

    #[error("failed to receive message: {0}")]
    ReceiveFailed(String),

    #[error("failed to serialize message: {0}")]
    SerializationFailed(String),

    #[error("failed to deserialize message: {0}")]
    DeserializationFailed(String),

    #[error("peer closed the connection without a response")]
    EmptyResponse,

    #[error("socket error: {0}")]
    SocketError(String),
}

/// Control-channel result type
pub type Result<T> = std::result::Result<T, IpcError>;
