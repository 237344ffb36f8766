//! Control-channel client
//!
//! Connects to a running daemon's control socket, sends one request, and
//! reads one response. Every call opens a fresh connection, matching the
//! server's one-shot framing.

use crate::{IpcError, Result};
use schema::{ControlRequest, ControlResponse};
use std::path::PathBuf;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

/// Client side of the control channel
#[derive(Debug, Clone)]
pub struct ControlClient {
    socket_path: PathBuf,
}

impl ControlClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    /// Client against the default socket path, honoring the environment
    /// override
    pub fn from_env() -> Self {
        Self::new(crate::socket_path())
    }

    /// Send `list_services` and return the daemon's response
    pub async fn list_services(&self) -> Result<ControlResponse> {
        self.round_trip(&ControlRequest::list_services()).await
    }

    /// Send `get_status` and return the daemon's response
    pub async fn get_status(&self) -> Result<ControlResponse> {
        self.round_trip(&ControlRequest::get_status()).await
    }

    /// Send `restart_service` for the named service
    pub async fn restart_service(&self, name: &str) -> Result<ControlResponse> {
        self.round_trip(&ControlRequest::restart_service(name)).await
    }

    async fn round_trip(&self, request: &ControlRequest) -> Result<ControlResponse> {
        let mut stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| IpcError::ConnectionFailed(e.to_string()))?;

        let data = serde_json::to_vec(request)
            .map_err(|e| IpcError::SerializationFailed(e.to_string()))?;
        stream
            .write_all(&data)
            .await
            .map_err(|e| IpcError::SendFailed(e.to_string()))?;

        let mut buf = vec![0u8; 65536];
        let n = stream
            .read(&mut buf)
            .await
            .map_err(|e| IpcError::ReceiveFailed(e.to_string()))?;
        if n == 0 {
            return Err(IpcError::EmptyResponse);
        }
        serde_json::from_slice(&buf[..n])
            .map_err(|e| IpcError::DeserializationFailed(e.to_string()))
    }
}
