//! Control-channel server over a Unix domain socket
//!
//! Accepts connections on the control socket and speaks a one-shot JSON
//! protocol: exactly one request is read and one response written per
//! connection, then the connection is closed. Requests are dispatched
//! through the [`ControlHandler`] seam so this crate stays independent of
//! the lifecycle engine.
//!
//! Malformed JSON closes the connection without a response; a well-formed
//! request with an unrecognized verb gets a failure response. The accept
//! loop observes the supervisor's cancellation token and unlinks the
//! socket file on its way out, so the socket exists only while the daemon
//! runs.

use crate::{IpcError, Result};
use schema::{CommandKind, ControlRequest, ControlResponse, ServiceInfo};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// One request per connection never legitimately approaches this size.
const MAX_MESSAGE_BYTES: usize = 65536;

/// Dispatch target for control requests
#[async_trait::async_trait]
pub trait ControlHandler: Send + Sync {
    /// Snapshot every registered service
    async fn list_services(&self) -> Vec<ServiceInfo>;

    /// Short human summary of registry-wide counts
    async fn status_message(&self) -> String;

    /// Restart one service; returns the confirmation message or a
    /// human-readable refusal
    async fn restart_service(&self, name: &str) -> std::result::Result<String, String>;
}

/// Control-channel server bound to one socket path
pub struct ControlServer {
    socket_path: PathBuf,
    handler: Arc<dyn ControlHandler>,
    shutdown: CancellationToken,
}

impl ControlServer {
    pub fn new(
        socket_path: impl Into<PathBuf>,
        handler: Arc<dyn ControlHandler>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            socket_path: socket_path.into(),
            handler,
            shutdown,
        }
    }

    /// Bind and serve until cancelled. Removes a stale socket file before
    /// binding and unlinks the socket when the loop exits.
    pub async fn serve(&self) -> Result<()> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| {
                IpcError::SocketError(format!(
                    "failed to remove existing socket {}: {}",
                    self.socket_path.display(),
                    e
                ))
            })?;
        }

        let listener = UnixListener::bind(&self.socket_path).map_err(|e| {
            IpcError::SocketError(format!(
                "failed to bind control socket {}: {}",
                self.socket_path.display(),
                e
            ))
        })?;
        info!("control server listening at {}", self.socket_path.display());

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _addr)) => {
                        let handler = self.handler.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, handler).await {
                                debug!("control connection ended: {}", e);
                            }
                        });
                    }
                    Err(e) => error!("failed to accept control connection: {}", e),
                },
            }
        }

        drop(listener);
        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            debug!(
                "could not remove socket {}: {}",
                self.socket_path.display(),
                e
            );
        }
        info!("control server shut down");
        Ok(())
    }
}

async fn handle_connection(
    mut stream: UnixStream,
    handler: Arc<dyn ControlHandler>,
) -> Result<()> {
    // A parse failure propagates here and drops the connection without a
    // response, which is the contract for malformed input.
    let request = read_request(&mut stream).await?;
    let response = dispatch(&request, handler.as_ref()).await;
    write_response(&mut stream, &response).await
}

/// Map one request to one response through the handler.
pub async fn dispatch(request: &ControlRequest, handler: &dyn ControlHandler) -> ControlResponse {
    match request.kind {
        CommandKind::ListServices => {
            ControlResponse::with_services(handler.list_services().await)
        }
        CommandKind::GetStatus => ControlResponse::ok(handler.status_message().await),
        CommandKind::RestartService => {
            let Some(name) = request.service_name.as_deref() else {
                return ControlResponse::failure("service_name is required for restart_service");
            };
            match handler.restart_service(name).await {
                Ok(message) => ControlResponse::ok(message),
                Err(message) => ControlResponse::failure(message),
            }
        }
        CommandKind::Unknown => ControlResponse::failure("Unknown command type"),
    }
}

async fn read_request(stream: &mut UnixStream) -> Result<ControlRequest> {
    let mut buf = vec![0u8; MAX_MESSAGE_BYTES];
    let n = stream
        .read(&mut buf)
        .await
        .map_err(|e| IpcError::ReceiveFailed(e.to_string()))?;
    if n == 0 {
        return Err(IpcError::EmptyResponse);
    }
    serde_json::from_slice(&buf[..n]).map_err(|e| IpcError::DeserializationFailed(e.to_string()))
}

async fn write_response(stream: &mut UnixStream, response: &ControlResponse) -> Result<()> {
    let data = serde_json::to_vec(response)
        .map_err(|e| IpcError::SerializationFailed(e.to_string()))?;
    stream
        .write_all(&data)
        .await
        .map_err(|e| IpcError::SendFailed(e.to_string()))
}
