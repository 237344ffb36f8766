//! Local control channel over a Unix domain socket
//!
//! The daemon exposes a stream socket at a fixed path; each connection
//! carries exactly one JSON request and one JSON response. The same
//! protocol is consumed by the client half of the binary when it runs in
//! CLI mode. The socket file exists only while the daemon is running and
//! its permissions inherit the process umask — there is no authentication
//! beyond filesystem access.

pub mod client;
pub mod error;
pub mod server;

pub use client::ControlClient;
pub use error::{IpcError, Result};
pub use server::{ControlHandler, ControlServer};

use std::path::PathBuf;

/// Environment variable overriding the control socket location
pub const SOCKET_ENV: &str = "ROOST_CONTROL_SOCKET";

const DEFAULT_SOCKET_PATH: &str = "/tmp/roost.sock";

/// The control socket path: `/tmp/roost.sock` unless overridden via
/// [`SOCKET_ENV`]. Stable across releases.
pub fn socket_path() -> PathBuf {
    std::env::var_os(SOCKET_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET_PATH))
}
