//! Control-channel protocol types
//!
//! The daemon and the client exchange exactly one JSON object per connection
//! in each direction. Requests carry a command kind and, for restarts, the
//! target service name; responses carry a success flag, an optional human
//! message, and (for listings) a snapshot of service information.

use crate::ServiceState;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Command verb carried in a control request
///
/// Serialized as its snake_case wire name. Verbs the daemon does not know
/// decode to [`CommandKind::Unknown`] so a well-formed request with a bad
/// verb still gets a failure response instead of a dropped connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Snapshot all registered services
    ListServices,
    /// Summarize total/running/failed counts
    GetStatus,
    /// Stop and respawn one service by name
    RestartService,
    /// Any unrecognized verb; rejected with a failure response
    Unknown,
}

impl CommandKind {
    /// Wire name of the verb
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::ListServices => "list_services",
            CommandKind::GetStatus => "get_status",
            CommandKind::RestartService => "restart_service",
            CommandKind::Unknown => "unknown",
        }
    }
}

impl Serialize for CommandKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CommandKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(match name.as_str() {
            "list_services" => CommandKind::ListServices,
            "get_status" => CommandKind::GetStatus,
            "restart_service" => CommandKind::RestartService,
            _ => CommandKind::Unknown,
        })
    }
}

impl JsonSchema for CommandKind {
    fn schema_name() -> String {
        "CommandKind".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        String::json_schema(gen)
    }
}

/// One control request, sent by the client as a single JSON object
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ControlRequest {
    /// Command verb
    #[serde(rename = "type")]
    pub kind: CommandKind,

    /// Target service; required for `restart_service` only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
}

impl ControlRequest {
    /// Build a `list_services` request
    pub fn list_services() -> Self {
        Self {
            kind: CommandKind::ListServices,
            service_name: None,
        }
    }

    /// Build a `get_status` request
    pub fn get_status() -> Self {
        Self {
            kind: CommandKind::GetStatus,
            service_name: None,
        }
    }

    /// Build a `restart_service` request for the given service
    pub fn restart_service(name: impl Into<String>) -> Self {
        Self {
            kind: CommandKind::RestartService,
            service_name: Some(name.into()),
        }
    }
}

/// One control response, sent by the daemon as a single JSON object
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ControlResponse {
    /// Whether the request was handled successfully
    pub success: bool,

    /// Optional human-readable detail
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    /// Per-service snapshots; present for `list_services` only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<ServiceInfo>,
}

impl ControlResponse {
    /// Successful response with a message
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            services: Vec::new(),
        }
    }

    /// Successful response carrying a service listing
    pub fn with_services(services: Vec<ServiceInfo>) -> Self {
        Self {
            success: true,
            message: String::new(),
            services,
        }
    }

    /// Failed response with a message
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            services: Vec::new(),
        }
    }
}

/// Snapshot of one registered service for the control channel
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ServiceInfo {
    /// Service name
    pub name: String,
    /// Current lifecycle state
    pub state: ServiceState,
    /// Child process id, or 0 when no live child exists
    pub pid: u32,
    /// Seconds since this instance was registered
    pub uptime: u64,
    /// Last recorded error, empty when none
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_error: String,
    /// Whether the service is marked required
    pub required: bool,
}
