//! Service specification and state types for the roost supervisor
//!
//! This module contains the declarative input for one supervised service,
//! the timeout knobs shared by the whole supervisor, and the runtime state
//! enumeration each service instance moves through.
//!
//! ## Service lifecycle
//!
//! A service instance progresses through the following states:
//!
//! ```text
//! Pending → Starting → Running → Stopping → Stopped
//! ```
//!
//! `Failed` is admissible from any non-terminal state and is sticky for the
//! lifetime of that instance; a restart creates a fresh instance back at
//! `Pending`.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Declarative specification for one supervised service
///
/// Two fields accept a short and a long surface form: `depends_on` may be a
/// single name or an array of names (canonicalized to a list), and
/// `wait_after` may be a single number applied to every predecessor or a map
/// of predecessor name to seconds (see [`WaitAfter`]).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ServiceSpec {
    /// Unique service name; letters, digits, dashes, and underscores only
    pub name: String,

    /// Executable to run: absolute path or resolvable via `PATH`
    pub command: String,

    /// Command-line arguments
    #[serde(default)]
    pub args: Vec<String>,

    /// When set, the service is not spawned; the file is tailed instead
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,

    /// Shell script run before dependency waiting and spawn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_script: Option<String>,

    /// Shell script run a fixed delay after the service is launched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos_script: Option<String>,

    /// Local user to run the service as (via `su`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Names of services that must have started before this one
    #[serde(default, deserialize_with = "deserialize_depends_on")]
    pub depends_on: Vec<String>,

    /// Extra delay applied after each predecessor has started
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_after: Option<WaitAfter>,

    /// Disabled services are skipped entirely
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// When true, a failure to launch escalates to a global shutdown
    #[serde(default)]
    pub required: bool,
}

impl ServiceSpec {
    /// Extra delay in seconds to apply after the given predecessor started
    pub fn wait_after_for(&self, dep: &str) -> u64 {
        self.wait_after.as_ref().map_or(0, |w| w.wait_for(dep))
    }
}

const fn default_enabled() -> bool {
    true
}

/// Post-dependency delay: one value for every edge, or a per-edge map
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(untagged)]
pub enum WaitAfter {
    /// The same delay (seconds) after every predecessor
    Uniform(u64),
    /// Delay (seconds) per predecessor name; missing entries mean no delay
    PerDependency(HashMap<String, u64>),
}

impl WaitAfter {
    /// Delay in seconds for the given predecessor edge
    pub fn wait_for(&self, dep: &str) -> u64 {
        match self {
            WaitAfter::Uniform(secs) => *secs,
            WaitAfter::PerDependency(map) => map.get(dep).copied().unwrap_or(0),
        }
    }
}

fn deserialize_depends_on<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(name) => vec![name],
        OneOrMany::Many(names) => names,
    })
}

/// Supervisor-wide timeout knobs, all in whole seconds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Timeouts {
    /// Delay before the post-start script of each service runs
    #[serde(default = "default_post_script", alias = "post_script_timeout")]
    pub post_script: u64,

    /// Grace period between SIGTERM and SIGKILL for one service
    #[serde(default = "default_service_shutdown", alias = "service_shutdown_timeout")]
    pub service_shutdown: u64,

    /// Budget for the whole shutdown sequence before the SIGKILL wave
    #[serde(default = "default_global_shutdown", alias = "global_shutdown_timeout")]
    pub global_shutdown: u64,

    /// How long a starter waits for any one dependency chain
    #[serde(default = "default_dependency_wait", alias = "dependency_wait_timeout")]
    pub dependency_wait: u64,
}

impl Timeouts {
    /// Post-script delay as a `Duration`
    pub fn post_script_delay(&self) -> Duration {
        Duration::from_secs(self.post_script)
    }

    /// Per-service SIGTERM grace period as a `Duration`
    pub fn service_shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.service_shutdown)
    }

    /// Global shutdown budget as a `Duration`
    pub fn global_shutdown_budget(&self) -> Duration {
        Duration::from_secs(self.global_shutdown)
    }

    /// Dependency-wait deadline as a `Duration`
    pub fn dependency_wait_deadline(&self) -> Duration {
        Duration::from_secs(self.dependency_wait)
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            post_script: default_post_script(),
            service_shutdown: default_service_shutdown(),
            global_shutdown: default_global_shutdown(),
            dependency_wait: default_dependency_wait(),
        }
    }
}

const fn default_post_script() -> u64 {
    7
}

const fn default_service_shutdown() -> u64 {
    10
}

const fn default_global_shutdown() -> u64 {
    30
}

const fn default_dependency_wait() -> u64 {
    300
}

/// Full supervisor configuration: the service set plus timeout knobs
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Config {
    /// Services to supervise
    #[serde(default)]
    pub services: Vec<ServiceSpec>,

    /// Timeout knobs; every field has a default
    #[serde(default)]
    pub timeouts: Timeouts,
}

/// Current state of one service instance
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceState {
    /// Created but not yet registered
    Pending,
    /// Registered; the child process is being started
    Starting,
    /// Child is running under the supervisor's PTY
    Running,
    /// Shutdown or restart requested; waiting for the child to exit
    Stopping,
    /// Child exited and cleanup finished
    Stopped,
    /// An error was recorded for this instance
    Failed,
}

impl ServiceState {
    /// Whether this state ends the instance's lifecycle
    pub fn is_terminal(&self) -> bool {
        matches!(self, ServiceState::Stopped | ServiceState::Failed)
    }

    /// Upper-case state name as used on the wire and in log output
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceState::Pending => "PENDING",
            ServiceState::Starting => "STARTING",
            ServiceState::Running => "RUNNING",
            ServiceState::Stopping => "STOPPING",
            ServiceState::Stopped => "STOPPED",
            ServiceState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
