//! CLI library for roost
//!
//! Client-side glue around the control channel: each subcommand opens one
//! connection to a running daemon, sends its request, and renders the
//! response for the terminal. The daemon bootstrap lives in [`daemon`].

pub mod daemon;
pub mod error;
pub mod install;

pub use error::{CliError, Result};

use ipc::ControlClient;
use schema::ServiceInfo;

/// Client for a running roost daemon
pub struct Client {
    control: ControlClient,
}

impl Client {
    /// Client against the default (or env-overridden) control socket
    pub fn new() -> Self {
        Self {
            control: ControlClient::from_env(),
        }
    }

    /// Fetch and print the fixed-width service table
    pub async fn list(&self) -> Result<()> {
        let response = self.control.list_services().await?;
        if !response.success {
            return Err(CliError::Daemon(response.message));
        }
        print_service_table(&response.services);
        Ok(())
    }

    /// Fetch and print the system status line
    pub async fn status(&self) -> Result<()> {
        let response = self.control.get_status().await?;
        if !response.success {
            return Err(CliError::Daemon(response.message));
        }
        println!("System Status: {}", response.message);
        Ok(())
    }

    /// Request a restart of the named service and print the confirmation
    pub async fn restart(&self, name: &str) -> Result<()> {
        let response = self.control.restart_service(name).await?;
        if !response.success {
            return Err(CliError::Daemon(response.message));
        }
        println!("✓ {}", response.message);
        Ok(())
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

fn print_service_table(services: &[ServiceInfo]) {
    println!(
        "{:<15} {:<10} {:<8} {:<12} {:<8} {}",
        "NAME", "STATE", "PID", "UPTIME", "REQUIRED", "LAST_ERROR"
    );
    println!("{}", "-".repeat(85));
    for svc in services {
        println!(
            "{:<15} {:<10} {:<8} {:<12} {:<8} {}",
            svc.name,
            svc.state.to_string(),
            svc.pid,
            format_uptime(svc.uptime),
            if svc.required { "Yes" } else { "No" },
            render_error(&svc.last_error),
        );
    }
}

/// Render whole seconds in the compact 1h2m3s style
pub fn format_uptime(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Error column: dash when empty, truncated to 30 characters otherwise
fn render_error(message: &str) -> String {
    if message.is_empty() {
        return "-".to_string();
    }
    if message.chars().count() > 30 {
        let mut out: String = message.chars().take(27).collect();
        out.push_str("...");
        return out;
    }
    message.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uptime_formats_compactly() {
        assert_eq!(format_uptime(0), "0s");
        assert_eq!(format_uptime(59), "59s");
        assert_eq!(format_uptime(90), "1m30s");
        assert_eq!(format_uptime(3600), "1h0m0s");
        assert_eq!(format_uptime(3723), "1h2m3s");
    }

    #[test]
    fn error_column_is_dashed_when_empty_and_truncated_when_long() {
        assert_eq!(render_error(""), "-");
        assert_eq!(render_error("short"), "short");
        let long = "x".repeat(40);
        let rendered = render_error(&long);
        assert_eq!(rendered.chars().count(), 30);
        assert!(rendered.ends_with("..."));
    }
}
