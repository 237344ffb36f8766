//! Configuration loading for roost services
//!
//! Parses a TOML file into the shared `schema` types. Defaults for the
//! timeout knobs and the `enabled` flag are materialized by serde during
//! parsing; semantic validation is a separate pass (see [`crate::validate`]).

use crate::{CoreError, Result};
use schema::Config;
use std::path::Path;
use tracing::info;

/// Load a supervisor configuration from a TOML file
pub fn load_config_from_toml_path(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    info!("loading services from {}", path.display());
    let data = std::fs::read_to_string(path).map_err(|e| {
        CoreError::Configuration(format!("error opening config file {}: {}", path.display(), e))
    })?;
    load_config_from_toml_str(&data)
}

/// Load a supervisor configuration from a TOML string
pub fn load_config_from_toml_str(input: &str) -> Result<Config> {
    toml::from_str(input).map_err(|e| CoreError::Configuration(format!("TOML parse error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema::WaitAfter;
    use std::io::Write;

    #[test]
    fn parses_services_and_timeouts() {
        let cfg = load_config_from_toml_str(
            r#"
            [[services]]
            name = "db"
            command = "postgres"

            [[services]]
            name = "web"
            command = "nginx"
            depends_on = "db"
            wait_after = 2
            required = true

            [timeouts]
            global_shutdown = 15
            "#,
        )
        .expect("config should parse");

        assert_eq!(cfg.services.len(), 2);
        assert_eq!(cfg.services[1].depends_on, vec!["db".to_string()]);
        assert_eq!(cfg.services[1].wait_after, Some(WaitAfter::Uniform(2)));
        assert!(cfg.services[1].required);
        assert_eq!(cfg.timeouts.global_shutdown, 15);
        assert_eq!(cfg.timeouts.service_shutdown, 10);
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = load_config_from_toml_str("[[services]\nname = ").unwrap_err();
        assert!(err.to_string().contains("TOML parse error"));
    }

    #[test]
    fn rejects_unknown_service_fields() {
        let err = load_config_from_toml_str(
            r#"
            [[services]]
            name = "svc"
            command = "echo"
            restart_policy = "always"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("TOML parse error"));
    }

    #[test]
    fn missing_file_is_a_configuration_error() {
        let err = load_config_from_toml_path("/no/such/services.toml").unwrap_err();
        assert!(err.to_string().contains("error opening config file"));
    }

    #[test]
    fn loads_from_a_file_on_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[[services]]\nname = \"svc\"\ncommand = \"echo\"\nargs = [\"hi\"]"
        )
        .unwrap();
        let cfg = load_config_from_toml_path(file.path()).expect("file should load");
        assert_eq!(cfg.services[0].args, vec!["hi".to_string()]);
    }
}
