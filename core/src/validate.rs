//! Structural and semantic validation of the service set
//!
//! The validator runs once at startup, before any process is spawned. It
//! accumulates every problem it finds instead of stopping at the first one,
//! so a broken configuration is reported in full. Apart from existence
//! checks on referenced files it has no side effects.

use crate::script::lookup_path;
use crate::{CoreError, Result};
use schema::{Config, ServiceSpec, WaitAfter};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

/// Upper bound for `wait_after`, scalar or per-edge, in seconds
pub const MAX_WAIT_AFTER_SECS: u64 = 300;

/// One validation problem: the offending field, the service it belongs to
/// (when applicable), and a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub field: &'static str,
    pub service: Option<String>,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: &'static str, service: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            field,
            service: service.map(str::to_string),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.service {
            Some(service) => write!(
                f,
                "validation error in service '{}', field '{}': {}",
                service, self.field, self.message
            ),
            None => write!(
                f,
                "validation error in field '{}': {}",
                self.field, self.message
            ),
        }
    }
}

/// Validate the whole configuration.
///
/// Returns `Ok(())` when the service set is well formed, or
/// [`CoreError::Validation`] carrying every issue found. The supervisor
/// refuses to start any process while issues exist.
pub fn validate_config(config: &Config) -> Result<()> {
    let mut issues = Vec::new();

    let mut seen = HashSet::new();
    for svc in &config.services {
        validate_service(svc, &mut issues);
        if !seen.insert(svc.name.clone()) {
            issues.push(ValidationIssue::new(
                "name",
                Some(&svc.name),
                "duplicate service name",
            ));
        }
    }

    validate_dependencies(&config.services, &mut issues);

    if issues.is_empty() {
        Ok(())
    } else {
        Err(CoreError::Validation(issues))
    }
}

fn validate_service(svc: &ServiceSpec, issues: &mut Vec<ValidationIssue>) {
    if svc.name.is_empty() {
        issues.push(ValidationIssue::new(
            "name",
            Some(&svc.name),
            "service name is required",
        ));
    } else if !svc
        .name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        issues.push(ValidationIssue::new(
            "name",
            Some(&svc.name),
            "service name must contain only alphanumeric characters, dashes, and underscores",
        ));
    }

    validate_command(svc, issues);
    validate_scripts(svc, issues);
    validate_log_file(svc, issues);
    validate_wait_after(svc, issues);
    validate_user(svc, issues);
}

fn validate_command(svc: &ServiceSpec, issues: &mut Vec<ValidationIssue>) {
    if svc.command.is_empty() {
        issues.push(ValidationIssue::new(
            "command",
            Some(&svc.name),
            "command is required",
        ));
        return;
    }

    // Commands containing whitespace are shell fragments; resolution is
    // left to the shell at spawn time.
    if svc.command.contains(char::is_whitespace) {
        return;
    }

    if lookup_path(&svc.command).is_none() {
        if Path::new(&svc.command).is_absolute() {
            issues.push(ValidationIssue::new(
                "command",
                Some(&svc.name),
                format!("command file '{}' does not exist", svc.command),
            ));
        } else {
            issues.push(ValidationIssue::new(
                "command",
                Some(&svc.name),
                format!("command '{}' not found in PATH", svc.command),
            ));
        }
    }
}

fn validate_scripts(svc: &ServiceSpec, issues: &mut Vec<ValidationIssue>) {
    if let Some(path) = &svc.pre_script {
        if !Path::new(path).exists() {
            issues.push(ValidationIssue::new(
                "pre_script",
                Some(&svc.name),
                format!("pre-script file '{}' does not exist", path),
            ));
        }
    }
    if let Some(path) = &svc.pos_script {
        if !Path::new(path).exists() {
            issues.push(ValidationIssue::new(
                "pos_script",
                Some(&svc.name),
                format!("post-script file '{}' does not exist", path),
            ));
        }
    }
}

fn validate_log_file(svc: &ServiceSpec, issues: &mut Vec<ValidationIssue>) {
    if let Some(path) = &svc.log_file {
        let dir = Path::new(path).parent().unwrap_or_else(|| Path::new("/"));
        if !dir.exists() {
            issues.push(ValidationIssue::new(
                "log_file",
                Some(&svc.name),
                format!("log file directory '{}' does not exist", dir.display()),
            ));
        }
    }
}

fn validate_wait_after(svc: &ServiceSpec, issues: &mut Vec<ValidationIssue>) {
    let Some(wait_after) = &svc.wait_after else {
        return;
    };
    match wait_after {
        WaitAfter::Uniform(secs) => {
            if *secs > MAX_WAIT_AFTER_SECS {
                issues.push(ValidationIssue::new(
                    "wait_after",
                    Some(&svc.name),
                    format!("wait_after must be between 0 and {} seconds", MAX_WAIT_AFTER_SECS),
                ));
            }
        }
        WaitAfter::PerDependency(map) => {
            for (dep, secs) in map {
                if *secs > MAX_WAIT_AFTER_SECS {
                    issues.push(ValidationIssue::new(
                        "wait_after",
                        Some(&svc.name),
                        format!(
                            "wait_after for dependency '{}' must be between 0 and {} seconds",
                            dep, MAX_WAIT_AFTER_SECS
                        ),
                    ));
                }
            }
        }
    }
}

fn validate_user(svc: &ServiceSpec, issues: &mut Vec<ValidationIssue>) {
    if let Some(user) = &svc.user {
        match nix::unistd::User::from_name(user) {
            Ok(Some(_)) => {}
            _ => {
                issues.push(ValidationIssue::new(
                    "user",
                    Some(&svc.name),
                    format!("user '{}' does not exist", user),
                ));
            }
        }
    }
}

fn validate_dependencies(services: &[ServiceSpec], issues: &mut Vec<ValidationIssue>) {
    let by_name: HashMap<&str, &ServiceSpec> =
        services.iter().map(|s| (s.name.as_str(), s)).collect();

    for svc in services {
        for dep in &svc.depends_on {
            if !by_name.contains_key(dep.as_str()) {
                issues.push(ValidationIssue::new(
                    "dependencies",
                    None,
                    format!(
                        "service '{}' depends on non-existent service '{}'",
                        svc.name, dep
                    ),
                ));
            }
        }

        if let Some(WaitAfter::PerDependency(map)) = &svc.wait_after {
            for dep in map.keys() {
                if !svc.depends_on.contains(dep) {
                    issues.push(ValidationIssue::new(
                        "dependencies",
                        None,
                        format!(
                            "service '{}' has wait_after for '{}' but doesn't depend on it",
                            svc.name, dep
                        ),
                    ));
                }
            }
        }
    }

    for svc in services {
        let mut visited = HashSet::new();
        let mut stack = HashSet::new();
        if has_cycles(&svc.name, &by_name, &mut visited, &mut stack) {
            issues.push(ValidationIssue::new(
                "dependencies",
                None,
                format!("circular dependency detected involving service '{}'", svc.name),
            ));
        }
    }
}

/// Depth-first cycle detection over the `depends_on` graph, tracking the
/// current recursion stack separately from the visited set.
fn has_cycles(
    name: &str,
    by_name: &HashMap<&str, &ServiceSpec>,
    visited: &mut HashSet<String>,
    stack: &mut HashSet<String>,
) -> bool {
    visited.insert(name.to_string());
    stack.insert(name.to_string());

    if let Some(svc) = by_name.get(name) {
        for dep in &svc.depends_on {
            if !visited.contains(dep) {
                if has_cycles(dep, by_name, visited, stack) {
                    return true;
                }
            } else if stack.contains(dep) {
                return true;
            }
        }
    }

    stack.remove(name);
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn svc(name: &str) -> ServiceSpec {
        ServiceSpec {
            name: name.to_string(),
            command: "echo".to_string(),
            args: vec![],
            log_file: None,
            pre_script: None,
            pos_script: None,
            user: None,
            depends_on: vec![],
            wait_after: None,
            enabled: true,
            required: false,
        }
    }

    fn config(services: Vec<ServiceSpec>) -> Config {
        Config {
            services,
            timeouts: Default::default(),
        }
    }

    fn issues(config: &Config) -> Vec<ValidationIssue> {
        match validate_config(config) {
            Ok(()) => vec![],
            Err(CoreError::Validation(issues)) => issues,
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn valid_config_passes() {
        let mut a = svc("a");
        let mut b = svc("b");
        b.depends_on = vec!["a".to_string()];
        b.wait_after = Some(WaitAfter::Uniform(MAX_WAIT_AFTER_SECS));
        a.command = "/bin/sh".to_string();
        assert!(validate_config(&config(vec![a, b])).is_ok());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let found = issues(&config(vec![svc("dup"), svc("dup")]));
        assert!(found.iter().any(|i| i.message.contains("duplicate")));
    }

    #[test]
    fn bad_name_charset_is_rejected() {
        let found = issues(&config(vec![svc("bad name!")]));
        assert!(found.iter().any(|i| i.field == "name"));
    }

    #[test]
    fn empty_command_is_rejected() {
        let mut s = svc("a");
        s.command = String::new();
        let found = issues(&config(vec![s]));
        assert!(found.iter().any(|i| i.message == "command is required"));
    }

    #[test]
    fn missing_command_in_path_is_rejected() {
        let mut s = svc("a");
        s.command = "definitely-not-a-real-binary-xyz".to_string();
        let found = issues(&config(vec![s]));
        assert!(found.iter().any(|i| i.message.contains("not found in PATH")));
    }

    #[test]
    fn missing_absolute_command_is_rejected() {
        let mut s = svc("a");
        s.command = "/no/such/binary".to_string();
        let found = issues(&config(vec![s]));
        assert!(found.iter().any(|i| i.message.contains("does not exist")));
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let mut s = svc("a");
        s.depends_on = vec!["ghost".to_string()];
        let found = issues(&config(vec![s]));
        assert!(found
            .iter()
            .any(|i| i.message.contains("non-existent service 'ghost'")));
    }

    #[test]
    fn circular_dependency_is_rejected() {
        let mut a = svc("a");
        let mut b = svc("b");
        a.depends_on = vec!["b".to_string()];
        b.depends_on = vec!["a".to_string()];
        let found = issues(&config(vec![a, b]));
        assert!(found.iter().any(|i| i.message.contains("circular dependency")));
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let mut a = svc("a");
        a.depends_on = vec!["a".to_string()];
        let found = issues(&config(vec![a]));
        assert!(found.iter().any(|i| i.message.contains("circular dependency")));
    }

    #[test]
    fn wait_after_boundary_values() {
        let mut dep = svc("dep");
        dep.command = "/bin/sh".to_string();

        let mut ok = svc("ok");
        ok.depends_on = vec!["dep".to_string()];
        ok.wait_after = Some(WaitAfter::Uniform(300));
        assert!(validate_config(&config(vec![dep.clone(), ok])).is_ok());

        let mut too_long = svc("slow");
        too_long.depends_on = vec!["dep".to_string()];
        too_long.wait_after = Some(WaitAfter::Uniform(301));
        let found = issues(&config(vec![dep, too_long]));
        assert!(found
            .iter()
            .any(|i| i.message.contains("between 0 and 300")));
    }

    #[test]
    fn per_edge_wait_after_must_reference_a_dependency() {
        let mut a = svc("a");
        let mut b = svc("b");
        b.depends_on = vec!["a".to_string()];
        let mut map = HashMap::new();
        map.insert("other".to_string(), 3u64);
        b.wait_after = Some(WaitAfter::PerDependency(map));
        a.command = "/bin/sh".to_string();
        let found = issues(&config(vec![a, b]));
        assert!(found
            .iter()
            .any(|i| i.message.contains("doesn't depend on it")));
    }

    #[test]
    fn per_edge_wait_after_range_is_checked() {
        let mut a = svc("a");
        a.command = "/bin/sh".to_string();
        let mut b = svc("b");
        b.depends_on = vec!["a".to_string()];
        let mut map = HashMap::new();
        map.insert("a".to_string(), 900u64);
        b.wait_after = Some(WaitAfter::PerDependency(map));
        let found = issues(&config(vec![a, b]));
        assert!(found.iter().any(|i| i.field == "wait_after"));
    }

    #[test]
    fn unknown_user_is_rejected() {
        let mut s = svc("a");
        s.user = Some("no-such-user-roost-test".to_string());
        let found = issues(&config(vec![s]));
        assert!(found.iter().any(|i| i.field == "user"));
    }

    #[test]
    fn missing_scripts_are_rejected() {
        let mut s = svc("a");
        s.pre_script = Some("/no/such/pre.sh".to_string());
        s.pos_script = Some("/no/such/pos.sh".to_string());
        let found = issues(&config(vec![s]));
        assert!(found.iter().any(|i| i.field == "pre_script"));
        assert!(found.iter().any(|i| i.field == "pos_script"));
    }

    #[test]
    fn errors_accumulate_instead_of_short_circuiting() {
        let mut a = svc("bad name");
        a.command = String::new();
        let mut b = svc("b");
        b.depends_on = vec!["ghost".to_string()];
        let found = issues(&config(vec![a, b]));
        assert!(found.len() >= 3);
    }

    #[test]
    fn validator_is_deterministic() {
        let mut a = svc("a");
        a.depends_on = vec!["missing".to_string()];
        let cfg = config(vec![a]);
        assert_eq!(issues(&cfg), issues(&cfg));
    }
}
