//! Shell script execution and executable resolution
//!
//! Pre- and post-scripts run through `bash -c` (or `sh -c` when bash is not
//! installed) with the supervisor's own stdio and environment, after being
//! marked owner-executable.

use crate::{CoreError, Result};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Resolve a command name against `PATH`, or verify a path directly when it
/// contains a separator. Returns the executable's path when found.
pub fn lookup_path(command: &str) -> Option<PathBuf> {
    if command.contains('/') {
        let path = PathBuf::from(command);
        return is_executable(&path).then_some(path);
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(command))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// The shell used for scripts and user switching: bash when available
pub fn preferred_shell() -> &'static str {
    if lookup_path("bash").is_some() {
        "bash"
    } else {
        "sh"
    }
}

/// Run one script to completion with inherited stdio and environment.
///
/// The file is chmod'ed to 0700 first so a config can ship scripts without
/// the execute bit. A non-zero exit is an error; interpretation (skip the
/// service, or escalate) is up to the caller.
pub async fn run_script(path: &str) -> Result<()> {
    let mut perms = std::fs::metadata(path)
        .map_err(|e| CoreError::Script(format!("cannot stat script '{}': {}", path, e)))?
        .permissions();
    perms.set_mode(0o700);
    std::fs::set_permissions(path, perms)
        .map_err(|e| CoreError::Script(format!("cannot set execute permission on '{}': {}", path, e)))?;

    let status = Command::new(preferred_shell())
        .arg("-c")
        .arg(path)
        .status()
        .await
        .map_err(|e| CoreError::Script(format!("cannot run script '{}': {}", path, e)))?;

    if status.success() {
        Ok(())
    } else {
        Err(CoreError::Script(format!(
            "script '{}' exited with {}",
            path, status
        )))
    }
}
