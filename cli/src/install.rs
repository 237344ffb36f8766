//! Best-effort installation of the binary into PATH
//!
//! Symlinks the running executable to `/usr/local/bin/roost` so the client
//! subcommands are reachable from inside the container. Every failure is a
//! warning; installation never blocks supervision.

use std::path::Path;
use tracing::{info, warn};

const PATH_DIRS: [&str; 3] = ["/usr/local/bin", "/usr/bin", "/bin"];
const INSTALL_TARGET: &str = "/usr/local/bin/roost";

/// Create (or refresh) the PATH symlink for the current executable.
pub fn auto_install() {
    let exec_path = match std::env::current_exe() {
        Ok(path) => path,
        Err(e) => {
            info!("could not determine executable path: {}", e);
            return;
        }
    };

    if let Some(dir) = exec_path.parent() {
        if PATH_DIRS.iter().any(|d| Path::new(d) == dir) {
            info!("already installed in PATH: {}", dir.display());
            return;
        }
    }

    let target = Path::new(INSTALL_TARGET);
    if let Ok(existing) = std::fs::read_link(target) {
        if existing == exec_path {
            return;
        }
        let _ = std::fs::remove_file(target);
    }

    match std::os::unix::fs::symlink(&exec_path, target) {
        Ok(()) => {
            info!("installed in PATH as 'roost'");
            info!("you can now use: roost list, roost restart <service>, roost status");
        }
        Err(e) => {
            warn!("could not create symlink in PATH: {}", e);
            warn!(
                "you can manually run: ln -sf {} {}",
                exec_path.display(),
                target.display()
            );
        }
    }
}
