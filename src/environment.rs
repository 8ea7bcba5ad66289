//! Environment verification: required external tools and the sync remote.
//!
//! The sync and archive steps shell out to `rclone` and `zip`; both must be
//! resolvable on PATH before the pipeline starts. The configured sync remote
//! is registered with rclone on first use, which mutates rclone's own
//! persistent configuration store.

use std::env;
use std::path::PathBuf;
use std::process::Command;

use tracing::{error, info};

use crate::config::Settings;
use crate::error::RunError;

/// External executables every run depends on.
pub const REQUIRED_TOOLS: [&str; 2] = ["rclone", "zip"];

/// Fail with a missing-tool error naming the first absent executable.
pub fn require_tools() -> Result<(), RunError> {
    for tool in REQUIRED_TOOLS {
        if resolve_on_path(tool).is_none() {
            error!(tool, "required tool not found on PATH");
            return Err(RunError::MissingTool(tool.to_string()));
        }
    }
    Ok(())
}

fn resolve_on_path(name: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Make sure the configured remote is registered with rclone, creating it
/// with a generic WebDAV profile when absent.
pub fn ensure_remote(settings: &Settings) -> Result<(), RunError> {
    let output = Command::new("rclone")
        .arg("listremotes")
        .output()
        .map_err(|e| RunError::RemoteConfiguration(format!("running rclone listremotes: {e}")))?;
    if !output.status.success() {
        return Err(RunError::RemoteConfiguration(format!(
            "rclone listremotes exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    let registered = String::from_utf8_lossy(&output.stdout)
        .lines()
        .any(|line| line.trim().trim_end_matches(':') == settings.remote_name);
    if registered {
        return Ok(());
    }

    let address = settings.remote_address.as_deref().ok_or_else(|| {
        RunError::RemoteConfiguration(format!(
            "remote '{}' is not registered and no remote_address is configured",
            settings.remote_name
        ))
    })?;

    info!(remote = %settings.remote_name, address, "registering sync remote");
    let status = Command::new("rclone")
        .args([
            "config",
            "create",
            &settings.remote_name,
            "webdav",
            &format!("url={address}"),
            "vendor=other",
        ])
        .status()
        .map_err(|e| RunError::RemoteConfiguration(format!("running rclone config create: {e}")))?;
    if !status.success() {
        error!(remote = %settings.remote_name, %status, "rclone config create failed");
        return Err(RunError::RemoteConfiguration(format!(
            "registering remote '{}' failed with {status}",
            settings.remote_name
        )));
    }
    Ok(())
}
