//! Pulling remote device files into the local data directory.
//!
//! The transfer itself is delegated to rclone. Its human-readable output is
//! inspected for the no-transfer sentinel here, behind the [`Syncer`] trait,
//! so the rest of the pipeline only ever sees a `SyncOutcome { changed }`.

use std::path::PathBuf;
use std::process::Command;

use async_trait::async_trait;
use mockall::automock;
use tracing::{debug, error, info};

use crate::config::Settings;
use crate::error::RunError;

/// Phrase rclone prints when a copy moved no files.
const NO_TRANSFER_SENTINEL: &str = "There was nothing to transfer";

/// Result of one sync invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Whether any file was transferred from the remote.
    pub changed: bool,
}

/// Seam for the external sync step.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Syncer: Send + Sync {
    /// Pull remote files into the local data directory.
    async fn pull(&self) -> Result<SyncOutcome, RunError>;
}

/// Real implementation driving `rclone copy <remote>:/ <data_dir>`.
pub struct RcloneSyncer {
    remote_name: String,
    data_dir: PathBuf,
}

impl RcloneSyncer {
    pub fn new(settings: &Settings) -> Self {
        RcloneSyncer {
            remote_name: settings.remote_name.clone(),
            data_dir: settings.data_dir(),
        }
    }
}

#[async_trait]
impl Syncer for RcloneSyncer {
    async fn pull(&self) -> Result<SyncOutcome, RunError> {
        let source = format!("{}:/", self.remote_name);
        info!(remote = %source, target = %self.data_dir.display(), "syncing remote data");
        let output = Command::new("rclone")
            .arg("copy")
            .arg(&source)
            .arg(&self.data_dir)
            .arg("-v")
            .output()
            .map_err(|e| RunError::Failure(format!("running rclone copy: {e}")))?;

        // rclone logs transfer statistics on stderr with -v.
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            error!(status = %output.status, "rclone copy failed");
            return Err(RunError::Failure(format!(
                "rclone copy exited with {}: {}",
                output.status,
                combined.trim()
            )));
        }

        let changed = !combined.contains(NO_TRANSFER_SENTINEL);
        debug!(changed, "sync finished");
        Ok(SyncOutcome { changed })
    }
}
