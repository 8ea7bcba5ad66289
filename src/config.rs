//! Immutable run settings and the directory layout derived from them.
//!
//! A `Settings` value is constructed once by [`crate::load_config`] and passed
//! by reference to every later component. Nothing mutates it after startup.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::RunError;

/// Default analysis service endpoint, overridable via the `server_url` key.
pub const DEFAULT_SERVER_URL: &str = "https://app.somnolog.com";

/// Subdirectory of the data directory holding the device's dated session
/// folders (`DATALOG/<YYYYMMDD>/...`).
pub const DATALOG_DIR: &str = "DATALOG";

#[derive(Debug, Clone)]
pub struct Settings {
    /// Base working directory; all other paths derive from it.
    pub base_dir: PathBuf,
    /// OAuth client identifier for the analysis service.
    pub client_id: String,
    /// OAuth client secret for the analysis service.
    pub client_secret: String,
    /// Name of the sync remote registered with the sync tool.
    pub remote_name: String,
    /// WebDAV address used to register the remote when it is absent.
    pub remote_address: Option<String>,
    /// Analysis service base URL.
    pub server_url: String,
}

impl Settings {
    /// Local mirror of the device directory tree.
    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    /// Staging directory for dated archives awaiting upload.
    pub fn archive_dir(&self) -> PathBuf {
        self.base_dir.join("archives")
    }

    /// Daily log files live here.
    pub fn log_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    pub fn config_dir(&self) -> PathBuf {
        self.base_dir.join("config")
    }

    /// Cached bearer token, two `key=value` lines, owner-only permissions.
    pub fn credential_cache_path(&self) -> PathBuf {
        self.config_dir().join("credentials")
    }

    /// Dated session folders pulled from the device.
    pub fn datalog_dir(&self) -> PathBuf {
        self.data_dir().join(DATALOG_DIR)
    }

    /// Create the derived working directories. Kept separate from loading so
    /// that validation alone has no side effects.
    pub fn ensure_directories(&self) -> Result<(), RunError> {
        for dir in [
            self.data_dir(),
            self.archive_dir(),
            self.log_dir(),
            self.config_dir(),
        ] {
            create_dir(&dir)?;
        }
        Ok(())
    }
}

fn create_dir(dir: &Path) -> Result<(), RunError> {
    fs::create_dir_all(dir)
        .map_err(|e| RunError::from_io(&format!("creating directory {}", dir.display()), e))
}
