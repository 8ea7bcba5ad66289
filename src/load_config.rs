//! Locates and parses the settings source into a validated [`Settings`].
//!
//! The settings source is a plain `key=value` file. A custom location (the
//! `--settings` flag) takes priority over the default fallback under the
//! user's config directory; if neither exists the run aborts with a
//! configuration-missing error before anything else happens.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::config::{Settings, DEFAULT_SERVER_URL};
use crate::error::RunError;

/// Fallback settings location relative to `$HOME`.
const DEFAULT_SETTINGS_REL: &str = ".config/somnosync/somnosync.conf";

const REQUIRED_KEYS: [&str; 4] = ["base_dir", "client_id", "client_secret", "remote_name"];

/// Resolve the settings source path: the custom location wins when it
/// exists, then the default fallback; a configuration-missing error only
/// when neither does.
pub fn locate_settings(custom: Option<&Path>) -> Result<PathBuf, RunError> {
    if let Some(path) = custom {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        warn!(path = %path.display(), "no settings file at custom location; trying default");
    }

    let home = std::env::var_os("HOME").map(PathBuf::from).ok_or_else(|| {
        RunError::ConfigurationMissing("HOME is not set; cannot locate settings".into())
    })?;
    let fallback = home.join(DEFAULT_SETTINGS_REL);
    if fallback.is_file() {
        return Ok(fallback);
    }
    error!(path = %fallback.display(), "no settings file at default location");
    let tried = match custom {
        Some(path) => format!("{} or {}", path.display(), fallback.display()),
        None => fallback.display().to_string(),
    };
    Err(RunError::ConfigurationMissing(format!(
        "settings file not found at {tried}"
    )))
}

/// Load, parse and validate the settings source.
pub fn load_settings(custom: Option<&Path>) -> Result<Settings, RunError> {
    let path = locate_settings(custom)?;
    info!(path = %path.display(), "loading settings");

    let raw = fs::read_to_string(&path)
        .map_err(|e| RunError::from_io(&format!("reading settings {}", path.display()), e))?;
    let pairs = parse_key_values(&raw);

    // Parsing trims values, so a whitespace-only credential arrives here
    // empty and is rejected like a missing one.
    for key in REQUIRED_KEYS {
        match pairs.get(key) {
            Some(value) if !value.is_empty() => {}
            _ => {
                error!(key, path = %path.display(), "required settings key missing or empty");
                return Err(RunError::ConfigurationMissing(format!(
                    "required key '{key}' missing or empty in {}",
                    path.display()
                )));
            }
        }
    }

    let server_url = match pairs.get("server_url") {
        Some(url) if !url.is_empty() => url.trim_end_matches('/').to_string(),
        _ => DEFAULT_SERVER_URL.to_string(),
    };
    let remote_address = pairs
        .get("remote_address")
        .filter(|v| !v.is_empty())
        .cloned();

    let settings = Settings {
        base_dir: PathBuf::from(&pairs["base_dir"]),
        client_id: pairs["client_id"].clone(),
        client_secret: pairs["client_secret"].clone(),
        remote_name: pairs["remote_name"].clone(),
        remote_address,
        server_url,
    };
    info!(
        base_dir = %settings.base_dir.display(),
        remote = %settings.remote_name,
        server = %settings.server_url,
        "settings loaded"
    );
    Ok(settings)
}

/// Parse `key=value` lines. Blank lines and `#` comments are skipped; values
/// keep everything after the first `=` (trimmed), so addresses containing
/// `=` survive.
fn parse_key_values(raw: &str) -> HashMap<String, String> {
    let mut pairs = HashMap::new();
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            pairs.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    pairs
}
