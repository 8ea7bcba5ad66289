//! Logging bootstrap: stdout plus a daily log file.
//!
//! Lines are UTC-timestamped by the subscriber and tagged with severity. When
//! a log directory is available, the same events are appended to
//! `somnosync_<YYYYMMDD>.log` inside it; before settings are loaded only the
//! stdout layer exists.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::error::RunError;

/// Install the global subscriber. Safe to call more than once; later calls
/// are no-ops (this matters for integration tests driving `cli::run`).
pub fn init(log_dir: Option<&Path>) -> Result<(), RunError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = tracing_subscriber::fmt::layer();

    match log_dir {
        Some(dir) => {
            let path = dir.join(format!("somnosync_{}.log", Utc::now().format("%Y%m%d")));
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| RunError::from_io(&format!("opening log file {}", path.display()), e))?;
            let file_layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(file));
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(stdout_layer)
                .with(file_layer)
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(stdout_layer)
                .try_init();
        }
    }
    Ok(())
}
