//! CLI surface and the run harness.
//!
//! `run` is the async entrypoint used by both `main` and the integration
//! tests. It wires the real collaborators together, frames every run with
//! started/finished log lines (including duration) regardless of outcome,
//! and maps failures to their process exit codes.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use tracing::{error, info};

use crate::archive::ZipArchiver;
use crate::config::Settings;
use crate::credentials::{CredentialManager, OauthExchanger};
use crate::download::RcloneSyncer;
use crate::error::RunError;
use crate::synchronise::{synchronise, RunReport};
use crate::upload::ApiClient;
use crate::{environment, load_config, logging};

/// Defensive ceiling on every HTTP call; the service imposes none itself.
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// CLI for somnosync: sync therapy-device data and publish daily archives.
#[derive(Parser)]
#[clap(
    name = "somnosync",
    version,
    about = "Pull therapy-device data from a WebDAV source and upload daily archives to Somnolog"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one sync-archive-upload cycle
    Sync {
        /// Path to the settings file (default: ~/.config/somnosync/somnosync.conf)
        #[clap(long)]
        settings: Option<PathBuf>,
    },
}

/// Async CLI entrypoint; returns the process exit code.
pub async fn run(cli: Cli) -> i32 {
    match cli.command {
        Commands::Sync { settings } => run_sync(settings.as_deref()).await,
    }
}

async fn run_sync(custom_settings: Option<&Path>) -> i32 {
    // Settings come first: the daily log file lives under the derived log
    // directory. Failures before that point log to stdout only.
    let settings = match load_config::load_settings(custom_settings) {
        Ok(settings) => settings,
        Err(e) => return abort_before_logging(e),
    };
    if let Err(e) = settings.ensure_directories() {
        return abort_before_logging(e);
    }
    if let Err(e) = logging::init(Some(&settings.log_dir())) {
        return abort_before_logging(e);
    }

    let started = Instant::now();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        base_dir = %settings.base_dir.display(),
        "run started"
    );

    let code = match execute(&settings).await {
        Ok(report) => {
            match &report.uploaded {
                Some(name) => info!(archive = %name, "run completed"),
                None => info!("run completed; nothing to upload"),
            }
            0
        }
        Err(e) => {
            error!(error = %e, "run failed");
            e.exit_code()
        }
    };

    info!(duration_secs = started.elapsed().as_secs_f64(), "run finished");
    code
}

fn abort_before_logging(e: RunError) -> i32 {
    let _ = logging::init(None);
    error!(error = %e, "startup failed");
    e.exit_code()
}

async fn execute(settings: &Settings) -> Result<RunReport, RunError> {
    environment::require_tools()?;
    environment::ensure_remote(settings)?;

    let http = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|e| RunError::Failure(format!("building HTTP client: {e}")))?;

    let syncer = RcloneSyncer::new(settings);
    let archiver = ZipArchiver::new(settings.data_dir());
    let exchanger = OauthExchanger::new(http.clone(), settings);
    let credentials = CredentialManager::new(settings.credential_cache_path(), exchanger);
    let api = ApiClient::new(http, settings.server_url.clone(), credentials);

    synchronise(settings, &syncer, &archiver, &api).await
}
