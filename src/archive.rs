//! Dated archive naming, the full-vs-incremental decision engine, and the
//! external zip invocation.
//!
//! An archive covers the prior UTC calendar day and is produced at most once
//! per day of coverage. The first-ever archive captures everything the device
//! has (full snapshot); later archives carry only yesterday's session folder
//! plus the device's top-level files.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use mockall::automock;
use tracing::{debug, info};

use crate::config::{Settings, DATALOG_DIR};
use crate::download::Syncer;
use crate::error::RunError;

/// Prior UTC calendar day.
pub fn yesterday_utc() -> Result<NaiveDate, RunError> {
    Utc::now()
        .date_naive()
        .pred_opt()
        .ok_or_else(|| RunError::DateComputation("no day precedes today".into()))
}

/// Deterministic archive name for a day of coverage.
pub fn archive_name(date: NaiveDate) -> String {
    format!("data_{}.zip", date.format("%Y%m%d"))
}

/// What an archive should contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveScope {
    /// Top-level device files plus the whole data-log tree.
    Full,
    /// Top-level device files plus one dated data-log subdirectory.
    Daily(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveJob {
    pub archive_path: PathBuf,
    pub scope: ArchiveScope,
}

/// Seam for the external archive step.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Archiver: Send + Sync {
    async fn build(&self, job: &ArchiveJob) -> Result<(), RunError>;
}

/// Sync the remote, then decide whether a dated archive must be produced and
/// build it. Returns the archive path when one was created, `None` when this
/// run has nothing to package.
pub async fn maybe_build_archive<S, A>(
    settings: &Settings,
    syncer: &S,
    archiver: &A,
) -> Result<Option<PathBuf>, RunError>
where
    S: Syncer,
    A: Archiver,
{
    let yesterday = yesterday_utc()?;
    let stamp = yesterday.format("%Y%m%d").to_string();
    let archive_path = settings.archive_dir().join(archive_name(yesterday));
    let zip_exists = archive_path.is_file();

    let outcome = syncer.pull().await?;
    info!(
        changed = outcome.changed,
        archive = %archive_path.display(),
        already_staged = zip_exists,
        "sync finished, deciding on archive"
    );

    if zip_exists && !outcome.changed {
        info!("archive for yesterday already staged and no new data; skipping");
        return Ok(None);
    }

    // Note the two different scopes: the skip check above is for yesterday's
    // exact name, while the bootstrap check below is for any staged archive.
    let staging_populated = staging_has_archive(&settings.archive_dir())?;
    let datalog = settings.datalog_dir();

    let scope = if !staging_populated && datalog_has_entries(&datalog) {
        info!("no archive staged yet; building full snapshot");
        ArchiveScope::Full
    } else if datalog.join(&stamp).is_dir() {
        info!(day = %stamp, "building incremental archive for yesterday");
        ArchiveScope::Daily(stamp)
    } else {
        info!("no new data to package");
        return Ok(None);
    };

    archiver
        .build(&ArchiveJob {
            archive_path: archive_path.clone(),
            scope,
        })
        .await?;
    info!(archive = %archive_path.display(), "archive created");
    Ok(Some(archive_path))
}

fn staging_has_archive(archive_dir: &Path) -> Result<bool, RunError> {
    let entries = fs::read_dir(archive_dir)
        .map_err(|e| RunError::from_io(&format!("reading {}", archive_dir.display()), e))?;
    for entry in entries {
        let entry =
            entry.map_err(|e| RunError::from_io(&format!("reading {}", archive_dir.display()), e))?;
        if entry.path().extension().is_some_and(|ext| ext == "zip") {
            return Ok(true);
        }
    }
    Ok(false)
}

fn datalog_has_entries(datalog: &Path) -> bool {
    fs::read_dir(datalog)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// Real implementation shelling out to `zip -r` inside the data directory.
pub struct ZipArchiver {
    data_dir: PathBuf,
}

impl ZipArchiver {
    pub fn new(data_dir: PathBuf) -> Self {
        ZipArchiver { data_dir }
    }

    /// Top-level device files (not directories), relative to the data dir.
    fn top_level_files(&self) -> Result<Vec<String>, RunError> {
        let entries = fs::read_dir(&self.data_dir)
            .map_err(|e| RunError::from_io(&format!("reading {}", self.data_dir.display()), e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|e| RunError::from_io(&format!("reading {}", self.data_dir.display()), e))?;
            if entry.path().is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

#[async_trait]
impl Archiver for ZipArchiver {
    async fn build(&self, job: &ArchiveJob) -> Result<(), RunError> {
        // zip runs with the data directory as cwd, so the archive path must
        // survive the directory change.
        let archive_path = if job.archive_path.is_absolute() {
            job.archive_path.clone()
        } else {
            env::current_dir()
                .map_err(|e| RunError::from_io("resolving working directory", e))?
                .join(&job.archive_path)
        };

        let mut cmd = Command::new("zip");
        cmd.current_dir(&self.data_dir).arg("-r").arg(&archive_path);
        match &job.scope {
            ArchiveScope::Full => {
                cmd.arg(".");
            }
            ArchiveScope::Daily(day) => {
                for name in self.top_level_files()? {
                    cmd.arg(name);
                }
                cmd.arg(format!("{DATALOG_DIR}/{day}"));
            }
        }

        debug!(archive = %archive_path.display(), scope = ?job.scope, "invoking zip");
        let output = cmd
            .output()
            .map_err(|e| RunError::Failure(format!("running zip: {e}")))?;
        if !output.status.success() {
            return Err(RunError::Failure(format!(
                "zip exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}
