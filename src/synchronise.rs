//! Top-level pipeline: sync, decide, archive, upload.
//!
//! Generic over the collaborator seams so integration tests can drive the
//! whole flow with mocks. Fail-fast: the first failing step aborts the run.

use tracing::info;

use crate::archive::{maybe_build_archive, Archiver};
use crate::config::Settings;
use crate::download::Syncer;
use crate::error::RunError;
use crate::upload::{upload_archive, AnalysisApi};

/// What a run accomplished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Name of the archive uploaded this run, if one was produced.
    pub uploaded: Option<String>,
}

pub async fn synchronise<S, A, U>(
    settings: &Settings,
    syncer: &S,
    archiver: &A,
    api: &U,
) -> Result<RunReport, RunError>
where
    S: Syncer,
    A: Archiver,
    U: AnalysisApi,
{
    match maybe_build_archive(settings, syncer, archiver).await? {
        Some(archive_path) => {
            let name = upload_archive(api, &archive_path).await?;
            Ok(RunReport {
                uploaded: Some(name),
            })
        }
        None => {
            info!("no archive produced; skipping upload");
            Ok(RunReport { uploaded: None })
        }
    }
}
