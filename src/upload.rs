//! Upload orchestration against the analysis service.
//!
//! Four sequential calls, each carrying the bearer token: resolve the
//! current team, create an import under it, post the archive as multipart,
//! then trigger server-side processing. Any failing step aborts the run; a
//! created import whose upload fails is left dangling server-side.

use std::fs;
use std::path::Path;

use async_trait::async_trait;
use mockall::automock;
use reqwest::multipart;
use tracing::{error, info};

use crate::credentials::{CredentialManager, TokenExchange};
use crate::error::RunError;

const JSON_API_ACCEPT: &str = "application/vnd.api+json";

/// Everything the file-upload call needs about the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivePayload {
    pub name: String,
    pub path: String,
    pub content_hash: String,
    pub bytes: Vec<u8>,
}

/// Seam for the analysis service API.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait AnalysisApi: Send + Sync {
    /// Resolve the caller's current team.
    async fn current_team_id(&self) -> Result<String, RunError>;

    /// Create a new import session under the team; returns the import id.
    async fn create_import(&self, team_id: &str) -> Result<String, RunError>;

    /// Upload the archive into the import.
    async fn upload_file(&self, import_id: &str, payload: &ArchivePayload)
        -> Result<(), RunError>;

    /// Ask the server to process the uploaded files.
    async fn process_files(&self, import_id: &str) -> Result<(), RunError>;
}

/// Run the full upload sequence for a freshly created archive. Returns the
/// uploaded archive name.
pub async fn upload_archive<A: AnalysisApi>(
    api: &A,
    archive_path: &Path,
) -> Result<String, RunError> {
    let name = archive_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| RunError::Failure(format!("not a file path: {}", archive_path.display())))?;

    let team_id = api.current_team_id().await?;
    info!(team_id = %team_id, "resolved current team");

    let import_id = api.create_import(&team_id).await?;
    info!(import_id = %import_id, "created import");

    let bytes = fs::read(archive_path)
        .map_err(|e| RunError::from_io(&format!("reading archive {}", archive_path.display()), e))?;
    let content_hash = format!("{:x}", md5::compute(&bytes));
    let payload = ArchivePayload {
        name: name.clone(),
        path: archive_path.display().to_string(),
        content_hash,
        bytes,
    };

    api.upload_file(&import_id, &payload).await?;
    info!(import_id = %import_id, file = %name, "archive uploaded");

    api.process_files(&import_id).await?;
    info!(archive = %name, "upload sequence completed");
    Ok(name)
}

/// Real client for the service's JSON:API-style v1 endpoints.
pub struct ApiClient<E> {
    http: reqwest::Client,
    base_url: String,
    credentials: CredentialManager<E>,
}

impl<E: TokenExchange> ApiClient<E> {
    pub fn new(http: reqwest::Client, base_url: String, credentials: CredentialManager<E>) -> Self {
        ApiClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    async fn bearer(&self) -> Result<String, RunError> {
        Ok(self.credentials.obtain_token().await?.token)
    }

    /// Read the body and fail on HTTP >= 400, surfacing the body verbatim.
    async fn checked_body(response: reqwest::Response) -> Result<String, RunError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RunError::Failure(format!("reading response body: {e}")))?;
        if status.as_u16() >= 400 {
            error!(status = status.as_u16(), body = %body, "API call failed");
            return Err(RunError::Upload {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl<E: TokenExchange> AnalysisApi for ApiClient<E> {
    async fn current_team_id(&self) -> Result<String, RunError> {
        let token = self.bearer().await?;
        let response = self
            .http
            .get(self.url("/me"))
            .header(reqwest::header::ACCEPT, JSON_API_ACCEPT)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| RunError::Failure(format!("requesting current user: {e}")))?;
        let body = Self::checked_body(response).await?;
        extract_id(&body, "/data/attributes/current_team_id", "current_team_id")
    }

    async fn create_import(&self, team_id: &str) -> Result<String, RunError> {
        let token = self.bearer().await?;
        let response = self
            .http
            .post(self.url(&format!("/teams/{team_id}/imports")))
            .header(reqwest::header::ACCEPT, JSON_API_ACCEPT)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| RunError::Failure(format!("creating import: {e}")))?;
        let body = Self::checked_body(response).await?;
        extract_id(&body, "/data/attributes/id", "import id")
    }

    async fn upload_file(
        &self,
        import_id: &str,
        payload: &ArchivePayload,
    ) -> Result<(), RunError> {
        let token = self.bearer().await?;
        let part = multipart::Part::bytes(payload.bytes.clone())
            .file_name(payload.name.clone())
            .mime_str("application/zip")
            .map_err(|e| RunError::Failure(format!("building multipart body: {e}")))?;
        let form = multipart::Form::new()
            .text("name", payload.name.clone())
            .text("path", payload.path.clone())
            .text("content_hash", payload.content_hash.clone())
            .part("file", part);

        let response = self
            .http
            .post(self.url(&format!("/imports/{import_id}/files")))
            .header(reqwest::header::ACCEPT, JSON_API_ACCEPT)
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| RunError::Failure(format!("uploading archive: {e}")))?;
        Self::checked_body(response).await?;
        Ok(())
    }

    async fn process_files(&self, import_id: &str) -> Result<(), RunError> {
        let token = self.bearer().await?;
        let response = self
            .http
            .post(self.url(&format!("/imports/{import_id}/process_files")))
            .header(reqwest::header::ACCEPT, JSON_API_ACCEPT)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| RunError::Failure(format!("triggering processing: {e}")))?;
        Self::checked_body(response).await?;
        Ok(())
    }
}

/// Pull an identifier out of a JSON body. Servers disagree on whether ids are
/// strings or integers, so both are accepted; missing or null is fatal.
fn extract_id(body: &str, pointer: &str, what: &str) -> Result<String, RunError> {
    let json: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| RunError::Failure(format!("response is not valid JSON: {e}")))?;
    match json.pointer(pointer) {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(serde_json::Value::Number(n)) => Ok(n.to_string()),
        _ => Err(RunError::Failure(format!("response has no {what}"))),
    }
}
