//! Credential lifecycle: one cached bearer token per validity window.
//!
//! The cache is a small `key=value` file with owner-only permissions. A run
//! reads it first and only performs the password-grant exchange when the
//! cached token is absent or expired, so at most one exchange happens per
//! validity window.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use mockall::automock;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::RunError;

/// Safety margin subtracted from the server-reported lifetime, absorbing
/// clock skew and request latency.
pub const EXPIRY_MARGIN_SECS: i64 = 60;

const TOKEN_SCOPE: &str = "read write delete";

/// A bearer token with its absolute expiry (epoch seconds, margin already
/// applied).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: i64,
}

/// Raw result of a successful token exchange.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_in: i64,
}

/// Seam for the OAuth exchange so the cache logic is testable without a
/// network.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait TokenExchange: Send + Sync {
    async fn exchange(&self) -> Result<TokenGrant, RunError>;
}

/// Password-grant exchange against `{server_url}/oauth/token`.
pub struct OauthExchanger {
    http: reqwest::Client,
    server_url: String,
    client_id: String,
    client_secret: String,
}

impl OauthExchanger {
    pub fn new(http: reqwest::Client, settings: &Settings) -> Self {
        OauthExchanger {
            http,
            server_url: settings.server_url.clone(),
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
        }
    }
}

#[async_trait]
impl TokenExchange for OauthExchanger {
    async fn exchange(&self) -> Result<TokenGrant, RunError> {
        let url = format!("{}/oauth/token", self.server_url);
        info!(url = %url, "requesting access token");
        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "password"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", TOKEN_SCOPE),
            ])
            .send()
            .await
            .map_err(|e| RunError::Token(format!("token request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RunError::Token(format!("reading token response: {e}")))?;
        parse_token_response(status.as_u16(), &body)
    }
}

#[derive(Debug, serde::Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
}

fn parse_token_response(status: u16, body: &str) -> Result<TokenGrant, RunError> {
    if status >= 400 {
        return Err(RunError::Token(format!(
            "token endpoint returned status {status}: {body}"
        )));
    }
    let response: TokenResponse = serde_json::from_str(body)
        .map_err(|e| RunError::Token(format!("token response is not valid JSON: {e}")))?;
    let access_token = match response.access_token {
        Some(token) if !token.is_empty() => token,
        _ => return Err(RunError::Token("response has no access_token".into())),
    };
    let expires_in = response
        .expires_in
        .ok_or_else(|| RunError::Token("response has no expires_in".into()))?;
    Ok(TokenGrant {
        access_token,
        expires_in,
    })
}

/// Owns the credential cache file and decides when a fresh exchange is
/// needed.
pub struct CredentialManager<E> {
    cache_path: PathBuf,
    exchanger: E,
}

impl<E: TokenExchange> CredentialManager<E> {
    pub fn new(cache_path: PathBuf, exchanger: E) -> Self {
        CredentialManager {
            cache_path,
            exchanger,
        }
    }

    /// Return a valid bearer token, reusing the cache when it has not
    /// expired and exchanging (then overwriting the cache) otherwise.
    pub async fn obtain_token(&self) -> Result<AccessToken, RunError> {
        let now = Utc::now().timestamp();
        if let Some(cached) = read_cache(&self.cache_path) {
            if now < cached.expires_at {
                debug!(expires_at = cached.expires_at, "using cached access token");
                return Ok(cached);
            }
            debug!(expires_at = cached.expires_at, "cached access token expired");
        }

        let grant = self.exchanger.exchange().await?;
        let token = AccessToken {
            token: grant.access_token,
            expires_at: Utc::now().timestamp() + grant.expires_in - EXPIRY_MARGIN_SECS,
        };
        write_cache(&self.cache_path, &token)?;
        info!(expires_at = token.expires_at, "access token refreshed");
        Ok(token)
    }
}

/// Read the cached credential, if present and well-formed. A malformed cache
/// is a cache miss, not an error: the next exchange rewrites it.
fn read_cache(path: &Path) -> Option<AccessToken> {
    let raw = fs::read_to_string(path).ok()?;
    if raw.trim().is_empty() {
        return None;
    }
    let mut token = None;
    let mut expires_at = None;
    for line in raw.lines() {
        match line.trim().split_once('=') {
            Some(("access_token", value)) if !value.is_empty() => {
                token = Some(value.to_string());
            }
            Some(("expires_at", value)) => {
                expires_at = value.parse::<i64>().ok();
            }
            _ => {}
        }
    }
    match (token, expires_at) {
        (Some(token), Some(expires_at)) => Some(AccessToken { token, expires_at }),
        _ => {
            warn!(path = %path.display(), "credential cache is malformed; ignoring it");
            None
        }
    }
}

fn write_cache(path: &Path, token: &AccessToken) -> Result<(), RunError> {
    let contents = format!(
        "access_token={}\nexpires_at={}\n",
        token.token, token.expires_at
    );
    fs::write(path, contents)
        .map_err(|e| RunError::from_io(&format!("writing credential cache {}", path.display()), e))?;
    restrict_permissions(path)?;
    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), RunError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .map_err(|e| RunError::from_io(&format!("restricting {}", path.display()), e))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), RunError> {
    Ok(())
}
