//! HTTP client for the digest document.
//!
//! The digest is fetched exactly once per session; there is no polling and
//! no retry. Any non-2xx status or unparseable body is a `FetchError`.

use std::time::Duration;

use reqwest::{header, Client, Url};
use tracing::{debug, info, warn};

use super::FetchError;
use crate::config::{DEFAULT_CONTENT_PATH, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::models::Digest;

/// Client for the origin that serves the digest and its narration.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone, Debug)]
pub struct ContentClient {
    client: Client,
    base_url: Url,
    content_path: String,
}

impl ContentClient {
    /// Create a client for `base_url` with the default timeout.
    pub fn new(base_url: &str) -> Result<Self, FetchError> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: Self::normalize_base(base_url)?,
            content_path: DEFAULT_CONTENT_PATH.to_string(),
        })
    }

    /// Override where the digest lives relative to the base URL.
    pub fn with_content_path(mut self, content_path: impl Into<String>) -> Self {
        self.content_path = content_path.into();
        self
    }

    /// Directory-style base so relative paths resolve beneath it.
    fn normalize_base(base_url: &str) -> Result<Url, FetchError> {
        let trimmed = base_url.trim();
        let with_slash = if trimmed.ends_with('/') {
            trimmed.to_string()
        } else {
            format!("{}/", trimmed)
        };
        Url::parse(&with_slash).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", trimmed, e)))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The underlying HTTP client, shared with the audio transport.
    pub fn http(&self) -> &Client {
        &self.client
    }

    /// Resolve a path from the digest (e.g. an `audio_url`) against the base URL.
    pub fn resolve(&self, relative: &str) -> Result<Url, FetchError> {
        resolve_against(&self.base_url, relative)
    }

    pub fn digest_url(&self) -> Result<Url, FetchError> {
        self.resolve(&self.content_path)
    }

    /// Fetch and parse the digest document.
    pub async fn fetch_digest(&self) -> Result<Digest, FetchError> {
        let url = self.digest_url()?;
        debug!(%url, "Fetching digest");

        let response = self
            .client
            .get(url.clone())
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%url, status = status.as_u16(), "Digest request failed");
            return Err(FetchError::from_status(status, &body));
        }

        let bytes = response.bytes().await?;
        let digest: Digest = serde_json::from_slice(&bytes)?;

        info!(date = %digest.date, stories = digest.len(), "Digest fetched");
        Ok(digest)
    }
}

/// Resolve a digest-relative path against a directory-style base URL.
pub fn resolve_against(base: &Url, relative: &str) -> Result<Url, FetchError> {
    base.join(relative.trim())
        .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", relative, e)))
}
