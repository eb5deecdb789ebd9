use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, Url};
use tracing::debug;

use super::error::ShellError;
use super::storage::ShellResponse;

/// Timeout for shell resource requests.
pub const SHELL_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Where the worker gets fresh shell resources from.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, path: &str) -> Result<ShellResponse, ShellError>;
}

/// Fetches shell paths from the application origin.
#[derive(Debug, Clone)]
pub struct HttpNetwork {
    client: Client,
    origin: Url,
}

impl HttpNetwork {
    pub fn new(origin: &str) -> Result<Self, ShellError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(SHELL_REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ShellError::Network {
                path: origin.to_string(),
                reason: e.to_string(),
            })?;
        Self::with_client(client, origin)
    }

    pub fn with_client(client: Client, origin: &str) -> Result<Self, ShellError> {
        let mut origin = Url::parse(origin).map_err(|e| ShellError::Network {
            path: origin.to_string(),
            reason: e.to_string(),
        })?;
        if !origin.path().ends_with('/') {
            let path = format!("{}/", origin.path());
            origin.set_path(&path);
        }
        Ok(Self { client, origin })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    fn url_for(&self, path: &str) -> Result<Url, ShellError> {
        self.origin
            .join(path.trim_start_matches('/'))
            .map_err(|e| ShellError::Network {
                path: path.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, path: &str) -> Result<ShellResponse, ShellError> {
        let url = self.url_for(path)?;
        let network_error = |e: reqwest::Error| ShellError::Network {
            path: path.to_string(),
            reason: e.to_string(),
        };

        let response = self.client.get(url.clone()).send().await.map_err(network_error)?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(network_error)?;

        debug!(url = %url, status, bytes = body.len(), "Fetched shell resource");
        Ok(ShellResponse::new(status, content_type, body.to_vec()))
    }
}
