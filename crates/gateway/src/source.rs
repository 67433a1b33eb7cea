//! [`ImageSource`] for artifacts addressed by URL or file path.

use std::time::Duration;

use async_trait::async_trait;

use atelier_core::error::CoreError;
use atelier_core::source::ImageSource;
use atelier_core::types::ArtifactRef;

use crate::error::GatewayError;

/// Loads `http(s)://` artifacts over HTTP and anything else from the local
/// filesystem.
pub struct HttpImageSource {
    client: reqwest::Client,
}

impl HttpImageSource {
    pub fn new(timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, CoreError> {
        let unavailable = |e: reqwest::Error| CoreError::SourceUnavailable(format!("{url}: {e}"));
        let response = self.client.get(url).send().await.map_err(unavailable)?;
        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::SourceUnavailable(format!("{url}: HTTP {status}")));
        }
        let bytes = response.bytes().await.map_err(unavailable)?;
        Ok(bytes.to_vec())
    }
}

fn is_remote(artifact: &ArtifactRef) -> bool {
    let s = artifact.as_str();
    s.starts_with("http://") || s.starts_with("https://")
}

#[async_trait]
impl ImageSource for HttpImageSource {
    async fn load(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, CoreError> {
        if is_remote(artifact) {
            return self.fetch(artifact.as_str()).await;
        }
        tokio::fs::read(artifact.as_str())
            .await
            .map_err(|e| CoreError::SourceUnavailable(format!("{artifact}: {e}")))
    }
}
