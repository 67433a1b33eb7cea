//! Image loading seam.
//!
//! The crop engine and the edit pipeline read artifact bytes through
//! [`ImageSource`]; production code plugs in an HTTP/file loader, tests use
//! [`MemoryImageSource`].

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::CoreError;
use crate::types::ArtifactRef;

/// Anything that can turn an [`ArtifactRef`] into encoded image bytes.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Fetch the encoded bytes of `artifact`.
    ///
    /// Fails with [`CoreError::SourceUnavailable`] when the artifact cannot
    /// be read.
    async fn load(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, CoreError>;
}

/// In-memory image store.
#[derive(Default)]
pub struct MemoryImageSource {
    images: RwLock<HashMap<ArtifactRef, Vec<u8>>>,
    loads: RwLock<usize>,
}

impl MemoryImageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, artifact: ArtifactRef, bytes: Vec<u8>) {
        self.images.write().await.insert(artifact, bytes);
    }

    /// Number of successful [`ImageSource::load`] calls so far.
    pub async fn load_count(&self) -> usize {
        *self.loads.read().await
    }
}

#[async_trait]
impl ImageSource for MemoryImageSource {
    async fn load(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, CoreError> {
        let bytes = self
            .images
            .read()
            .await
            .get(artifact)
            .cloned()
            .ok_or_else(|| CoreError::SourceUnavailable(format!("No image stored for {artifact}")))?;
        *self.loads.write().await += 1;
        Ok(bytes)
    }
}
