//! Service seams used by the edit pipeline.

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::request::{GeneratedArtifact, GenerationRequest, StructuredDescription};

/// The external image generation service.
#[async_trait]
pub trait GenerationGateway: Send + Sync {
    async fn generate(&self, request: &GenerationRequest)
        -> Result<GeneratedArtifact, GatewayError>;
}

/// The external vision analysis service.
#[async_trait]
pub trait AnalysisGateway: Send + Sync {
    /// Describe the contents of a PNG image. `hint` names what the caller
    /// expects to find, e.g. the zone name.
    async fn analyze(
        &self,
        image_png: &[u8],
        hint: Option<&str>,
    ) -> Result<StructuredDescription, GatewayError>;
}
