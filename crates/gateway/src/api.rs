//! HTTP clients for the generation and analysis services.
//!
//! Both services take `multipart/form-data`: a JSON `request` part describing
//! the call plus one binary part per attached image. Non-success responses
//! are classified by [`classify_response`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Serialize;

use atelier_core::region::Region;
use atelier_core::types::ArtifactRef;
use atelier_core::version_graph::RenderKind;

use crate::config::GatewayConfig;
use crate::error::{classify_response, GatewayError};
use crate::gateway::{AnalysisGateway, GenerationGateway};
use crate::request::{
    GeneratedArtifact, GenerationRequest, Placement, Reference, ReferenceRole,
    StructuredDescription,
};

const PNG_MIME: &str = "image/png";

fn build_client(timeout: Duration) -> Result<reqwest::Client, GatewayError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

fn png_part(bytes: Vec<u8>, file_name: String) -> Result<Part, GatewayError> {
    Ok(Part::bytes(bytes).file_name(file_name).mime_str(PNG_MIME)?)
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// HTTP client for the generation service.
pub struct HttpGenerationGateway {
    client: reqwest::Client,
    api_url: String,
}

/// JSON manifest sent as the `request` part.
#[derive(Debug, Serialize)]
struct GenerateManifest<'a> {
    source_artifact_ref: &'a ArtifactRef,
    directive: &'a str,
    kind: RenderKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    region: Option<&'a Region>,
    /// Name of the multipart part holding the mask, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    mask_part: Option<&'static str>,
    references: Vec<ReferenceManifest<'a>>,
    placements: &'a [Placement],
    views: &'a [String],
}

#[derive(Debug, Serialize)]
struct ReferenceManifest<'a> {
    role: ReferenceRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    artifact_ref: Option<&'a ArtifactRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    part: Option<String>,
}

impl HttpGenerationGateway {
    /// Create a client for the service at `api_url`, e.g.
    /// `http://host:8080`.
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        Ok(Self::with_client(build_client(timeout)?, api_url))
    }

    /// Reuse an existing [`reqwest::Client`] (shared connection pool).
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        Self::new(config.generation_api_url.clone(), config.timeout)
    }

    /// Describe `request` as the JSON manifest. Inline rasters are named
    /// `reference_{index}` and the mask `mask`.
    fn manifest(request: &GenerationRequest) -> GenerateManifest<'_> {
        let references = request
            .references
            .iter()
            .enumerate()
            .map(|(index, reference)| match reference {
                Reference::Artifact { role, artifact_ref } => ReferenceManifest {
                    role: *role,
                    artifact_ref: Some(artifact_ref),
                    part: None,
                },
                Reference::Raster { role, .. } => ReferenceManifest {
                    role: *role,
                    artifact_ref: None,
                    part: Some(format!("reference_{index}")),
                },
            })
            .collect();

        GenerateManifest {
            source_artifact_ref: &request.source_artifact_ref,
            directive: &request.directive,
            kind: request.kind,
            region: request.region.as_ref(),
            mask_part: request.mask_png.as_ref().map(|_| "mask"),
            references,
            placements: &request.placements,
            views: &request.views,
        }
    }

    /// Assemble the multipart form for `request`.
    fn build_form(request: &GenerationRequest) -> Result<Form, GatewayError> {
        let json = serde_json::to_string(&Self::manifest(request))
            .map_err(|e| GatewayError::ValidationRejected(e.to_string()))?;
        let mut form = Form::new().text("request", json);

        for (index, reference) in request.references.iter().enumerate() {
            if let Reference::Raster { png, .. } = reference {
                let name = format!("reference_{index}");
                form = form.part(name.clone(), png_part(png.clone(), format!("{name}.png"))?);
            }
        }
        if let Some(mask) = &request.mask_png {
            form = form.part("mask", png_part(mask.clone(), "mask.png".to_string())?);
        }
        Ok(form)
    }
}

#[async_trait]
impl GenerationGateway for HttpGenerationGateway {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedArtifact, GatewayError> {
        let form = Self::build_form(request)?;

        tracing::debug!(
            kind = request.kind.as_str(),
            source = %request.source_artifact_ref,
            references = request.references.len(),
            "Submitting generation request",
        );

        let response = self
            .client
            .post(format!("{}/generate", self.api_url))
            .multipart(form)
            .send()
            .await?;

        parse_response(response).await
    }
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// HTTP client for the analysis service.
pub struct HttpAnalysisGateway {
    client: reqwest::Client,
    api_url: String,
}

impl HttpAnalysisGateway {
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        Ok(Self::with_client(build_client(timeout)?, api_url))
    }

    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
        }
    }

    /// `None` when no analysis service is configured.
    pub fn from_config(config: &GatewayConfig) -> Result<Option<Self>, GatewayError> {
        config
            .analysis_api_url
            .as_ref()
            .map(|url| Self::new(url.clone(), config.timeout))
            .transpose()
    }
}

#[async_trait]
impl AnalysisGateway for HttpAnalysisGateway {
    async fn analyze(
        &self,
        image_png: &[u8],
        hint: Option<&str>,
    ) -> Result<StructuredDescription, GatewayError> {
        let mut form = Form::new().part("image", png_part(image_png.to_vec(), "image.png".into())?);
        if let Some(hint) = hint {
            form = form.text("hint", hint.to_string());
        }

        let response = self
            .client
            .post(format!("{}/analyze", self.api_url))
            .multipart(form)
            .send()
            .await?;

        parse_response(response).await
    }
}

// ---- private helpers ----

/// Return the response unchanged on success, or the classified
/// [`GatewayError`] for its status, `Retry-After` header and body.
async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());

    let err = classify_response(status.as_u16(), retry_after.as_deref(), &body);
    tracing::error!(status = status.as_u16(), code = err.code(), error = %err, "Service call failed");
    Err(err)
}

/// Parse a successful JSON response body into the expected type.
async fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, GatewayError> {
    let response = ensure_success(response).await?;
    Ok(response.json::<T>().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_core::region::{normalize_rect, Point};

    #[test]
    fn manifest_names_raster_parts_and_mask() {
        let mut request = GenerationRequest::new(
            ArtifactRef::new("renders/root.png"),
            "oak floor",
            RenderKind::SelectiveEdit,
        );
        request.region = Some(Region::Rect(normalize_rect(
            Point::new(10.0, 10.0),
            Point::new(40.0, 60.0),
        )));
        request.references = vec![
            Reference::Artifact {
                role: ReferenceRole::Swatch,
                artifact_ref: ArtifactRef::new("swatches/oak.png"),
            },
            Reference::Raster {
                role: ReferenceRole::ZoneCrop,
                png: vec![1, 2, 3],
            },
        ];

        request.mask_png = Some(vec![0; 4]);

        let manifest = HttpGenerationGateway::manifest(&request);
        let json = serde_json::to_value(&manifest).unwrap();

        assert_eq!(json["kind"], "selective-edit");
        assert_eq!(json["region"]["type"], "rect");
        assert_eq!(json["mask_part"], "mask");
        assert_eq!(json["references"][0]["artifact_ref"], "swatches/oak.png");
        assert_eq!(json["references"][1]["part"], "reference_1");
        assert!(json["references"][1].get("artifact_ref").is_none());

        assert!(HttpGenerationGateway::build_form(&request).is_ok());
    }

    #[test]
    fn analysis_is_optional_in_config() {
        let config = GatewayConfig {
            generation_api_url: "http://localhost:8080".to_string(),
            analysis_api_url: None,
            timeout: Duration::from_secs(5),
        };
        assert!(HttpAnalysisGateway::from_config(&config).unwrap().is_none());
        assert!(HttpGenerationGateway::from_config(&config).is_ok());
    }
}
