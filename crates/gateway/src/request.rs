//! Request and response types exchanged with the generation and analysis
//! services.

use serde::{Deserialize, Serialize};

use atelier_core::region::{Point, Region};
use atelier_core::types::ArtifactRef;
use atelier_core::version_graph::RenderKind;

/// What a reference image is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceRole {
    /// Material or colour sample for a selective edit.
    Swatch,
    /// Crop of the zone being re-rendered.
    ZoneCrop,
    /// Mood or style example.
    Style,
    /// Catalog product that should appear in the render.
    Product,
}

/// A reference image attached to a request, either by address or inline.
#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    Artifact {
        role: ReferenceRole,
        artifact_ref: ArtifactRef,
    },
    /// PNG bytes produced locally, e.g. a zone crop.
    Raster { role: ReferenceRole, png: Vec<u8> },
}

impl Reference {
    pub fn role(&self) -> ReferenceRole {
        match self {
            Reference::Artifact { role, .. } | Reference::Raster { role, .. } => *role,
        }
    }
}

/// Where to place a reference item in a composite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub artifact_ref: ArtifactRef,
    /// Anchor position in percentage-of-image coordinates.
    pub position: Point,
    /// Size relative to the item's natural size.
    pub scale: f64,
}

/// One call's worth of input to the generation service.
///
/// Built by the edit pipeline and never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub source_artifact_ref: ArtifactRef,
    pub directive: String,
    pub kind: RenderKind,
    pub region: Option<Region>,
    /// PNG mask at the source's natural size: opaque inside the region.
    pub mask_png: Option<Vec<u8>>,
    pub references: Vec<Reference>,
    pub placements: Vec<Placement>,
    /// Ordered view labels for multi-view grids.
    pub views: Vec<String>,
}

impl GenerationRequest {
    pub fn new(
        source_artifact_ref: ArtifactRef,
        directive: impl Into<String>,
        kind: RenderKind,
    ) -> Self {
        Self {
            source_artifact_ref,
            directive: directive.into(),
            kind,
            region: None,
            mask_png: None,
            references: Vec::new(),
            placements: Vec::new(),
            views: Vec::new(),
        }
    }
}

/// Successful generation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    pub artifact_ref: ArtifactRef,
}

/// An item the analysis service recognised in an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedItem {
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Structured output of the analysis service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredDescription {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub items: Vec<DetectedItem>,
}

impl StructuredDescription {
    /// Render the description as text to append to a directive. `None` when
    /// the analysis found nothing.
    pub fn to_prompt_fragment(&self) -> Option<String> {
        let summary = self.summary.trim();
        let items: Vec<String> = self
            .items
            .iter()
            .map(|item| match item.description.as_deref().map(str::trim) {
                Some(desc) if !desc.is_empty() => format!("{} ({desc})", item.label),
                _ => item.label.clone(),
            })
            .collect();

        match (summary.is_empty(), items.is_empty()) {
            (true, true) => None,
            (false, true) => Some(format!("Scene: {summary}")),
            (true, false) => Some(format!("Contains: {}", items.join(", "))),
            (false, false) => Some(format!("Scene: {summary}. Contains: {}", items.join(", "))),
        }
    }
}
