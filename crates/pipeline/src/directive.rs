//! User edit intents.

use serde::{Deserialize, Serialize};

use atelier_core::error::CoreError;
use atelier_core::region::Region;
use atelier_core::types::{ArtifactRef, ZoneId};
use atelier_core::version_graph::RenderKind;
use atelier_gateway::Placement;

use crate::preset::ViewPreset;

/// What the user asked for, independent of how it is sent to the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Directive {
    /// Whole-image edit driven by text alone.
    Global { text: String },

    /// Masked edit of one region, optionally guided by a swatch.
    Selective {
        text: String,
        region: Region,
        #[serde(default)]
        reference: Option<ArtifactRef>,
    },

    /// Re-render of a saved zone with style and product references.
    ZoneView {
        #[serde(default)]
        text: String,
        zone_id: ZoneId,
        /// Run the analysis service on the zone crop first.
        #[serde(default)]
        analyze: bool,
        #[serde(default)]
        style_references: Vec<ArtifactRef>,
        #[serde(default)]
        product_references: Vec<ArtifactRef>,
    },

    /// Place catalog items into the render.
    Composite {
        #[serde(default)]
        text: String,
        placements: Vec<Placement>,
    },

    /// One grid image showing several camera views.
    MultiView {
        #[serde(default)]
        text: String,
        preset: ViewPreset,
        #[serde(default)]
        focus: Option<Region>,
    },
}

impl Directive {
    pub fn global(text: impl Into<String>) -> Self {
        Directive::Global { text: text.into() }
    }

    /// Kind of render node this directive produces.
    pub fn kind(&self) -> RenderKind {
        match self {
            Directive::Global { .. } => RenderKind::GlobalEdit,
            Directive::Selective { .. } => RenderKind::SelectiveEdit,
            Directive::ZoneView { .. } => RenderKind::ZoneView,
            Directive::Composite { .. } => RenderKind::Composite,
            Directive::MultiView { .. } => RenderKind::MulticamGrid,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Directive::Global { text }
            | Directive::Selective { text, .. }
            | Directive::ZoneView { text, .. }
            | Directive::Composite { text, .. }
            | Directive::MultiView { text, .. } => text,
        }
    }

    /// Check everything that can be checked without I/O.
    pub fn validate(&self, max_style_references: usize) -> Result<(), CoreError> {
        match self {
            Directive::Global { text } => require_text(text),
            Directive::Selective { text, region, .. } => {
                require_text(text)?;
                region.ensure_usable()
            }
            Directive::ZoneView {
                style_references, ..
            } => {
                if style_references.len() > max_style_references {
                    return Err(CoreError::Validation(format!(
                        "At most {max_style_references} style references are allowed, got {}",
                        style_references.len()
                    )));
                }
                Ok(())
            }
            Directive::Composite { placements, .. } => {
                if placements.is_empty() {
                    return Err(CoreError::Validation(
                        "Composite needs at least one placement".to_string(),
                    ));
                }
                for placement in placements {
                    if !placement.position.is_in_range() {
                        return Err(CoreError::Validation(format!(
                            "Placement of {} is outside the image",
                            placement.artifact_ref
                        )));
                    }
                    if !(placement.scale.is_finite() && placement.scale > 0.0) {
                        return Err(CoreError::Validation(format!(
                            "Placement scale must be positive, got {}",
                            placement.scale
                        )));
                    }
                }
                Ok(())
            }
            Directive::MultiView { focus, .. } => match focus {
                Some(region) => region.ensure_usable(),
                None => Ok(()),
            },
        }
    }
}

fn require_text(text: &str) -> Result<(), CoreError> {
    if text.trim().is_empty() {
        return Err(CoreError::Validation(
            "Directive text must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use atelier_core::region::{normalize_rect, Point};

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Region {
        Region::Rect(normalize_rect(Point::new(x0, y0), Point::new(x1, y1)))
    }

    #[test]
    fn kinds_match_shapes() {
        assert_eq!(Directive::global("x").kind(), RenderKind::GlobalEdit);
        let multi = Directive::MultiView {
            text: String::new(),
            preset: ViewPreset::builtin("orbit-4").unwrap(),
            focus: None,
        };
        assert_eq!(multi.kind(), RenderKind::MulticamGrid);
    }

    #[test]
    fn global_needs_text() {
        assert_matches!(
            Directive::global("   ").validate(3),
            Err(CoreError::Validation(_))
        );
        assert!(Directive::global("warmer light").validate(3).is_ok());
    }

    #[test]
    fn selective_rejects_degenerate_region() {
        let directive = Directive::Selective {
            text: "marble".to_string(),
            region: rect(10.0, 10.0, 11.0, 50.0),
            reference: None,
        };
        assert_matches!(directive.validate(3), Err(CoreError::InvalidRegion(_)));
    }

    #[test]
    fn zone_view_caps_style_references() {
        let refs = |n: usize| (0..n).map(|i| ArtifactRef::new(format!("style/{i}.png"))).collect();
        let directive = |n| Directive::ZoneView {
            text: String::new(),
            zone_id: uuid::Uuid::now_v7(),
            analyze: false,
            style_references: refs(n),
            product_references: Vec::new(),
        };
        assert!(directive(3).validate(3).is_ok());
        assert_matches!(directive(4).validate(3), Err(CoreError::Validation(_)));
    }

    #[test]
    fn composite_placements_are_checked() {
        let placement = |scale: f64| Placement {
            artifact_ref: ArtifactRef::new("catalog/sofa.png"),
            position: Point::new(40.0, 60.0),
            scale,
        };
        let ok = Directive::Composite {
            text: String::new(),
            placements: vec![placement(1.0)],
        };
        assert!(ok.validate(3).is_ok());

        let zero = Directive::Composite {
            text: String::new(),
            placements: vec![placement(0.0)],
        };
        assert_matches!(zero.validate(3), Err(CoreError::Validation(_)));

        let empty = Directive::Composite {
            text: String::new(),
            placements: vec![],
        };
        assert_matches!(empty.validate(3), Err(CoreError::Validation(_)));
    }

    #[test]
    fn deserializes_tagged_json() {
        let json = r#"{
            "type": "selective",
            "text": "terracotta tiles",
            "region": {"type": "rect", "x_start": 10, "y_start": 20, "x_end": 40, "y_end": 60}
        }"#;
        let directive: Directive = serde_json::from_str(json).unwrap();
        assert_eq!(directive.kind(), RenderKind::SelectiveEdit);
        assert_eq!(directive.text(), "terracotta tiles");

        let multi: Directive =
            serde_json::from_str(r#"{"type": "multi_view", "preset": "corners-4"}"#).unwrap();
        assert_matches!(multi, Directive::MultiView { ref preset, .. } if preset.name() == "corners-4");
    }
}
