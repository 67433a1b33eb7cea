//! Multi-view presets: ordered lists of camera view labels rendered together
//! into one grid image.

use serde::{Deserialize, Serialize};

use atelier_core::error::CoreError;

/// Maximum number of views in one grid.
pub const MAX_PRESET_VIEWS: usize = 9;

const BUILTIN_PRESETS: &[(&str, &[&str])] = &[
    (
        "orbit-4",
        &["front view", "left side view", "back view", "right side view"],
    ),
    (
        "corners-4",
        &[
            "view from the north-east corner",
            "view from the south-east corner",
            "view from the south-west corner",
            "view from the north-west corner",
        ],
    ),
    (
        "detail-6",
        &[
            "wide establishing shot",
            "eye-level view",
            "top-down view",
            "low angle view",
            "close-up detail",
            "over-the-shoulder view",
        ],
    ),
];

/// A named, ordered list of view labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PresetRecord", into = "PresetRecord")]
pub struct ViewPreset {
    name: String,
    views: Vec<String>,
}

/// Wire shape: either a built-in preset name or an explicit custom preset.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum PresetRecord {
    Named(String),
    Custom { name: String, views: Vec<String> },
}

impl TryFrom<PresetRecord> for ViewPreset {
    type Error = CoreError;

    fn try_from(record: PresetRecord) -> Result<Self, Self::Error> {
        match record {
            PresetRecord::Named(name) => ViewPreset::builtin(&name).ok_or_else(|| {
                CoreError::Validation(format!("Unknown view preset '{name}'"))
            }),
            PresetRecord::Custom { name, views } => ViewPreset::custom(name, views),
        }
    }
}

impl From<ViewPreset> for PresetRecord {
    fn from(preset: ViewPreset) -> Self {
        if ViewPreset::builtin(&preset.name).as_ref() == Some(&preset) {
            PresetRecord::Named(preset.name)
        } else {
            PresetRecord::Custom {
                name: preset.name,
                views: preset.views,
            }
        }
    }
}

impl ViewPreset {
    pub fn builtin(name: &str) -> Option<Self> {
        BUILTIN_PRESETS
            .iter()
            .find(|(preset, _)| *preset == name)
            .map(|(preset, views)| Self {
                name: (*preset).to_string(),
                views: views.iter().map(|v| (*v).to_string()).collect(),
            })
    }

    pub fn builtin_names() -> impl Iterator<Item = &'static str> {
        BUILTIN_PRESETS.iter().map(|(name, _)| *name)
    }

    /// Build a custom preset. Requires 1..=[`MAX_PRESET_VIEWS`] non-empty,
    /// unique labels.
    pub fn custom(name: impl Into<String>, views: Vec<String>) -> Result<Self, CoreError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CoreError::Validation(
                "View preset name must not be empty".to_string(),
            ));
        }
        if views.is_empty() || views.len() > MAX_PRESET_VIEWS {
            return Err(CoreError::Validation(format!(
                "View preset must have between 1 and {MAX_PRESET_VIEWS} views, got {}",
                views.len()
            )));
        }
        let views: Vec<String> = views.into_iter().map(|v| v.trim().to_string()).collect();
        if views.iter().any(String::is_empty) {
            return Err(CoreError::Validation(
                "View labels must not be empty".to_string(),
            ));
        }
        for (i, view) in views.iter().enumerate() {
            if views[..i].contains(view) {
                return Err(CoreError::Validation(format!(
                    "Duplicate view label '{view}'"
                )));
            }
        }
        Ok(Self { name, views })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn views(&self) -> &[String] {
        &self.views
    }
}
