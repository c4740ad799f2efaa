//! Style presets and the single-choice style selection.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_DENOISING_STRENGTH, DEFAULT_STYLE_ID};

/// Opaque style identifier. Ids outside the known catalog pass through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StyleId(String);

impl StyleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for StyleId {
    fn default() -> Self {
        Self::new(DEFAULT_STYLE_ID)
    }
}

impl fmt::Display for StyleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StyleId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Display metadata for one preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StylePreset {
    pub name: String,
    #[serde(default)]
    pub name_en: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Strength the backend applies when the client sends none.
    #[serde(default)]
    pub recommended_denoise: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleCatalog {
    pub styles: BTreeMap<StyleId, StylePreset>,
    #[serde(default = "default_recommended_strength")]
    pub recommended_strength: f64,
}

fn default_recommended_strength() -> f64 {
    DEFAULT_DENOISING_STRENGTH
}

impl StyleCatalog {
    /// Presets the stylization backend ships with.
    pub fn builtin() -> Self {
        let presets = [
            ("sd_character", "Character", "Stable Diffusion character portrait", None),
            ("real_bubblehead", "Real (Bubble Head)", "Photorealistic big-head character", Some(0.10)),
            ("semi_realistic", "Semi-Realistic (3D)", "3D animation style", Some(0.20)),
            ("character", "Storybook", "Fairy-tale character style", Some(0.30)),
        ];
        let styles = presets
            .into_iter()
            .map(|(id, name, description, denoise)| {
                (
                    StyleId::new(id),
                    StylePreset {
                        name: name.to_string(),
                        name_en: Some(name.to_string()),
                        description: Some(description.to_string()),
                        recommended_denoise: denoise,
                    },
                )
            })
            .collect();
        Self {
            styles,
            recommended_strength: DEFAULT_DENOISING_STRENGTH,
        }
    }

    pub fn contains(&self, id: &StyleId) -> bool {
        self.styles.contains_key(id)
    }

    pub fn get(&self, id: &StyleId) -> Option<&StylePreset> {
        self.styles.get(id)
    }

    /// Human-readable name, falling back to the raw id for unknown styles.
    pub fn display_name(&self, id: &StyleId) -> String {
        self.get(id)
            .map(|preset| preset.name.clone())
            .unwrap_or_else(|| id.to_string())
    }
}

impl Default for StyleCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Tracks the single active style. Always holds a value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleSelector {
    selected: StyleId,
}

impl StyleSelector {
    pub fn with_default(id: StyleId) -> Self {
        Self { selected: id }
    }

    /// Replace the selection. No catalog check is made.
    pub fn select(&mut self, id: StyleId) {
        self.selected = id;
    }

    pub fn selected(&self) -> &StyleId {
        &self.selected
    }
}
