//! Style presets and the read-only catalog that resolves them.
//!
//! The catalog is built once at start-up and shared immutably, so a preset a
//! conversion referenced can always be resolved again later.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ArtesiaError, Result};
use crate::StyleId;

/// A named, predefined transformation prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StylePreset {
    /// Style identifier.
    pub id: StyleId,

    /// Display name.
    pub name: String,

    /// Short marketing description.
    #[serde(default)]
    pub description: String,

    /// Prompt passed verbatim to the transformation service.
    pub prompt: String,

    /// Category label used for grouping.
    pub category: String,

    /// Preview image URL.
    #[serde(default)]
    pub preview_url: Option<String>,

    /// Whether the preset is offered to users.
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Immutable lookup table of style presets.
#[derive(Debug, Clone, Default)]
pub struct StyleCatalog {
    presets: BTreeMap<StyleId, StylePreset>,
}

impl StyleCatalog {
    /// Build a catalog from a list of presets.
    ///
    /// # Errors
    ///
    /// Returns `ArtesiaError::DuplicateStyle` if two presets share an ID.
    pub fn new(presets: impl IntoIterator<Item = StylePreset>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for preset in presets {
            let id = preset.id.clone();
            if map.insert(id.clone(), preset).is_some() {
                return Err(ArtesiaError::DuplicateStyle { style_id: id });
            }
        }
        Ok(Self { presets: map })
    }

    /// Load a catalog from a JSON array of presets.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or contains
    /// duplicate IDs.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let presets: Vec<StylePreset> = serde_json::from_str(&contents)?;
        Self::new(presets)
    }

    /// The presets shipped with the application.
    ///
    /// # Errors
    ///
    /// Returns an error if a shipped preset has an invalid or repeated ID.
    pub fn builtin() -> Result<Self> {
        let presets = BUILTIN_PRESETS
            .iter()
            .map(|(id, name, description, prompt, category)| -> Result<StylePreset> {
                Ok(StylePreset {
                    id: StyleId::new(*id)?,
                    name: (*name).to_string(),
                    description: (*description).to_string(),
                    prompt: (*prompt).to_string(),
                    category: (*category).to_string(),
                    preview_url: None,
                    is_active: true,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(presets)
    }

    /// Resolve a style identifier, active or not.
    ///
    /// # Errors
    ///
    /// Returns `ArtesiaError::StyleNotFound` if the ID is unknown.
    pub fn resolve(&self, style_id: &StyleId) -> Result<&StylePreset> {
        self.presets
            .get(style_id)
            .ok_or_else(|| ArtesiaError::StyleNotFound {
                style_id: style_id.clone(),
            })
    }

    /// Active presets ordered by category, then name.
    #[must_use]
    pub fn list(&self) -> Vec<&StylePreset> {
        let mut active: Vec<_> = self.presets.values().filter(|p| p.is_active).collect();
        active.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.name.cmp(&b.name)));
        active
    }

    /// Distinct categories of active presets, sorted.
    #[must_use]
    pub fn categories(&self) -> Vec<&str> {
        let mut categories: Vec<_> = self
            .presets
            .values()
            .filter(|p| p.is_active)
            .map(|p| p.category.as_str())
            .collect();
        categories.sort_unstable();
        categories.dedup();
        categories
    }

    /// Number of presets, active or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.presets.len()
    }

    /// Check if the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}

/// `(id, name, description, prompt, category)`
const BUILTIN_PRESETS: &[(&str, &str, &str, &str, &str)] = &[
    (
        "oil-painting",
        "Oil Painting",
        "Transform your photo into a classic oil painting with rich textures and vibrant colors",
        "Transform this image into a beautiful oil painting style with rich textures, vibrant colors, and visible brush strokes. Maintain the composition and subjects while giving it an artistic, painted appearance with depth and warmth.",
        "Artistic",
    ),
    (
        "watercolor",
        "Watercolor",
        "Create a soft, dreamy watercolor painting effect",
        "Convert this image into a delicate watercolor painting with soft, flowing colors, gentle gradients, and the characteristic texture of watercolor on paper. Keep the essence of the original while adding artistic fluidity.",
        "Artistic",
    ),
    (
        "anime",
        "Anime Style",
        "Turn your photo into anime/manga artwork",
        "Transform this image into anime/manga style artwork with clean lines, vibrant colors, large expressive eyes, and the characteristic aesthetic of Japanese animation. Maintain the subject's features while stylizing them.",
        "Animation",
    ),
    (
        "vintage-film",
        "Vintage Film",
        "Give your photo a nostalgic vintage film look",
        "Apply a vintage film aesthetic to this image with warm tones, slight grain, muted colors, and the nostalgic feel of old photographs from the 1970s-80s. Add subtle vignetting and film-like characteristics.",
        "Vintage",
    ),
    (
        "cyberpunk",
        "Cyberpunk",
        "Create a futuristic cyberpunk aesthetic",
        "Transform this image into a cyberpunk aesthetic with neon colors, futuristic elements, dark atmospheric lighting, and high-tech urban vibes. Add glowing neon highlights and a dystopian future atmosphere.",
        "Futuristic",
    ),
    (
        "pop-art",
        "Pop Art",
        "Create bold pop art with vibrant colors and comic book style",
        "Convert this image into pop art style with bold, vibrant colors, high contrast, and comic book aesthetics. Use bright, saturated colors and clean, graphic elements reminiscent of Andy Warhol's work.",
        "Modern",
    ),
    (
        "pencil-sketch",
        "Pencil Sketch",
        "Transform into a detailed pencil drawing",
        "Convert this image into a detailed pencil sketch with realistic shading, cross-hatching, and the texture of graphite on paper. Maintain fine details while giving it the appearance of hand-drawn artwork.",
        "Sketch",
    ),
    (
        "fantasy-art",
        "Fantasy Art",
        "Create magical fantasy artwork",
        "Transform this image into fantasy art with magical elements, ethereal lighting, mystical atmosphere, and enchanted aesthetics. Add fantasy-like qualities while maintaining the original composition.",
        "Fantasy",
    ),
];
