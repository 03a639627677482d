use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::style::medium::ImageMediumType;

pub const BUILTIN_CATALOG_VERSION: u32 = 3;
pub const DEFAULT_FALLBACK_TEXT: &str = "Style extraction incomplete. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlatformKey(String);

impl PlatformKey {
    pub fn new(value: impl Into<String>) -> Self {
        PlatformKey(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlatformKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordBand {
    pub min: u32,
    pub max: u32,
    #[serde(default)]
    pub approximate: bool,
}

impl fmt::Display for WordBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = if self.approximate { "~" } else { "" };
        write!(f, "{}{}-{} words", prefix, self.min, self.max)
    }
}

/// Fixed Replicate model and input parameters for one generation backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationPreset {
    pub model: String,
    #[serde(default)]
    pub input: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformSpec {
    pub key: PlatformKey,
    /// Canonical label the model is told to emit, e.g. `FLUX:`.
    pub label: String,
    /// Additional spellings accepted when reading the response back.
    #[serde(default)]
    pub variants: Vec<String>,
    pub word_band: WordBand,
    pub default_hint: String,
    #[serde(default)]
    pub medium_hints: HashMap<ImageMediumType, String>,
    #[serde(default)]
    pub generation: Option<GenerationPreset>,
}

impl PlatformSpec {
    /// Canonical label followed by its variants, without duplicates or blanks.
    pub fn accepted_labels(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        std::iter::once(self.label.as_str())
            .chain(self.variants.iter().map(|variant| variant.as_str()))
            .filter(|label| !label.trim().is_empty())
            .filter(|label| seen.insert(*label))
            .collect()
    }

    pub fn hint_for(&self, medium: Option<ImageMediumType>) -> &str {
        medium
            .and_then(|medium| self.medium_hints.get(&medium))
            .map(|hint| hint.as_str())
            .unwrap_or(&self.default_hint)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformCatalog {
    pub version: u32,
    #[serde(default = "default_fallback_text")]
    pub fallback_text: String,
    pub platforms: Vec<PlatformSpec>,
}

fn default_fallback_text() -> String {
    DEFAULT_FALLBACK_TEXT.to_string()
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog has no platforms")]
    Empty,
    #[error("platform key '{0}' is declared more than once")]
    DuplicateKey(String),
    #[error("platform key is empty")]
    EmptyKey,
    #[error("platform '{0}' has an empty label")]
    EmptyLabel(String),
    #[error("label '{label}' is shared by '{first}' and '{second}'")]
    SharedLabel {
        label: String,
        first: String,
        second: String,
    },
}

impl PlatformCatalog {
    pub fn len(&self) -> usize {
        self.platforms.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &PlatformKey> {
        self.platforms.iter().map(|platform| &platform.key)
    }

    pub fn get(&self, key: &str) -> Option<&PlatformSpec> {
        self.platforms
            .iter()
            .find(|platform| platform.key.as_str() == key)
    }

    pub fn generation_platforms(&self) -> impl Iterator<Item = &PlatformSpec> {
        self.platforms
            .iter()
            .filter(|platform| platform.generation.is_some())
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.platforms.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut keys = HashSet::new();
        let mut label_owners: HashMap<&str, &str> = HashMap::new();
        for platform in &self.platforms {
            let key = platform.key.as_str();
            if key.trim().is_empty() {
                return Err(CatalogError::EmptyKey);
            }
            if !keys.insert(key) {
                return Err(CatalogError::DuplicateKey(key.to_string()));
            }
            if platform.label.trim().is_empty() {
                return Err(CatalogError::EmptyLabel(key.to_string()));
            }
            for label in platform.accepted_labels() {
                if let Some(owner) = label_owners.insert(label, key) {
                    return Err(CatalogError::SharedLabel {
                        label: label.to_string(),
                        first: owner.to_string(),
                        second: key.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Reads an override catalog, falling back to [`builtin_catalog`] when the
    /// file is missing, unreadable or invalid.
    pub fn load_or_builtin(path: &Path) -> Self {
        if !path.exists() {
            info!(
                "Platform catalog not found at {}; using built-in v{}",
                path.display(),
                BUILTIN_CATALOG_VERSION
            );
            return builtin_catalog();
        }

        let raw = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                warn!(
                    "Failed to read platform catalog at {}: {}",
                    path.display(),
                    err
                );
                return builtin_catalog();
            }
        };

        let parsed: PlatformCatalog = match serde_json::from_str(&raw) {
            Ok(catalog) => catalog,
            Err(err) => {
                warn!(
                    "Failed to parse platform catalog at {}: {}",
                    path.display(),
                    err
                );
                return builtin_catalog();
            }
        };

        if let Err(err) = parsed.validate() {
            warn!(
                "Rejected platform catalog at {}: {}",
                path.display(),
                err
            );
            return builtin_catalog();
        }

        info!(
            "Loaded platform catalog v{} with {} platform(s) from {}",
            parsed.version,
            parsed.len(),
            path.display()
        );
        parsed
    }
}

fn hints(entries: [(ImageMediumType, &str); 6]) -> HashMap<ImageMediumType, String> {
    entries
        .into_iter()
        .map(|(medium, hint)| (medium, hint.to_string()))
        .collect()
}

fn preset(model: &str, input: Value) -> Option<GenerationPreset> {
    let input = match input {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    Some(GenerationPreset {
        model: model.to_string(),
        input,
    })
}

fn labels(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

pub fn builtin_catalog() -> PlatformCatalog {
    use ImageMediumType::*;

    PlatformCatalog {
        version: BUILTIN_CATALOG_VERSION,
        fallback_text: DEFAULT_FALLBACK_TEXT.to_string(),
        platforms: vec![
            PlatformSpec {
                key: PlatformKey::new("gpt_image"),
                label: "GPT_IMAGE:".to_string(),
                variants: labels(&["**GPT_IMAGE:**", "GPT Image:", "GPT_IMAGE :", "GPT IMAGE:"]),
                word_band: WordBand { min: 60, max: 80, approximate: true },
                default_hint: "structured paragraph: lighting and atmosphere, then medium and technique, then color and finish".to_string(),
                medium_hints: hints([
                    (Photography, "structured paragraph: lighting and atmosphere, then camera and lens feel, then film or processing look"),
                    (TraditionalIllustration, "structured paragraph: line quality, then tool and medium feel, then hatching and shading technique"),
                    (Painting, "structured paragraph: paint medium and technique, then brushwork, then color approach"),
                    (DigitalArt, "structured paragraph: digital style category, then rendering technique, then effects and color"),
                    (Render3d, "structured paragraph: render style, then materials and lighting, then camera and post effects"),
                    (MixedMedia, "structured paragraph: primary medium, then secondary elements, then how they are combined"),
                ]),
                generation: None,
            },
            PlatformSpec {
                key: PlatformKey::new("flux"),
                label: "FLUX:".to_string(),
                variants: labels(&["**FLUX:**", "Flux:"]),
                word_band: WordBand { min: 30, max: 80, approximate: false },
                default_hint: "subject-first format: a subject placeholder followed by style and technique descriptors".to_string(),
                medium_hints: hints([
                    (Photography, "subject-first format: photographic style plus technical feel"),
                    (TraditionalIllustration, "illustration style plus technique descriptors"),
                    (Painting, "painting style plus medium and technique descriptors"),
                    (DigitalArt, "digital art style plus rendering approach"),
                    (Render3d, "3D style plus rendering approach and lighting"),
                    (MixedMedia, "mixed media style plus its component techniques"),
                ]),
                generation: preset(
                    "black-forest-labs/flux-2-pro",
                    json!({
                        "resolution": "1 MP",
                        "aspect_ratio": "1:1",
                        "output_format": "webp",
                        "output_quality": 80,
                        "safety_tolerance": 2
                    }),
                ),
            },
            PlatformSpec {
                key: PlatformKey::new("nano_banana"),
                label: "NANO_BANANA:".to_string(),
                variants: labels(&["**NANO_BANANA:**", "Nano Banana:", "NANO BANANA:"]),
                word_band: WordBand { min: 80, max: 100, approximate: true },
                default_hint: "camera-first: shot type and framing, then composition, then lighting and color palette".to_string(),
                medium_hints: hints([
                    (Photography, "camera-first: shot type, focal length feel and depth of field, then composition, then lighting and palette from the film or processing"),
                    (TraditionalIllustration, "composition framing, then line work style, then shading technique, then medium feel"),
                    (Painting, "composition, then painting medium feel, then brush technique, then color palette"),
                    (DigitalArt, "composition, then digital rendering style, then color and lighting approach"),
                    (Render3d, "camera and composition, then render style, then lighting setup, then material feel"),
                    (MixedMedia, "composition, then dominant technique, then secondary elements, then integration style"),
                ]),
                generation: preset(
                    "google/nano-banana-pro",
                    json!({
                        "aspect_ratio": "4:3",
                        "output_format": "png"
                    }),
                ),
            },
            PlatformSpec {
                key: PlatformKey::new("seedream"),
                label: "SEEDREAM:".to_string(),
                variants: labels(&["**SEEDREAM:**", "Seedream:", "SEEDREAM :"]),
                word_band: WordBand { min: 30, max: 100, approximate: false },
                default_hint: "priority-ordered: the most distinctive style elements first".to_string(),
                medium_hints: hints([
                    (Photography, "priority-ordered: the most distinctive photographic elements first"),
                    (TraditionalIllustration, "priority-ordered: line quality, hatching style, tool feel"),
                    (Painting, "priority-ordered: medium, technique, color approach"),
                    (DigitalArt, "priority-ordered: style category, rendering technique, distinctive digital elements"),
                    (Render3d, "priority-ordered: render style, lighting, materials, post-processing"),
                    (MixedMedia, "priority-ordered: dominant medium, combination approach, distinctive mixed elements"),
                ]),
                generation: preset(
                    "bytedance/seedream-4.5",
                    json!({
                        "size": "2K",
                        "aspect_ratio": "1:1",
                        "max_images": 1,
                        "sequential_image_generation": "disabled"
                    }),
                ),
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_is_valid() {
        let catalog = builtin_catalog();
        assert_eq!(catalog.validate(), Ok(()));
        let keys: Vec<&str> = catalog.keys().map(|key| key.as_str()).collect();
        assert_eq!(keys, vec!["gpt_image", "flux", "nano_banana", "seedream"]);
    }

    #[test]
    fn generation_backends_exclude_gpt_image() {
        let catalog = builtin_catalog();
        let keys: Vec<&str> = catalog
            .generation_platforms()
            .map(|platform| platform.key.as_str())
            .collect();
        assert_eq!(keys, vec!["flux", "nano_banana", "seedream"]);
    }

    #[test]
    fn every_builtin_platform_has_a_hint_per_medium() {
        let catalog = builtin_catalog();
        for platform in &catalog.platforms {
            for medium in ImageMediumType::ALL {
                assert!(platform.medium_hints.contains_key(&medium), "{} {}", platform.key, medium);
            }
        }
    }

    #[test]
    fn accepted_labels_start_with_canonical_label() {
        let catalog = builtin_catalog();
        let flux = catalog.get("flux").unwrap();
        assert_eq!(flux.accepted_labels(), vec!["FLUX:", "**FLUX:**", "Flux:"]);
    }

    #[test]
    fn rejects_duplicate_keys_and_shared_labels() {
        let mut catalog = builtin_catalog();
        catalog.platforms[1].key = PlatformKey::new("gpt_image");
        assert_eq!(
            catalog.validate(),
            Err(CatalogError::DuplicateKey("gpt_image".to_string()))
        );

        let mut catalog = builtin_catalog();
        catalog.platforms[3].variants.push("Flux:".to_string());
        assert!(matches!(
            catalog.validate(),
            Err(CatalogError::SharedLabel { .. })
        ));
    }

    #[test]
    fn word_band_renders_with_optional_tilde() {
        let approx = WordBand { min: 60, max: 80, approximate: true };
        let exact = WordBand { min: 30, max: 80, approximate: false };
        assert_eq!(approx.to_string(), "~60-80 words");
        assert_eq!(exact.to_string(), "30-80 words");
    }

    #[test]
    fn parses_minimal_override_file() {
        let raw = r#"{
            "version": 4,
            "platforms": [
                {
                    "key": "midjourney",
                    "label": "MIDJOURNEY:",
                    "word_band": { "min": 20, "max": 60 },
                    "default_hint": "comma-separated descriptors"
                }
            ]
        }"#;
        let catalog: PlatformCatalog = serde_json::from_str(raw).unwrap();
        assert_eq!(catalog.validate(), Ok(()));
        assert_eq!(catalog.fallback_text, DEFAULT_FALLBACK_TEXT);
        let platform = catalog.get("midjourney").unwrap();
        assert_eq!(platform.hint_for(Some(ImageMediumType::Painting)), "comma-separated descriptors");
        assert!(platform.generation.is_none());
    }

    #[test]
    fn missing_override_file_uses_builtin() {
        let catalog = PlatformCatalog::load_or_builtin(Path::new("/nonexistent/platform_catalog.json"));
        assert_eq!(catalog.version, BUILTIN_CATALOG_VERSION);
        assert_eq!(catalog.len(), 4);
    }
}
