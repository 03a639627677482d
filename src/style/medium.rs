use std::fmt;

use serde::{Deserialize, Serialize};

pub const CLASSIFICATION_PROMPT: &str = r#"Classify this image into ONE of these categories based on how it was made:

1. PHOTOGRAPHY - a real camera capture, film or digital
2. TRADITIONAL_ILLUSTRATION - drawn by hand with pen, ink, pencil, charcoal or markers
3. PAINTING - physical paint media such as oil, watercolor, acrylic, gouache or pastel
4. DIGITAL_ART - made on a computer or tablet: digital painting, vector art, concept art
5. 3D_RENDER - computer-generated 3D imagery (CGI, modeled and rendered scenes)
6. MIXED_MEDIA - a combination of techniques, collage or photo manipulation

Respond with ONLY the category name in capitals, for example "PHOTOGRAPHY". Nothing else."#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ImageMediumType {
    #[serde(rename = "PHOTOGRAPHY")]
    Photography,
    #[serde(rename = "TRADITIONAL_ILLUSTRATION")]
    TraditionalIllustration,
    #[serde(rename = "PAINTING")]
    Painting,
    #[serde(rename = "DIGITAL_ART")]
    DigitalArt,
    #[serde(rename = "3D_RENDER")]
    Render3d,
    #[serde(rename = "MIXED_MEDIA")]
    MixedMedia,
}

/// Used whenever the classifier answer cannot be mapped to a category.
pub const DEFAULT_MEDIUM: ImageMediumType = ImageMediumType::DigitalArt;

impl ImageMediumType {
    pub const ALL: [ImageMediumType; 6] = [
        ImageMediumType::Photography,
        ImageMediumType::TraditionalIllustration,
        ImageMediumType::Painting,
        ImageMediumType::DigitalArt,
        ImageMediumType::Render3d,
        ImageMediumType::MixedMedia,
    ];

    pub fn token(self) -> &'static str {
        match self {
            ImageMediumType::Photography => "PHOTOGRAPHY",
            ImageMediumType::TraditionalIllustration => "TRADITIONAL_ILLUSTRATION",
            ImageMediumType::Painting => "PAINTING",
            ImageMediumType::DigitalArt => "DIGITAL_ART",
            ImageMediumType::Render3d => "3D_RENDER",
            ImageMediumType::MixedMedia => "MIXED_MEDIA",
        }
    }

    /// Second-tier keywords, matched as word prefixes when no canonical token
    /// is present.
    fn keywords(self) -> &'static [&'static str] {
        match self {
            ImageMediumType::Photography => &["PHOTO"],
            ImageMediumType::TraditionalIllustration => {
                &["ILLUSTRATION", "DRAWING", "INK", "SKETCH", "PENCIL", "CHARCOAL"]
            }
            ImageMediumType::Painting => {
                &["PAINT", "WATERCOLOR", "WATERCOLOUR", "OIL", "ACRYLIC", "GOUACHE"]
            }
            ImageMediumType::DigitalArt => &["DIGITAL", "VECTOR"],
            ImageMediumType::Render3d => &["3D", "RENDER", "CGI"],
            ImageMediumType::MixedMedia => &["MIXED", "COLLAGE"],
        }
    }
}

impl fmt::Display for ImageMediumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

fn clean_classification(raw: &str) -> String {
    raw.to_uppercase()
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
        .collect()
}

fn answer_words(raw: &str) -> Vec<String> {
    raw.to_uppercase()
        .split(|ch: char| !ch.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

/// Maps a free-form classifier answer onto exactly one medium.
///
/// Canonical tokens are tried first (underscores ignored on both sides, so
/// "DIGITAL ART" and "DIGITAL_ART" both match), then per-category keywords,
/// then [`DEFAULT_MEDIUM`]. Never fails.
pub fn normalize_classification(raw: &str) -> ImageMediumType {
    let compact = clean_classification(raw).replace('_', "");

    for medium in ImageMediumType::ALL {
        if compact.contains(&medium.token().replace('_', "")) {
            return medium;
        }
    }

    let words = answer_words(raw);
    for medium in ImageMediumType::ALL {
        if medium
            .keywords()
            .iter()
            .any(|keyword| words.iter().any(|word| word.starts_with(keyword)))
        {
            return medium;
        }
    }

    DEFAULT_MEDIUM
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_sentence_with_partial_token() {
        assert_eq!(
            normalize_classification("I think this is a PHOTOGRAPH."),
            ImageMediumType::Photography
        );
    }

    #[test]
    fn falls_back_to_digital_art_for_unknown_answers() {
        assert_eq!(normalize_classification("uncertain"), ImageMediumType::DigitalArt);
        assert_eq!(normalize_classification(""), ImageMediumType::DigitalArt);
    }

    #[test]
    fn matches_every_canonical_token() {
        for medium in ImageMediumType::ALL {
            assert_eq!(normalize_classification(medium.token()), medium);
            assert_eq!(
                normalize_classification(&format!("\"{}\"\n", medium.token().to_lowercase())),
                medium
            );
        }
    }

    #[test]
    fn tolerates_spaces_instead_of_underscores() {
        assert_eq!(
            normalize_classification("Mixed Media"),
            ImageMediumType::MixedMedia
        );
        assert_eq!(
            normalize_classification("traditional illustration"),
            ImageMediumType::TraditionalIllustration
        );
    }

    #[test]
    fn uses_keyword_heuristics() {
        assert_eq!(normalize_classification("watercolour? oil?"), ImageMediumType::Painting);
        assert_eq!(normalize_classification("a CGI scene"), ImageMediumType::Render3d);
        assert_eq!(normalize_classification("3D"), ImageMediumType::Render3d);
        assert_eq!(normalize_classification("ink sketch"), ImageMediumType::TraditionalIllustration);
        assert_eq!(normalize_classification("collage"), ImageMediumType::MixedMedia);
        assert_eq!(normalize_classification("vector"), ImageMediumType::DigitalArt);
    }

    #[test]
    fn keywords_match_whole_words_only() {
        assert_eq!(
            normalize_classification("I think it's watercolor"),
            ImageMediumType::Painting
        );
        assert_eq!(normalize_classification("pink oil painting"), ImageMediumType::Painting);
        assert_eq!(normalize_classification("pink and oily"), ImageMediumType::Painting);
        assert_eq!(normalize_classification("spoiled, I think"), ImageMediumType::DigitalArt);
        assert_eq!(normalize_classification("inked lines"), ImageMediumType::TraditionalIllustration);
    }

    #[test]
    fn serializes_with_canonical_tokens() {
        let json = serde_json::to_string(&ImageMediumType::Render3d).unwrap();
        assert_eq!(json, "\"3D_RENDER\"");
        let parsed: ImageMediumType = serde_json::from_str("\"MIXED_MEDIA\"").unwrap();
        assert_eq!(parsed, ImageMediumType::MixedMedia);
    }
}
