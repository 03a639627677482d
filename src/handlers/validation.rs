use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use url::Url;

use crate::config::Config;
use crate::llm::ApiKey;
use crate::utils::text::truncate_chars;

static HTML_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static ANGLE_BRACKET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[<>]").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid request body")]
    InvalidBody,
    #[error("Replicate API key is required")]
    MissingApiKey,
    #[error("Invalid API key format")]
    InvalidApiKeyFormat,
    #[error("At least one image URL is required")]
    NoImages,
    #[error("Maximum {0} images allowed")]
    TooManyImages(usize),
    #[error("All image URLs must be strings")]
    NonStringUrl,
    #[error("Invalid URL format")]
    InvalidUrl,
    #[error("Images must be uploaded through this application")]
    DisallowedOrigin,
    #[error("Prompt is required")]
    MissingPrompt,
    #[error("Invalid platform. Supported: {0}")]
    UnsupportedPlatform(String),
    #[error("At least one prompt is required")]
    NoPrompts,
    #[error("No file provided")]
    MissingFile,
    #[error("File must be an image")]
    NotAnImage,
    #[error("File must be JPG, PNG, or WebP")]
    UnsupportedImageType,
    #[error("File must be smaller than {0}MB")]
    FileTooLarge(usize),
}

/// Request checks that run before any provider call.
#[derive(Debug, Clone)]
pub struct RequestValidator {
    api_key_prefix: String,
    api_key_min_length: usize,
    max_images: usize,
    max_guidance_chars: usize,
    allowed_url_patterns: Vec<Regex>,
}

impl RequestValidator {
    pub fn new(
        api_key_prefix: &str,
        api_key_min_length: usize,
        max_images: usize,
        max_guidance_chars: usize,
        allowed_url_patterns: Vec<Regex>,
    ) -> Self {
        RequestValidator {
            api_key_prefix: api_key_prefix.to_string(),
            api_key_min_length,
            max_images,
            max_guidance_chars,
            allowed_url_patterns,
        }
    }

    /// Patterns were already checked by `Config::load`; any that fail here are skipped.
    pub fn from_config(config: &Config) -> Self {
        let patterns = config
            .allowed_image_url_patterns
            .iter()
            .filter_map(|pattern| Regex::new(pattern).ok())
            .collect();
        RequestValidator::new(
            &config.api_key_prefix,
            config.api_key_min_length,
            config.max_images,
            config.max_guidance_chars,
            patterns,
        )
    }

    pub fn api_key(&self, body: &Value) -> Result<ApiKey, ValidationError> {
        let key = body
            .get("apiKey")
            .and_then(|value| value.as_str())
            .filter(|value| !value.is_empty())
            .ok_or(ValidationError::MissingApiKey)?;
        if !key.starts_with(&self.api_key_prefix) || key.chars().count() < self.api_key_min_length
        {
            return Err(ValidationError::InvalidApiKeyFormat);
        }
        Ok(ApiKey::new(key))
    }

    pub fn image_urls(&self, body: &Value) -> Result<Vec<String>, ValidationError> {
        let entries = body
            .get("imageUrls")
            .and_then(|value| value.as_array())
            .filter(|entries| !entries.is_empty())
            .ok_or(ValidationError::NoImages)?;
        if entries.len() > self.max_images {
            return Err(ValidationError::TooManyImages(self.max_images));
        }

        let mut urls = Vec::with_capacity(entries.len());
        for entry in entries {
            let url = entry.as_str().ok_or(ValidationError::NonStringUrl)?;
            Url::parse(url).map_err(|_| ValidationError::InvalidUrl)?;
            if !self.is_allowed_url(url) {
                return Err(ValidationError::DisallowedOrigin);
            }
            urls.push(url.to_string());
        }
        Ok(urls)
    }

    pub fn is_allowed_url(&self, url: &str) -> bool {
        self.allowed_url_patterns
            .iter()
            .any(|pattern| pattern.is_match(url))
    }

    /// Trimmed, cut to the length limit, then stripped of tags and angle
    /// brackets. Returns `None` when nothing usable remains.
    pub fn sanitize_guidance(&self, value: Option<&Value>) -> Option<String> {
        let raw = value?.as_str()?;
        let limited = truncate_chars(raw.trim(), self.max_guidance_chars);
        let without_tags = HTML_TAG_RE.replace_all(limited, "");
        let sanitized = ANGLE_BRACKET_RE.replace_all(&without_tags, "");
        if sanitized.is_empty() {
            None
        } else {
            Some(sanitized.into_owned())
        }
    }
}

pub fn required_prompt(body: &Value) -> Result<String, ValidationError> {
    body.get("prompt")
        .and_then(|value| value.as_str())
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(|value| value.to_string())
        .ok_or(ValidationError::MissingPrompt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_ALLOWED_IMAGE_URL_PATTERNS;
    use serde_json::json;

    fn validator() -> RequestValidator {
        let patterns = DEFAULT_ALLOWED_IMAGE_URL_PATTERNS
            .split(',')
            .map(|pattern| Regex::new(pattern).unwrap())
            .collect();
        RequestValidator::new("r8_", 10, 5, 500, patterns)
    }

    #[test]
    fn validates_api_key_presence_and_format() {
        let v = validator();
        assert_eq!(v.api_key(&json!({})), Err(ValidationError::MissingApiKey));
        assert_eq!(v.api_key(&json!({ "apiKey": 12 })), Err(ValidationError::MissingApiKey));
        assert_eq!(v.api_key(&json!({ "apiKey": "" })), Err(ValidationError::MissingApiKey));
        assert_eq!(
            v.api_key(&json!({ "apiKey": "sk_1234567890" })),
            Err(ValidationError::InvalidApiKeyFormat)
        );
        assert_eq!(
            v.api_key(&json!({ "apiKey": "r8_short" })),
            Err(ValidationError::InvalidApiKeyFormat)
        );
        assert!(v.api_key(&json!({ "apiKey": "r8_abcdefgh" })).is_ok());
    }

    #[test]
    fn validates_image_url_list() {
        let v = validator();
        let ok = "https://abc.public.blob.vercel-storage.com/x.png";
        assert_eq!(v.image_urls(&json!({})), Err(ValidationError::NoImages));
        assert_eq!(
            v.image_urls(&json!({ "imageUrls": [] })),
            Err(ValidationError::NoImages)
        );
        assert_eq!(
            v.image_urls(&json!({ "imageUrls": [ok, ok, ok, ok, ok, ok] })),
            Err(ValidationError::TooManyImages(5))
        );
        assert_eq!(
            v.image_urls(&json!({ "imageUrls": [ok, 3] })),
            Err(ValidationError::NonStringUrl)
        );
        assert_eq!(
            v.image_urls(&json!({ "imageUrls": ["not a url"] })),
            Err(ValidationError::InvalidUrl)
        );
        assert_eq!(
            v.image_urls(&json!({ "imageUrls": ["https://example.com/x.png"] })),
            Err(ValidationError::DisallowedOrigin)
        );
        assert_eq!(
            v.image_urls(&json!({ "imageUrls": [ok] })),
            Ok(vec![ok.to_string()])
        );
    }

    #[test]
    fn sanitizes_guidance() {
        let v = validator();
        assert_eq!(
            v.sanitize_guidance(Some(&json!("  <b>bold</b> lines > 2 "))),
            Some("bold lines  2".to_string())
        );
        assert_eq!(v.sanitize_guidance(Some(&json!("<script></script>"))), None);
        assert_eq!(v.sanitize_guidance(Some(&json!("   "))), None);
        assert_eq!(v.sanitize_guidance(Some(&json!(42))), None);
        assert_eq!(v.sanitize_guidance(None), None);

        let long = "a".repeat(800);
        assert_eq!(
            v.sanitize_guidance(Some(&json!(long))).map(|value| value.chars().count()),
            Some(500)
        );
    }

    #[test]
    fn requires_non_blank_prompt() {
        assert_eq!(required_prompt(&json!({ "prompt": "  " })), Err(ValidationError::MissingPrompt));
        assert_eq!(required_prompt(&json!({ "prompt": " ink " })), Ok("ink".to_string()));
    }
}
