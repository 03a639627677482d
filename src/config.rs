use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::style::catalog::PlatformCatalog;

pub const DEFAULT_ALLOWED_IMAGE_URL_PATTERNS: &str = r"^https://[a-z0-9-]+\.public\.blob\.vercel-storage\.com/,^https://[a-z0-9-]+\.blob\.vercel-storage\.com/";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub log_level: String,
    pub log_dir: String,
    pub http_timeout_seconds: u64,
    pub replicate_api_base_url: String,
    pub vision_model: String,
    pub two_pass_classification: bool,
    pub classification_max_tokens: u32,
    pub classification_temperature: f32,
    pub analysis_max_tokens: u32,
    pub analysis_temperature: f32,
    pub prediction_wait_seconds: u64,
    pub prediction_poll_interval_ms: u64,
    pub extraction_timeout_seconds: u64,
    pub generation_timeout_seconds: u64,
    pub generation_max_attempts: usize,
    pub generation_retry_base_delay_ms: u64,
    pub api_key_prefix: String,
    pub api_key_min_length: usize,
    pub max_images: usize,
    pub max_guidance_chars: usize,
    pub allowed_image_url_patterns: Vec<String>,
    pub blob_api_url: String,
    pub blob_read_write_token: String,
    pub max_upload_bytes: usize,
    pub platform_catalog_path: PathBuf,
    pub platform_catalog: PlatformCatalog,
}

pub static CONFIG: Lazy<Config> =
    Lazy::new(|| Config::load().expect("Failed to load configuration"));

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .map(|value| value.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_f32(name: &str, default: f32) -> f32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<f32>().ok())
        .unwrap_or(default)
}

fn env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_csv(name: &str, default: &str) -> Vec<String> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .split(',')
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}

fn resolve_platform_catalog_path() -> PathBuf {
    let configured = PathBuf::from(env_string("PLATFORM_CATALOG_PATH", "platform_catalog.json"));
    if configured.is_absolute() {
        return configured;
    }
    env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(configured)
}

impl Config {
    pub fn load() -> Result<Self> {
        let allowed_image_url_patterns =
            env_csv("ALLOWED_IMAGE_URL_PATTERNS", DEFAULT_ALLOWED_IMAGE_URL_PATTERNS);
        if allowed_image_url_patterns.is_empty() {
            return Err(anyhow!("ALLOWED_IMAGE_URL_PATTERNS must not be empty"));
        }
        for pattern in &allowed_image_url_patterns {
            Regex::new(pattern)
                .map_err(|err| anyhow!("Invalid ALLOWED_IMAGE_URL_PATTERNS entry '{pattern}': {err}"))?;
        }

        let generation_max_attempts = env_usize("GENERATION_MAX_ATTEMPTS", 3).max(1);
        let platform_catalog_path = resolve_platform_catalog_path();
        let platform_catalog = PlatformCatalog::load_or_builtin(&platform_catalog_path);

        Ok(Config {
            bind_address: env_string("BIND_ADDRESS", "0.0.0.0:3000"),
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            log_dir: env_string("LOG_DIR", "logs"),
            http_timeout_seconds: env_u64("HTTP_TIMEOUT_SECONDS", 120),
            replicate_api_base_url: env_string(
                "REPLICATE_API_BASE_URL",
                "https://api.replicate.com/v1",
            ),
            vision_model: env_string("VISION_MODEL", "anthropic/claude-4.5-sonnet"),
            two_pass_classification: env_bool("TWO_PASS_CLASSIFICATION", true),
            classification_max_tokens: env_u32("CLASSIFICATION_MAX_TOKENS", 1024),
            classification_temperature: env_f32("CLASSIFICATION_TEMPERATURE", 0.1),
            analysis_max_tokens: env_u32("ANALYSIS_MAX_TOKENS", 1500),
            analysis_temperature: env_f32("ANALYSIS_TEMPERATURE", 0.3),
            prediction_wait_seconds: env_u64("PREDICTION_WAIT_SECONDS", 60).clamp(1, 60),
            prediction_poll_interval_ms: env_u64("PREDICTION_POLL_INTERVAL_MS", 1000).max(100),
            extraction_timeout_seconds: env_u64("EXTRACTION_TIMEOUT_SECONDS", 180),
            generation_timeout_seconds: env_u64("GENERATION_TIMEOUT_SECONDS", 300),
            generation_max_attempts,
            generation_retry_base_delay_ms: env_u64("GENERATION_RETRY_BASE_DELAY_MS", 1000),
            api_key_prefix: env_string("API_KEY_PREFIX", "r8_"),
            api_key_min_length: env_usize("API_KEY_MIN_LENGTH", 10),
            max_images: env_usize("MAX_IMAGES", 5).max(1),
            max_guidance_chars: env_usize("MAX_GUIDANCE_CHARS", 500),
            allowed_image_url_patterns,
            blob_api_url: env_string("BLOB_API_URL", "https://blob.vercel-storage.com"),
            blob_read_write_token: env_string("BLOB_READ_WRITE_TOKEN", ""),
            max_upload_bytes: env_usize("MAX_UPLOAD_BYTES", 5 * 1024 * 1024),
            platform_catalog_path,
            platform_catalog,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_url_patterns_compile_and_match_blob_hosts() {
        let patterns: Vec<Regex> = DEFAULT_ALLOWED_IMAGE_URL_PATTERNS
            .split(',')
            .map(|pattern| Regex::new(pattern).unwrap())
            .collect();
        assert_eq!(patterns.len(), 2);
        assert!(patterns
            .iter()
            .any(|re| re.is_match("https://abc-123.public.blob.vercel-storage.com/a.png")));
        assert!(!patterns
            .iter()
            .any(|re| re.is_match("https://evil.example.com/a.png")));
    }

    #[test]
    fn csv_helper_skips_blank_entries() {
        let values = env_csv("STYLE_PROMPT_TEST_UNSET_VARIABLE", " a, ,b ,");
        assert_eq!(values, vec!["a".to_string(), "b".to_string()]);
    }
}
