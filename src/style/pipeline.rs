use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::llm::{ApiKey, InvocationError, InvocationErrorKind, SamplingParams, VisionModel};
use crate::style::catalog::PlatformCatalog;
use crate::style::composer::{compose_analysis_prompt, CompositionRequest};
use crate::style::medium::{
    normalize_classification, ImageMediumType, CLASSIFICATION_PROMPT, DEFAULT_MEDIUM,
};
use crate::style::segmenter::{segment_response, PlatformPrompts, SegmentError};
use crate::utils::text::truncate_for_log;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractionSettings {
    pub two_pass: bool,
    pub classification: SamplingParams,
    pub analysis: SamplingParams,
}

impl ExtractionSettings {
    pub fn from_config(config: &Config) -> Self {
        ExtractionSettings {
            two_pass: config.two_pass_classification,
            classification: SamplingParams {
                max_tokens: config.classification_max_tokens,
                temperature: config.classification_temperature,
            },
            analysis: SamplingParams {
                max_tokens: config.analysis_max_tokens,
                temperature: config.analysis_temperature,
            },
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("no image URLs supplied")]
    NoImages,
    #[error(transparent)]
    Invocation(#[from] InvocationError),
    #[error("model returned an empty response")]
    EmptyResponse,
    #[error(transparent)]
    Unparseable(#[from] SegmentError),
}

#[derive(Debug, Clone)]
pub struct StyleExtraction {
    pub prompts: PlatformPrompts,
    pub medium: Option<ImageMediumType>,
    pub complete: bool,
}

/// Runs classifier, composer, vision call and segmenter for one request.
pub struct StyleExtractor {
    vision: Arc<dyn VisionModel>,
    catalog: Arc<PlatformCatalog>,
    settings: ExtractionSettings,
}

impl StyleExtractor {
    pub fn new(
        vision: Arc<dyn VisionModel>,
        catalog: Arc<PlatformCatalog>,
        settings: ExtractionSettings,
    ) -> Self {
        StyleExtractor {
            vision,
            catalog,
            settings,
        }
    }

    /// First pass. Authentication and rate-limit failures are returned since
    /// the analysis pass would fail the same way; anything else falls back to
    /// [`DEFAULT_MEDIUM`].
    pub async fn classify_medium(
        &self,
        api_key: &ApiKey,
        image_url: &str,
    ) -> Result<ImageMediumType, InvocationError> {
        match self
            .vision
            .invoke(api_key, CLASSIFICATION_PROMPT, image_url, self.settings.classification)
            .await
        {
            Ok(raw) => {
                let medium = normalize_classification(&raw);
                info!(
                    "Classified image medium as {} (raw={:?})",
                    medium,
                    truncate_for_log(raw.trim(), 100)
                );
                Ok(medium)
            }
            Err(err)
                if matches!(
                    err.kind,
                    InvocationErrorKind::Authentication | InvocationErrorKind::RateLimited
                ) =>
            {
                Err(err)
            }
            Err(err) => {
                warn!(
                    "Medium classification failed, defaulting to {}: {}",
                    DEFAULT_MEDIUM, err
                );
                Ok(DEFAULT_MEDIUM)
            }
        }
    }

    pub async fn extract(
        &self,
        api_key: &ApiKey,
        image_urls: &[String],
        guidance: Option<&str>,
    ) -> Result<StyleExtraction, ExtractionError> {
        let primary_image = image_urls.first().ok_or(ExtractionError::NoImages)?;

        let medium = if self.settings.two_pass {
            Some(self.classify_medium(api_key, primary_image).await?)
        } else {
            None
        };

        let instruction = compose_analysis_prompt(
            &self.catalog,
            &CompositionRequest {
                image_count: image_urls.len(),
                guidance,
                medium,
            },
        );

        let raw = self
            .vision
            .invoke(api_key, &instruction, primary_image, self.settings.analysis)
            .await?;
        if raw.trim().is_empty() {
            warn!("Vision model returned an empty style description");
            return Err(ExtractionError::EmptyResponse);
        }

        let segmentation = segment_response(&raw, &self.catalog)?;
        info!(
            "Extracted {} platform prompt(s) with {} (matched={}, backfilled={}, medium={:?})",
            segmentation.prompts.len(),
            self.vision.model_name(),
            segmentation.matched.len(),
            segmentation.backfilled.len(),
            medium
        );

        Ok(StyleExtraction {
            complete: segmentation.is_complete(),
            prompts: segmentation.prompts,
            medium,
        })
    }
}
