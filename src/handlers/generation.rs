use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::handlers::responses::{
    ApiError, BatchGenerationResponse, GenerationOutcome, GenerationResponse,
    INTERNAL_ERROR_MESSAGE,
};
use crate::handlers::validation::{required_prompt, ValidationError};
use crate::llm::{ApiKey, ImageGenerator, InvocationError, Operation};
use crate::state::AppState;
use crate::style::catalog::{GenerationPreset, PlatformCatalog};
use crate::utils::timing::{complete_request_timer, start_request_timer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        RetryPolicy {
            max_attempts: config.generation_max_attempts.max(1),
            base_delay: Duration::from_millis(config.generation_retry_base_delay_ms),
        }
    }

    /// Delay before the retry that follows `attempt` (zero-based).
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let factor = 1u32.checked_shl(attempt as u32).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// Calls the generator until it succeeds, fails with a non-retryable kind,
/// or runs out of attempts.
pub async fn generate_with_retry(
    generator: &dyn ImageGenerator,
    api_key: &ApiKey,
    prompt: &str,
    preset: &GenerationPreset,
    policy: RetryPolicy,
) -> Result<String, InvocationError> {
    let mut attempt = 0;
    loop {
        match generator.generate(api_key, prompt, preset).await {
            Ok(url) => return Ok(url),
            Err(err) => {
                if !err.is_retryable() || attempt + 1 >= policy.max_attempts {
                    return Err(err);
                }
                warn!(
                    "Image generation with {} failed (attempt={}/{}): {}",
                    preset.model,
                    attempt + 1,
                    policy.max_attempts,
                    err
                );
                tokio::time::sleep(policy.delay_for(attempt)).await;
                attempt += 1;
            }
        }
    }
}

fn supported_platforms(catalog: &PlatformCatalog) -> String {
    catalog
        .generation_platforms()
        .map(|platform| platform.key.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn preset_for(catalog: &PlatformCatalog, platform: &str) -> Option<GenerationPreset> {
    catalog
        .get(platform)
        .and_then(|spec| spec.generation.clone())
}

fn parse_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, ApiError> {
    body.map(|Json(value)| value).map_err(|rejection| {
        warn!("Rejected generation body: {}", rejection);
        ValidationError::InvalidBody.into()
    })
}

pub async fn generate_image(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let mut timer = start_request_timer("/api/generate-image", None);
    match run_generation(&state, body).await {
        Ok(response) => {
            complete_request_timer(&mut timer, "success", Some(response.platform.clone()));
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => {
            complete_request_timer(
                &mut timer,
                "error",
                Some(format!("{} {}", err.status.as_u16(), err.message)),
            );
            err.into_response()
        }
    }
}

async fn run_generation(
    state: &AppState,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<GenerationResponse, ApiError> {
    let body = parse_body(body)?;
    let api_key = state.validator.api_key(&body)?;
    let prompt = required_prompt(&body)?;
    let platform = body
        .get("platform")
        .and_then(|value| value.as_str())
        .unwrap_or_default()
        .to_string();
    let preset = preset_for(&state.catalog, &platform).ok_or_else(|| {
        ValidationError::UnsupportedPlatform(supported_platforms(&state.catalog))
    })?;

    info!("Generating image for platform={} model={}", platform, preset.model);
    let generator = state.generator.clone();
    let policy = state.retry;
    let task = tokio::spawn(async move {
        generate_with_retry(generator.as_ref(), &api_key, &prompt, &preset, policy).await
    });
    let outcome = task.await.map_err(|err| {
        error!("Image generation task failed: {}", err);
        ApiError::internal()
    })?;

    match outcome {
        Ok(image_url) => Ok(GenerationResponse {
            success: true,
            image_url,
            platform,
        }),
        Err(err) => {
            warn!("Image generation for {} failed: {}", platform, err);
            Err(ApiError::from_invocation(&err, Operation::Generation))
        }
    }
}

pub async fn generate_images(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let mut timer = start_request_timer("/api/generate-images", None);
    match run_batch_generation(&state, body).await {
        Ok(response) => {
            let succeeded = response
                .results
                .values()
                .filter(|outcome| outcome.success)
                .count();
            complete_request_timer(
                &mut timer,
                if response.success { "success" } else { "failed" },
                Some(format!("succeeded={}/{}", succeeded, response.results.len())),
            );
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => {
            complete_request_timer(
                &mut timer,
                "error",
                Some(format!("{} {}", err.status.as_u16(), err.message)),
            );
            err.into_response()
        }
    }
}

/// One concurrent generation per platform, each with its own retry schedule.
async fn run_batch_generation(
    state: &AppState,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<BatchGenerationResponse, ApiError> {
    let body = parse_body(body)?;
    let api_key = state.validator.api_key(&body)?;
    let prompts = body
        .get("prompts")
        .and_then(|value| value.as_object())
        .filter(|prompts| !prompts.is_empty())
        .ok_or(ValidationError::NoPrompts)?;

    let mut results = BTreeMap::new();
    let mut jobs = Vec::new();
    for (platform, prompt) in prompts {
        let prompt = prompt.as_str().map(str::trim).unwrap_or_default();
        match preset_for(&state.catalog, platform) {
            Some(_) if prompt.is_empty() => {
                results.insert(
                    platform.clone(),
                    GenerationOutcome::failed(ValidationError::MissingPrompt.to_string()),
                );
            }
            Some(preset) => jobs.push((platform.clone(), prompt.to_string(), preset)),
            None => {
                results.insert(
                    platform.clone(),
                    GenerationOutcome::failed(
                        ValidationError::UnsupportedPlatform(supported_platforms(&state.catalog))
                            .to_string(),
                    ),
                );
            }
        }
    }

    if jobs.is_empty() {
        return Err(ValidationError::UnsupportedPlatform(supported_platforms(&state.catalog)).into());
    }

    info!("Generating {} image(s) concurrently", jobs.len());
    let api_key = Arc::new(api_key);
    let mut pending: HashSet<String> = HashSet::new();
    let mut set = JoinSet::new();
    for (platform, prompt, preset) in jobs {
        pending.insert(platform.clone());
        let generator = state.generator.clone();
        let api_key = api_key.clone();
        let policy = state.retry;
        set.spawn(async move {
            let outcome =
                generate_with_retry(generator.as_ref(), &api_key, &prompt, &preset, policy).await;
            (platform, outcome)
        });
    }

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((platform, Ok(image_url))) => {
                pending.remove(&platform);
                results.insert(platform, GenerationOutcome::succeeded(image_url));
            }
            Ok((platform, Err(err))) => {
                warn!("Batch generation for {} failed: {}", platform, err);
                pending.remove(&platform);
                results.insert(
                    platform,
                    GenerationOutcome::failed(err.kind.user_message(Operation::Generation)),
                );
            }
            Err(err) => error!("Batch generation task failed: {}", err),
        }
    }
    for platform in pending {
        results.insert(platform, GenerationOutcome::failed(INTERNAL_ERROR_MESSAGE));
    }

    let success = results.values().any(|outcome| outcome.success);
    Ok(BatchGenerationResponse { success, results })
}
