use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::Config;
use crate::llm::{ApiKey, ImageGenerator, InvocationError, SamplingParams, VisionModel};
use crate::style::catalog::GenerationPreset;
use crate::utils::http::get_http_client;
use crate::utils::text::truncate_for_log;
use crate::utils::timing::log_llm_timing;

const PROVIDER: &str = "replicate";
const ERROR_BODY_LOG_LIMIT: usize = 2000;

#[derive(Debug, Clone)]
pub struct ReplicateClient {
    client: Client,
    base_url: String,
    vision_model: String,
    wait_seconds: u64,
    poll_interval: Duration,
    extraction_deadline: Duration,
    generation_deadline: Duration,
}

impl ReplicateClient {
    pub fn from_config(config: &Config) -> Self {
        ReplicateClient {
            client: get_http_client().clone(),
            base_url: config.replicate_api_base_url.trim_end_matches('/').to_string(),
            vision_model: config.vision_model.clone(),
            wait_seconds: config.prediction_wait_seconds,
            poll_interval: Duration::from_millis(config.prediction_poll_interval_ms),
            extraction_deadline: Duration::from_secs(config.extraction_timeout_seconds),
            generation_deadline: Duration::from_secs(config.generation_timeout_seconds),
        }
    }

    fn predictions_url(&self, model: &str) -> Result<String, InvocationError> {
        let (owner, name) = model
            .split_once('/')
            .filter(|(owner, name)| !owner.is_empty() && !name.is_empty())
            .ok_or_else(|| InvocationError::failed(format!("Invalid model identifier '{model}'")))?;
        Ok(format!("{}/models/{}/{}/predictions", self.base_url, owner, name))
    }

    /// Creates a prediction and waits until it reaches a terminal state.
    async fn run_prediction(
        &self,
        api_key: &ApiKey,
        model: &str,
        input: Value,
        budget: Duration,
    ) -> Result<Value, InvocationError> {
        let deadline = Instant::now() + budget;
        let url = self.predictions_url(model)?;
        debug!("Creating Replicate prediction for model={}", model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key.expose())
            .header("Prefer", format!("wait={}", self.wait_seconds))
            .timeout(budget)
            .json(&json!({ "input": input }))
            .send()
            .await
            .map_err(request_error)?;

        let mut prediction = read_json_response(response).await?;
        loop {
            match prediction_status(&prediction) {
                "succeeded" => return Ok(prediction),
                "failed" => {
                    let message = prediction
                        .get("error")
                        .map(value_to_message)
                        .unwrap_or_else(|| "Prediction failed".to_string());
                    return Err(InvocationError::classify(None, message));
                }
                "canceled" | "aborted" => {
                    return Err(InvocationError::failed("Prediction was canceled"));
                }
                _ => {}
            }

            let Some(poll_url) = prediction
                .pointer("/urls/get")
                .and_then(|value| value.as_str())
                .map(|value| value.to_string())
            else {
                return Err(InvocationError::failed(
                    "Prediction is still running but has no polling URL",
                ));
            };

            if Instant::now() + self.poll_interval > deadline {
                return Err(InvocationError::failed(format!(
                    "Prediction did not finish within {}s",
                    budget.as_secs()
                )));
            }
            tokio::time::sleep(self.poll_interval).await;

            let response = self
                .client
                .get(&poll_url)
                .bearer_auth(api_key.expose())
                .send()
                .await
                .map_err(request_error)?;
            prediction = read_json_response(response).await?;
        }
    }
}

#[async_trait]
impl VisionModel for ReplicateClient {
    async fn invoke(
        &self,
        api_key: &ApiKey,
        instruction: &str,
        image_url: &str,
        params: SamplingParams,
    ) -> Result<String, InvocationError> {
        let input = json!({
            "prompt": instruction,
            "image": image_url,
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
        });
        let metadata = json!({
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
            "prompt_chars": instruction.chars().count(),
        });

        let prediction = log_llm_timing(
            PROVIDER,
            &self.vision_model,
            "vision",
            Some(metadata),
            || self.run_prediction(api_key, &self.vision_model, input, self.extraction_deadline),
        )
        .await?;

        let text = prediction
            .get("output")
            .and_then(output_to_text)
            .unwrap_or_default();
        Ok(text.trim().to_string())
    }

    fn model_name(&self) -> &str {
        &self.vision_model
    }
}

#[async_trait]
impl ImageGenerator for ReplicateClient {
    async fn generate(
        &self,
        api_key: &ApiKey,
        prompt: &str,
        preset: &GenerationPreset,
    ) -> Result<String, InvocationError> {
        let mut input = preset.input.clone();
        input.insert("prompt".to_string(), Value::String(prompt.to_string()));
        let metadata = json!({ "prompt_chars": prompt.chars().count() });

        let prediction = log_llm_timing(
            PROVIDER,
            &preset.model,
            "image_generation",
            Some(metadata),
            || {
                self.run_prediction(
                    api_key,
                    &preset.model,
                    Value::Object(input),
                    self.generation_deadline,
                )
            },
        )
        .await?;

        prediction
            .get("output")
            .and_then(output_to_image_url)
            .ok_or_else(|| InvocationError::failed("Failed to generate image - no URL returned"))
    }
}

fn request_error(err: reqwest::Error) -> InvocationError {
    warn!(
        "Replicate request error: {} (timeout={}, connect={}, status={:?})",
        err,
        err.is_timeout(),
        err.is_connect(),
        err.status()
    );
    let status = err.status().map(|status| status.as_u16());
    InvocationError::classify(status, format!("Replicate request error: {err}"))
}

async fn read_json_response(response: reqwest::Response) -> Result<Value, InvocationError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let (message, body_summary) = summarize_error_body(&body);
        warn!(
            "Replicate API error: status={}, body={}",
            status, body_summary
        );
        let detail = message.unwrap_or(body_summary);
        return Err(InvocationError::classify(
            Some(status.as_u16()),
            format!("Replicate request failed with status {status}: {detail}"),
        ));
    }
    response.json::<Value>().await.map_err(request_error)
}

fn prediction_status(prediction: &Value) -> &str {
    prediction
        .get("status")
        .and_then(|value| value.as_str())
        .unwrap_or("")
}

fn value_to_message(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .get("detail")
            .and_then(|v| v.as_str())
            .or_else(|| value.pointer("/error/message").and_then(|v| v.as_str()))
            .or_else(|| value.get("error").and_then(|v| v.as_str()))
            .or_else(|| value.get("message").and_then(|v| v.as_str()))
            .map(|v| v.to_string());
        return (message, truncate_for_log(&value.to_string(), ERROR_BODY_LOG_LIMIT));
    }

    (None, truncate_for_log(trimmed, ERROR_BODY_LOG_LIMIT))
}

/// Text models stream their output as an array of string chunks.
pub(crate) fn output_to_text(output: &Value) -> Option<String> {
    match output {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Array(chunks) => Some(
            chunks
                .iter()
                .filter_map(|chunk| chunk.as_str())
                .collect::<String>(),
        ),
        other => Some(other.to_string()),
    }
}

pub(crate) fn output_to_image_url(output: &Value) -> Option<String> {
    match output {
        Value::String(url) if !url.trim().is_empty() => Some(url.clone()),
        Value::Array(items) => items.first().and_then(output_to_image_url),
        Value::Object(map) => map
            .get("url")
            .and_then(|value| value.as_str())
            .filter(|url| !url.trim().is_empty())
            .map(|url| url.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ReplicateClient {
        ReplicateClient {
            client: Client::new(),
            base_url: "https://api.replicate.com/v1".to_string(),
            vision_model: "anthropic/claude-4.5-sonnet".to_string(),
            wait_seconds: 60,
            poll_interval: Duration::from_millis(100),
            extraction_deadline: Duration::from_secs(5),
            generation_deadline: Duration::from_secs(5),
        }
    }

    #[test]
    fn builds_model_prediction_url() {
        assert_eq!(
            client().predictions_url("black-forest-labs/flux-2-pro").unwrap(),
            "https://api.replicate.com/v1/models/black-forest-labs/flux-2-pro/predictions"
        );
        assert!(client().predictions_url("flux").is_err());
        assert!(client().predictions_url("/flux").is_err());
    }

    #[test]
    fn joins_streamed_text_chunks() {
        let output = json!(["FLUX: warm", " tones\n", "SEEDREAM: soft"]);
        assert_eq!(
            output_to_text(&output).as_deref(),
            Some("FLUX: warm tones\nSEEDREAM: soft")
        );
        assert_eq!(output_to_text(&json!("plain")).as_deref(), Some("plain"));
        assert_eq!(output_to_text(&Value::Null), None);
    }

    #[test]
    fn extracts_image_url_from_known_shapes() {
        assert_eq!(
            output_to_image_url(&json!("https://x/img.webp")).as_deref(),
            Some("https://x/img.webp")
        );
        assert_eq!(
            output_to_image_url(&json!(["https://x/a.png", "https://x/b.png"])).as_deref(),
            Some("https://x/a.png")
        );
        assert_eq!(
            output_to_image_url(&json!({ "url": "https://x/c.png" })).as_deref(),
            Some("https://x/c.png")
        );
        assert_eq!(output_to_image_url(&json!([])), None);
        assert_eq!(output_to_image_url(&json!(42)), None);
    }

    #[test]
    fn summarizes_replicate_error_bodies() {
        let (message, _) = summarize_error_body(r#"{"title":"Unauthenticated","detail":"You did not pass a valid authentication token","status":401}"#);
        assert_eq!(
            message.as_deref(),
            Some("You did not pass a valid authentication token")
        );

        let (message, _) = summarize_error_body(r#"{"error":{"message":"rate limit hit"}}"#);
        assert_eq!(message.as_deref(), Some("rate limit hit"));

        let (message, summary) = summarize_error_body("   ");
        assert_eq!(message, None);
        assert_eq!(summary, "empty response body");
    }

    #[test]
    fn reads_prediction_status() {
        assert_eq!(prediction_status(&json!({ "status": "succeeded" })), "succeeded");
        assert_eq!(prediction_status(&json!({})), "");
    }
}
