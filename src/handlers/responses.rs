use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use crate::handlers::validation::ValidationError;
use crate::llm::{InvocationError, Operation};
use crate::style::{ImageMediumType, PlatformPrompts};

pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error. Please try again.";
pub const PARSE_FAILURE_MESSAGE: &str = "Failed to parse platform-specific prompts from response";

/// Failure surfaced to the client as `{success: false, error}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError {
            status,
            message: message.into(),
        }
    }

    pub fn internal() -> Self {
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE)
    }

    pub fn from_invocation(err: &InvocationError, operation: Operation) -> Self {
        let status =
            StatusCode::from_u16(err.kind.http_status()).unwrap_or(StatusCode::BAD_GATEWAY);
        ApiError::new(status, err.kind.user_message(operation))
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::new(StatusCode::BAD_REQUEST, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "success": false, "error": self.message })),
        )
            .into_response()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResponse {
    pub success: bool,
    pub prompts: PlatformPrompts,
    pub image_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medium: Option<ImageMediumType>,
    pub partial: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    pub success: bool,
    pub image_url: String,
    pub platform: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GenerationOutcome {
    pub fn succeeded(image_url: String) -> Self {
        GenerationOutcome {
            success: true,
            image_url: Some(image_url),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        GenerationOutcome {
            success: false,
            image_url: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchGenerationResponse {
    pub success: bool,
    pub results: BTreeMap<String, GenerationOutcome>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub catalog_version: u32,
    pub platforms: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::InvocationErrorKind;

    #[test]
    fn maps_invocation_errors_to_client_errors() {
        let err = InvocationError::classify(Some(401), "Unauthenticated");
        let api = ApiError::from_invocation(&err, Operation::Extraction);
        assert_eq!(api.status, StatusCode::UNAUTHORIZED);

        let err = InvocationError {
            kind: InvocationErrorKind::ContentPolicy,
            status: None,
            message: "nsfw".to_string(),
        };
        let api = ApiError::from_invocation(&err, Operation::Generation);
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert!(api.message.contains("content policy"));
    }

    #[test]
    fn validation_errors_are_bad_requests() {
        let api: ApiError = ValidationError::TooManyImages(5).into();
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.message, "Maximum 5 images allowed");
    }

    #[test]
    fn outcome_omits_absent_fields() {
        let json = serde_json::to_value(GenerationOutcome::failed("nope")).unwrap();
        assert_eq!(json, json!({ "success": false, "error": "nope" }));
    }
}
