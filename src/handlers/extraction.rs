use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::handlers::responses::{ApiError, ExtractionResponse, PARSE_FAILURE_MESSAGE};
use crate::handlers::validation::ValidationError;
use crate::llm::Operation;
use crate::state::AppState;
use crate::style::ExtractionError;
use crate::utils::timing::{complete_request_timer, start_request_timer};

const ROUTE: &str = "/api/style-extraction";

pub async fn style_extraction(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let mut timer = start_request_timer(ROUTE, None);
    match run_extraction(&state, body).await {
        Ok(response) => {
            let status = if response.partial { "partial" } else { "success" };
            complete_request_timer(&mut timer, status, Some(format!("images={}", response.image_count)));
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

async fn run_extraction(
    state: &AppState,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<ExtractionResponse, ApiError> {
    let Json(body) = body.map_err(|rejection| {
        warn!("Rejected style extraction body: {}", rejection);
        ValidationError::InvalidBody
    })?;

    let api_key = state.validator.api_key(&body)?;
    let image_urls = state.validator.image_urls(&body)?;
    let guidance = state.validator.sanitize_guidance(body.get("userGuidance"));
    let image_count = image_urls.len();
    info!(
        "Style extraction requested for {} image(s), guidance={}",
        image_count,
        guidance.is_some()
    );

    let extractor = state.extractor.clone();
    let task = tokio::spawn(async move {
        extractor
            .extract(&api_key, &image_urls, guidance.as_deref())
            .await
    });
    let outcome = task.await.map_err(|err| {
        error!("Style extraction task failed: {}", err);
        ApiError::internal()
    })?;

    match outcome {
        Ok(extraction) => Ok(ExtractionResponse {
            success: true,
            prompts: extraction.prompts,
            image_count,
            medium: extraction.medium,
            partial: !extraction.complete,
        }),
        Err(ExtractionError::Invocation(err)) => {
            warn!("Style extraction invocation failed: {}", err);
            Err(ApiError::from_invocation(&err, Operation::Extraction))
        }
        Err(err @ (ExtractionError::EmptyResponse | ExtractionError::Unparseable(_))) => {
            warn!("Style extraction produced no usable prompts: {}", err);
            Err(ApiError::new(StatusCode::BAD_GATEWAY, PARSE_FAILURE_MESSAGE))
        }
        Err(ExtractionError::NoImages) => Err(ValidationError::NoImages.into()),
    }
}
