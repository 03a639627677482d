pub mod extraction;
pub mod generation;
pub mod responses;
pub mod upload;
pub mod validation;

use axum::extract::{DefaultBodyLimit, State};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::handlers::responses::HealthResponse;
use crate::state::AppState;

/// Slack on top of the file limit for multipart boundaries and headers.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;
    Router::new()
        .route("/api/health", get(health))
        .route("/api/style-extraction", post(extraction::style_extraction))
        .route("/api/generate-image", post(generation::generate_image))
        .route("/api/generate-images", post(generation::generate_images))
        .route(
            "/api/upload-image",
            post(upload::upload_image).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        catalog_version: state.catalog.version,
        platforms: state
            .catalog
            .keys()
            .map(|key| key.as_str().to_string())
            .collect(),
    })
}
