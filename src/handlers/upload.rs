use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use tracing::{error, info, warn};

use crate::handlers::responses::{ApiError, UploadResponse};
use crate::handlers::validation::ValidationError;
use crate::state::AppState;
use crate::storage::media::{
    detect_mime_type, extension_for_mime, is_allowed_image_type, normalize_mime_type,
};
use crate::storage::{reference_image_path, StorageError};
use crate::utils::timing::{complete_request_timer, start_request_timer};

const FILE_FIELD: &str = "file";
const BYTES_PER_MB: usize = 1024 * 1024;

struct UploadedFile {
    declared_type: String,
    bytes: Vec<u8>,
}

pub async fn upload_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let mut timer = start_request_timer("/api/upload-image", None);
    match run_upload(&state, multipart).await {
        Ok(response) => {
            complete_request_timer(&mut timer, "success", None);
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

fn file_too_large(max_upload_bytes: usize) -> ValidationError {
    ValidationError::FileTooLarge(max_upload_bytes.div_ceil(BYTES_PER_MB))
}

fn multipart_error(err: MultipartError, max_upload_bytes: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return file_too_large(max_upload_bytes).into();
    }
    warn!("Failed to read multipart upload: {}", err.body_text());
    ValidationError::InvalidBody.into()
}

async fn read_file_field(
    mut multipart: Multipart,
    max_upload_bytes: usize,
) -> Result<Option<UploadedFile>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| multipart_error(err, max_upload_bytes))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let declared_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|err| multipart_error(err, max_upload_bytes))?;
        return Ok(Some(UploadedFile {
            declared_type,
            bytes: bytes.to_vec(),
        }));
    }
    Ok(None)
}

async fn run_upload(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<UploadResponse, ApiError> {
    let multipart = multipart.map_err(|rejection| {
        warn!("Rejected upload body: {}", rejection);
        ValidationError::InvalidBody
    })?;
    let file = read_file_field(multipart, state.max_upload_bytes)
        .await?
        .ok_or(ValidationError::MissingFile)?;

    let declared = normalize_mime_type(&file.declared_type);
    if !declared.starts_with("image/") {
        return Err(ValidationError::NotAnImage.into());
    }
    if !is_allowed_image_type(&declared) {
        return Err(ValidationError::UnsupportedImageType.into());
    }
    if file.bytes.len() > state.max_upload_bytes {
        return Err(file_too_large(state.max_upload_bytes).into());
    }

    let content_type = detect_mime_type(&file.bytes)
        .filter(|sniffed| is_allowed_image_type(sniffed))
        .ok_or_else(|| {
            warn!(
                "Upload declared as {} does not contain a supported image",
                declared
            );
            ValidationError::UnsupportedImageType
        })?;

    let path = reference_image_path(extension_for_mime(&content_type), Utc::now());
    let size = file.bytes.len();
    match state.storage.store(file.bytes, &path, &content_type).await {
        Ok(url) => {
            info!("Uploaded reference image ({} bytes, {})", size, content_type);
            Ok(UploadResponse { success: true, url })
        }
        Err(StorageError::NotConfigured) => {
            error!("Upload rejected: object storage is not configured");
            Err(ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "Image storage is not configured",
            ))
        }
        Err(err) => {
            error!("Failed to store reference image: {}", err);
            Err(ApiError::new(StatusCode::BAD_GATEWAY, "Failed to upload image"))
        }
    }
}
