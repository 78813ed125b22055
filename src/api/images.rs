//! Image upload endpoints
//!
//! - POST /api/admin/images - multipart upload of one or more files
//! - DELETE /api/admin/images/{public_id} - delete one image from the host
//!
//! The upload form carries the files (field `files` or `file`) plus the
//! caller's current list size (`existingCount`) and the first order to
//! assign (`nextOrder`).

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    routing::{delete, post},
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState};
use crate::config::UploadConfig;
use crate::services::images::{IncomingFile, UploadReport};

/// Request body ceiling for a full batch, with room for the form overhead
pub fn body_limit(limits: &UploadConfig) -> usize {
    (limits.max_file_size as usize).saturating_mul(limits.max_files) + 1024 * 1024
}

pub fn router(limits: &UploadConfig) -> Router<AppState> {
    Router::new()
        .route("/", post(upload_images))
        .route("/{*public_id}", delete(delete_image))
        .layer(DefaultBodyLimit::max(body_limit(limits)))
}

fn parse_number<T: std::str::FromStr>(field: &str, raw: &str) -> Result<T, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::validation_error(format!("{} must be a non-negative number", field)))
}

/// POST /api/admin/images
async fn upload_images(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadReport>, ApiError> {
    let mut files = Vec::new();
    let mut existing_count: usize = 0;
    let mut next_order: i64 = 0;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation_error(format!("Failed to read multipart: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "files" | "file" => {
                let file_name = field.file_name().unwrap_or("image").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::validation_error(format!("Failed to read file: {}", e)))?;
                files.push(IncomingFile {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            "existingCount" | "nextOrder" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::validation_error(format!("Failed to read {}: {}", name, e)))?;
                if name == "existingCount" {
                    existing_count = parse_number(&name, &text)?;
                } else {
                    next_order = parse_number::<u32>(&name, &text)?.into();
                }
            }
            _ => {}
        }
    }

    let report = state.images.upload_batch(files, existing_count, next_order).await?;
    Ok(Json(report))
}

/// DELETE /api/admin/images/{public_id}
async fn delete_image(
    State(state): State<AppState>,
    Path(public_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.images.delete(&public_id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}
