//! Gallery admin endpoints
//!
//! - GET /api/admin/gallery - list events
//! - POST /api/admin/gallery - create event
//! - GET|PUT|DELETE /api/admin/gallery/{id}
//! - POST /api/admin/gallery/{id}/images/move - reorder one image
//! - DELETE /api/admin/gallery/{id}/images/{public_id} - remove one image

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState};
use crate::models::{GalleryEvent, GalleryEventInput};
use crate::services::MoveDirection;

/// Request body for moving an image
#[derive(Debug, Deserialize)]
pub struct MoveImageRequest {
    pub index: usize,
    pub direction: MoveDirection,
}

/// Result of deleting a record that owned images
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub success: bool,
    /// Images the host could not delete
    pub failed_images: Vec<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_events).post(create_event))
        .route("/{id}", get(get_event).put(update_event).delete(delete_event))
        .route("/{id}/images/move", post(move_image))
        .route("/{id}/images/{*public_id}", delete(remove_image))
}

async fn list_events(State(state): State<AppState>) -> Result<Json<Vec<GalleryEvent>>, ApiError> {
    Ok(Json(state.gallery.list().await?))
}

async fn create_event(
    State(state): State<AppState>,
    Json(input): Json<GalleryEventInput>,
) -> Result<(StatusCode, Json<GalleryEvent>), ApiError> {
    let event = state.gallery.create(input).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<GalleryEvent>, ApiError> {
    Ok(Json(state.gallery.get(&id).await?))
}

async fn update_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<GalleryEventInput>,
) -> Result<Json<GalleryEvent>, ApiError> {
    Ok(Json(state.gallery.update(&id, input).await?))
}

async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let failed_images = state.gallery.delete(&id).await?;
    Ok(Json(DeleteResponse {
        success: true,
        failed_images,
    }))
}

async fn move_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<MoveImageRequest>,
) -> Result<Json<GalleryEvent>, ApiError> {
    Ok(Json(state.gallery.move_image(&id, body.index, body.direction).await?))
}

async fn remove_image(
    State(state): State<AppState>,
    Path((id, public_id)): Path<(String, String)>,
) -> Result<Json<GalleryEvent>, ApiError> {
    Ok(Json(state.gallery.remove_image(&id, &public_id).await?))
}
