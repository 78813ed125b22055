//! Blog admin endpoints
//!
//! Same shape as the gallery endpoints, plus
//! POST /api/admin/blog/preview for rendering editor markdown.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::gallery::{DeleteResponse, MoveImageRequest};
use crate::api::middleware::{ApiError, AppState};
use crate::models::{BlogPost, BlogPostInput};
use crate::services::PostPreview;

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub markdown: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_posts).post(create_post))
        .route("/preview", post(preview))
        .route("/{id}", get(get_post).put(update_post).delete(delete_post))
        .route("/{id}/images/move", post(move_image))
        .route("/{id}/images/{*public_id}", delete(remove_image))
}

async fn list_posts(State(state): State<AppState>) -> Result<Json<Vec<BlogPost>>, ApiError> {
    Ok(Json(state.blog.list().await?))
}

async fn create_post(
    State(state): State<AppState>,
    Json(input): Json<BlogPostInput>,
) -> Result<(StatusCode, Json<BlogPost>), ApiError> {
    let post = state.blog.create(input).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn get_post(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<BlogPost>, ApiError> {
    Ok(Json(state.blog.get(&id).await?))
}

async fn update_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<BlogPostInput>,
) -> Result<Json<BlogPost>, ApiError> {
    Ok(Json(state.blog.update(&id, input).await?))
}

async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let failed_images = state.blog.delete(&id).await?;
    Ok(Json(DeleteResponse {
        success: true,
        failed_images,
    }))
}

async fn move_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<MoveImageRequest>,
) -> Result<Json<BlogPost>, ApiError> {
    Ok(Json(state.blog.move_image(&id, body.index, body.direction).await?))
}

async fn remove_image(
    State(state): State<AppState>,
    Path((id, public_id)): Path<(String, String)>,
) -> Result<Json<BlogPost>, ApiError> {
    Ok(Json(state.blog.remove_image(&id, &public_id).await?))
}

/// POST /api/admin/blog/preview
async fn preview(State(state): State<AppState>, Json(body): Json<PreviewRequest>) -> Json<PostPreview> {
    Json(state.blog.preview(&body.markdown))
}
