//! Public read API used by the club website
//!
//! - GET /api/gallery - all gallery events, most recent date first
//! - GET /api/blog - all blog posts, newest first, with `isEdited`
//!
//! Responses are cached until the next write. CORS allows exactly one
//! origin, `GET`/`OPTIONS` and the `Content-Type` header.

use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::api::middleware::AppState;
use crate::cache::{keys, CacheLayer};
use crate::models::BlogPost;

/// Blog post as published, with the derived edit flag
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicBlogPost {
    #[serde(flatten)]
    pub post: BlogPost,
    pub is_edited: bool,
}

impl From<BlogPost> for PublicBlogPost {
    fn from(post: BlogPost) -> Self {
        let is_edited = post.is_edited();
        Self { post, is_edited }
    }
}

/// Error body of the public endpoints
fn failure(message: &str, detail: impl std::fmt::Display) -> Response {
    tracing::error!("{}: {}", message, detail);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "message": message, "error": detail.to_string() })),
    )
        .into_response()
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);
    match HeaderValue::from_str(origin) {
        Ok(value) => layer.allow_origin(value),
        Err(e) => {
            tracing::warn!("Invalid public origin {:?}: {}; CORS disabled", origin, e);
            layer
        }
    }
}

pub fn router(public_origin: &str) -> Router<AppState> {
    Router::new()
        .route("/gallery", get(gallery))
        .route("/blog", get(blog))
        .layer(cors_layer(public_origin))
}

async fn cached(state: &AppState, key: &str) -> Option<serde_json::Value> {
    match state.cache.get::<serde_json::Value>(key).await {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Cache read for {} failed: {}", key, e);
            None
        }
    }
}

async fn store(state: &AppState, key: &str, value: &serde_json::Value) {
    if let Err(e) = state.cache.set(key, value, state.cache.default_ttl()).await {
        tracing::warn!("Cache write for {} failed: {}", key, e);
    }
}

/// GET /api/gallery
async fn gallery(State(state): State<AppState>) -> Response {
    if let Some(body) = cached(&state, keys::PUBLIC_GALLERY).await {
        return Json(body).into_response();
    }

    let events = match state.gallery.list().await {
        Ok(events) => events,
        Err(e) => return failure("Failed to fetch gallery events", e),
    };
    let body = match serde_json::to_value(&events) {
        Ok(body) => body,
        Err(e) => return failure("Failed to fetch gallery events", e),
    };
    store(&state, keys::PUBLIC_GALLERY, &body).await;
    Json(body).into_response()
}

/// GET /api/blog
async fn blog(State(state): State<AppState>) -> Response {
    if let Some(body) = cached(&state, keys::PUBLIC_BLOG).await {
        return Json(body).into_response();
    }

    let posts = match state.blog.list().await {
        Ok(posts) => posts,
        Err(e) => return failure("Failed to fetch blog posts", e),
    };
    let public: Vec<PublicBlogPost> = posts.into_iter().map(PublicBlogPost::from).collect();
    let body = match serde_json::to_value(&public) {
        Ok(body) => body,
        Err(e) => return failure("Failed to fetch blog posts", e),
    };
    store(&state, keys::PUBLIC_BLOG, &body).await;
    Json(body).into_response()
}
