//! Dashboard endpoints

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::auth::EffectiveUser;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub gallery_count: i64,
    pub blog_count: i64,
    /// Name to greet the signed-in user with
    pub greeting_name: String,
    pub user: EffectiveUser,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/stats", get(stats))
}

/// GET /api/admin/stats
async fn stats(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<DashboardStats>, ApiError> {
    let (gallery_count, blog_count) = tokio::try_join!(
        async { state.gallery.count().await.map_err(ApiError::from) },
        async { state.blog.count().await.map_err(ApiError::from) },
    )?;

    Ok(Json(DashboardStats {
        gallery_count,
        blog_count,
        greeting_name: user.display_name().to_string(),
        user,
    }))
}
