//! API layer - HTTP handlers and routing
//!
//! - Auth endpoints (login, logout, session)
//! - Admin endpoints for gallery events, blog posts, images and stats
//! - Public read endpoints for the club website
//! - Admin shell pages and assets

pub mod admin_shell;
pub mod auth;
pub mod blog;
pub mod dashboard;
pub mod gallery;
pub mod images;
pub mod middleware;
pub mod public;

use axum::{middleware as axum_middleware, Router};
use tower_http::trace::TraceLayer;

use crate::config::Config;

pub use middleware::{ApiError, AppState, AuthenticatedUser};

/// Build the `/api` router
pub fn build_api_router(state: AppState, config: &Config) -> Router<AppState> {
    // Everything under /admin needs an effective user
    let admin_routes = Router::new()
        .nest("/gallery", gallery::router())
        .nest("/blog", blog::router())
        .nest("/images", images::router(&config.upload))
        .merge(dashboard::router())
        .route_layer(axum_middleware::from_fn_with_state(state, middleware::require_auth));

    Router::new()
        .nest("/auth", auth::router())
        .nest("/admin", admin_routes)
        .merge(public::router(&config.server.public_origin))
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, config: &Config) -> Router {
    Router::new()
        .nest("/api", build_api_router(state.clone(), config))
        .merge(admin_shell::router(&config.admin.static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
