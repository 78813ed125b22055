//! Admin shell
//!
//! Serves the admin single-page app. Page routes (`/`, `/login`, `/admin`,
//! `/admin/*`) pass through the route guard and get `index.html`; built
//! assets are served straight from the static directory.

use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use std::path::Path;
use tower_http::services::ServeDir;

use crate::api::middleware::{with_cookies, AppState, AuthTokens};
use crate::auth::{decide_route, RouteDecision, DASHBOARD_PATH};

const LOADING_PAGE: &str = "<!doctype html><html><head><meta charset=\"utf-8\">\
<meta http-equiv=\"refresh\" content=\"1\"><title>Loading</title></head>\
<body><p>Loading...</p></body></html>";

pub fn router(static_dir: &Path) -> Router<AppState> {
    Router::new()
        .route("/", get(shell))
        .route("/login", get(shell))
        .route("/admin", get(shell))
        .route("/admin/{*path}", get(shell))
        .nest_service("/assets", ServeDir::new(static_dir.join("assets")))
        .fallback_service(ServeDir::new(static_dir))
}

async fn shell(State(state): State<AppState>, tokens: AuthTokens, uri: Uri) -> Response {
    let resolution = match state.auth.resolve(tokens.as_request()).await {
        Ok(resolution) => resolution,
        Err(e) => {
            tracing::error!("Session resolution failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Session check failed").into_response();
        }
    };

    let path = uri.path();
    // the bare entry points have no page of their own
    let entry = matches!(path.trim_end_matches('/'), "" | "/admin");
    let guarded = if entry { "/admin" } else { path };

    let response = match decide_route(&resolution.state, guarded) {
        RouteDecision::ShowLoading => loading_page(),
        RouteDecision::Redirect(to) => Redirect::to(to).into_response(),
        RouteDecision::Render if entry => Redirect::to(DASHBOARD_PATH).into_response(),
        RouteDecision::Render => serve_index(&state.admin_dir).await,
    };
    with_cookies(response, &resolution.cookies)
}

fn loading_page() -> Response {
    ([(header::REFRESH, "1")], Html(LOADING_PAGE)).into_response()
}

async fn serve_index(static_dir: &Path) -> Response {
    match tokio::fs::read_to_string(static_dir.join("index.html")).await {
        Ok(html) => ([(header::CACHE_CONTROL, "no-cache")], Html(html)).into_response(),
        Err(e) => {
            tracing::warn!("Admin UI index missing in {}: {}", static_dir.display(), e);
            (StatusCode::NOT_FOUND, "Admin UI is not installed").into_response()
        }
    }
}
