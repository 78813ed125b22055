//! Authentication API endpoints
//!
//! - POST /api/auth/login - username/password login
//! - POST /api/auth/logout - end both provider and local sessions
//! - GET /api/auth/session - current effective user

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{with_cookies, ApiError, AppState, AuthTokens, ClientIp};
use crate::auth::EffectiveUser;

/// Request body for user login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub authenticated: bool,
    pub user: Option<EffectiveUser>,
}

/// Build the auth router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/session", get(session))
}

/// POST /api/auth/login
async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    tokens: AuthTokens,
    Json(body): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    if body.username.trim().is_empty() || body.password.is_empty() {
        return Err(ApiError::validation_error("Username and password are required."));
    }

    let outcome = state
        .auth
        .login(&body.username, &body.password, ip, tokens.as_request())
        .await?;

    let response = Json(SessionResponse {
        authenticated: true,
        user: Some(outcome.user),
    })
    .into_response();
    Ok(with_cookies(response, &outcome.cookies))
}

/// POST /api/auth/logout
async fn logout(State(state): State<AppState>, tokens: AuthTokens) -> Result<Response, ApiError> {
    let cookies = state.auth.logout(tokens.as_request()).await?;
    let response = Json(serde_json::json!({ "success": true })).into_response();
    Ok(with_cookies(response, &cookies))
}

/// GET /api/auth/session
async fn session(State(state): State<AppState>, tokens: AuthTokens) -> Result<Response, ApiError> {
    let resolution = state.auth.resolve(tokens.as_request()).await?;
    let user = resolution.state.effective_user();
    let response = Json(SessionResponse {
        authenticated: user.is_some(),
        user,
    })
    .into_response();
    Ok(with_cookies(response, &resolution.cookies))
}
