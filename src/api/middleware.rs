//! API middleware
//!
//! Contains:
//! - `AppState`, the shared service handles
//! - `ApiError`, the JSON error envelope and its status mapping
//! - token and client address extraction
//! - `require_auth`, which resolves the effective user for admin routes

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use crate::auth::{
    AuthError, AuthService, DynIdentityProvider, EffectiveUser, RequestTokens, PROVIDER_COOKIE, SESSION_COOKIE,
};
use crate::cache::{create_cache, SharedCache};
use crate::cloudinary::{DynImageHost, ImageHostError};
use crate::config::Config;
use crate::db::repositories::{
    SqlxBlogRepository, SqlxGalleryRepository, SqlxSessionRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::services::{
    BlogService, BlogServiceError, CredentialError, CredentialService, GalleryService, GalleryServiceError,
    ImageService, ImageServiceError,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub credentials: Arc<CredentialService>,
    pub gallery: Arc<GalleryService>,
    pub blog: Arc<BlogService>,
    pub images: Arc<ImageService>,
    pub cache: SharedCache,
    /// Directory holding the built admin single-page app
    pub admin_dir: Arc<PathBuf>,
}

impl AppState {
    /// Wire services over a migrated pool, an image host and an identity provider
    pub fn new(config: &Config, pool: DynDatabasePool, host: DynImageHost, provider: DynIdentityProvider) -> Self {
        let cache = create_cache(&config.cache);
        let images = Arc::new(ImageService::new(host, config.upload.clone()));
        let credentials = Arc::new(CredentialService::new(SqlxUserRepository::boxed(pool.clone())));
        let auth = Arc::new(AuthService::new(
            credentials.clone(),
            SqlxSessionRepository::boxed(pool.clone()),
            provider,
            &config.auth,
        ));
        let gallery = Arc::new(GalleryService::new(
            SqlxGalleryRepository::boxed(pool.clone()),
            images.clone(),
            cache.clone(),
        ));
        let blog = Arc::new(BlogService::new(SqlxBlogRepository::boxed(pool), images.clone(), cache.clone()));

        Self {
            auth,
            credentials,
            gallery,
            blog,
            images,
            cache,
            admin_dir: Arc::new(config.admin.static_dir.clone()),
        }
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub EffectiveUser);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            "RATE_LIMIT" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

fn internal(e: impl std::fmt::Display) -> ApiError {
    tracing::error!("Request failed: {}", e);
    ApiError::internal_error("An internal error occurred")
}

impl From<ImageServiceError> for ApiError {
    fn from(e: ImageServiceError) -> Self {
        match e {
            ImageServiceError::TooManyFiles { .. } | ImageServiceError::NoFiles => {
                ApiError::validation_error(e.to_string())
            }
            ImageServiceError::NotFound(_) => ApiError::not_found(e.to_string()),
            ImageServiceError::Host(ImageHostError::MissingCredentials) => {
                tracing::error!("Image host credentials are not configured");
                ApiError::internal_error(ImageHostError::MissingCredentials.to_string())
            }
            ImageServiceError::Host(host) => {
                tracing::error!("Image host error: {}", host);
                ApiError::new("IMAGE_HOST_ERROR", host.to_string())
            }
        }
    }
}

impl From<GalleryServiceError> for ApiError {
    fn from(e: GalleryServiceError) -> Self {
        match e {
            GalleryServiceError::NotFound(_) => ApiError::not_found("Gallery event not found"),
            GalleryServiceError::Validation(fields) => {
                ApiError::with_details("VALIDATION_ERROR", "Please correct the highlighted fields.", fields.to_json())
            }
            GalleryServiceError::Image(e) => e.into(),
            GalleryServiceError::InternalError(e) => internal(e),
        }
    }
}

impl From<BlogServiceError> for ApiError {
    fn from(e: BlogServiceError) -> Self {
        match e {
            BlogServiceError::NotFound(_) => ApiError::not_found("Blog post not found"),
            BlogServiceError::Validation(fields) => {
                ApiError::with_details("VALIDATION_ERROR", "Please correct the highlighted fields.", fields.to_json())
            }
            BlogServiceError::SlugConflict(slug) => ApiError::with_details(
                "CONFLICT",
                "Another post already uses this slug.",
                serde_json::json!({ "slug": slug }),
            ),
            BlogServiceError::Image(e) => e.into(),
            BlogServiceError::InternalError(e) => internal(e),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials => ApiError::unauthorized(e.to_string()),
            AuthError::RateLimited => ApiError::new("RATE_LIMIT", e.to_string()),
            AuthError::Credential(CredentialError::ValidationError(msg)) => ApiError::validation_error(msg),
            AuthError::Credential(CredentialError::UserExists(name)) => {
                ApiError::conflict(format!("User already exists: {}", name))
            }
            AuthError::Credential(CredentialError::InternalError(e)) | AuthError::InternalError(e) => internal(e),
        }
    }
}

/// Value of a named cookie
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

/// Extract session token: `Authorization: Bearer` first, then the session cookie
fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.to_string());
            }
        }
    }
    cookie_value(headers, SESSION_COOKIE)
}

/// Session and provider tokens carried by a request
#[derive(Debug, Clone, Default)]
pub struct AuthTokens {
    pub provider: Option<String>,
    pub session: Option<String>,
}

impl AuthTokens {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            provider: cookie_value(headers, PROVIDER_COOKIE),
            session: extract_session_token(headers),
        }
    }

    pub fn as_request(&self) -> RequestTokens<'_> {
        RequestTokens {
            provider: self.provider.as_deref(),
            session: self.session.as_deref(),
        }
    }
}

impl<S> FromRequestParts<S> for AuthTokens
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

/// Client address: proxy headers first, then the socket peer
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub Option<IpAddr>);

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim);
    let real = headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .map(str::trim);
    forwarded.or(real).and_then(|ip| ip.parse().ok())
}

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip());
        Ok(ClientIp(forwarded_ip(&parts.headers).or(peer)))
    }
}

/// Append `Set-Cookie` headers to a response
pub fn with_cookies(mut response: Response, cookies: &[String]) -> Response {
    for cookie in cookies {
        match HeaderValue::from_str(cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::warn!("Dropping malformed cookie: {}", e),
        }
    }
    response
}

/// Authentication middleware
///
/// Resolves the effective user; cookie changes from the resolution are
/// attached to the response whether or not the request is let through.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let tokens = AuthTokens::from_headers(request.headers());
    let resolution = match state.auth.resolve(tokens.as_request()).await {
        Ok(resolution) => resolution,
        Err(e) => return ApiError::from(e).into_response(),
    };

    let response = match resolution.state.effective_user() {
        Some(user) => {
            request.extensions_mut().insert(AuthenticatedUser(user));
            next.run(request).await
        }
        None => ApiError::unauthorized("Invalid or expired session").into_response(),
    };
    with_cookies(response, &resolution.cookies)
}
