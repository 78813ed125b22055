//! External identity provider
//!
//! Verifies provider ID tokens through the Identity Toolkit `accounts:lookup`
//! endpoint. A token the provider rejects means "nobody signed in"; only
//! transport failures and unexpected responses are errors.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use super::resolver::ProviderIdentity;
use crate::config::ProviderConfig;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Identity provider returned {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Identity provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Who the token belongs to, or `None` if the token is not valid
    async fn verify(&self, id_token: &str) -> Result<Option<ProviderIdentity>, ProviderError>;
}

pub type DynIdentityProvider = Arc<dyn IdentityProvider>;

/// Provider used when no identity provider is configured
pub struct DisabledProvider;

#[async_trait]
impl IdentityProvider for DisabledProvider {
    async fn verify(&self, _id_token: &str) -> Result<Option<ProviderIdentity>, ProviderError> {
        Ok(None)
    }
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    email: Option<String>,
    display_name: Option<String>,
    #[serde(default)]
    disabled: bool,
}

#[derive(Debug, Deserialize)]
struct LookupError {
    error: LookupErrorMessage,
}

#[derive(Debug, Deserialize)]
struct LookupErrorMessage {
    message: String,
}

/// Firebase Authentication over REST
pub struct FirebaseIdentityProvider {
    http: reqwest::Client,
    lookup_url: String,
    api_key: String,
}

impl FirebaseIdentityProvider {
    pub fn new(lookup_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            lookup_url: lookup_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Build the provider described by the configuration
    pub fn from_config(config: &ProviderConfig) -> DynIdentityProvider {
        match config.api_key.as_deref().filter(|k| !k.is_empty()) {
            Some(key) if config.enabled => {
                tracing::info!("Identity provider enabled");
                Arc::new(Self::new(config.lookup_url.clone(), key))
            }
            _ => {
                tracing::info!("Identity provider disabled; only local logins are accepted");
                Arc::new(DisabledProvider)
            }
        }
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentityProvider {
    async fn verify(&self, id_token: &str) -> Result<Option<ProviderIdentity>, ProviderError> {
        let response = self
            .http
            .post(&self.lookup_url)
            .query(&[("key", self.api_key.as_str())])
            .json(&serde_json::json!({ "idToken": id_token }))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::BAD_REQUEST {
            // INVALID_ID_TOKEN, TOKEN_EXPIRED, USER_NOT_FOUND
            let reason = response
                .json::<LookupError>()
                .await
                .map(|e| e.error.message)
                .unwrap_or_default();
            tracing::debug!("Provider token rejected: {}", reason);
            return Ok(None);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: LookupResponse = response.json().await?;
        Ok(body
            .users
            .into_iter()
            .find(|u| !u.disabled)
            .map(|u| ProviderIdentity {
                uid: u.local_id,
                email: u.email,
                display_name: u.display_name,
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use std::collections::HashMap;

    async fn fake_lookup(
        Query(query): Query<HashMap<String, String>>,
        Json(body): Json<serde_json::Value>,
    ) -> (StatusCode, Json<serde_json::Value>) {
        if query.get("key").map(String::as_str) != Some("web-key") {
            return (StatusCode::FORBIDDEN, Json(serde_json::json!({})));
        }
        match body["idToken"].as_str() {
            Some("good") => (
                StatusCode::OK,
                Json(serde_json::json!({
                    "users": [{ "localId": "abc", "email": "coach@example.org", "displayName": "Coach" }]
                })),
            ),
            Some("disabled") => (
                StatusCode::OK,
                Json(serde_json::json!({ "users": [{ "localId": "x", "disabled": true }] })),
            ),
            _ => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": { "message": "INVALID_ID_TOKEN" } })),
            ),
        }
    }

    async fn spawn_lookup() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = Router::new().route("/v1/lookup", post(fake_lookup));
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/v1/lookup", addr)
    }

    #[tokio::test]
    async fn test_verify_valid_token() {
        let url = spawn_lookup().await;
        let provider = FirebaseIdentityProvider::new(url, "web-key");

        let identity = provider.verify("good").await.unwrap().unwrap();
        assert_eq!(identity.uid, "abc");
        assert_eq!(identity.display_name.as_deref(), Some("Coach"));
    }

    #[tokio::test]
    async fn test_invalid_or_disabled_token_is_none() {
        let url = spawn_lookup().await;
        let provider = FirebaseIdentityProvider::new(url, "web-key");

        assert!(provider.verify("expired").await.unwrap().is_none());
        assert!(provider.verify("disabled").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_wrong_key_is_error() {
        let url = spawn_lookup().await;
        let provider = FirebaseIdentityProvider::new(url, "other-key");

        let err = provider.verify("good").await.unwrap_err();
        assert!(matches!(err, ProviderError::Rejected { status: 403, .. }));
    }

    #[test]
    fn test_disabled_unless_configured() {
        let config = ProviderConfig::default();
        let provider = FirebaseIdentityProvider::from_config(&config);
        let result = tokio_test::block_on(provider.verify("anything")).unwrap();
        assert!(result.is_none());
    }
}
