//! Image host client
//!
//! Uploads go to the host unsigned, through an upload preset. Deletions are
//! signed with the API secret:
//!
//! ```text
//! signature = hex(sha256("public_id=<id>&timestamp=<unix>" + api_secret))
//! ```
//!
//! The `ImageHost` trait is the seam used by services and handlers so the
//! HTTP client can be swapped out in tests.

use async_trait::async_trait;
use chrono::Utc;
use data_encoding::HEXLOWER;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::config::CloudinaryConfig;

/// Error type for image host operations
#[derive(Debug, thiserror::Error)]
pub enum ImageHostError {
    /// Cloud name or upload preset missing
    #[error("Image host is not configured: {0}")]
    NotConfigured(&'static str),

    /// API key or secret missing; deletion cannot be signed
    #[error("Server configuration error.")]
    MissingCredentials,

    /// The host rejected the upload
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    /// The host refused to delete the image
    #[error("Deletion failed: {0}")]
    DeleteFailed(String),

    /// Network or decoding failure
    #[error("Image host request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// What the host returns for a stored image
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadedImage {
    pub secure_url: String,
    pub public_id: String,
}

/// Remote image storage
#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Store one file and return its delivery URL and identifier
    async fn upload(
        &self,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadedImage, ImageHostError>;

    /// Delete an image. An image the host no longer knows about counts as deleted.
    async fn destroy(&self, public_id: &str) -> Result<(), ImageHostError>;
}

/// Shared image host handle
pub type DynImageHost = Arc<dyn ImageHost>;

/// Error body returned by the host on 4xx/5xx
#[derive(Debug, Deserialize)]
struct HostErrorBody {
    error: HostErrorMessage,
}

#[derive(Debug, Deserialize)]
struct HostErrorMessage {
    message: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

/// Cloudinary REST client
pub struct CloudinaryClient {
    http: reqwest::Client,
    config: CloudinaryConfig,
}

impl CloudinaryClient {
    pub fn new(config: CloudinaryConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Create a shared handle for dependency injection
    pub fn shared(config: CloudinaryConfig) -> DynImageHost {
        Arc::new(Self::new(config))
    }

    fn endpoint(&self, cloud_name: &str, action: &str) -> String {
        format!(
            "{}/{}/image/{}",
            self.config.api_base.trim_end_matches('/'),
            cloud_name,
            action
        )
    }

    fn cloud_name(&self) -> Result<&str, ImageHostError> {
        self.config
            .cloud_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(ImageHostError::NotConfigured("cloud name is not set"))
    }
}

async fn host_error_message(response: reqwest::Response) -> String {
    let status = response.status();
    match response.json::<HostErrorBody>().await {
        Ok(body) => body.error.message,
        Err(_) => format!("HTTP {}", status),
    }
}

#[async_trait]
impl ImageHost for CloudinaryClient {
    async fn upload(
        &self,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadedImage, ImageHostError> {
        let cloud_name = self.cloud_name()?;
        let preset = self
            .config
            .upload_preset
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(ImageHostError::NotConfigured("upload preset is not set"))?;

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(content_type)?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("upload_preset", preset.to_string());

        let response = self
            .http
            .post(self.endpoint(cloud_name, "upload"))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let message = host_error_message(response).await;
            tracing::warn!("Image upload of {} rejected: {}", file_name, message);
            return Err(ImageHostError::UploadFailed(message));
        }

        let uploaded: UploadedImage = response.json().await?;
        tracing::debug!("Uploaded {} as {}", file_name, uploaded.public_id);
        Ok(uploaded)
    }

    async fn destroy(&self, public_id: &str) -> Result<(), ImageHostError> {
        let (api_key, api_secret) = match (
            self.config.api_key.as_deref().filter(|s| !s.is_empty()),
            self.config.api_secret.as_deref().filter(|s| !s.is_empty()),
        ) {
            (Some(key), Some(secret)) => (key, secret),
            _ => {
                tracing::error!("Image host API key or secret not configured for deletion");
                return Err(ImageHostError::MissingCredentials);
            }
        };
        let cloud_name = self.cloud_name()?;

        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign_params(
            &[("public_id", public_id), ("timestamp", timestamp.as_str())],
            api_secret,
        );

        let response = self
            .http
            .post(self.endpoint(cloud_name, "destroy"))
            .form(&[
                ("public_id", public_id),
                ("timestamp", timestamp.as_str()),
                ("api_key", api_key),
                ("signature", signature.as_str()),
                ("signature_algorithm", "sha256"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let message = host_error_message(response).await;
            tracing::error!("Image deletion of {} failed: {}", public_id, message);
            return Err(ImageHostError::DeleteFailed(message));
        }

        let body: DestroyResponse = response.json().await?;
        match body.result.as_str() {
            "ok" | "not found" => {
                tracing::info!("Deleted image {} ({})", public_id, body.result);
                Ok(())
            }
            other => {
                tracing::error!("Image deletion of {} failed: {}", public_id, other);
                Err(ImageHostError::DeleteFailed(other.to_string()))
            }
        }
    }
}

/// Build the string that gets signed: parameters sorted by name, joined as a query string.
pub fn signing_payload(params: &[(&str, &str)]) -> String {
    let mut sorted: Vec<&(&str, &str)> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Hex SHA-256 signature over the payload and secret.
pub fn sign_params(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(signing_payload(params).as_bytes());
    hasher.update(api_secret.as_bytes());
    HEXLOWER.encode(&hasher.finalize())
}
