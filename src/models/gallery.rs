//! Gallery event model
//!
//! A gallery event is a dated photo album. `photo_count` and `thumbnail_url`
//! are never supplied by callers; they are derived from the image list
//! whenever the event is saved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::CloudinaryImage;

/// Gallery event entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryEvent {
    /// Store-assigned identifier
    pub id: String,
    pub title: String,
    /// When the event took place
    pub date: DateTime<Utc>,
    pub description: String,
    /// Images in display order
    pub images: Vec<CloudinaryImage>,
    /// Number of images
    pub photo_count: i64,
    /// URL of the first image, if any
    pub thumbnail_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GalleryEvent {
    /// Recompute `photo_count` and `thumbnail_url` from `images`.
    pub fn refresh_derived(&mut self) {
        self.photo_count = self.images.len() as i64;
        self.thumbnail_url = self.images.first().map(|img| img.secure_url.clone());
    }
}

/// Input for creating or replacing a gallery event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryEventInput {
    #[serde(default)]
    pub title: String,
    /// RFC 3339 timestamp or a plain `YYYY-MM-DD` date
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub images: Vec<CloudinaryImage>,
}
