//! Image list management
//!
//! Gallery events and blog posts both carry an ordered list of hosted
//! images. This module owns the rules for that list:
//! - uploads respect the per-list file limit and the per-file size/type limits
//! - new images are appended after the highest existing `order`
//! - moving an image swaps its `order` with its neighbour
//! - removing an image deletes it from the host first, then re-sequences
//!
//! After any reorder, remove or save, sibling `order` values are unique.

use serde::{Deserialize, Serialize};

use crate::cloudinary::{DynImageHost, ImageHostError};
use crate::config::UploadConfig;
use crate::models::CloudinaryImage;

/// Prefix of placeholder ids for images whose upload has not finished.
/// Such images were never stored on the host.
pub const TEMP_ID_PREFIX: &str = "uploading-";

/// Error type for image operations
#[derive(Debug, thiserror::Error)]
pub enum ImageServiceError {
    #[error("You can upload a maximum of {max} images.")]
    TooManyFiles { max: usize },

    #[error("No files were provided")]
    NoFiles,

    #[error("Image not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Host(#[from] ImageHostError),
}

/// Direction of a manual reorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveDirection {
    Up,
    Down,
}

/// Sort images by `order`, keeping the relative position of equal orders.
pub fn sort_by_order(images: &mut [CloudinaryImage]) {
    images.sort_by_key(|img| img.order);
}

/// Order for the next appended image: one past the highest, or 0 for an empty list.
pub fn next_order(images: &[CloudinaryImage]) -> i64 {
    images.iter().map(|img| img.order).max().map_or(0, |max| max + 1)
}

/// Sort, then renumber orders as 0..n.
pub fn normalize_orders(images: &mut [CloudinaryImage]) {
    sort_by_order(images);
    for (idx, img) in images.iter_mut().enumerate() {
        img.order = idx as i64;
    }
}

/// Swap the `order` of the image at `index` with its neighbour and re-sort.
///
/// Returns false (and leaves the list untouched) when the move would leave the list.
pub fn move_image(images: &mut [CloudinaryImage], index: usize, direction: MoveDirection) -> bool {
    let target = match direction {
        MoveDirection::Up => index.checked_sub(1),
        MoveDirection::Down => index.checked_add(1),
    };
    let target = match target {
        Some(t) if t < images.len() && index < images.len() => t,
        _ => return false,
    };

    let order = images[index].order;
    images[index].order = images[target].order;
    images[target].order = order;
    sort_by_order(images);
    true
}

/// A file received from the editor, not yet uploaded
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// A file that was not stored, with the reason shown to the editor
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedFile {
    pub file_name: String,
    pub reason: String,
}

/// Outcome of a batch upload
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReport {
    pub uploaded: Vec<CloudinaryImage>,
    pub rejected: Vec<RejectedFile>,
}

/// Uploads, deletions and list edits against the image host
pub struct ImageService {
    host: DynImageHost,
    limits: UploadConfig,
}

impl ImageService {
    pub fn new(host: DynImageHost, limits: UploadConfig) -> Self {
        Self { host, limits }
    }

    /// Upload a batch of files for a list that already holds `existing_count` images.
    ///
    /// The whole batch is refused when it would exceed the file limit.
    /// Oversize, wrong-type and failed files are skipped and reported;
    /// the rest get consecutive orders starting at `first_order`.
    pub async fn upload_batch(
        &self,
        files: Vec<IncomingFile>,
        existing_count: usize,
        first_order: i64,
    ) -> Result<UploadReport, ImageServiceError> {
        if files.is_empty() {
            return Err(ImageServiceError::NoFiles);
        }
        if existing_count.saturating_add(files.len()) > self.limits.max_files {
            return Err(ImageServiceError::TooManyFiles {
                max: self.limits.max_files,
            });
        }

        let mut report = UploadReport::default();
        let mut order = first_order;
        let max_mb = self.limits.max_file_size / (1024 * 1024);

        for file in files {
            if file.bytes.len() as u64 > self.limits.max_file_size {
                report.rejected.push(RejectedFile {
                    reason: format!("{} exceeds the {}MB size limit.", file.file_name, max_mb),
                    file_name: file.file_name,
                });
                continue;
            }
            if !self.limits.is_type_allowed(&file.content_type) {
                report.rejected.push(RejectedFile {
                    reason: format!("{} is not a supported image type.", file.file_name),
                    file_name: file.file_name,
                });
                continue;
            }

            match self
                .host
                .upload(&file.file_name, &file.content_type, file.bytes)
                .await
            {
                Ok(stored) => {
                    report.uploaded.push(CloudinaryImage {
                        secure_url: stored.secure_url,
                        public_id: stored.public_id,
                        order,
                    });
                    order += 1;
                }
                Err(e) => {
                    tracing::warn!("Upload of {} failed: {}", file.file_name, e);
                    report.rejected.push(RejectedFile {
                        reason: format!("Error uploading {}: {}", file.file_name, e),
                        file_name: file.file_name,
                    });
                }
            }
        }

        tracing::info!(
            "Uploaded {} image(s), rejected {}",
            report.uploaded.len(),
            report.rejected.len()
        );
        Ok(report)
    }

    /// Delete one image from the host. Placeholder ids never reach the host.
    pub async fn delete(&self, public_id: &str) -> Result<(), ImageServiceError> {
        if public_id.starts_with(TEMP_ID_PREFIX) {
            return Ok(());
        }
        self.host.destroy(public_id).await?;
        Ok(())
    }

    /// Remove an image from a list.
    ///
    /// The host deletion happens first; if it fails the caller keeps its list
    /// unchanged. On success the remaining images are renumbered 0..n.
    pub async fn remove_from(
        &self,
        images: &[CloudinaryImage],
        public_id: &str,
    ) -> Result<Vec<CloudinaryImage>, ImageServiceError> {
        if !images.iter().any(|img| img.public_id == public_id) {
            return Err(ImageServiceError::NotFound(public_id.to_string()));
        }

        self.delete(public_id).await?;

        let mut remaining: Vec<CloudinaryImage> = images
            .iter()
            .filter(|img| img.public_id != public_id)
            .cloned()
            .collect();
        normalize_orders(&mut remaining);
        Ok(remaining)
    }

    /// Best-effort deletion of every image in a list. Returns the ids that could not be deleted.
    pub async fn purge(&self, images: &[CloudinaryImage]) -> Vec<String> {
        let mut failed = Vec::new();
        for img in images {
            if let Err(e) = self.delete(&img.public_id).await {
                tracing::warn!("Could not delete image {}: {}", img.public_id, e);
                failed.push(img.public_id.clone());
            }
        }
        failed
    }
}
