//! Hosted image reference

use serde::{Deserialize, Serialize};

/// An image stored on the image host, positioned within its parent list by `order`.
///
/// Field names follow the host's upload response so the records can be
/// passed straight through to the public site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudinaryImage {
    /// Delivery URL (https)
    pub secure_url: String,
    /// Host-side identifier, used for deletion
    pub public_id: String,
    /// Position within the parent list
    pub order: i64,
}

impl CloudinaryImage {
    pub fn new(secure_url: impl Into<String>, public_id: impl Into<String>, order: i64) -> Self {
        Self {
            secure_url: secure_url.into(),
            public_id: public_id.into(),
            order,
        }
    }
}
