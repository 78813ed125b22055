//! Services layer - Business logic
//!
//! Services implement the rules of the admin panel on top of the
//! repositories, the image host and the cache:
//! - validation with per-field error reporting
//! - image list ordering and host cleanup
//! - credential checks and login throttling

pub mod blog;
pub mod credentials;
pub mod gallery;
pub mod images;
pub mod markdown;
pub mod password;
pub mod rate_limiter;
pub mod validation;

pub use blog::{generate_slug, is_valid_slug, BlogService, BlogServiceError, PostPreview};
pub use credentials::{CredentialError, CredentialService};
pub use gallery::{GalleryService, GalleryServiceError};
pub use images::{ImageService, ImageServiceError, MoveDirection, UploadReport};
pub use markdown::MarkdownRenderer;
pub use password::{hash_password, verify_password};
pub use rate_limiter::LoginRateLimiter;
pub use validation::FieldErrors;
