//! Data models
//!
//! Data structures shared across the service:
//! - Database entities (User, Session, GalleryEvent, BlogPost)
//! - Editor input types
//! - Hosted image references

mod blog;
mod gallery;
mod image;
mod session;
mod user;

pub use blog::{BlogPost, BlogPostInput, PostStatus, TagsInput};
pub use gallery::{GalleryEvent, GalleryEventInput};
pub use image::CloudinaryImage;
pub use session::Session;
pub use user::User;
