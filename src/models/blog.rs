//! Blog post model
//!
//! This module provides:
//! - `BlogPost` entity, a markdown article with an image slideshow
//! - `PostStatus` enum for publication states
//! - `BlogPostInput`, the editor payload for create and update

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::CloudinaryImage;

/// Blog post entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    /// Store-assigned identifier
    pub id: String,
    pub title: String,
    pub author: String,
    /// URL-safe unique slug
    pub slug: String,
    /// Short summary shown in listings
    pub excerpt: String,
    pub tags: Vec<String>,
    /// Slideshow images in display order
    pub image_slideshow: Vec<CloudinaryImage>,
    /// Markdown body
    pub content_markdown: String,
    pub status: PostStatus,
    pub created_at: DateTime<Utc>,
    pub last_edited_at: DateTime<Utc>,
}

impl BlogPost {
    /// A post counts as edited once it has been saved after creation.
    pub fn is_edited(&self) -> bool {
        self.last_edited_at > self.created_at
    }
}

/// Blog post publication status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    /// Not shown on the public site
    #[default]
    Draft,
    /// Visible to the public site
    Published,
}

impl PostStatus {
    /// Convert status to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
        }
    }

    /// Parse status from its string form
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Some(PostStatus::Draft),
            "published" => Some(PostStatus::Published),
            _ => None,
        }
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tags as sent by the editor: either a list or one comma-separated string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagsInput {
    List(Vec<String>),
    Text(String),
}

impl Default for TagsInput {
    fn default() -> Self {
        TagsInput::List(Vec::new())
    }
}

impl TagsInput {
    /// Split, trim and drop empty entries.
    pub fn normalize(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            TagsInput::List(items) => items.iter().map(String::as_str).collect(),
            TagsInput::Text(text) => text.split(',').collect(),
        };
        raw.into_iter()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// A non-blank comma string with an empty entry, such as `"a,,b"` or `"a,"`.
    /// Lists are already split, so their blank entries are just dropped.
    pub fn has_empty_segment(&self) -> bool {
        match self {
            TagsInput::List(_) => false,
            TagsInput::Text(text) => !text.trim().is_empty() && text.split(',').any(|t| t.trim().is_empty()),
        }
    }
}

/// Input for creating or replacing a blog post
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPostInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    /// Generated from the title when left empty on create
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub tags: TagsInput,
    #[serde(default)]
    pub image_slideshow: Vec<CloudinaryImage>,
    #[serde(default)]
    pub content_markdown: String,
    /// `draft` or `published`; defaults to draft
    #[serde(default)]
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_tags_from_comma_string() {
        let tags: TagsInput = serde_json::from_value(serde_json::json!(" karate, , kids ,grading")).unwrap();
        assert_eq!(tags.normalize(), vec!["karate", "kids", "grading"]);
    }

    #[test]
    fn test_tags_from_list() {
        let tags: TagsInput = serde_json::from_value(serde_json::json!(["kata", "  ", " bo "])).unwrap();
        assert_eq!(tags.normalize(), vec!["kata", "bo"]);
        assert!(!tags.has_empty_segment());
    }

    #[test]
    fn test_tags_empty_segment() {
        assert!(TagsInput::Text("kata,,kids".to_string()).has_empty_segment());
        assert!(TagsInput::Text("kata, ".to_string()).has_empty_segment());
        assert!(!TagsInput::Text("kata, kids".to_string()).has_empty_segment());
        assert!(!TagsInput::Text("   ".to_string()).has_empty_segment());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(PostStatus::parse("Published"), Some(PostStatus::Published));
        assert_eq!(PostStatus::parse("draft"), Some(PostStatus::Draft));
        assert_eq!(PostStatus::parse("archived"), None);
    }

    #[test]
    fn test_is_edited_is_strict() {
        let now = Utc::now();
        let mut post = BlogPost {
            id: "p1".into(),
            title: "Title".into(),
            author: "Sensei".into(),
            slug: "title".into(),
            excerpt: "An excerpt".into(),
            tags: vec![],
            image_slideshow: vec![],
            content_markdown: String::new(),
            status: PostStatus::Draft,
            created_at: now,
            last_edited_at: now,
        };
        assert!(!post.is_edited());

        post.last_edited_at = now + Duration::seconds(1);
        assert!(post.is_edited());
    }
}
