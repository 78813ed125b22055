//! Blog service
//!
//! Business logic for blog posts: validation, slug generation and
//! uniqueness, slideshow image handling, markdown preview and cache
//! invalidation.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::cache::{keys, CacheLayer, SharedCache};
use crate::db::repositories::BlogRepository;
use crate::models::{BlogPost, BlogPostInput, CloudinaryImage, PostStatus};
use crate::services::gallery::check_images;
use crate::services::images::{self, ImageService, ImageServiceError, MoveDirection};
use crate::services::markdown::MarkdownRenderer;
use crate::services::validation::FieldErrors;

static SLUG_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("slug pattern is valid")
});
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Error types for blog operations
#[derive(Debug, thiserror::Error)]
pub enum BlogServiceError {
    #[error("Blog post not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(FieldErrors),

    /// Another post already uses the slug
    #[error("Slug already in use: {0}")]
    SlugConflict(String),

    #[error(transparent)]
    Image(#[from] ImageServiceError),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Derive a slug from a title.
///
/// Lowercases, turns whitespace runs into `-` and drops anything that is
/// not a letter, digit, `_` or `-`. The result may still fail slug
/// validation (e.g. underscores, doubled hyphens); the editor then fixes it.
pub fn generate_slug(title: &str) -> String {
    let lowered = title.trim().to_lowercase();
    WHITESPACE
        .replace_all(&lowered, "-")
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_' || *c == '-')
        .collect()
}

/// Whether a slug is lowercase alphanumeric words joined by single hyphens
pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_PATTERN.is_match(slug)
}

/// Rendered editor preview
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPreview {
    pub html: String,
    pub word_count: usize,
}

struct ValidPost {
    title: String,
    author: String,
    slug: String,
    excerpt: String,
    tags: Vec<String>,
    image_slideshow: Vec<CloudinaryImage>,
    content_markdown: String,
    status: PostStatus,
}

fn validate(input: BlogPostInput) -> Result<ValidPost, FieldErrors> {
    let mut errors = FieldErrors::new();

    errors.check_length("title", &input.title, 3, 150, "Title must be at least 3 characters.");
    errors.check_length("author", &input.author, 2, 50, "Author name is required.");
    errors.check_length("excerpt", &input.excerpt, 10, 300, "Excerpt must be at least 10 characters.");

    let slug = match input.slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(slug) => slug.to_string(),
        None => generate_slug(&input.title),
    };
    errors.check_length("slug", &slug, 3, 100, "Slug is required, auto-generated if empty.");
    if !is_valid_slug(&slug) {
        errors.add(
            "slug",
            "Slug can only contain lowercase letters, numbers, and hyphens.",
        );
    }

    let tags = input.tags.normalize();
    if input.tags.has_empty_segment() || tags.iter().any(|t| t.chars().count() > 20) {
        errors.add("tags", "Tags should be comma-separated, each tag max 20 chars.");
    }

    check_images(&mut errors, "imageSlideshow", &input.image_slideshow);

    if input.content_markdown.trim().chars().count() < 50 {
        errors.add("contentMarkdown", "Content must be at least 50 characters.");
    }

    let status = match input.status.as_deref() {
        None | Some("") => Some(PostStatus::Draft),
        Some(raw) => PostStatus::parse(raw),
    };
    if status.is_none() {
        errors.add("status", "Status must be draft or published.");
    }

    match status {
        Some(status) if errors.is_empty() => {
            let mut slideshow = input.image_slideshow;
            images::normalize_orders(&mut slideshow);
            Ok(ValidPost {
                title: input.title.trim().to_string(),
                author: input.author.trim().to_string(),
                slug,
                excerpt: input.excerpt.trim().to_string(),
                tags,
                image_slideshow: slideshow,
                content_markdown: input.content_markdown,
                status,
            })
        }
        _ => Err(errors),
    }
}

/// Blog service
pub struct BlogService {
    repo: Arc<dyn BlogRepository>,
    images: Arc<ImageService>,
    cache: SharedCache,
    renderer: MarkdownRenderer,
}

impl BlogService {
    pub fn new(repo: Arc<dyn BlogRepository>, images: Arc<ImageService>, cache: SharedCache) -> Self {
        Self {
            repo,
            images,
            cache,
            renderer: MarkdownRenderer::new(),
        }
    }

    /// Create a post. An empty slug is generated from the title.
    pub async fn create(&self, input: BlogPostInput) -> Result<BlogPost, BlogServiceError> {
        let valid = validate(input).map_err(BlogServiceError::Validation)?;
        if self.repo.slug_exists(&valid.slug, None).await? {
            return Err(BlogServiceError::SlugConflict(valid.slug));
        }

        let now = Utc::now();
        let post = BlogPost {
            id: Uuid::new_v4().to_string(),
            title: valid.title,
            author: valid.author,
            slug: valid.slug,
            excerpt: valid.excerpt,
            tags: valid.tags,
            image_slideshow: valid.image_slideshow,
            content_markdown: valid.content_markdown,
            status: valid.status,
            created_at: now,
            last_edited_at: now,
        };

        let created = self.repo.create(&post).await?;
        tracing::info!("Created blog post {} ({})", created.id, created.slug);
        self.invalidate().await;
        Ok(created)
    }

    pub async fn get(&self, id: &str) -> Result<BlogPost, BlogServiceError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| BlogServiceError::NotFound(id.to_string()))
    }

    /// All posts, newest first
    pub async fn list(&self) -> Result<Vec<BlogPost>, BlogServiceError> {
        Ok(self.repo.list().await?)
    }

    pub async fn count(&self) -> Result<i64, BlogServiceError> {
        Ok(self.repo.count().await?)
    }

    /// Replace a post's fields. `created_at` is kept, `last_edited_at` refreshed.
    pub async fn update(&self, id: &str, input: BlogPostInput) -> Result<BlogPost, BlogServiceError> {
        let mut post = self.get(id).await?;
        let valid = validate(input).map_err(BlogServiceError::Validation)?;
        if self.repo.slug_exists(&valid.slug, Some(id)).await? {
            return Err(BlogServiceError::SlugConflict(valid.slug));
        }

        post.title = valid.title;
        post.author = valid.author;
        post.slug = valid.slug;
        post.excerpt = valid.excerpt;
        post.tags = valid.tags;
        post.image_slideshow = valid.image_slideshow;
        post.content_markdown = valid.content_markdown;
        post.status = valid.status;
        self.save(post).await
    }

    /// Delete a post after removing its slideshow from the host.
    pub async fn delete(&self, id: &str) -> Result<Vec<String>, BlogServiceError> {
        let post = self.get(id).await?;

        let failed = self.images.purge(&post.image_slideshow).await;
        if !failed.is_empty() {
            tracing::warn!(
                "Blog post {} deleted with {} image(s) left on the host",
                id,
                failed.len()
            );
        }

        if !self.repo.delete(id).await? {
            return Err(BlogServiceError::NotFound(id.to_string()));
        }
        tracing::info!("Deleted blog post {}", id);
        self.invalidate().await;
        Ok(failed)
    }

    pub async fn move_image(
        &self,
        id: &str,
        index: usize,
        direction: MoveDirection,
    ) -> Result<BlogPost, BlogServiceError> {
        let mut post = self.get(id).await?;
        images::sort_by_order(&mut post.image_slideshow);
        if !images::move_image(&mut post.image_slideshow, index, direction) {
            return Ok(post);
        }
        self.save(post).await
    }

    pub async fn remove_image(&self, id: &str, public_id: &str) -> Result<BlogPost, BlogServiceError> {
        let mut post = self.get(id).await?;
        post.image_slideshow = self.images.remove_from(&post.image_slideshow, public_id).await?;
        self.save(post).await
    }

    /// Render markdown the way the public site will show it
    pub fn preview(&self, markdown: &str) -> PostPreview {
        PostPreview {
            html: self.renderer.render(markdown),
            word_count: self.renderer.word_count(markdown),
        }
    }

    async fn save(&self, mut post: BlogPost) -> Result<BlogPost, BlogServiceError> {
        images::normalize_orders(&mut post.image_slideshow);
        post.last_edited_at = Utc::now();

        if !self.repo.update(&post).await? {
            return Err(BlogServiceError::NotFound(post.id));
        }
        tracing::debug!("Saved blog post {}", post.id);
        self.invalidate().await;
        Ok(post)
    }

    async fn invalidate(&self) {
        if let Err(e) = self.cache.delete_prefix(keys::PUBLIC_PREFIX).await {
            tracing::warn!("Failed to invalidate public cache: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_cache;
    use crate::cloudinary::{ImageHost, ImageHostError, UploadedImage};
    use crate::config::{CacheConfig, UploadConfig};
    use crate::db::repositories::SqlxBlogRepository;
    use crate::db::{create_test_pool, migrations};
    use crate::models::TagsInput;
    use async_trait::async_trait;
    use proptest::prelude::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeHost {
        destroyed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ImageHost for FakeHost {
        async fn upload(&self, file_name: &str, _: &str, _: Vec<u8>) -> Result<UploadedImage, ImageHostError> {
            Ok(UploadedImage {
                secure_url: format!("https://img/{}", file_name),
                public_id: file_name.to_string(),
            })
        }

        async fn destroy(&self, public_id: &str) -> Result<(), ImageHostError> {
            self.destroyed.lock().unwrap().push(public_id.to_string());
            Ok(())
        }
    }

    async fn setup_test_service() -> (Arc<FakeHost>, BlogService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let host = Arc::new(FakeHost::default());
        let images = Arc::new(ImageService::new(host.clone(), UploadConfig::default()));
        let cache = create_cache(&CacheConfig::default());
        (host, BlogService::new(SqlxBlogRepository::boxed(pool), images, cache))
    }

    fn input(title: &str, slug: Option<&str>) -> BlogPostInput {
        BlogPostInput {
            title: title.to_string(),
            author: "Sensei Wanjiru".to_string(),
            slug: slug.map(str::to_string),
            excerpt: "What happened at this term's grading".to_string(),
            tags: TagsInput::Text("grading, kids".to_string()),
            image_slideshow: vec![
                CloudinaryImage::new("https://img/2.jpg", "two", 5),
                CloudinaryImage::new("https://img/1.jpg", "one", 1),
            ],
            content_markdown: "Twenty students tested for their next belt this weekend at the dojo.".to_string(),
            status: Some("published".to_string()),
        }
    }

    // ========================================================================
    // Slug rules
    // ========================================================================

    #[test]
    fn test_generate_slug() {
        assert_eq!(generate_slug("Hello World"), "hello-world");
        assert_eq!(generate_slug("Grading: Spring 2024!"), "grading-spring-2024");
        assert_eq!(generate_slug("  Kata   Night "), "kata-night");
        assert_eq!(generate_slug("Dojo_news"), "dojo_news");
    }

    #[test]
    fn test_slug_validation() {
        assert!(is_valid_slug("spring-grading-2024"));
        assert!(!is_valid_slug("Spring-Grading"));
        assert!(!is_valid_slug("spring grading"));
        assert!(!is_valid_slug("spring--grading"));
        assert!(!is_valid_slug("-spring"));
        assert!(!is_valid_slug("dojo_news"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn property_slug_rejects_uppercase_and_spaces(
            word in "[a-z0-9]{1,8}",
            upper in "[A-Z]{1,4}",
        ) {
            let with_upper = format!("{}{}", word, upper);
            let with_space = format!("{} {}", word, word);
            prop_assert!(!is_valid_slug(&with_upper));
            prop_assert!(!is_valid_slug(&with_space));
            let joined = format!("{}-{}", word, word);
            prop_assert!(is_valid_slug(&joined));
        }

        #[test]
        fn property_generated_slug_from_plain_words_is_valid(
            words in prop::collection::vec("[A-Za-z0-9]{1,8}", 1..5),
        ) {
            let slug = generate_slug(&words.join(" "));
            prop_assert!(is_valid_slug(&slug));
        }
    }

    // ========================================================================
    // Validation
    // ========================================================================

    #[test]
    fn test_validate_defaults_and_errors() {
        let mut bad = input("Hi", Some("Bad Slug"));
        bad.author = "A".to_string();
        bad.excerpt = "short".to_string();
        bad.tags = TagsInput::List(vec!["this-tag-is-far-too-long-to-keep".to_string()]);
        bad.content_markdown = "too short".to_string();
        bad.status = Some("archived".to_string());

        let errors = validate(bad).err().unwrap();
        let fields: Vec<&str> = errors.fields().collect();
        assert_eq!(
            fields,
            vec!["author", "contentMarkdown", "excerpt", "slug", "status", "tags", "title"]
        );

        let mut draft = input("Summer Camp Recap", None);
        draft.status = None;
        let valid = validate(draft).ok().unwrap();
        assert_eq!(valid.slug, "summer-camp-recap");
        assert_eq!(valid.status, PostStatus::Draft);
        assert_eq!(valid.tags, vec!["grading", "kids"]);
    }

    #[test]
    fn test_validate_rejects_empty_tag_segment() {
        let mut post = input("Kata Night", Some("kata-night"));
        post.tags = TagsInput::Text("kata,,kids".to_string());

        let errors = validate(post).err().unwrap();
        assert_eq!(
            errors.get("tags"),
            Some("Tags should be comma-separated, each tag max 20 chars.")
        );

        let mut blank = input("Kata Night", Some("kata-night"));
        blank.tags = TagsInput::Text("  ".to_string());
        assert!(validate(blank).ok().unwrap().tags.is_empty());
    }

    // ========================================================================
    // CRUD
    // ========================================================================

    #[tokio::test]
    async fn test_create_generates_slug_and_timestamps() {
        let (_, service) = setup_test_service().await;

        let post = service.create(input("Spring Grading Results", None)).await.unwrap();

        assert_eq!(post.slug, "spring-grading-results");
        assert_eq!(post.created_at, post.last_edited_at);
        assert!(!post.is_edited());
        let orders: Vec<i64> = post.image_slideshow.iter().map(|i| i.order).collect();
        assert_eq!(orders, vec![0, 1]);
        assert_eq!(post.image_slideshow[0].public_id, "one");
    }

    #[tokio::test]
    async fn test_duplicate_slug_conflicts() {
        let (_, service) = setup_test_service().await;
        service.create(input("First Post", Some("dojo-news"))).await.unwrap();

        let err = service.create(input("Second Post", Some("dojo-news"))).await.unwrap_err();
        assert!(matches!(err, BlogServiceError::SlugConflict(ref s) if s == "dojo-news"));
    }

    #[tokio::test]
    async fn test_update_keeps_own_slug_and_marks_edited() {
        let (_, service) = setup_test_service().await;
        let post = service.create(input("Club Newsletter", Some("newsletter"))).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let updated = service
            .update(&post.id, input("Club Newsletter (June)", Some("newsletter")))
            .await
            .unwrap();

        assert_eq!(updated.title, "Club Newsletter (June)");
        assert_eq!(updated.created_at, post.created_at);
        assert!(updated.is_edited());

        let fetched = service.get(&post.id).await.unwrap();
        assert_eq!(fetched.id, post.id);
    }

    #[tokio::test]
    async fn test_delete_purges_slideshow() {
        let (host, service) = setup_test_service().await;
        let post = service.create(input("Seminar Photos", None)).await.unwrap();

        let failed = service.delete(&post.id).await.unwrap();
        assert!(failed.is_empty());
        assert_eq!(host.destroyed.lock().unwrap().len(), 2);
        assert!(matches!(service.get(&post.id).await, Err(BlogServiceError::NotFound(_))));
        assert_eq!(service.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_move_image_swaps_orders() {
        let (_, service) = setup_test_service().await;
        let post = service.create(input("Belt Ceremony", None)).await.unwrap();

        let moved = service.move_image(&post.id, 1, MoveDirection::Up).await.unwrap();
        let ids: Vec<&str> = moved.image_slideshow.iter().map(|i| i.public_id.as_str()).collect();
        assert_eq!(ids, vec!["two", "one"]);

        let removed = service.remove_image(&post.id, "two").await.unwrap();
        assert_eq!(removed.image_slideshow.len(), 1);
        assert_eq!(removed.image_slideshow[0].order, 0);
    }

    #[tokio::test]
    async fn test_preview_renders_markdown() {
        let (_, service) = setup_test_service().await;
        let preview = service.preview("Train **hard** daily");
        assert!(preview.html.contains("<strong>hard</strong>"));
        assert_eq!(preview.word_count, 3);
    }
}
