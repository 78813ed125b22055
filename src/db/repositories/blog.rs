//! Blog post repository
//!
//! Database operations for blog posts. Tags and the image slideshow are
//! stored as JSON text columns.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{BlogPost, CloudinaryImage, PostStatus};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Blog post repository trait
#[async_trait]
pub trait BlogRepository: Send + Sync {
    /// Insert a new post
    async fn create(&self, post: &BlogPost) -> Result<BlogPost>;

    /// Get post by ID
    async fn get_by_id(&self, id: &str) -> Result<Option<BlogPost>>;

    /// List all posts, newest first
    async fn list(&self) -> Result<Vec<BlogPost>>;

    /// Replace an existing post; returns false when no row matched
    async fn update(&self, post: &BlogPost) -> Result<bool>;

    /// Delete a post; returns false when no row matched
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Check whether a slug is taken, optionally ignoring one post
    async fn slug_exists(&self, slug: &str, exclude_id: Option<&str>) -> Result<bool>;

    /// Count posts
    async fn count(&self) -> Result<i64>;
}

/// SQLx-based blog repository implementation
pub struct SqlxBlogRepository {
    pool: DynDatabasePool,
}

impl SqlxBlogRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn BlogRepository> {
        Arc::new(Self::new(pool))
    }
}

/// JSON-encoded columns of a post
struct EncodedPost {
    tags: String,
    slideshow: String,
}

impl EncodedPost {
    fn from_post(post: &BlogPost) -> Result<Self> {
        Ok(Self {
            tags: serde_json::to_string(&post.tags).context("Failed to encode tags")?,
            slideshow: serde_json::to_string(&post.image_slideshow)
                .context("Failed to encode image slideshow")?,
        })
    }
}

#[async_trait]
impl BlogRepository for SqlxBlogRepository {
    async fn create(&self, post: &BlogPost) -> Result<BlogPost> {
        let encoded = EncodedPost::from_post(post)?;
        match self.pool.backend() {
            Backend::Sqlite(p) => create_post_sqlite(p, post, &encoded).await?,
            Backend::Mysql(p) => create_post_mysql(p, post, &encoded).await?,
        }
        Ok(post.clone())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<BlogPost>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => get_post_by_id_sqlite(p, id).await,
            Backend::Mysql(p) => get_post_by_id_mysql(p, id).await,
        }
    }

    async fn list(&self) -> Result<Vec<BlogPost>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => list_posts_sqlite(p).await,
            Backend::Mysql(p) => list_posts_mysql(p).await,
        }
    }

    async fn update(&self, post: &BlogPost) -> Result<bool> {
        let encoded = EncodedPost::from_post(post)?;
        match self.pool.backend() {
            Backend::Sqlite(p) => update_post_sqlite(p, post, &encoded).await,
            Backend::Mysql(p) => update_post_mysql(p, post, &encoded).await,
        }
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let affected = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query("DELETE FROM blog_posts WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .map(|r| r.rows_affected()),
            Backend::Mysql(p) => sqlx::query("DELETE FROM blog_posts WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .map(|r| r.rows_affected()),
        }
        .context("Failed to delete blog post")?;

        Ok(affected > 0)
    }

    async fn slug_exists(&self, slug: &str, exclude_id: Option<&str>) -> Result<bool> {
        let sql = "SELECT COUNT(*) FROM blog_posts WHERE slug = ? AND id <> ?";
        let exclude = exclude_id.unwrap_or("");
        let count = match self.pool.backend() {
            Backend::Sqlite(p) => {
                sqlx::query_scalar::<_, i64>(sql)
                    .bind(slug)
                    .bind(exclude)
                    .fetch_one(p)
                    .await
            }
            Backend::Mysql(p) => {
                sqlx::query_scalar::<_, i64>(sql)
                    .bind(slug)
                    .bind(exclude)
                    .fetch_one(p)
                    .await
            }
        }
        .context("Failed to check slug")?;

        Ok(count > 0)
    }

    async fn count(&self) -> Result<i64> {
        let sql = "SELECT COUNT(*) FROM blog_posts";
        let count = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query_scalar::<_, i64>(sql).fetch_one(p).await,
            Backend::Mysql(p) => sqlx::query_scalar::<_, i64>(sql).fetch_one(p).await,
        }
        .context("Failed to count blog posts")?;

        Ok(count)
    }
}

const SELECT_POST: &str = r#"
    SELECT id, title, author, slug, excerpt, tags, image_slideshow, content_markdown,
           status, created_at, last_edited_at
    FROM blog_posts
"#;

fn decode_tags(raw: &str) -> Result<Vec<String>> {
    serde_json::from_str(raw).context("Failed to decode tags")
}

fn decode_slideshow(raw: &str) -> Result<Vec<CloudinaryImage>> {
    serde_json::from_str(raw).context("Failed to decode image slideshow")
}

fn decode_status(raw: &str) -> Result<PostStatus> {
    PostStatus::parse(raw).ok_or_else(|| anyhow!("Unknown post status: {}", raw))
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_post_sqlite(pool: &SqlitePool, post: &BlogPost, encoded: &EncodedPost) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO blog_posts
            (id, title, author, slug, excerpt, tags, image_slideshow, content_markdown,
             status, created_at, last_edited_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&post.id)
    .bind(&post.title)
    .bind(&post.author)
    .bind(&post.slug)
    .bind(&post.excerpt)
    .bind(&encoded.tags)
    .bind(&encoded.slideshow)
    .bind(&post.content_markdown)
    .bind(post.status.as_str())
    .bind(post.created_at)
    .bind(post.last_edited_at)
    .execute(pool)
    .await
    .context("Failed to create blog post")?;

    Ok(())
}

async fn get_post_by_id_sqlite(pool: &SqlitePool, id: &str) -> Result<Option<BlogPost>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_POST))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get blog post by id")?;

    row.as_ref().map(row_to_post_sqlite).transpose()
}

async fn list_posts_sqlite(pool: &SqlitePool) -> Result<Vec<BlogPost>> {
    let rows = sqlx::query(&format!("{} ORDER BY created_at DESC", SELECT_POST))
        .fetch_all(pool)
        .await
        .context("Failed to list blog posts")?;

    rows.iter().map(row_to_post_sqlite).collect()
}

async fn update_post_sqlite(pool: &SqlitePool, post: &BlogPost, encoded: &EncodedPost) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE blog_posts
        SET title = ?, author = ?, slug = ?, excerpt = ?, tags = ?, image_slideshow = ?,
            content_markdown = ?, status = ?, last_edited_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&post.title)
    .bind(&post.author)
    .bind(&post.slug)
    .bind(&post.excerpt)
    .bind(&encoded.tags)
    .bind(&encoded.slideshow)
    .bind(&post.content_markdown)
    .bind(post.status.as_str())
    .bind(post.last_edited_at)
    .bind(&post.id)
    .execute(pool)
    .await
    .context("Failed to update blog post")?;

    Ok(result.rows_affected() > 0)
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<BlogPost> {
    let tags: String = row.try_get("tags")?;
    let slideshow: String = row.try_get("image_slideshow")?;
    let status: String = row.try_get("status")?;
    Ok(BlogPost {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        author: row.try_get("author")?,
        slug: row.try_get("slug")?,
        excerpt: row.try_get("excerpt")?,
        tags: decode_tags(&tags)?,
        image_slideshow: decode_slideshow(&slideshow)?,
        content_markdown: row.try_get("content_markdown")?,
        status: decode_status(&status)?,
        created_at: row.try_get("created_at")?,
        last_edited_at: row.try_get("last_edited_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_post_mysql(pool: &MySqlPool, post: &BlogPost, encoded: &EncodedPost) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO blog_posts
            (id, title, author, slug, excerpt, tags, image_slideshow, content_markdown,
             status, created_at, last_edited_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&post.id)
    .bind(&post.title)
    .bind(&post.author)
    .bind(&post.slug)
    .bind(&post.excerpt)
    .bind(&encoded.tags)
    .bind(&encoded.slideshow)
    .bind(&post.content_markdown)
    .bind(post.status.as_str())
    .bind(post.created_at)
    .bind(post.last_edited_at)
    .execute(pool)
    .await
    .context("Failed to create blog post")?;

    Ok(())
}

async fn get_post_by_id_mysql(pool: &MySqlPool, id: &str) -> Result<Option<BlogPost>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_POST))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get blog post by id")?;

    row.as_ref().map(row_to_post_mysql).transpose()
}

async fn list_posts_mysql(pool: &MySqlPool) -> Result<Vec<BlogPost>> {
    let rows = sqlx::query(&format!("{} ORDER BY created_at DESC", SELECT_POST))
        .fetch_all(pool)
        .await
        .context("Failed to list blog posts")?;

    rows.iter().map(row_to_post_mysql).collect()
}

async fn update_post_mysql(pool: &MySqlPool, post: &BlogPost, encoded: &EncodedPost) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE blog_posts
        SET title = ?, author = ?, slug = ?, excerpt = ?, tags = ?, image_slideshow = ?,
            content_markdown = ?, status = ?, last_edited_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&post.title)
    .bind(&post.author)
    .bind(&post.slug)
    .bind(&post.excerpt)
    .bind(&encoded.tags)
    .bind(&encoded.slideshow)
    .bind(&post.content_markdown)
    .bind(post.status.as_str())
    .bind(post.last_edited_at)
    .bind(&post.id)
    .execute(pool)
    .await
    .context("Failed to update blog post")?;

    Ok(result.rows_affected() > 0)
}

fn row_to_post_mysql(row: &sqlx::mysql::MySqlRow) -> Result<BlogPost> {
    let tags: String = row.try_get("tags")?;
    let slideshow: String = row.try_get("image_slideshow")?;
    let status: String = row.try_get("status")?;
    Ok(BlogPost {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        author: row.try_get("author")?,
        slug: row.try_get("slug")?,
        excerpt: row.try_get("excerpt")?,
        tags: decode_tags(&tags)?,
        image_slideshow: decode_slideshow(&slideshow)?,
        content_markdown: row.try_get("content_markdown")?,
        status: decode_status(&status)?,
        created_at: row.try_get("created_at")?,
        last_edited_at: row.try_get("last_edited_at")?,
    })
}
