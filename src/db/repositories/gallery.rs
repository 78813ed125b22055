//! Gallery event repository
//!
//! Database operations for gallery events. The image list is stored as a
//! JSON text column and always written whole.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{CloudinaryImage, GalleryEvent};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Gallery event repository trait
#[async_trait]
pub trait GalleryRepository: Send + Sync {
    /// Insert a new event
    async fn create(&self, event: &GalleryEvent) -> Result<GalleryEvent>;

    /// Get event by ID
    async fn get_by_id(&self, id: &str) -> Result<Option<GalleryEvent>>;

    /// List all events, most recent `date` first
    async fn list(&self) -> Result<Vec<GalleryEvent>>;

    /// Replace an existing event; returns false when no row matched
    async fn update(&self, event: &GalleryEvent) -> Result<bool>;

    /// Delete an event; returns false when no row matched
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Count events
    async fn count(&self) -> Result<i64>;
}

/// SQLx-based gallery repository implementation
pub struct SqlxGalleryRepository {
    pool: DynDatabasePool,
}

impl SqlxGalleryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn GalleryRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl GalleryRepository for SqlxGalleryRepository {
    async fn create(&self, event: &GalleryEvent) -> Result<GalleryEvent> {
        let images = encode_images(&event.images)?;
        match self.pool.backend() {
            Backend::Sqlite(p) => create_event_sqlite(p, event, &images).await?,
            Backend::Mysql(p) => create_event_mysql(p, event, &images).await?,
        }
        Ok(event.clone())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<GalleryEvent>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => get_event_by_id_sqlite(p, id).await,
            Backend::Mysql(p) => get_event_by_id_mysql(p, id).await,
        }
    }

    async fn list(&self) -> Result<Vec<GalleryEvent>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => list_events_sqlite(p).await,
            Backend::Mysql(p) => list_events_mysql(p).await,
        }
    }

    async fn update(&self, event: &GalleryEvent) -> Result<bool> {
        let images = encode_images(&event.images)?;
        match self.pool.backend() {
            Backend::Sqlite(p) => update_event_sqlite(p, event, &images).await,
            Backend::Mysql(p) => update_event_mysql(p, event, &images).await,
        }
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let affected = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query("DELETE FROM gallery_events WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .map(|r| r.rows_affected()),
            Backend::Mysql(p) => sqlx::query("DELETE FROM gallery_events WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .map(|r| r.rows_affected()),
        }
        .context("Failed to delete gallery event")?;

        Ok(affected > 0)
    }

    async fn count(&self) -> Result<i64> {
        let sql = "SELECT COUNT(*) FROM gallery_events";
        let count = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query_scalar::<_, i64>(sql).fetch_one(p).await,
            Backend::Mysql(p) => sqlx::query_scalar::<_, i64>(sql).fetch_one(p).await,
        }
        .context("Failed to count gallery events")?;

        Ok(count)
    }
}

fn encode_images(images: &[CloudinaryImage]) -> Result<String> {
    serde_json::to_string(images).context("Failed to encode image list")
}

fn decode_images(raw: &str) -> Result<Vec<CloudinaryImage>> {
    serde_json::from_str(raw).context("Failed to decode image list")
}

const SELECT_EVENT: &str = r#"
    SELECT id, title, event_date, description, images, photo_count, thumbnail_url,
           created_at, updated_at
    FROM gallery_events
"#;

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_event_sqlite(pool: &SqlitePool, event: &GalleryEvent, images: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO gallery_events
            (id, title, event_date, description, images, photo_count, thumbnail_url, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&event.id)
    .bind(&event.title)
    .bind(event.date)
    .bind(&event.description)
    .bind(images)
    .bind(event.photo_count)
    .bind(&event.thumbnail_url)
    .bind(event.created_at)
    .bind(event.updated_at)
    .execute(pool)
    .await
    .context("Failed to create gallery event")?;

    Ok(())
}

async fn get_event_by_id_sqlite(pool: &SqlitePool, id: &str) -> Result<Option<GalleryEvent>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_EVENT))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get gallery event by ID")?;

    row.as_ref().map(row_to_event_sqlite).transpose()
}

async fn list_events_sqlite(pool: &SqlitePool) -> Result<Vec<GalleryEvent>> {
    let rows = sqlx::query(&format!("{} ORDER BY event_date DESC", SELECT_EVENT))
        .fetch_all(pool)
        .await
        .context("Failed to list gallery events")?;

    rows.iter().map(row_to_event_sqlite).collect()
}

async fn update_event_sqlite(pool: &SqlitePool, event: &GalleryEvent, images: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE gallery_events
        SET title = ?, event_date = ?, description = ?, images = ?, photo_count = ?,
            thumbnail_url = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&event.title)
    .bind(event.date)
    .bind(&event.description)
    .bind(images)
    .bind(event.photo_count)
    .bind(&event.thumbnail_url)
    .bind(event.updated_at)
    .bind(&event.id)
    .execute(pool)
    .await
    .context("Failed to update gallery event")?;

    Ok(result.rows_affected() > 0)
}

fn row_to_event_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<GalleryEvent> {
    let images: String = row.try_get("images")?;
    Ok(GalleryEvent {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        date: row.try_get("event_date")?,
        description: row.try_get("description")?,
        images: decode_images(&images)?,
        photo_count: row.try_get("photo_count")?,
        thumbnail_url: row.try_get("thumbnail_url")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_event_mysql(pool: &MySqlPool, event: &GalleryEvent, images: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO gallery_events
            (id, title, event_date, description, images, photo_count, thumbnail_url, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&event.id)
    .bind(&event.title)
    .bind(event.date)
    .bind(&event.description)
    .bind(images)
    .bind(event.photo_count)
    .bind(&event.thumbnail_url)
    .bind(event.created_at)
    .bind(event.updated_at)
    .execute(pool)
    .await
    .context("Failed to create gallery event")?;

    Ok(())
}

async fn get_event_by_id_mysql(pool: &MySqlPool, id: &str) -> Result<Option<GalleryEvent>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_EVENT))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get gallery event by ID")?;

    row.as_ref().map(row_to_event_mysql).transpose()
}

async fn list_events_mysql(pool: &MySqlPool) -> Result<Vec<GalleryEvent>> {
    let rows = sqlx::query(&format!("{} ORDER BY event_date DESC", SELECT_EVENT))
        .fetch_all(pool)
        .await
        .context("Failed to list gallery events")?;

    rows.iter().map(row_to_event_mysql).collect()
}

async fn update_event_mysql(pool: &MySqlPool, event: &GalleryEvent, images: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE gallery_events
        SET title = ?, event_date = ?, description = ?, images = ?, photo_count = ?,
            thumbnail_url = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&event.title)
    .bind(event.date)
    .bind(&event.description)
    .bind(images)
    .bind(event.photo_count)
    .bind(&event.thumbnail_url)
    .bind(event.updated_at)
    .bind(&event.id)
    .execute(pool)
    .await
    .context("Failed to update gallery event")?;

    Ok(result.rows_affected() > 0)
}

fn row_to_event_mysql(row: &sqlx::mysql::MySqlRow) -> Result<GalleryEvent> {
    let images: String = row.try_get("images")?;
    let photo_count: i32 = row.try_get("photo_count")?;
    Ok(GalleryEvent {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        date: row.try_get("event_date")?,
        description: row.try_get("description")?,
        images: decode_images(&images)?,
        photo_count: i64::from(photo_count),
        thumbnail_url: row.try_get("thumbnail_url")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
