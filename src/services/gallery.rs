//! Gallery service
//!
//! Business logic for gallery events:
//! - field validation, with every failing field reported together
//! - image list normalization and the derived `photoCount` / `thumbnailUrl`
//! - host cleanup when an event or one of its images is removed
//! - invalidation of the cached public responses after every write

use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::cache::{keys, CacheLayer, SharedCache};
use crate::db::repositories::GalleryRepository;
use crate::models::{CloudinaryImage, GalleryEvent, GalleryEventInput};
use crate::services::images::{self, ImageService, ImageServiceError, MoveDirection};
use crate::services::validation::FieldErrors;

/// Error types for gallery operations
#[derive(Debug, thiserror::Error)]
pub enum GalleryServiceError {
    #[error("Gallery event not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(FieldErrors),

    #[error(transparent)]
    Image(#[from] ImageServiceError),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Validated editor input
struct ValidEvent {
    title: String,
    date: DateTime<Utc>,
    description: String,
    images: Vec<CloudinaryImage>,
}

/// Parse an event date: RFC 3339, or a bare `YYYY-MM-DD` taken as midnight UTC.
pub fn parse_event_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Check every image has a URL and an id
pub(crate) fn check_images(errors: &mut FieldErrors, field: &str, list: &[CloudinaryImage]) {
    if list
        .iter()
        .any(|img| img.secure_url.trim().is_empty() || img.public_id.trim().is_empty())
    {
        errors.add(field, "Every image needs a URL and an id.");
    }
}

fn validate(input: GalleryEventInput) -> Result<ValidEvent, FieldErrors> {
    let mut errors = FieldErrors::new();

    errors.check_length("title", &input.title, 3, 100, "Title must be at least 3 characters.");
    errors.check_length(
        "description",
        &input.description,
        10,
        5000,
        "Description must be at least 10 characters.",
    );

    let date = match input.date.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => {
            errors.add("date", "Event date is required.");
            None
        }
        Some(raw) => {
            let parsed = parse_event_date(raw);
            if parsed.is_none() {
                errors.add("date", "Event date is not a valid date.");
            }
            parsed
        }
    };

    if input.images.is_empty() {
        errors.add("images", "At least one image is required.");
    }
    check_images(&mut errors, "images", &input.images);

    // a missing date always has its error recorded
    match date {
        Some(date) if errors.is_empty() => {
            let mut list = input.images;
            images::normalize_orders(&mut list);
            Ok(ValidEvent {
                title: input.title.trim().to_string(),
                date,
                description: input.description.trim().to_string(),
                images: list,
            })
        }
        _ => Err(errors),
    }
}

/// Gallery service
pub struct GalleryService {
    repo: Arc<dyn GalleryRepository>,
    images: Arc<ImageService>,
    cache: SharedCache,
}

impl GalleryService {
    pub fn new(repo: Arc<dyn GalleryRepository>, images: Arc<ImageService>, cache: SharedCache) -> Self {
        Self { repo, images, cache }
    }

    /// Create an event. Timestamps are both set to now.
    pub async fn create(&self, input: GalleryEventInput) -> Result<GalleryEvent, GalleryServiceError> {
        let valid = validate(input).map_err(GalleryServiceError::Validation)?;
        let now = Utc::now();

        let mut event = GalleryEvent {
            id: Uuid::new_v4().to_string(),
            title: valid.title,
            date: valid.date,
            description: valid.description,
            images: valid.images,
            photo_count: 0,
            thumbnail_url: None,
            created_at: now,
            updated_at: now,
        };
        event.refresh_derived();

        let created = self.repo.create(&event).await?;
        tracing::info!("Created gallery event {} ({} photos)", created.id, created.photo_count);
        self.invalidate().await;
        Ok(created)
    }

    pub async fn get(&self, id: &str) -> Result<GalleryEvent, GalleryServiceError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| GalleryServiceError::NotFound(id.to_string()))
    }

    /// All events, most recent date first
    pub async fn list(&self) -> Result<Vec<GalleryEvent>, GalleryServiceError> {
        Ok(self.repo.list().await?)
    }

    pub async fn count(&self) -> Result<i64, GalleryServiceError> {
        Ok(self.repo.count().await?)
    }

    /// Replace an event's fields and image list.
    pub async fn update(&self, id: &str, input: GalleryEventInput) -> Result<GalleryEvent, GalleryServiceError> {
        let mut event = self.get(id).await?;
        let valid = validate(input).map_err(GalleryServiceError::Validation)?;

        event.title = valid.title;
        event.date = valid.date;
        event.description = valid.description;
        event.images = valid.images;
        self.save(event).await
    }

    /// Delete an event and its images.
    ///
    /// Images are removed from the host first; ids the host refused are
    /// logged and returned, and the record is deleted regardless.
    pub async fn delete(&self, id: &str) -> Result<Vec<String>, GalleryServiceError> {
        let event = self.get(id).await?;

        let failed = self.images.purge(&event.images).await;
        if !failed.is_empty() {
            tracing::warn!(
                "Gallery event {} deleted with {} image(s) left on the host",
                id,
                failed.len()
            );
        }

        if !self.repo.delete(id).await? {
            return Err(GalleryServiceError::NotFound(id.to_string()));
        }
        tracing::info!("Deleted gallery event {}", id);
        self.invalidate().await;
        Ok(failed)
    }

    /// Move one image up or down. Out-of-range moves leave the event untouched.
    pub async fn move_image(
        &self,
        id: &str,
        index: usize,
        direction: MoveDirection,
    ) -> Result<GalleryEvent, GalleryServiceError> {
        let mut event = self.get(id).await?;
        images::sort_by_order(&mut event.images);
        if !images::move_image(&mut event.images, index, direction) {
            return Ok(event);
        }
        self.save(event).await
    }

    /// Delete one image from the host, then from the event.
    pub async fn remove_image(&self, id: &str, public_id: &str) -> Result<GalleryEvent, GalleryServiceError> {
        let mut event = self.get(id).await?;
        event.images = self.images.remove_from(&event.images, public_id).await?;
        self.save(event).await
    }

    async fn save(&self, mut event: GalleryEvent) -> Result<GalleryEvent, GalleryServiceError> {
        images::normalize_orders(&mut event.images);
        event.refresh_derived();
        event.updated_at = Utc::now();

        if !self.repo.update(&event).await? {
            return Err(GalleryServiceError::NotFound(event.id));
        }
        tracing::debug!("Saved gallery event {}", event.id);
        self.invalidate().await;
        Ok(event)
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
    use crate::db::repositories::SqlxGalleryRepository;
    use crate::db::{create_test_pool, migrations};
    use async_trait::async_trait;
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
            if public_id == "stuck" {
                return Err(ImageHostError::DeleteFailed("error".to_string()));
            }
            self.destroyed.lock().unwrap().push(public_id.to_string());
            Ok(())
        }
    }

    async fn setup_test_service() -> (Arc<FakeHost>, SharedCache, GalleryService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let host = Arc::new(FakeHost::default());
        let images = Arc::new(ImageService::new(host.clone(), UploadConfig::default()));
        let cache = create_cache(&CacheConfig::default());
        let service = GalleryService::new(SqlxGalleryRepository::boxed(pool), images, cache.clone());
        (host, cache, service)
    }

    fn input(title: &str, date: &str) -> GalleryEventInput {
        GalleryEventInput {
            title: title.to_string(),
            date: Some(date.to_string()),
            description: "Annual grading at the main dojo".to_string(),
            images: vec![
                CloudinaryImage::new("https://img/b.jpg", "b", 7),
                CloudinaryImage::new("https://img/a.jpg", "a", 3),
                CloudinaryImage::new("https://img/c.jpg", "c", 7),
            ],
        }
    }

    #[test]
    fn test_parse_event_date_formats() {
        let plain = parse_event_date("2024-03-09").unwrap();
        assert_eq!(plain.to_rfc3339(), "2024-03-09T00:00:00+00:00");

        let offset = parse_event_date("2024-03-09T10:00:00+03:00").unwrap();
        assert_eq!(offset.to_rfc3339(), "2024-03-09T07:00:00+00:00");

        assert!(parse_event_date("09/03/2024").is_none());
    }

    #[test]
    fn test_validate_reports_all_fields() {
        let errors = validate(GalleryEventInput {
            title: "ab".to_string(),
            date: None,
            description: "short".to_string(),
            images: vec![CloudinaryImage::new("", "x", 0)],
        })
        .err()
        .unwrap();

        let fields: Vec<&str> = errors.fields().collect();
        assert_eq!(fields, vec!["date", "description", "images", "title"]);
        assert_eq!(errors.get("date"), Some("Event date is required."));
    }

    #[tokio::test]
    async fn test_create_without_images_is_rejected() {
        let (_, _, service) = setup_test_service().await;
        let mut bare = input("Open Mat", "2024-05-02");
        bare.images.clear();

        let err = service.create(bare).await.unwrap_err();
        let GalleryServiceError::Validation(errors) = err else {
            panic!("expected validation error, got {:?}", err);
        };
        assert_eq!(errors.get("images"), Some("At least one image is required."));
        assert_eq!(service.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_normalizes_and_derives() {
        let (_, _, service) = setup_test_service().await;

        let event = service.create(input("Spring Grading", "2024-04-01")).await.unwrap();

        let ids: Vec<&str> = event.images.iter().map(|i| i.public_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        let orders: Vec<i64> = event.images.iter().map(|i| i.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert_eq!(event.photo_count, 3);
        assert_eq!(event.thumbnail_url.as_deref(), Some("https://img/a.jpg"));
        assert_eq!(event.created_at, event.updated_at);
    }

    #[tokio::test]
    async fn test_list_orders_by_date_desc() {
        let (_, _, service) = setup_test_service().await;
        service.create(input("Older event", "2023-01-01")).await.unwrap();
        service.create(input("Newer event", "2024-06-01")).await.unwrap();

        let events = service.list().await.unwrap();
        assert_eq!(events[0].title, "Newer event");
        assert_eq!(service.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_update_refreshes_updated_at() {
        let (_, _, service) = setup_test_service().await;
        let created = service.create(input("Summer Camp", "2024-07-01")).await.unwrap();

        let mut changed = input("Summer Camp 2024", "2024-07-02");
        changed.images.truncate(1);
        let updated = service.update(&created.id, changed).await.unwrap();

        assert_eq!(updated.title, "Summer Camp 2024");
        assert_eq!(updated.photo_count, 1);
        assert!(updated.updated_at >= created.updated_at);
        assert_eq!(updated.created_at, created.created_at);
    }

    #[tokio::test]
    async fn test_update_missing_event() {
        let (_, _, service) = setup_test_service().await;
        let err = service.update("nope", input("Whatever", "2024-01-01")).await.unwrap_err();
        assert!(matches!(err, GalleryServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_move_and_remove_image() {
        let (host, _, service) = setup_test_service().await;
        let event = service.create(input("Kata Seminar", "2024-02-02")).await.unwrap();

        let moved = service.move_image(&event.id, 0, MoveDirection::Down).await.unwrap();
        let ids: Vec<&str> = moved.images.iter().map(|i| i.public_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
        assert_eq!(moved.thumbnail_url.as_deref(), Some("https://img/b.jpg"));

        let unchanged = service.move_image(&event.id, 0, MoveDirection::Up).await.unwrap();
        assert_eq!(unchanged.images, moved.images);

        let removed = service.remove_image(&event.id, "a").await.unwrap();
        assert_eq!(removed.photo_count, 2);
        let orders: Vec<i64> = removed.images.iter().map(|i| i.order).collect();
        assert_eq!(orders, vec![0, 1]);
        assert_eq!(host.destroyed.lock().unwrap().as_slice(), ["a"]);
    }

    #[tokio::test]
    async fn test_delete_purges_images_and_cache() {
        let (host, cache, service) = setup_test_service().await;
        let mut with_stuck = input("Tournament", "2024-05-05");
        with_stuck.images.push(CloudinaryImage::new("https://img/s.jpg", "stuck", 9));
        let event = service.create(with_stuck).await.unwrap();

        cache
            .set(keys::PUBLIC_GALLERY, &"cached", cache.default_ttl())
            .await
            .unwrap();

        let failed = service.delete(&event.id).await.unwrap();
        assert_eq!(failed, vec!["stuck".to_string()]);
        assert_eq!(host.destroyed.lock().unwrap().len(), 3);
        assert!(matches!(
            service.get(&event.id).await,
            Err(GalleryServiceError::NotFound(_))
        ));
        assert!(cache.get::<String>(keys::PUBLIC_GALLERY).await.unwrap().is_none());
    }
}
