//! Image repository backed by the object store
//!
//! Images live under `ngo-images/<category>/<millis>-<random>.<ext>`. The
//! category is always read back from the key; description, original name and
//! upload date come from the object's user metadata.

use chrono::{DateTime, SecondsFormat, Utc};
use futures::future::join_all;
use ngo_common::{BucketStatus, Metadata, NewObject, ObjectStore, ObjectSummary, StoreError, StoreResult};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    models::image::{ImageRecord, ImageUpload},
    validation::{is_image_key, sanitize_metadata_value},
};

/// Prefix every site image is stored under
pub const IMAGE_PREFIX: &str = "ngo-images/";

const UNCATEGORIZED: &str = "uncategorized";

/// Image repository for object store operations
#[derive(Clone)]
pub struct ImageRepository {
    store: Arc<dyn ObjectStore>,
}

impl ImageRepository {
    /// Create a new image repository
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// List images, newest first, optionally limited to one category
    pub async fn list_images(&self, category: Option<&str>) -> StoreResult<Vec<ImageRecord>> {
        let prefix = match category {
            Some(category) => format!("{IMAGE_PREFIX}{category}/"),
            None => IMAGE_PREFIX.to_string(),
        };

        let objects = self.store.list(&prefix).await?;
        let candidates: Vec<ObjectSummary> = objects
            .into_iter()
            .filter(|obj| obj.size > 0 && is_image_key(&obj.key))
            .collect();

        let mut images: Vec<ImageRecord> = join_all(candidates.iter().map(|obj| self.describe(obj)))
            .await
            .into_iter()
            .flatten()
            .collect();

        images.sort_by(|a, b| b.upload_date.cmp(&a.upload_date));

        info!("Listed {} images under {}", images.len(), prefix);
        Ok(images)
    }

    /// Build the record for a listed object. Objects deleted since the
    /// listing are skipped; any other HEAD failure degrades to key-derived values.
    async fn describe(&self, object: &ObjectSummary) -> Option<ImageRecord> {
        let fallback_date = object
            .last_modified
            .map(format_timestamp)
            .unwrap_or_default();

        match self.store.head(&object.key).await {
            Ok(head) => Some(self.record(&object.key, object.size, &head.metadata, fallback_date)),
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                warn!("Error getting metadata for {}: {}", object.key, e);
                Some(self.record(&object.key, object.size, &Metadata::new(), fallback_date))
            }
        }
    }

    fn record(&self, key: &str, size: u64, metadata: &Metadata, fallback_date: String) -> ImageRecord {
        ImageRecord {
            key: key.to_string(),
            url: self.store.public_url(key),
            category: category_from_key(key).to_string(),
            description: metadata.get("description").cloned().unwrap_or_default(),
            original_name: metadata
                .get("originalname")
                .cloned()
                .unwrap_or_else(|| file_name(key).to_string()),
            upload_date: metadata.get("uploaddate").cloned().unwrap_or(fallback_date),
            size,
        }
    }

    /// Store every file under a fresh key in `category`
    pub async fn upload_images(
        &self,
        files: Vec<ImageUpload>,
        category: &str,
        description: &str,
    ) -> StoreResult<Vec<ImageRecord>> {
        let description = sanitize_metadata_value(description);
        let upload_date = format_timestamp(Utc::now());

        let uploads = files
            .into_iter()
            .map(|file| self.upload_image(file, category, &description, &upload_date));
        let results = join_all(uploads).await;

        if let Some(failure) = results.iter().find_map(|r| r.as_ref().err()).cloned() {
            // The request fails as a whole, so drop the files that did land
            let written: Vec<&str> = results
                .iter()
                .filter_map(|r| r.as_ref().ok())
                .map(|record| record.key.as_str())
                .collect();
            self.remove_partial_upload(&written).await;
            return Err(failure);
        }

        let records: Vec<ImageRecord> = results.into_iter().flatten().collect();

        info!("Uploaded {} images to category {}", records.len(), category);
        Ok(records)
    }

    async fn remove_partial_upload(&self, keys: &[&str]) {
        if keys.is_empty() {
            return;
        }

        warn!("Upload failed part way, removing {} stored files", keys.len());
        for key in keys {
            if let Err(e) = self.store.delete(key).await {
                error!("Failed to remove partially uploaded {}: {}", key, e);
            }
        }
    }

    async fn upload_image(
        &self,
        file: ImageUpload,
        category: &str,
        description: &str,
        upload_date: &str,
    ) -> StoreResult<ImageRecord> {
        let key = build_key(category, &file.extension);
        let original_name = sanitize_metadata_value(&file.original_name);
        let size = file.data.len() as u64;

        let mut metadata = Metadata::new();
        metadata.insert("category".to_string(), category.to_string());
        metadata.insert("description".to_string(), description.to_string());
        metadata.insert("uploaddate".to_string(), upload_date.to_string());
        metadata.insert("originalname".to_string(), original_name.clone());

        self.store
            .put(NewObject {
                key: key.clone(),
                body: file.data,
                content_type: file.content_type,
                metadata,
            })
            .await?;

        Ok(ImageRecord {
            url: self.store.public_url(&key),
            category: category_from_key(&key).to_string(),
            key,
            description: description.to_string(),
            original_name,
            upload_date: upload_date.to_string(),
            size,
        })
    }

    /// Replace an image's description, keeping the rest of its metadata.
    ///
    /// Returns the description as stored.
    pub async fn update_description(&self, key: &str, description: &str) -> StoreResult<String> {
        ensure_image_key(key)?;

        let head = self.store.head(key).await?;
        let description = sanitize_metadata_value(description);

        let mut metadata = head.metadata;
        metadata.insert("description".to_string(), description.clone());
        metadata.insert("lastmodified".to_string(), format_timestamp(Utc::now()));

        self.store
            .replace_metadata(key, head.content_type.as_deref(), metadata)
            .await?;

        info!("Updated description of {}", key);
        Ok(description)
    }

    /// Delete an image. A missing key is reported as not found.
    pub async fn delete_image(&self, key: &str) -> StoreResult<()> {
        ensure_image_key(key)?;

        self.store.head(key).await?;
        self.store.delete(key).await?;

        info!("Deleted image {}", key);
        Ok(())
    }

    /// Check the bucket behind the repository is reachable
    pub async fn check_connection(&self) -> StoreResult<BucketStatus> {
        self.store.check_bucket().await
    }
}

/// Only keys under the image prefix can be managed through the API
fn ensure_image_key(key: &str) -> StoreResult<()> {
    if key.starts_with(IMAGE_PREFIX) {
        Ok(())
    } else {
        Err(StoreError::NotFound(key.to_string()))
    }
}

/// `ngo-images/<category>/<millis>-<16 hex>.<ext>`
fn build_key(category: &str, extension: &str) -> String {
    format!(
        "{IMAGE_PREFIX}{category}/{}-{}.{}",
        Utc::now().timestamp_millis(),
        hex::encode(rand::random::<[u8; 8]>()),
        extension
    )
}

/// Second path segment of the key
pub fn category_from_key(key: &str) -> &str {
    key.split('/')
        .nth(1)
        .filter(|segment| !segment.is_empty())
        .unwrap_or(UNCATEGORIZED)
}

fn file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ngo_common::memory::InMemoryObjectStore;

    fn upload(name: &str, content_type: &str, extension: &str) -> ImageUpload {
        ImageUpload {
            original_name: name.to_string(),
            content_type: content_type.to_string(),
            extension: extension.to_string(),
            data: vec![1, 2, 3, 4, 5],
        }
    }

    fn repository() -> (Arc<InMemoryObjectStore>, ImageRepository) {
        let store = Arc::new(InMemoryObjectStore::new("ngo-site"));
        let repository = ImageRepository::new(store.clone());
        (store, repository)
    }

    #[test]
    fn test_category_from_key() {
        assert_eq!(category_from_key("ngo-images/team/1-a.jpg"), "team");
        assert_eq!(category_from_key("ngo-images//1-a.jpg"), "uncategorized");
        assert_eq!(category_from_key("loose.jpg"), "uncategorized");
    }

    #[test]
    fn test_build_key_shape() {
        let key = build_key("yoga", "png");
        assert!(key.starts_with("ngo-images/yoga/"));
        assert!(key.ends_with(".png"));

        let stem = file_name(&key).trim_end_matches(".png");
        let (millis, random) = stem.split_once('-').expect("millis-random");
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(random.len(), 16);
    }

    #[tokio::test]
    async fn test_upload_then_list_returns_new_entries() {
        let (_, repository) = repository();

        let uploaded = repository
            .upload_images(
                vec![
                    upload("stage.jpg", "image/jpeg", "jpg"),
                    upload("crowd.png", "image/png", "png"),
                    upload("banner.webp", "image/webp", "webp"),
                ],
                "gallery",
                "Annual day",
            )
            .await
            .expect("upload should succeed");
        assert_eq!(uploaded.len(), 3);

        let listed = repository.list_images(None).await.expect("list");
        assert_eq!(listed.len(), 3);
        for image in &listed {
            assert_eq!(image.category, "gallery");
            assert_eq!(image.description, "Annual day");
            assert_eq!(image.size, 5);
            assert!(uploaded.iter().any(|u| u.key == image.key));
        }
    }

    #[tokio::test]
    async fn test_list_filters_by_category() {
        let (_, repository) = repository();
        repository
            .upload_images(vec![upload("a.jpg", "image/jpeg", "jpg")], "team", "Coordinator")
            .await
            .expect("upload");
        repository
            .upload_images(vec![upload("b.jpg", "image/jpeg", "jpg")], "yoga", "")
            .await
            .expect("upload");

        let team = repository.list_images(Some("team")).await.expect("list");
        assert_eq!(team.len(), 1);
        assert_eq!(team[0].category, "team");
        assert_eq!(team[0].original_name, "a.jpg");
    }

    #[tokio::test]
    async fn test_list_skips_empty_and_non_image_objects() {
        let (store, repository) = repository();

        for (key, body) in [
            ("ngo-images/gallery/", Vec::new()),
            ("ngo-images/gallery/notes.txt", vec![1]),
            ("ngo-images/gallery/empty.jpg", Vec::new()),
            ("ngo-images/gallery/real.JPG", vec![1, 2]),
        ] {
            store
                .put(NewObject {
                    key: key.to_string(),
                    body,
                    content_type: "application/octet-stream".to_string(),
                    metadata: Metadata::new(),
                })
                .await
                .expect("put");
        }

        let listed = repository.list_images(None).await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].key, "ngo-images/gallery/real.JPG");
        assert_eq!(listed[0].original_name, "real.JPG");
        assert!(!listed[0].upload_date.is_empty());
    }

    #[tokio::test]
    async fn test_head_failure_degrades_to_key_values() {
        let (store, repository) = repository();
        let uploaded = repository
            .upload_images(vec![upload("a.jpg", "image/jpeg", "jpg")], "about", "Founders")
            .await
            .expect("upload");
        let key = &uploaded[0].key;

        store.fail_head(key).await;

        let listed = repository.list_images(None).await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].category, "about");
        assert_eq!(listed[0].description, "");
        assert_eq!(listed[0].original_name, file_name(key));
    }

    #[tokio::test]
    async fn test_update_description_is_idempotent() {
        let (store, repository) = repository();
        let uploaded = repository
            .upload_images(vec![upload("a.png", "image/png", "png")], "team", "Old")
            .await
            .expect("upload");
        let key = uploaded[0].key.clone();

        let first = repository
            .update_description(&key, "Program lead\nsince 2019")
            .await
            .expect("update");
        let after_first = store.head(&key).await.expect("head");

        let second = repository
            .update_description(&key, "Program lead\nsince 2019")
            .await
            .expect("update");
        let after_second = store.head(&key).await.expect("head");

        assert_eq!(first, "Program lead since 2019");
        assert_eq!(first, second);
        assert_eq!(
            after_first.metadata.get("description"),
            after_second.metadata.get("description")
        );
        assert_eq!(after_second.content_type.as_deref(), Some("image/png"));
        assert_eq!(
            after_second.metadata.get("originalname").map(String::as_str),
            Some("a.png")
        );
        assert!(after_second.metadata.contains_key("lastmodified"));

        let listed = repository.list_images(Some("team")).await.expect("list");
        assert_eq!(listed[0].description, "Program lead since 2019");
    }

    #[tokio::test]
    async fn test_update_missing_key_is_not_found() {
        let (_, repository) = repository();
        let result = repository
            .update_description("ngo-images/team/missing.jpg", "x")
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_reports_missing_key() {
        let (store, repository) = repository();
        let uploaded = repository
            .upload_images(vec![upload("a.gif", "image/gif", "gif")], "aerobics", "")
            .await
            .expect("upload");
        let key = uploaded[0].key.clone();

        repository.delete_image(&key).await.expect("delete");
        assert!(store.is_empty().await);

        let again = repository.delete_image(&key).await;
        assert!(matches!(again, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_keys_outside_prefix_are_not_managed() {
        let (store, repository) = repository();
        store
            .put(NewObject {
                key: "backups/site.jpg".to_string(),
                body: vec![1],
                content_type: "image/jpeg".to_string(),
                metadata: Metadata::new(),
            })
            .await
            .expect("put");

        let result = repository.delete_image("backups/site.jpg").await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_failed_upload_leaves_no_partial_files() {
        let (store, repository) = repository();
        store.fail_put(".gif").await;

        let result = repository
            .upload_images(
                vec![
                    upload("a.jpg", "image/jpeg", "jpg"),
                    upload("b.gif", "image/gif", "gif"),
                    upload("c.png", "image/png", "png"),
                ],
                "gallery",
                "",
            )
            .await;

        assert!(matches!(result, Err(StoreError::Upstream { .. })));
        assert!(store.is_empty().await);
    }
}
