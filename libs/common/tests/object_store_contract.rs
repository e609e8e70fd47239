//! Integration tests for the in-memory object store
//!
//! These exercise the same sequence of calls the image gateway performs
//! against S3: put with metadata, list by prefix, HEAD, metadata-replace copy
//! and delete.

use ngo_common::{Metadata, NewObject, ObjectStore, StoreError, memory::InMemoryObjectStore};

fn image(key: &str, description: &str) -> NewObject {
    let mut metadata = Metadata::new();
    metadata.insert("category".to_string(), "gallery".to_string());
    metadata.insert("description".to_string(), description.to_string());
    metadata.insert("originalName".to_string(), "photo.jpg".to_string());

    NewObject {
        key: key.to_string(),
        body: vec![0xFF, 0xD8, 0xFF, 0xE0],
        content_type: "image/jpeg".to_string(),
        metadata,
    }
}

#[tokio::test]
async fn test_object_lifecycle() -> Result<(), Box<dyn std::error::Error>> {
    let store = InMemoryObjectStore::new("ngo-site");
    let key = "ngo-images/gallery/1700000000000-aa.jpg";

    store.put(image(key, "Opening day")).await?;
    store
        .put(image("ngo-images/team/1700000000001-bb.jpg", "Volunteer"))
        .await?;
    store.put(image("other/readme.jpg", "ignored")).await?;

    // Listing is scoped to the prefix
    let listed = store.list("ngo-images/gallery/").await?;
    assert_eq!(listed.len(), 1, "prefix listing returned wrong objects");
    assert_eq!(listed[0].key, key);
    assert_eq!(listed[0].size, 4);
    assert_eq!(store.list("ngo-images/").await?.len(), 2);

    // HEAD returns lower-cased metadata keys like S3 does
    let head = store.head(key).await?;
    assert_eq!(head.content_type.as_deref(), Some("image/jpeg"));
    assert_eq!(
        head.metadata.get("originalname").map(String::as_str),
        Some("photo.jpg")
    );

    // Metadata-replace copy keeps the body
    let mut metadata = head.metadata.clone();
    metadata.insert("description".to_string(), "Closing day".to_string());
    store
        .replace_metadata(key, head.content_type.as_deref(), metadata)
        .await?;
    let head = store.head(key).await?;
    assert_eq!(
        head.metadata.get("description").map(String::as_str),
        Some("Closing day")
    );
    assert_eq!(store.body(key).await, Some(vec![0xFF, 0xD8, 0xFF, 0xE0]));

    // Delete, then HEAD reports not found
    store.delete(key).await?;
    assert_eq!(
        store.head(key).await,
        Err(StoreError::NotFound(key.to_string()))
    );

    // Deleting again is not an error, matching S3
    store.delete(key).await?;

    Ok(())
}

#[tokio::test]
async fn test_replace_metadata_on_missing_key() {
    let store = InMemoryObjectStore::new("ngo-site");
    let result = store
        .replace_metadata("ngo-images/team/missing.png", None, Metadata::new())
        .await;
    assert!(matches!(result, Err(StoreError::NotFound(_))));
}

#[tokio::test]
async fn test_check_bucket_reports_bucket_name() -> Result<(), Box<dyn std::error::Error>> {
    let store = InMemoryObjectStore::new("ngo-site");
    let status = store.check_bucket().await?;
    assert_eq!(status.bucket, "ngo-site");
    assert_eq!(status.object_count, 0);
    Ok(())
}
