//! Object storage abstraction
//!
//! The [`ObjectStore`] trait covers the handful of bucket operations the site
//! needs: list by prefix, HEAD, PUT, metadata-replace copy and DELETE. The
//! production backend lives in [`crate::s3`]; [`crate::memory`] is used by tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::error::StoreResult;

/// User metadata attached to an object. Keys are always lower-case.
pub type Metadata = HashMap<String, String>;

/// One entry of a bucket listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Result of a HEAD request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectHead {
    pub content_type: Option<String>,
    pub content_length: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub metadata: Metadata,
}

/// An object to be written
#[derive(Debug, Clone)]
pub struct NewObject {
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: String,
    pub metadata: Metadata,
}

/// Outcome of a bucket connectivity probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketStatus {
    pub bucket: String,
    pub region: String,
    pub object_count: usize,
}

/// Bucket-scoped object storage
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Name of the bucket this store is bound to
    fn bucket(&self) -> &str;

    /// Public URL under which `key` can be fetched
    fn public_url(&self, key: &str) -> String;

    /// List every object whose key starts with `prefix`
    async fn list(&self, prefix: &str) -> StoreResult<Vec<ObjectSummary>>;

    /// Fetch size, content type and user metadata of one object
    async fn head(&self, key: &str) -> StoreResult<ObjectHead>;

    /// Store an object, overwriting any previous one under the same key
    async fn put(&self, object: NewObject) -> StoreResult<()>;

    /// Copy an object onto itself with `metadata` replacing its user metadata.
    ///
    /// Object stores do not support editing metadata in place, so this is the
    /// only way to change it without re-uploading the body.
    async fn replace_metadata(
        &self,
        key: &str,
        content_type: Option<&str>,
        metadata: Metadata,
    ) -> StoreResult<()>;

    /// Remove an object. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Check the bucket is reachable and readable with the current credentials
    async fn check_bucket(&self) -> StoreResult<BucketStatus>;
}

/// Lower-case metadata keys the way S3 returns them
pub fn normalize_metadata(metadata: Metadata) -> Metadata {
    metadata
        .into_iter()
        .map(|(key, value)| (key.to_ascii_lowercase(), value))
        .collect()
}
