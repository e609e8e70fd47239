//! In-memory object store
//!
//! Behaves like a single S3 bucket closely enough for handler and gateway
//! tests: metadata keys are lower-cased, deletes of missing keys succeed and
//! listings come back in key order.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use tokio::sync::RwLock;

use crate::{
    error::{StoreError, StoreResult},
    storage::{
        BucketStatus, Metadata, NewObject, ObjectHead, ObjectStore, ObjectSummary,
        normalize_metadata,
    },
};

#[derive(Debug, Clone)]
struct StoredObject {
    body: Vec<u8>,
    content_type: String,
    metadata: Metadata,
    last_modified: DateTime<Utc>,
}

/// Object store kept entirely in process memory
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    bucket: String,
    objects: RwLock<BTreeMap<String, StoredObject>>,
    failing_heads: RwLock<HashSet<String>>,
    failing_put_suffixes: RwLock<HashSet<String>>,
}

impl InMemoryObjectStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Default::default()
        }
    }

    /// Make every HEAD on `key` fail with an upstream error
    pub async fn fail_head(&self, key: &str) {
        self.failing_heads.write().await.insert(key.to_string());
    }

    /// Make every PUT of a key ending in `suffix` fail with an upstream error
    pub async fn fail_put(&self, suffix: &str) {
        self.failing_put_suffixes
            .write()
            .await
            .insert(suffix.to_string());
    }

    /// Raw body of a stored object
    pub async fn body(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.read().await.get(key).map(|obj| obj.body.clone())
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn public_url(&self, key: &str) -> String {
        format!("memory://{}/{}", self.bucket, key)
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<ObjectSummary>> {
        let objects = self.objects.read().await;
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, obj)| ObjectSummary {
                key: key.clone(),
                size: obj.body.len() as u64,
                last_modified: Some(obj.last_modified),
            })
            .collect())
    }

    async fn head(&self, key: &str) -> StoreResult<ObjectHead> {
        if self.failing_heads.read().await.contains(key) {
            return Err(StoreError::Upstream {
                code: "InternalError".to_string(),
                message: format!("injected HEAD failure for {}", key),
            });
        }

        let objects = self.objects.read().await;
        let obj = objects
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        Ok(ObjectHead {
            content_type: Some(obj.content_type.clone()),
            content_length: obj.body.len() as u64,
            last_modified: Some(obj.last_modified),
            metadata: obj.metadata.clone(),
        })
    }

    async fn put(&self, object: NewObject) -> StoreResult<()> {
        let failing = self.failing_put_suffixes.read().await;
        if failing.iter().any(|suffix| object.key.ends_with(suffix.as_str())) {
            return Err(StoreError::Upstream {
                code: "InternalError".to_string(),
                message: format!("injected PUT failure for {}", object.key),
            });
        }
        drop(failing);

        let stored = StoredObject {
            body: object.body,
            content_type: object.content_type,
            metadata: normalize_metadata(object.metadata),
            last_modified: Utc::now(),
        };
        self.objects.write().await.insert(object.key, stored);
        Ok(())
    }

    async fn replace_metadata(
        &self,
        key: &str,
        content_type: Option<&str>,
        metadata: Metadata,
    ) -> StoreResult<()> {
        let mut objects = self.objects.write().await;
        let obj = objects
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        obj.metadata = normalize_metadata(metadata);
        if let Some(content_type) = content_type {
            obj.content_type = content_type.to_string();
        }
        obj.last_modified = Utc::now();
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.objects.write().await.remove(key);
        Ok(())
    }

    async fn check_bucket(&self) -> StoreResult<BucketStatus> {
        Ok(BucketStatus {
            bucket: self.bucket.clone(),
            region: "local".to_string(),
            object_count: self.objects.read().await.len().min(1),
        })
    }
}
