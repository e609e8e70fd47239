//! AWS S3 backend for [`ObjectStore`]
//!
//! Wraps an `aws_sdk_s3::Client` bound to a single bucket and translates SDK
//! failures into [`StoreError`].

use async_trait::async_trait;
use aws_config::{BehaviorVersion, timeout::TimeoutConfig};
use aws_sdk_s3::{
    Client,
    config::{Region, http::HttpResponse},
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    primitives::ByteStream,
    types::MetadataDirective,
};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{error, info};

use crate::{
    error::{StoreError, StoreResult},
    storage::{BucketStatus, Metadata, NewObject, ObjectHead, ObjectStore, ObjectSummary, normalize_metadata},
};

/// Configuration for the S3 backend
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Bucket holding the site images
    pub bucket: String,
    /// AWS region of the bucket
    pub region: String,
    /// Custom endpoint (MinIO, LocalStack); forces path-style addressing
    pub endpoint_url: Option<String>,
    /// Base URL used to build public image links
    pub public_base_url: Option<String>,
}

impl S3Config {
    /// Base URL objects are publicly served from, without a trailing slash
    pub fn public_base_url(&self) -> String {
        if let Some(base) = &self.public_base_url {
            return base.trim_end_matches('/').to_string();
        }

        match &self.endpoint_url {
            Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), self.bucket),
            None => format!("https://{}.s3.{}.amazonaws.com", self.bucket, self.region),
        }
    }
}

/// S3-backed object store
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    region: String,
    public_base_url: String,
}

impl S3ObjectStore {
    /// Build a client from the default AWS credential chain
    pub async fn connect(config: &S3Config) -> Self {
        let timeouts = TimeoutConfig::builder()
            .connect_timeout(Duration::from_secs(5))
            .read_timeout(Duration::from_secs(10))
            .build();

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .timeout_config(timeouts)
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        info!(
            "S3 client initialized for bucket {} in region {}",
            config.bucket, config.region
        );

        Self::new(Client::from_conf(builder.build()), config)
    }

    /// Wrap an existing client
    pub fn new(client: Client, config: &S3Config) -> Self {
        Self {
            client,
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            public_base_url: config.public_base_url(),
        }
    }

    fn classify<E>(&self, err: SdkError<E, HttpResponse>, key: &str) -> StoreError
    where
        E: ProvideErrorMetadata + std::error::Error + 'static,
    {
        let status = err.raw_response().map(|response| response.status().as_u16());
        let code = err.code().map(str::to_string);
        let message = DisplayErrorContext(&err).to_string();

        match (code.as_deref(), status) {
            (Some("NoSuchKey") | Some("NotFound"), _) | (None, Some(404)) => {
                StoreError::NotFound(key.to_string())
            }
            (Some("NoSuchBucket"), _) => StoreError::BucketNotFound(self.bucket.clone()),
            (Some("AccessDenied") | Some("Forbidden"), _) | (None, Some(403)) => {
                StoreError::AccessDenied(message)
            }
            _ => {
                let code = code.unwrap_or_else(|| transport_code(&err).to_string());
                error!("S3 request for {} failed ({}): {}", key, code, message);
                StoreError::Upstream { code, message }
            }
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<ObjectSummary>> {
        let mut objects = Vec::new();
        let mut continuation_token = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);

            if let Some(token) = continuation_token {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| self.classify(e, prefix))?;

            for obj in response.contents() {
                if let Some(key) = obj.key() {
                    objects.push(ObjectSummary {
                        key: key.to_string(),
                        size: obj.size().unwrap_or(0).max(0) as u64,
                        last_modified: obj.last_modified().and_then(to_chrono),
                    });
                }
            }

            if response.is_truncated().unwrap_or(false) {
                continuation_token = response.next_continuation_token().map(str::to_string);
                if continuation_token.is_none() {
                    break;
                }
            } else {
                break;
            }
        }

        Ok(objects)
    }

    async fn head(&self, key: &str) -> StoreResult<ObjectHead> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| self.classify(e, key))?;

        Ok(ObjectHead {
            content_type: output.content_type().map(str::to_string),
            content_length: output.content_length().unwrap_or(0).max(0) as u64,
            last_modified: output.last_modified().and_then(to_chrono),
            metadata: normalize_metadata(output.metadata().cloned().unwrap_or_default()),
        })
    }

    async fn put(&self, object: NewObject) -> StoreResult<()> {
        info!("Uploading object to S3: {}", object.key);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&object.key)
            .body(ByteStream::from(object.body))
            .content_type(object.content_type)
            .set_metadata(Some(object.metadata))
            .send()
            .await
            .map_err(|e| self.classify(e, &object.key))?;

        Ok(())
    }

    async fn replace_metadata(
        &self,
        key: &str,
        content_type: Option<&str>,
        metadata: Metadata,
    ) -> StoreResult<()> {
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .key(key)
            .copy_source(copy_source(&self.bucket, key))
            .metadata_directive(MetadataDirective::Replace)
            .set_content_type(content_type.map(str::to_string))
            .set_metadata(Some(metadata))
            .send()
            .await
            .map_err(|e| self.classify(e, key))?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| self.classify(e, key))?;

        Ok(())
    }

    async fn check_bucket(&self) -> StoreResult<BucketStatus> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| match self.classify(e, &self.bucket) {
                StoreError::NotFound(_) => StoreError::BucketNotFound(self.bucket.clone()),
                other => other,
            })?;

        let response = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .max_keys(1)
            .send()
            .await
            .map_err(|e| self.classify(e, &self.bucket))?;

        Ok(BucketStatus {
            bucket: self.bucket.clone(),
            region: self.region.clone(),
            object_count: response.contents().len(),
        })
    }
}

fn to_chrono(dt: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())
}

fn transport_code<E, R>(err: &SdkError<E, R>) -> &'static str {
    match err {
        SdkError::TimeoutError(_) => "TimeoutError",
        SdkError::DispatchFailure(_) => "NetworkingError",
        SdkError::ConstructionFailure(_) => "ConstructionFailure",
        SdkError::ResponseError(_) => "ResponseError",
        _ => "UnknownError",
    }
}

/// `CopySource` must be URL-encoded; `/` separators are kept as-is.
fn copy_source(bucket: &str, key: &str) -> String {
    let key = key
        .split('/')
        .map(|segment| urlencoding::encode(segment))
        .collect::<Vec<_>>()
        .join("/");
    format!("{bucket}/{key}")
}
