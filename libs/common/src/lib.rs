//! Common library for the NGO site backend
//!
//! This crate provides the object storage layer shared by the site services:
//! the [`storage::ObjectStore`] abstraction, its S3 backend and an in-memory
//! backend for tests.

pub mod error;
pub mod memory;
pub mod s3;
pub mod storage;

pub use error::{StoreError, StoreResult};
pub use storage::{BucketStatus, Metadata, NewObject, ObjectHead, ObjectStore, ObjectSummary};

/// Example usage of the storage layer
///
/// ```rust,no_run
/// use ngo_common::s3::{S3Config, S3ObjectStore};
/// use ngo_common::ObjectStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = S3Config {
///         bucket: "ngo-site".to_string(),
///         region: "eu-north-1".to_string(),
///         endpoint_url: None,
///         public_base_url: None,
///     };
///     let store = S3ObjectStore::connect(&config).await;
///     let status = store.check_bucket().await?;
///     println!("Bucket {} reachable", status.bucket);
///     Ok(())
/// }
/// ```
pub fn example_usage() {}
