//! Custom error types for the common library
//!
//! Object store backends translate their native failures into [`StoreError`]
//! so callers can tell a missing object apart from an unreachable bucket.

use thiserror::Error;

/// Custom error type for object store operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The requested object key does not exist
    #[error("Object not found: {0}")]
    NotFound(String),

    /// The configured bucket does not exist or is not visible to us
    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    /// Credentials were rejected or lack permission
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Any other failure reported by the storage service or transport
    #[error("Object store error ({code}): {message}")]
    Upstream { code: String, message: String },
}

impl StoreError {
    /// Short machine-readable code, mirroring the S3 error code where one exists
    pub fn code(&self) -> &str {
        match self {
            StoreError::NotFound(_) => "NoSuchKey",
            StoreError::BucketNotFound(_) => "NoSuchBucket",
            StoreError::AccessDenied(_) => "AccessDenied",
            StoreError::Upstream { code, .. } => code,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Type alias for Result with StoreError
pub type StoreResult<T> = Result<T, StoreError>;
