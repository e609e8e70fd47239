//! Image models for the gallery endpoints

use serde::{Deserialize, Serialize};

/// An image stored in the bucket, as the site and admin panel see it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub key: String,
    pub url: String,
    pub category: String,
    pub description: String,
    pub original_name: String,
    pub upload_date: String,
    pub size: u64,
}

/// Query parameters for image listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageQuery {
    /// Only list images of this category
    pub category: Option<String>,
}

/// Response for image listing
#[derive(Debug, Serialize)]
pub struct ImageListResponse {
    pub success: bool,
    pub count: usize,
    pub images: Vec<ImageRecord>,
}

/// Response for an upload request
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub files: Vec<ImageRecord>,
}

/// A validated file taken from the multipart form
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub original_name: String,
    pub content_type: String,
    pub extension: String,
    pub data: Vec<u8>,
}

/// Request for a description update
#[derive(Debug, Deserialize)]
pub struct UpdateMetadataRequest {
    #[serde(default)]
    pub description: Option<String>,
}

/// Response for a description update
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMetadataResponse {
    pub success: bool,
    pub message: String,
    pub new_description: String,
}

/// Response for the bucket connectivity check
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionTestResponse {
    pub success: bool,
    pub message: String,
    pub bucket: String,
    pub region: String,
    pub object_count: usize,
}
