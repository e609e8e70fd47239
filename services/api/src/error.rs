//! Custom error types for the site API

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use ngo_common::StoreError;
use serde_json::{Map, Value, json};
use thiserror::Error;

/// Custom error type for the site API
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing or malformed input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Login with a wrong username or password
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Missing, unknown or expired session
    #[error("Unauthorized")]
    Unauthorized,

    /// Requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Client exceeded the request budget
    #[error("Too many requests")]
    TooManyRequests,

    /// Object store failure, passed through with its code
    #[error("{error}: {details}")]
    Upstream {
        error: String,
        details: String,
        code: Option<String>,
        suggestion: Option<String>,
    },
}

impl ApiError {
    /// Map a storage failure, labelling it with what we were trying to do
    pub fn store(context: &str, err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => ApiError::NotFound("Image not found".to_string()),
            other => ApiError::Upstream {
                error: context.to_string(),
                details: other.to_string(),
                code: Some(other.code().to_string()),
                suggestion: None,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            ApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "Invalid credentials" }),
            ),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, json!({ "error": "Unauthorized" })),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            ApiError::TooManyRequests => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({ "error": "Too many requests, please try again later." }),
            ),
            ApiError::Upstream {
                error,
                details,
                code,
                suggestion,
            } => {
                let mut body = Map::new();
                body.insert("error".to_string(), Value::String(error));
                body.insert("details".to_string(), Value::String(details));
                if let Some(code) = code {
                    body.insert("code".to_string(), Value::String(code));
                }
                if let Some(suggestion) = suggestion {
                    body.insert("suggestion".to_string(), Value::String(suggestion));
                }
                (StatusCode::INTERNAL_SERVER_ERROR, Value::Object(body))
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
