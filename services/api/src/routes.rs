//! Site API routes

use axum::{
    Extension, Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State, multipart::MultipartError},
    http::{HeaderValue, Method, header},
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use axum_extra::TypedHeader;
use ngo_common::StoreError;
use serde_json::json;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::{
    config::AppConfig,
    error::{ApiError, ApiResult},
    middleware::{SessionId, auth_middleware, rate_limit_middleware},
    models::{
        LoginRequest, LoginResponse, SuccessResponse, VerifyResponse,
        contact::ContactRequest,
        image::{
            ConnectionTestResponse, ImageListResponse, ImageQuery, ImageUpload,
            UpdateMetadataRequest, UpdateMetadataResponse, UploadResponse,
        },
    },
    session::Session,
    state::AppState,
    validation::{
        MAX_FILE_SIZE, MAX_FILES_PER_UPLOAD, sanitize_metadata_value, validate_category,
        validate_image_file,
    },
};

/// Request body limit for uploads, with headroom for the form fields
const UPLOAD_BODY_LIMIT: usize = MAX_FILES_PER_UPLOAD * MAX_FILE_SIZE + 1024 * 1024;

/// Category that needs a description on every upload
const TEAM_CATEGORY: &str = "team";

/// Create the router for the site API
pub fn create_router(state: AppState, cors: CorsLayer) -> Router {
    let protected_routes = Router::new()
        .route("/api/admin/verify", get(verify_session))
        .route(
            "/api/images/upload",
            post(upload_images).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/api/images/:key/metadata", put(update_image_metadata))
        .route("/api/images/:key", delete(delete_image))
        .route("/api/s3/test", get(test_connection))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let api_routes = Router::new()
        .route("/api/admin/login", post(login))
        .route("/api/admin/logout", post(logout))
        .route("/api/images", get(list_images))
        .route("/api/contact", post(submit_contact))
        .merge(protected_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(api_routes)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Permissive CORS in development, configured origins only in production
pub fn cors_layer(config: &AppConfig) -> CorsLayer {
    if !config.is_production() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::HeaderName::from_static("x-session-id")])
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "ngo-site"
    }))
}

/// Exchange admin credentials for a session token
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let session = state
        .sessions
        .login(&payload.username, &payload.password)
        .await
        .ok_or(ApiError::InvalidCredentials)?;

    Ok(Json(LoginResponse {
        success: true,
        session_id: session.id,
        expires_in: state.sessions.ttl_seconds(),
    }))
}

/// End the caller's session, if it has one
pub async fn logout(
    State(state): State<AppState>,
    session_id: Option<TypedHeader<SessionId>>,
) -> Json<SuccessResponse> {
    if let Some(TypedHeader(SessionId(id))) = session_id {
        state.sessions.logout(&id).await;
    }

    Json(SuccessResponse::with_message("Logged out successfully"))
}

/// Report who the session belongs to and when it ends
pub async fn verify_session(Extension(session): Extension<Session>) -> Json<VerifyResponse> {
    Json(VerifyResponse {
        success: true,
        username: session.username,
        expires_at: session.expires_at,
    })
}

/// List images, newest first
pub async fn list_images(
    State(state): State<AppState>,
    Query(query): Query<ImageQuery>,
) -> ApiResult<Json<ImageListResponse>> {
    let category = query
        .category
        .as_deref()
        .map(str::trim)
        .filter(|category| !category.is_empty() && *category != "all");

    if let Some(category) = category {
        validate_category(category).map_err(ApiError::BadRequest)?;
    }

    let images = state.images.list_images(category).await.map_err(|e| {
        error!("Failed to list images: {}", e);
        ApiError::store("Failed to list images", e)
    })?;

    Ok(Json(ImageListResponse {
        success: true,
        count: images.len(),
        images,
    }))
}

/// Upload one or more images into a category
pub async fn upload_images(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let mut category = String::new();
    let mut description = String::new();
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("category") => category = field.text().await.map_err(multipart_error)?,
            Some("description") => description = field.text().await.map_err(multipart_error)?,
            Some("images") | Some("images[]") => {
                if files.len() >= MAX_FILES_PER_UPLOAD {
                    return Err(ApiError::BadRequest(format!(
                        "Too many files. Maximum is {}.",
                        MAX_FILES_PER_UPLOAD
                    )));
                }

                let original_name = field.file_name().unwrap_or("image").to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();

                // Reject before reading the body when the type is already wrong
                if !content_type.starts_with("image/") {
                    return Err(ApiError::BadRequest(
                        "Only image files are allowed!".to_string(),
                    ));
                }

                let data = field.bytes().await.map_err(multipart_error)?;
                let extension = validate_image_file(&original_name, &content_type, data.len())
                    .map_err(ApiError::BadRequest)?;

                files.push(ImageUpload {
                    original_name,
                    content_type,
                    extension,
                    data: data.to_vec(),
                });
            }
            other => warn!("Ignoring unexpected upload field: {:?}", other),
        }
    }

    let category = category.trim();
    validate_category(category).map_err(ApiError::BadRequest)?;

    if category == TEAM_CATEGORY && sanitize_metadata_value(&description).is_empty() {
        return Err(ApiError::BadRequest(
            "Description is required for team members".to_string(),
        ));
    }

    if files.is_empty() {
        return Err(ApiError::BadRequest("No files uploaded".to_string()));
    }

    info!(
        "Admin {} uploading {} files to {}",
        session.username,
        files.len(),
        category
    );

    let uploaded = state
        .images
        .upload_images(files, category, &description)
        .await
        .map_err(|e| {
            error!("Failed to upload images: {}", e);
            ApiError::store("Upload failed", e)
        })?;

    Ok(Json(UploadResponse {
        success: true,
        files: uploaded,
    }))
}

/// Replace the description of one image
pub async fn update_image_metadata(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(payload): Json<UpdateMetadataRequest>,
) -> ApiResult<Json<UpdateMetadataResponse>> {
    let description = payload
        .description
        .filter(|description| !sanitize_metadata_value(description).is_empty())
        .ok_or_else(|| ApiError::BadRequest("Description is required".to_string()))?;

    let new_description = state
        .images
        .update_description(&key, &description)
        .await
        .map_err(|e| {
            error!("Failed to update metadata for {}: {}", key, e);
            ApiError::store("Failed to update metadata", e)
        })?;

    Ok(Json(UpdateMetadataResponse {
        success: true,
        message: "Metadata updated successfully".to_string(),
        new_description,
    }))
}

/// Delete one image
pub async fn delete_image(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<SuccessResponse>> {
    state.images.delete_image(&key).await.map_err(|e| {
        error!("Failed to delete {}: {}", key, e);
        ApiError::store("Failed to delete image", e)
    })?;

    Ok(Json(SuccessResponse::with_message("Image deleted successfully")))
}

/// Check the bucket is reachable with the configured credentials
pub async fn test_connection(
    State(state): State<AppState>,
) -> ApiResult<Json<ConnectionTestResponse>> {
    let status = state.images.check_connection().await.map_err(|e| {
        error!("S3 connection test failed: {}", e);
        connection_error(e)
    })?;

    Ok(Json(ConnectionTestResponse {
        success: true,
        message: "S3 connection successful".to_string(),
        bucket: status.bucket,
        region: status.region,
        object_count: status.object_count,
    }))
}

/// Accept a contact form submission
pub async fn submit_contact(
    State(state): State<AppState>,
    Json(payload): Json<ContactRequest>,
) -> ApiResult<Json<SuccessResponse>> {
    state.contact.submit(&payload).await?;

    Ok(Json(SuccessResponse::with_message(
        "Thank you for your message! We will get back to you soon.",
    )))
}

fn multipart_error(err: MultipartError) -> ApiError {
    warn!("Malformed upload: {}", err);
    ApiError::BadRequest(err.body_text())
}

/// Explain a failed connection test in terms an operator can act on
fn connection_error(err: StoreError) -> ApiError {
    let (error, suggestion) = match &err {
        StoreError::BucketNotFound(bucket) => (
            "Bucket does not exist".to_string(),
            format!("Create bucket '{}' in the configured region", bucket),
        ),
        StoreError::AccessDenied(_) => (
            "Access denied to bucket".to_string(),
            "Check IAM permissions for S3 access".to_string(),
        ),
        StoreError::Upstream { code, .. } => match code.as_str() {
            "InvalidAccessKeyId" => (
                "Invalid AWS Access Key ID".to_string(),
                "Check AWS_ACCESS_KEY_ID".to_string(),
            ),
            "SignatureDoesNotMatch" => (
                "Invalid AWS Secret Access Key".to_string(),
                "Check AWS_SECRET_ACCESS_KEY".to_string(),
            ),
            "ExpiredToken" | "TokenRefreshRequired" => (
                "AWS credentials have expired".to_string(),
                "Generate new AWS credentials".to_string(),
            ),
            _ => (
                "S3 connection failed".to_string(),
                "Check AWS credentials and configuration".to_string(),
            ),
        },
        StoreError::NotFound(_) => (
            "S3 connection failed".to_string(),
            "Check AWS credentials and configuration".to_string(),
        ),
    };

    ApiError::Upstream {
        error,
        details: err.to_string(),
        code: Some(err.code().to_string()),
        suggestion: Some(suggestion),
    }
}
