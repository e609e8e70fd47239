//! Session authentication and rate limiting middleware

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use axum_extra::{TypedHeader, headers};
use std::net::SocketAddr;
use tracing::{debug, warn};

use crate::{error::ApiError, state::AppState};

static X_SESSION_ID: HeaderName = HeaderName::from_static("x-session-id");

/// The `X-Session-Id` header carrying the admin session token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(pub String);

impl headers::Header for SessionId {
    fn name() -> &'static HeaderName {
        &X_SESSION_ID
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = values
            .next()
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(headers::Error::invalid)?;

        Ok(SessionId(value.to_string()))
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        if let Ok(value) = HeaderValue::from_str(&self.0) {
            values.extend(std::iter::once(value));
        }
    }
}

/// Reject requests without a live admin session.
///
/// The session is inserted into the request extensions for handlers.
pub async fn auth_middleware(
    State(state): State<AppState>,
    session_id: Option<TypedHeader<SessionId>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(SessionId(session_id)) = session_id.ok_or(ApiError::Unauthorized)?;

    let session = state
        .sessions
        .authenticate(&session_id)
        .await
        .ok_or(ApiError::Unauthorized)?;

    req.extensions_mut().insert(session);

    Ok(next.run(req).await)
}

/// Apply the fixed-window limit per client
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let key = client_key(&req);

    if !state.rate_limiter.is_allowed(&key).await {
        let config = state.rate_limiter.config();
        warn!(
            "Rejecting {} {} from {}: over {} requests per {}s",
            req.method(),
            req.uri().path(),
            key,
            config.max_requests,
            config.window_seconds
        );
        return Err(ApiError::TooManyRequests);
    }

    debug!("Rate limit check passed for {}", key);
    Ok(next.run(req).await)
}

/// First `X-Forwarded-For` hop, else the peer address, else `unknown`
pub fn client_key<B>(req: &Request<B>) -> String {
    let forwarded = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty());

    if let Some(hop) = forwarded {
        return hop.to_string();
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
