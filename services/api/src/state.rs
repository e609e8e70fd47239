//! Application state shared across handlers

use crate::{
    contact::ContactService, rate_limiter::RateLimiter, repositories::ImageRepository,
    session::SessionStore,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionStore,
    pub images: ImageRepository,
    pub contact: ContactService,
    pub rate_limiter: RateLimiter,
}
