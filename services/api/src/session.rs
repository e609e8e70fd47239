//! In-memory admin session management
//!
//! Sessions live only as long as the process. Expired entries are swept when
//! someone logs in and dropped when a lookup finds them stale.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::credentials::AdminCredentials;

/// An authenticated admin session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(skip_serializing)]
    pub id: String,
    pub username: String,
    pub login_time: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Session store for the admin panel
#[derive(Clone)]
pub struct SessionStore {
    credentials: AdminCredentials,
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    ttl: TimeDelta,
}

impl SessionStore {
    /// Create a new session store
    pub fn new(credentials: AdminCredentials, ttl_seconds: u64) -> Self {
        let ttl = i64::try_from(ttl_seconds)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::hours(1));

        Self {
            credentials,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Session lifetime in seconds
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }

    /// Check credentials and open a session. Returns `None` on mismatch.
    pub async fn login(&self, username: &str, password: &str) -> Option<Session> {
        self.login_at(username, password, Utc::now()).await
    }

    pub async fn login_at(
        &self,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Option<Session> {
        if !self.credentials.verify(username, password) {
            info!("Rejected admin login for user: {}", username);
            return None;
        }

        let session = Session {
            id: generate_session_id(),
            username: username.to_string(),
            login_time: now,
            expires_at: now
                .checked_add_signed(self.ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };

        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());

        let swept = self.sweep_expired_at(now).await;
        info!(
            "Admin {} logged in, {} active sessions ({} expired swept)",
            username,
            self.active_sessions().await,
            swept
        );

        Some(session)
    }

    /// Look up a live session. Expired sessions are removed and rejected.
    pub async fn authenticate(&self, session_id: &str) -> Option<Session> {
        self.authenticate_at(session_id, Utc::now()).await
    }

    pub async fn authenticate_at(&self, session_id: &str, now: DateTime<Utc>) -> Option<Session> {
        let session = self.sessions.read().await.get(session_id).cloned()?;

        if session.is_expired_at(now) {
            info!("Session for {} expired at {}", session.username, session.expires_at);
            self.sessions.write().await.remove(session_id);
            return None;
        }

        Some(session)
    }

    /// Drop a session. Unknown ids are ignored.
    pub async fn logout(&self, session_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(session_id);
        if let Some(session) = &removed {
            info!("Admin {} logged out", session.username);
        }
        removed.is_some()
    }

    /// Remove every expired session, returning how many were dropped
    pub async fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired_at(now));
        before - sessions.len()
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// 32 random bytes, hex encoded
fn generate_session_id() -> String {
    hex::encode(rand::random::<[u8; 32]>())
}
