use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crosstalk_core::SessionId;
use crosstalk_telemetry::MetricsRecorder;

/// A logged-in session. The opaque token is the registry key; it is only
/// ever stored in the browser cookie.
#[derive(Clone, Debug)]
pub struct Session {
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Server-side session registry. Tokens map to usernames; expiry is
/// enforced on lookup and by the periodic purge task. Restarting the
/// process logs everyone out.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<String, Session>>,
    ttl: chrono::Duration,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl)
            .unwrap_or_else(|_| chrono::Duration::seconds(86_400));
        Self {
            sessions: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Open a session for `username`; returns the cookie token.
    pub fn create(&self, username: &str) -> String {
        let token = SessionId::new().to_string();
        let now = Utc::now();
        self.sessions.insert(
            token.clone(),
            Session {
                username: username.to_string(),
                created_at: now,
                expires_at: now + self.ttl,
            },
        );
        token
    }

    /// Resolve a token. Expired entries are removed on the spot.
    pub fn resolve(&self, token: &str) -> Option<Session> {
        if let Some(entry) = self.sessions.get(token) {
            if entry.expires_at > Utc::now() {
                return Some(entry.clone());
            }
        }
        self.sessions.remove(token);
        None
    }

    /// Drop a session (logout). Returns whether it existed.
    pub fn revoke(&self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    /// Remove every expired session; returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.expires_at > now);
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Spawn the periodic purge loop for expired sessions.
pub fn start_purge_task(
    registry: SessionRegistry,
    interval: Duration,
    metrics: Arc<MetricsRecorder>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let removed = registry.purge_expired();
            if removed > 0 {
                tracing::info!(removed = removed, "expired session purge");
            }
            metrics.gauge_set("sessions.active", &[], registry.len() as f64);
        }
    })
}
