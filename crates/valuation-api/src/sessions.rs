use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use dashmap::DashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;
use valuation_admin::CalculatorSession;

use crate::AppError;

pub const SESSION_HEADER: &str = "x-session-id";

struct SessionEntry {
    session: CalculatorSession,
    last_seen: Instant,
}

/// Per-user calculator sessions keyed by a random id.
///
/// Each session owns its own registries, inputs and admin state; nothing is
/// shared between sessions.
pub struct SessionStore {
    sessions: DashMap<String, SessionEntry>,
    idle_timeout: Duration,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            idle_timeout,
            max_sessions,
        }
    }

    /// Start a session with the built-in fields and formulas.
    /// Returns `None` when the store is full even after expiring idle sessions.
    pub fn create(&self) -> Option<String> {
        if self.sessions.len() >= self.max_sessions {
            self.cleanup();
            if self.sessions.len() >= self.max_sessions {
                tracing::warn!("Session limit of {} reached", self.max_sessions);
                return None;
            }
        }

        let id = Uuid::new_v4().to_string();
        self.sessions.insert(
            id.clone(),
            SessionEntry {
                session: CalculatorSession::new(),
                last_seen: Instant::now(),
            },
        );
        tracing::debug!("Session {} created ({} active)", id, self.sessions.len());
        Some(id)
    }

    /// Run `f` against a session, marking it as recently used.
    /// Returns `None` for unknown or expired ids.
    pub fn with_session<R>(&self, id: &str, f: impl FnOnce(&mut CalculatorSession) -> R) -> Option<R> {
        let mut entry = self.sessions.get_mut(id)?;
        entry.last_seen = Instant::now();
        Some(f(&mut entry.session))
    }

    pub fn remove(&self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop sessions idle longer than the timeout.
    /// Called periodically by a background task.
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions
            .retain(|_, entry| now.duration_since(entry.last_seen) < self.idle_timeout);
        let removed = before.saturating_sub(self.sessions.len());
        if removed > 0 {
            tracing::info!("Expired {} idle sessions", removed);
        }
        removed
    }
}

/// Session id taken from the `X-Session-Id` header.
#[derive(Debug, Clone)]
pub struct SessionId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for SessionId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| SessionId(s.to_string()))
            .ok_or_else(|| {
                AppError::bad_request("Missing session id. Create one via POST /api/sessions and send it as X-Session-Id.")
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sessions_are_isolated() {
        let store = SessionStore::new(Duration::from_secs(60), 10);
        let a = store.create().unwrap();
        let b = store.create().unwrap();
        assert_ne!(a, b);

        store.with_session(&a, |s| s.set_input("price", "10")).unwrap();
        let b_price = store.with_session(&b, |s| s.inputs().get("price").to_string());
        assert_eq!(b_price.as_deref(), Some(""));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_unknown_session() {
        let store = SessionStore::new(Duration::from_secs(60), 10);
        assert!(store.with_session("nope", |_| ()).is_none());
        assert!(!store.remove("nope"));
    }

    #[test]
    fn test_cleanup_drops_idle_sessions() {
        let store = SessionStore::new(Duration::ZERO, 10);
        store.create();
        store.create();
        assert_eq!(store.cleanup(), 2);
        assert!(store.is_empty());

        let store = SessionStore::new(Duration::from_secs(3600), 10);
        store.create();
        assert_eq!(store.cleanup(), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_session_limit() {
        let store = SessionStore::new(Duration::from_secs(3600), 2);
        assert!(store.create().is_some());
        assert!(store.create().is_some());
        assert!(store.create().is_none());
        assert_eq!(store.len(), 2);

        // Idle sessions are expired to make room
        let store = SessionStore::new(Duration::ZERO, 1);
        assert!(store.create().is_some());
        assert!(store.create().is_some());
        assert_eq!(store.len(), 1);
    }
}
