//! In-memory session manager.
//!
//! Holds at most one live session per client. Sessions are indexed both by
//! session ID and by client ID; both indexes sit behind a single lock so
//! they never disagree.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::AuthnError;
use crate::clock::Clock;

/// Default session lifetime.
pub const DEFAULT_SESSION_DAYS: i64 = 30;

/// A live login session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(rename = "sessionID")]
    pub session_id: String,
    #[serde(rename = "clientID")]
    pub client_id: String,
    pub created: DateTime<Utc>,
    pub expiry: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry <= now
    }
}

#[derive(Debug, Default)]
struct SessionIndex {
    by_session_id: HashMap<String, Session>,
    /// clientID -> sessionID
    by_client_id: HashMap<String, String>,
}

impl SessionIndex {
    fn remove_session(&mut self, session_id: &str) -> Option<Session> {
        let session = self.by_session_id.remove(session_id)?;
        if self.by_client_id.get(&session.client_id).map(String::as_str) == Some(session_id) {
            self.by_client_id.remove(&session.client_id);
        }
        Some(session)
    }
}

/// Tracks live sessions with expiry.
pub struct SessionManager {
    sessions: RwLock<SessionIndex>,
    duration: Duration,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("count", &self.count())
            .field("duration", &self.duration)
            .finish()
    }
}

impl SessionManager {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_duration(clock, Duration::days(DEFAULT_SESSION_DAYS))
    }

    /// A non-positive duration falls back to the default.
    pub fn with_duration(clock: Arc<dyn Clock>, duration: Duration) -> Self {
        let duration = if duration <= Duration::zero() {
            tracing::warn!(?duration, "invalid session duration, using default");
            Duration::days(DEFAULT_SESSION_DAYS)
        } else {
            duration
        };
        Self {
            sessions: RwLock::new(SessionIndex::default()),
            duration,
            clock,
        }
    }

    pub fn session_duration(&self) -> Duration {
        self.duration
    }

    /// Create or renew the session of `client_id`.
    ///
    /// The same session ID renews the expiry; a different one replaces the
    /// client's previous session.
    pub fn new_session(&self, client_id: &str, session_id: &str) -> Result<Session, AuthnError> {
        if client_id.is_empty() || session_id.is_empty() {
            return Err(AuthnError::InvalidArgument(
                "clientID and sessionID are required".into(),
            ));
        }
        let now = self.clock.now();
        let expiry = now + self.duration;
        let mut index = self.sessions.write();

        if let Some(existing_sid) = index.by_client_id.get(client_id).cloned() {
            if existing_sid == session_id
                && let Some(session) = index.by_session_id.get_mut(session_id)
            {
                session.expiry = expiry;
                debug!(client_id, session_id, "renewed session");
                return Ok(session.clone());
            }
            index.remove_session(&existing_sid);
            info!(client_id, old_session_id = %existing_sid, "replaced previous session");
        }
        // A session ID owned by another client is taken over by this one.
        index.remove_session(session_id);

        let session = Session {
            session_id: session_id.to_string(),
            client_id: client_id.to_string(),
            created: now,
            expiry,
        };
        index
            .by_session_id
            .insert(session_id.to_string(), session.clone());
        index
            .by_client_id
            .insert(client_id.to_string(), session_id.to_string());
        debug!(client_id, session_id, "created session");
        Ok(session)
    }

    /// Look up a session. An expired session is removed and still returned
    /// so the caller can tell expired from unknown.
    pub fn get_session_by_session_id(&self, session_id: &str) -> Option<Session> {
        let now = self.clock.now();
        let session = self.sessions.read().by_session_id.get(session_id).cloned()?;
        if session.is_expired(now) {
            let mut index = self.sessions.write();
            let still_expired = index
                .by_session_id
                .get(session_id)
                .is_some_and(|s| s.is_expired(now));
            if still_expired {
                index.remove_session(session_id);
                debug!(client_id = %session.client_id, session_id, "evicted expired session");
            }
        }
        Some(session)
    }

    /// Look up the session of a client. Expired sessions are handled as in
    /// [`SessionManager::get_session_by_session_id`].
    pub fn get_session_by_client_id(&self, client_id: &str) -> Option<Session> {
        let session_id = self.sessions.read().by_client_id.get(client_id).cloned()?;
        self.get_session_by_session_id(&session_id)
    }

    /// Remove a session. Idempotent.
    pub fn remove(&self, session_id: &str) {
        if let Some(session) = self.sessions.write().remove_session(session_id) {
            debug!(client_id = %session.client_id, session_id, "removed session");
        }
    }

    /// Remove the session of a client. Idempotent.
    pub fn remove_by_client_id(&self, client_id: &str) {
        let mut index = self.sessions.write();
        if let Some(session_id) = index.by_client_id.get(client_id).cloned() {
            index.remove_session(&session_id);
            debug!(client_id, session_id = %session_id, "removed session");
        }
    }

    pub fn remove_all(&self) {
        let mut index = self.sessions.write();
        let count = index.by_session_id.len();
        *index = SessionIndex::default();
        info!(count, "removed all sessions");
    }

    /// Drop every expired session. Returns how many were removed.
    pub fn remove_expired(&self) -> usize {
        let now = self.clock.now();
        let mut index = self.sessions.write();
        let expired: Vec<String> = index
            .by_session_id
            .values()
            .filter(|s| s.is_expired(now))
            .map(|s| s.session_id.clone())
            .collect();
        for session_id in &expired {
            index.remove_session(session_id);
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "removed expired sessions");
        }
        expired.len()
    }

    /// Snapshot of all sessions, ordered by clientID.
    pub fn get_sessions(&self) -> Vec<Session> {
        let mut sessions: Vec<Session> =
            self.sessions.read().by_session_id.values().cloned().collect();
        sessions.sort_by(|a, b| a.client_id.cmp(&b.client_id));
        sessions
    }

    pub fn count(&self) -> usize {
        self.sessions.read().by_session_id.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn manager() -> (Arc<ManualClock>, SessionManager) {
        let clock = Arc::new(ManualClock::starting_now());
        let sm = SessionManager::new(clock.clone());
        (clock, sm)
    }

    #[test]
    fn new_session_rejects_empty_ids() {
        let (_, sm) = manager();
        assert!(sm.new_session("", "s1").is_err());
        assert!(sm.new_session("alice", "").is_err());
        assert_eq!(sm.count(), 0);
    }

    #[test]
    fn new_session_creates_with_default_expiry() {
        let (clock, sm) = manager();
        let session = sm.new_session("alice", "s1").unwrap();
        assert_eq!(session.created, clock.now());
        assert_eq!(session.expiry, clock.now() + Duration::days(30));
        assert!(session.expiry > session.created);
    }

    #[test]
    fn same_session_id_renews_expiry() {
        let (clock, sm) = manager();
        let first = sm.new_session("alice", "s1").unwrap();
        clock.advance(Duration::days(1));
        let renewed = sm.new_session("alice", "s1").unwrap();
        assert_eq!(renewed.created, first.created);
        assert_eq!(renewed.expiry, first.expiry + Duration::days(1));
        assert_eq!(sm.count(), 1);
    }

    #[test]
    fn different_session_id_evicts_previous() {
        let (_, sm) = manager();
        sm.new_session("alice", "s1").unwrap();
        sm.new_session("alice", "s2").unwrap();
        assert!(sm.get_session_by_session_id("s1").is_none());
        assert_eq!(sm.get_session_by_client_id("alice").unwrap().session_id, "s2");
        assert_eq!(sm.count(), 1);
    }

    #[test]
    fn remove_is_idempotent_and_clears_both_indexes() {
        let (_, sm) = manager();
        sm.new_session("alice", "s1").unwrap();
        sm.remove("s1");
        sm.remove("s1");
        assert!(sm.get_session_by_client_id("alice").is_none());
        assert!(sm.get_session_by_session_id("s1").is_none());
    }

    #[test]
    fn remove_by_client_id_drops_session() {
        let (_, sm) = manager();
        sm.new_session("alice", "s1").unwrap();
        sm.new_session("bob", "s2").unwrap();
        sm.remove_by_client_id("alice");
        sm.remove_by_client_id("alice");
        assert!(sm.get_session_by_session_id("s1").is_none());
        assert!(sm.get_session_by_session_id("s2").is_some());
    }

    #[test]
    fn expired_session_is_returned_once_then_gone() {
        let (clock, sm) = manager();
        sm.new_session("alice", "s1").unwrap();
        clock.advance(Duration::days(31));
        let dead = sm.get_session_by_session_id("s1").unwrap();
        assert!(dead.is_expired(clock.now()));
        assert!(sm.get_session_by_session_id("s1").is_none());
        assert!(sm.get_session_by_client_id("alice").is_none());
    }

    #[test]
    fn remove_expired_sweeps_only_dead_sessions() {
        let (clock, sm) = manager();
        sm.new_session("alice", "s1").unwrap();
        clock.advance(Duration::days(20));
        sm.new_session("bob", "s2").unwrap();
        clock.advance(Duration::days(15));
        assert_eq!(sm.remove_expired(), 1);
        let remaining = sm.get_sessions();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].client_id, "bob");
    }

    #[test]
    fn remove_all_clears_everything() {
        let (_, sm) = manager();
        sm.new_session("alice", "s1").unwrap();
        sm.new_session("bob", "s2").unwrap();
        sm.remove_all();
        assert_eq!(sm.count(), 0);
        assert!(sm.get_session_by_client_id("bob").is_none());
    }

    #[test]
    fn session_id_reused_by_other_client_moves_ownership() {
        let (_, sm) = manager();
        sm.new_session("alice", "shared").unwrap();
        sm.new_session("bob", "shared").unwrap();
        assert!(sm.get_session_by_client_id("alice").is_none());
        assert_eq!(sm.get_session_by_session_id("shared").unwrap().client_id, "bob");
        assert_eq!(sm.count(), 1);
    }

    #[test]
    fn non_positive_duration_falls_back_to_default() {
        let clock = Arc::new(ManualClock::starting_now());
        let sm = SessionManager::with_duration(clock, Duration::zero());
        assert_eq!(sm.session_duration(), Duration::days(30));
    }
}
