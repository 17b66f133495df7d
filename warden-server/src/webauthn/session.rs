//! Server-held ceremony sessions
//!
//! Sessions are single use and expire after a TTL. At most one session is live per
//! account: binding a new one drops the previous.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use super::CeremonyError;

/// Default session lifetime (5 minutes)
pub const DEFAULT_SESSION_TTL_SECS: u64 = 300;

/// Pending registration ceremony
#[derive(Debug, Clone)]
pub struct CeremonySession {
    pub challenge: Vec<u8>,
    pub account_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Opaque engine state; never sent to the client
    pub engine_state: serde_json::Value,
}

impl CeremonySession {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Session store keyed by an opaque reference
pub struct SessionBinder {
    sessions: DashMap<String, CeremonySession>,
    /// account -> live reference
    by_account: DashMap<Uuid, String>,
    ttl: Duration,
}

impl SessionBinder {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            sessions: DashMap::new(),
            by_account: DashMap::new(),
            ttl: Duration::seconds(ttl_secs.min(i32::MAX as u64) as i64),
        }
    }

    /// Store a session for `account_id`, replacing any earlier one. Returns the reference.
    pub fn bind(&self, account_id: Uuid, challenge: Vec<u8>, engine_state: serde_json::Value) -> String {
        let reference = Uuid::new_v4().to_string();
        let now = Utc::now();

        self.sessions.insert(
            reference.clone(),
            CeremonySession {
                challenge,
                account_id,
                created_at: now,
                expires_at: now + self.ttl,
                engine_state,
            },
        );

        if let Some(previous) = self.by_account.insert(account_id, reference.clone()) {
            self.sessions.remove(&previous);
            tracing::debug!(account_id = %account_id, "Previous ceremony session invalidated");
        }

        reference
    }

    /// Remove and return a session. The session is consumed whatever the outcome.
    pub fn take(&self, reference: &str, account_id: Uuid) -> Result<CeremonySession, CeremonyError> {
        let (_, session) = self
            .sessions
            .remove(reference)
            .ok_or(CeremonyError::SessionNotFound)?;

        self.by_account
            .remove_if(&session.account_id, |_, live| live == reference);

        if session.is_expired(Utc::now()) {
            return Err(CeremonyError::SessionExpired);
        }
        if session.account_id != account_id {
            tracing::warn!(
                bound_account = %session.account_id,
                caller = %account_id,
                "Ceremony session used by another account"
            );
            return Err(CeremonyError::AccountMismatch);
        }

        Ok(session)
    }

    /// Drop expired sessions. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !session.is_expired(now));
        self.by_account
            .retain(|_, reference| self.sessions.contains_key(reference.as_str()));
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl std::fmt::Debug for SessionBinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBinder")
            .field("sessions", &self.sessions.len())
            .field("ttl_secs", &self.ttl.num_seconds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_and_take_once() {
        let binder = SessionBinder::new(300);
        let account = Uuid::new_v4();
        let reference = binder.bind(account, b"c1".to_vec(), serde_json::json!({}));

        let session = binder.take(&reference, account).unwrap();
        assert_eq!(session.challenge, b"c1");
        assert!(binder.is_empty());

        assert!(matches!(
            binder.take(&reference, account),
            Err(CeremonyError::SessionNotFound)
        ));
    }

    #[test]
    fn test_second_bind_invalidates_first() {
        let binder = SessionBinder::new(300);
        let account = Uuid::new_v4();
        let first = binder.bind(account, b"c1".to_vec(), serde_json::json!({}));
        let second = binder.bind(account, b"c2".to_vec(), serde_json::json!({}));

        assert_eq!(binder.len(), 1);
        assert!(matches!(
            binder.take(&first, account),
            Err(CeremonyError::SessionNotFound)
        ));
        assert_eq!(binder.take(&second, account).unwrap().challenge, b"c2");
    }

    #[test]
    fn test_sessions_are_per_account() {
        let binder = SessionBinder::new(300);
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let a = binder.bind(alice, b"a".to_vec(), serde_json::json!({}));
        let b = binder.bind(bob, b"b".to_vec(), serde_json::json!({}));

        assert_eq!(binder.len(), 2);
        assert!(binder.take(&a, alice).is_ok());
        assert!(binder.take(&b, bob).is_ok());
    }

    #[test]
    fn test_expired_session() {
        let binder = SessionBinder::new(0);
        let account = Uuid::new_v4();
        let reference = binder.bind(account, b"c".to_vec(), serde_json::json!({}));

        assert!(matches!(
            binder.take(&reference, account),
            Err(CeremonyError::SessionExpired)
        ));
        // Consumed even though it failed
        assert!(matches!(
            binder.take(&reference, account),
            Err(CeremonyError::SessionNotFound)
        ));
    }

    #[test]
    fn test_account_mismatch_consumes_session() {
        let binder = SessionBinder::new(300);
        let owner = Uuid::new_v4();
        let reference = binder.bind(owner, b"c".to_vec(), serde_json::json!({}));

        assert!(matches!(
            binder.take(&reference, Uuid::new_v4()),
            Err(CeremonyError::AccountMismatch)
        ));
        assert!(binder.is_empty());
    }

    #[test]
    fn test_sweep_expired() {
        let expired = SessionBinder::new(0);
        expired.bind(Uuid::new_v4(), b"a".to_vec(), serde_json::json!({}));
        expired.bind(Uuid::new_v4(), b"b".to_vec(), serde_json::json!({}));
        assert_eq!(expired.sweep_expired(), 2);
        assert!(expired.is_empty());

        let live = SessionBinder::new(300);
        live.bind(Uuid::new_v4(), b"a".to_vec(), serde_json::json!({}));
        assert_eq!(live.sweep_expired(), 0);
        assert_eq!(live.len(), 1);
    }
}
