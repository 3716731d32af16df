//! Session-scoped unlock tokens.
//!
//! After a caller proves knowledge of a file or folder password, the pair
//! (session, target) is remembered until the session expires. Changing the
//! target's password revokes every token for it.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

/// A password-gatable resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetRef {
    /// A stored file.
    File(i64),
    /// A folder.
    Folder(i64),
}

/// In-memory store of unlock tokens.
#[derive(Debug, Default)]
pub struct UnlockStore {
    tokens: RwLock<HashMap<(String, TargetRef), DateTime<Utc>>>,
}

impl UnlockStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `session_id` unlocked `target` until `expires_at`.
    pub fn grant(&self, session_id: &str, target: TargetRef, expires_at: DateTime<Utc>) {
        let mut tokens = self.tokens.write().unwrap_or_else(|e| e.into_inner());
        tokens.insert((session_id.to_string(), target), expires_at);
    }

    /// Check for a live token at `now`.
    pub fn is_unlocked(&self, session_id: &str, target: TargetRef, now: DateTime<Utc>) -> bool {
        let tokens = self.tokens.read().unwrap_or_else(|e| e.into_inner());
        tokens
            .get(&(session_id.to_string(), target))
            .map(|expires_at| *expires_at > now)
            .unwrap_or(false)
    }

    /// Drop every session's token for `target`.
    pub fn revoke_target(&self, target: TargetRef) -> usize {
        let mut tokens = self.tokens.write().unwrap_or_else(|e| e.into_inner());
        let before = tokens.len();
        tokens.retain(|(_, t), _| *t != target);
        before - tokens.len()
    }

    /// Remove tokens that expired before `now`.
    pub fn prune_expired(&self, now: DateTime<Utc>) -> usize {
        let mut tokens = self.tokens.write().unwrap_or_else(|e| e.into_inner());
        let before = tokens.len();
        tokens.retain(|_, expires_at| *expires_at > now);
        before - tokens.len()
    }

    /// Number of live and expired tokens held.
    pub fn len(&self) -> usize {
        self.tokens.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Check if the store holds no tokens.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_grant_scoped_to_session_and_target() {
        let store = UnlockStore::new();
        let now = Utc::now();
        store.grant("s1", TargetRef::Folder(1), now + Duration::hours(1));

        assert!(store.is_unlocked("s1", TargetRef::Folder(1), now));
        assert!(!store.is_unlocked("s2", TargetRef::Folder(1), now));
        assert!(!store.is_unlocked("s1", TargetRef::Folder(2), now));
        assert!(!store.is_unlocked("s1", TargetRef::File(1), now));
    }

    #[test]
    fn test_token_expires_with_session() {
        let store = UnlockStore::new();
        let now = Utc::now();
        store.grant("s1", TargetRef::File(7), now + Duration::minutes(5));

        assert!(store.is_unlocked("s1", TargetRef::File(7), now));
        assert!(!store.is_unlocked("s1", TargetRef::File(7), now + Duration::minutes(6)));
    }

    #[test]
    fn test_revoke_target() {
        let store = UnlockStore::new();
        let later = Utc::now() + Duration::hours(1);
        store.grant("s1", TargetRef::Folder(1), later);
        store.grant("s2", TargetRef::Folder(1), later);
        store.grant("s1", TargetRef::Folder(2), later);

        assert_eq!(store.revoke_target(TargetRef::Folder(1)), 2);
        assert_eq!(store.len(), 1);
        assert!(store.is_unlocked("s1", TargetRef::Folder(2), Utc::now()));
    }

    #[test]
    fn test_prune_expired() {
        let store = UnlockStore::new();
        let now = Utc::now();
        store.grant("old", TargetRef::File(1), now - Duration::seconds(1));
        store.grant("new", TargetRef::File(1), now + Duration::hours(1));

        assert_eq!(store.prune_expired(now), 1);
        assert_eq!(store.len(), 1);
        assert!(!store.is_empty());
    }
}
