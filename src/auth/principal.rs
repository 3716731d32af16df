//! The authenticated caller.

use chrono::{DateTime, Utc};

/// An authenticated user identity, bound to one login session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// User ID.
    pub user_id: i64,
    /// Username.
    pub username: String,
    /// Session identifier; unlock tokens are scoped to it.
    pub session_id: String,
    /// When the session ends.
    pub session_expires_at: DateTime<Utc>,
}

impl Principal {
    /// Create a principal for the given session.
    pub fn new(
        user_id: i64,
        username: impl Into<String>,
        session_id: impl Into<String>,
        session_expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            username: username.into(),
            session_id: session_id.into(),
            session_expires_at,
        }
    }
}
