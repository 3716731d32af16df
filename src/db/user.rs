//! User model for Sharebox.
//!
//! Users are provisioned by the identity provider; this crate only keeps
//! what file sharing needs: the unique username and the avatar reference.

/// User entity from the database.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct User {
    /// Unique user ID.
    pub id: i64,
    /// Unique username.
    pub username: String,
    /// Stored name of the avatar image, if any.
    pub avatar: Option<String>,
    /// Account creation timestamp.
    pub created_at: String,
}

/// New user for insertion into the database.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Unique username.
    pub username: String,
}

impl NewUser {
    /// Create a new user with the given username.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user() {
        let user = NewUser::new("alice");
        assert_eq!(user.username, "alice");
    }
}
