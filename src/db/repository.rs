//! User repository for Sharebox.
//!
//! This module provides CRUD operations for users in the database.

use sqlx::SqlitePool;

use super::user::{NewUser, User};
use crate::{Result, ShareboxError};

/// Repository for user operations.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Create a new UserRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new user in the database.
    ///
    /// Returns the created user with the assigned ID.
    pub async fn create(&self, new_user: &NewUser) -> Result<User> {
        let result = sqlx::query("INSERT INTO users (username) VALUES (?)")
            .bind(&new_user.username)
            .execute(self.pool)
            .await
            .map_err(|e| ShareboxError::Database(e.to_string()))?;

        let id = result.last_insert_rowid();
        self.get_by_id(id)
            .await?
            .ok_or_else(|| ShareboxError::NotFound("user".to_string()))
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let result = sqlx::query_as::<_, User>(
            "SELECT id, username, avatar, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| ShareboxError::Database(e.to_string()))?;

        Ok(result)
    }

    /// Get a user by username (case-insensitive).
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let result = sqlx::query_as::<_, User>(
            "SELECT id, username, avatar, created_at
             FROM users WHERE username = ? COLLATE NOCASE",
        )
        .bind(username)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| ShareboxError::Database(e.to_string()))?;

        Ok(result)
    }

    /// Find the user whose avatar has the given stored name.
    pub async fn get_by_avatar(&self, avatar: &str) -> Result<Option<User>> {
        let result = sqlx::query_as::<_, User>(
            "SELECT id, username, avatar, created_at FROM users WHERE avatar = ?",
        )
        .bind(avatar)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| ShareboxError::Database(e.to_string()))?;

        Ok(result)
    }

    /// Replace a user's avatar reference.
    ///
    /// Returns the previous reference so the caller can delete the old blob.
    pub async fn set_avatar(&self, id: i64, avatar: Option<&str>) -> Result<Option<String>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ShareboxError::Database(e.to_string()))?;

        let previous: Option<Option<String>> =
            sqlx::query_scalar("SELECT avatar FROM users WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| ShareboxError::Database(e.to_string()))?;

        let Some(previous) = previous else {
            return Err(ShareboxError::NotFound("user".to_string()));
        };

        sqlx::query("UPDATE users SET avatar = ? WHERE id = ?")
            .bind(avatar)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| ShareboxError::Database(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| ShareboxError::Database(e.to_string()))?;

        Ok(previous)
    }

    /// Resolve a list of usernames to users, preserving order and skipping unknown names.
    ///
    /// Returns the found users and the names that did not resolve.
    pub async fn resolve_usernames(&self, usernames: &[String]) -> Result<(Vec<User>, Vec<String>)> {
        let mut found = Vec::new();
        let mut missing = Vec::new();
        for name in usernames {
            match self.get_by_username(name).await? {
                Some(user) => {
                    if !found.iter().any(|u: &User| u.id == user.id) {
                        found.push(user);
                    }
                }
                None => missing.push(name.clone()),
            }
        }
        Ok((found, missing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    async fn setup_db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let db = setup_db().await;
        let repo = UserRepository::new(db.pool());

        let user = repo.create(&NewUser::new("alice")).await.unwrap();
        assert_eq!(user.username, "alice");
        assert!(user.avatar.is_none());

        let found = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(found, user);
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let db = setup_db().await;
        let repo = UserRepository::new(db.pool());

        repo.create(&NewUser::new("alice")).await.unwrap();
        let result = repo.create(&NewUser::new("alice")).await;
        assert!(matches!(result, Err(ShareboxError::Database(_))));
    }

    #[tokio::test]
    async fn test_get_by_username_case_insensitive() {
        let db = setup_db().await;
        let repo = UserRepository::new(db.pool());

        let user = repo.create(&NewUser::new("Alice")).await.unwrap();
        let found = repo.get_by_username("alice").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(repo.get_by_username("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_avatar_returns_previous() {
        let db = setup_db().await;
        let repo = UserRepository::new(db.pool());

        let user = repo.create(&NewUser::new("alice")).await.unwrap();

        let previous = repo.set_avatar(user.id, Some("a.png")).await.unwrap();
        assert!(previous.is_none());

        let previous = repo.set_avatar(user.id, Some("b.png")).await.unwrap();
        assert_eq!(previous.as_deref(), Some("a.png"));

        let found = repo.get_by_avatar("b.png").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(repo.get_by_avatar("a.png").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_avatar_unknown_user() {
        let db = setup_db().await;
        let repo = UserRepository::new(db.pool());

        let result = repo.set_avatar(999, Some("a.png")).await;
        assert!(matches!(result, Err(ShareboxError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_resolve_usernames() {
        let db = setup_db().await;
        let repo = UserRepository::new(db.pool());

        let bob = repo.create(&NewUser::new("bob")).await.unwrap();
        let carol = repo.create(&NewUser::new("carol")).await.unwrap();

        let names = vec![
            "bob".to_string(),
            "ghost".to_string(),
            "carol".to_string(),
            "BOB".to_string(),
        ];
        let (found, missing) = repo.resolve_usernames(&names).await.unwrap();
        assert_eq!(
            found.iter().map(|u| u.id).collect::<Vec<_>>(),
            vec![bob.id, carol.id]
        );
        assert_eq!(missing, vec!["ghost".to_string()]);
    }
}
