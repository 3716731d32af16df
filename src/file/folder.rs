//! Folder types and repository for Sharebox.

use sqlx::{QueryBuilder, SqlitePool};

use crate::{Result, ShareboxError};

/// A folder owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Folder {
    /// Unique folder ID.
    pub id: i64,
    /// Folder name.
    pub name: String,
    /// User ID of the owner.
    pub owner_id: i64,
    /// Parent folder ID (None for root folders).
    pub parent_id: Option<i64>,
    /// Argon2 hash of the access password, if the folder is gated.
    pub password_hash: Option<String>,
    /// When the folder was created.
    pub created_at: String,
}

impl Folder {
    /// Check if the folder is password gated.
    pub fn is_locked(&self) -> bool {
        self.password_hash
            .as_deref()
            .map(|h| !h.is_empty())
            .unwrap_or(false)
    }
}

/// Data for creating a new folder.
#[derive(Debug, Clone)]
pub struct NewFolder {
    /// Folder name.
    pub name: String,
    /// Owner user ID.
    pub owner_id: i64,
    /// Parent folder ID (None for root folders).
    pub parent_id: Option<i64>,
}

impl NewFolder {
    /// Create a new root folder for the given owner.
    pub fn new(name: impl Into<String>, owner_id: i64) -> Self {
        Self {
            name: name.into(),
            owner_id,
            parent_id: None,
        }
    }

    /// Set the parent folder.
    pub fn with_parent(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

/// Builder for updating a folder.
#[derive(Debug, Clone, Default)]
pub struct FolderUpdate {
    /// New folder name.
    pub name: Option<String>,
    /// New parent folder ID.
    pub parent_id: Option<Option<i64>>,
}

impl FolderUpdate {
    /// Create a new FolderUpdate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the parent folder ID.
    pub fn parent_id(mut self, parent_id: Option<i64>) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Check if any fields are set.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.parent_id.is_none()
    }
}

/// What a cascading folder delete removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeDelete {
    /// IDs of the deleted folders, the root of the subtree included.
    pub folder_ids: Vec<i64>,
    /// IDs of the deleted file records.
    pub file_ids: Vec<i64>,
    /// Content store names of the deleted files.
    pub stored_names: Vec<String>,
}

/// Repository for folder operations.
pub struct FolderRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FolderRepository<'a> {
    /// Create a new FolderRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new folder.
    pub async fn create(&self, folder: &NewFolder) -> Result<Folder> {
        let result =
            sqlx::query("INSERT INTO folders (name, owner_id, parent_id) VALUES (?, ?, ?)")
                .bind(&folder.name)
                .bind(folder.owner_id)
                .bind(folder.parent_id)
                .execute(self.pool)
                .await
                .map_err(|e| ShareboxError::Database(e.to_string()))?;

        let id = result.last_insert_rowid();
        self.get_by_id(id)
            .await?
            .ok_or_else(|| ShareboxError::NotFound("folder".to_string()))
    }

    /// Get a folder by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Folder>> {
        let folder = sqlx::query_as::<_, Folder>(
            "SELECT id, name, owner_id, parent_id, password_hash, created_at
             FROM folders WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| ShareboxError::Database(e.to_string()))?;

        Ok(folder)
    }

    /// List an owner's folders under `parent_id` (`None` for the root).
    pub async fn list_by_owner_and_parent(
        &self,
        owner_id: i64,
        parent_id: Option<i64>,
    ) -> Result<Vec<Folder>> {
        let folders = sqlx::query_as::<_, Folder>(
            "SELECT id, name, owner_id, parent_id, password_hash, created_at
             FROM folders WHERE owner_id = ? AND parent_id IS ?
             ORDER BY name COLLATE NOCASE, id",
        )
        .bind(owner_id)
        .bind(parent_id)
        .fetch_all(self.pool)
        .await
        .map_err(|e| ShareboxError::Database(e.to_string()))?;

        Ok(folders)
    }

    /// Update a folder.
    pub async fn update(&self, id: i64, update: &FolderUpdate) -> Result<Option<Folder>> {
        if update.is_empty() {
            return self.get_by_id(id).await;
        }

        let mut query: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new("UPDATE folders SET ");
        let mut separated = query.separated(", ");

        if let Some(ref name) = update.name {
            separated.push("name = ");
            separated.push_bind_unseparated(name);
        }

        if let Some(parent_id) = update.parent_id {
            separated.push("parent_id = ");
            separated.push_bind_unseparated(parent_id);
        }

        query.push(" WHERE id = ");
        query.push_bind(id);

        let result = query
            .build()
            .execute(self.pool)
            .await
            .map_err(|e| ShareboxError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_by_id(id).await
    }

    /// Set or clear a folder's password hash.
    pub async fn set_password(&self, id: i64, password_hash: Option<&str>) -> Result<bool> {
        let result = sqlx::query("UPDATE folders SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| ShareboxError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// IDs of a folder and everything below it.
    pub async fn subtree_ids(&self, id: i64) -> Result<Vec<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "WITH RECURSIVE subtree(id) AS (
                 SELECT id FROM folders WHERE id = ?
                 UNION ALL
                 SELECT f.id FROM folders f JOIN subtree s ON f.parent_id = s.id
             )
             SELECT id FROM subtree",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await
        .map_err(|e| ShareboxError::Database(e.to_string()))?;

        Ok(ids)
    }

    /// Check if `candidate` is `ancestor` itself or lies below it.
    pub async fn is_within(&self, candidate: i64, ancestor: i64) -> Result<bool> {
        Ok(self.subtree_ids(ancestor).await?.contains(&candidate))
    }

    /// Delete a folder and, through the foreign keys, its whole subtree.
    ///
    /// The stored names of every file in the subtree are collected in the
    /// same transaction so the caller can remove the blobs afterwards.
    /// Returns `None` if the folder does not exist.
    pub async fn delete_cascade(&self, id: i64) -> Result<Option<CascadeDelete>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ShareboxError::Database(e.to_string()))?;

        let folder_ids: Vec<i64> = sqlx::query_scalar(
            "WITH RECURSIVE subtree(id) AS (
                 SELECT id FROM folders WHERE id = ?
                 UNION ALL
                 SELECT f.id FROM folders f JOIN subtree s ON f.parent_id = s.id
             )
             SELECT id FROM subtree",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| ShareboxError::Database(e.to_string()))?;

        if folder_ids.is_empty() {
            return Ok(None);
        }

        let mut query: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new("SELECT id, stored_name FROM files WHERE folder_id IN (");
        let mut separated = query.separated(", ");
        for folder_id in &folder_ids {
            separated.push_bind(*folder_id);
        }
        separated.push_unseparated(")");

        let files: Vec<(i64, String)> = query
            .build_query_as()
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| ShareboxError::Database(e.to_string()))?;

        sqlx::query("DELETE FROM folders WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| ShareboxError::Database(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| ShareboxError::Database(e.to_string()))?;

        let (file_ids, stored_names) = files.into_iter().unzip();
        Ok(Some(CascadeDelete {
            folder_ids,
            file_ids,
            stored_names,
        }))
    }

    /// Count files directly in a folder.
    pub async fn count_files(&self, folder_id: i64) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM files WHERE folder_id = ?")
            .bind(folder_id)
            .fetch_one(self.pool)
            .await
            .map_err(|e| ShareboxError::Database(e.to_string()))?;

        Ok(count.0)
    }
}
