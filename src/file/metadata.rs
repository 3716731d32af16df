//! Stored file records and repository for Sharebox.
//!
//! Every listing query takes the principal it is answering for, so a bare
//! id from a caller can never surface another user's private records.

use sqlx::{QueryBuilder, SqlitePool};

use crate::{Result, ShareboxError};

const FILE_COLUMNS: &str = "f.id, f.filename, f.stored_name, f.content_type, f.size, \
     f.password_hash, f.owner_id, f.folder_id, f.created_at";

/// Metadata for a stored file.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct StoredFile {
    /// Unique file ID.
    pub id: i64,
    /// Logical filename (display name, used for downloads).
    pub filename: String,
    /// Name in the content store; may differ from `filename` after collision resolution.
    pub stored_name: String,
    /// Media type hint.
    pub content_type: String,
    /// File size in bytes.
    pub size: i64,
    /// Argon2 hash of the access password, if the file is gated.
    pub password_hash: Option<String>,
    /// User ID of the owner.
    pub owner_id: i64,
    /// Containing folder, if any.
    pub folder_id: Option<i64>,
    /// When the file was uploaded.
    pub created_at: String,
}

impl StoredFile {
    /// Check if the file is password gated.
    pub fn is_locked(&self) -> bool {
        self.password_hash
            .as_deref()
            .map(|h| !h.is_empty())
            .unwrap_or(false)
    }

    /// Size in bytes as unsigned.
    pub fn size_bytes(&self) -> u64 {
        self.size.max(0) as u64
    }
}

/// Data for creating a new file entry.
#[derive(Debug, Clone)]
pub struct NewStoredFile {
    /// Logical filename.
    pub filename: String,
    /// Name in the content store.
    pub stored_name: String,
    /// Media type hint.
    pub content_type: String,
    /// File size in bytes.
    pub size: i64,
    /// Owner user ID.
    pub owner_id: i64,
    /// Containing folder.
    pub folder_id: Option<i64>,
}

impl NewStoredFile {
    /// Create a new NewStoredFile.
    pub fn new(
        filename: impl Into<String>,
        stored_name: impl Into<String>,
        content_type: impl Into<String>,
        size: i64,
        owner_id: i64,
    ) -> Self {
        Self {
            filename: filename.into(),
            stored_name: stored_name.into(),
            content_type: content_type.into(),
            size,
            owner_id,
            folder_id: None,
        }
    }

    /// Place the file in a folder.
    pub fn in_folder(mut self, folder_id: i64) -> Self {
        self.folder_id = Some(folder_id);
        self
    }
}

/// Builder for updating file metadata.
#[derive(Debug, Clone, Default)]
pub struct FileUpdate {
    /// New filename.
    pub filename: Option<String>,
    /// New containing folder (`Some(None)` moves to the root).
    pub folder_id: Option<Option<i64>>,
}

impl FileUpdate {
    /// Create a new FileUpdate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the filename.
    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Set the folder.
    pub fn folder_id(mut self, folder_id: Option<i64>) -> Self {
        self.folder_id = Some(folder_id);
        self
    }

    /// Check if any fields are set.
    pub fn is_empty(&self) -> bool {
        self.filename.is_none() && self.folder_id.is_none()
    }
}

/// Repository for stored file records.
pub struct FileRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FileRepository<'a> {
    /// Create a new FileRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new file record.
    pub async fn create(&self, file: &NewStoredFile) -> Result<StoredFile> {
        let result = sqlx::query(
            "INSERT INTO files (filename, stored_name, content_type, size, owner_id, folder_id)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&file.filename)
        .bind(&file.stored_name)
        .bind(&file.content_type)
        .bind(file.size)
        .bind(file.owner_id)
        .bind(file.folder_id)
        .execute(self.pool)
        .await
        .map_err(|e| ShareboxError::Database(e.to_string()))?;

        let id = result.last_insert_rowid();
        self.get_by_id(id)
            .await?
            .ok_or_else(|| ShareboxError::NotFound("file".to_string()))
    }

    /// Create a file record only if the owner's total stays within `quota`.
    ///
    /// The usage check and the insert run as one statement, so SQLite's
    /// write lock orders concurrent uploads by the same owner. Returns
    /// `None` when the record would push the owner over the quota.
    pub async fn create_within_quota(
        &self,
        file: &NewStoredFile,
        quota: u64,
    ) -> Result<Option<StoredFile>> {
        let quota = i64::try_from(quota).unwrap_or(i64::MAX);
        let result = sqlx::query(
            "INSERT INTO files (filename, stored_name, content_type, size, owner_id, folder_id)
             SELECT ?, ?, ?, ?, ?, ?
             WHERE (SELECT COALESCE(SUM(size), 0) FROM files WHERE owner_id = ?) <= ? - ?",
        )
        .bind(&file.filename)
        .bind(&file.stored_name)
        .bind(&file.content_type)
        .bind(file.size)
        .bind(file.owner_id)
        .bind(file.folder_id)
        .bind(file.owner_id)
        .bind(quota)
        .bind(file.size)
        .execute(self.pool)
        .await
        .map_err(|e| ShareboxError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(result.last_insert_rowid()).await
    }

    /// Get a file by ID.
    ///
    /// This is unscoped; callers must pass the record through the access policy.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<StoredFile>> {
        let query = format!("SELECT {FILE_COLUMNS} FROM files f WHERE f.id = ?");
        let file = sqlx::query_as::<_, StoredFile>(&query)
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| ShareboxError::Database(e.to_string()))?;

        Ok(file)
    }

    /// Files owned by a user that are not in any folder.
    pub async fn list_root_by_owner(&self, owner_id: i64) -> Result<Vec<StoredFile>> {
        let query = format!(
            "SELECT {FILE_COLUMNS} FROM files f
             WHERE f.owner_id = ? AND f.folder_id IS NULL
             ORDER BY f.created_at DESC, f.id DESC"
        );
        self.fetch_all_with(&query, &[owner_id]).await
    }

    /// Files owned by a user inside one of that user's folders.
    pub async fn list_in_folder(&self, owner_id: i64, folder_id: i64) -> Result<Vec<StoredFile>> {
        let query = format!(
            "SELECT {FILE_COLUMNS} FROM files f
             WHERE f.owner_id = ? AND f.folder_id = ?
             ORDER BY f.created_at DESC, f.id DESC"
        );
        self.fetch_all_with(&query, &[owner_id, folder_id]).await
    }

    /// Every file owned by a user.
    pub async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<StoredFile>> {
        let query = format!(
            "SELECT {FILE_COLUMNS} FROM files f WHERE f.owner_id = ? ORDER BY f.id"
        );
        self.fetch_all_with(&query, &[owner_id]).await
    }

    /// Files a user has received from others.
    pub async fn list_received(&self, user_id: i64) -> Result<Vec<StoredFile>> {
        let query = format!(
            "SELECT {FILE_COLUMNS} FROM files f
             JOIN file_recipients r ON r.file_id = f.id
             WHERE r.user_id = ?
             ORDER BY r.shared_at DESC, f.id DESC"
        );
        self.fetch_all_with(&query, &[user_id]).await
    }

    async fn fetch_all_with(&self, query: &str, binds: &[i64]) -> Result<Vec<StoredFile>> {
        let mut q = sqlx::query_as::<_, StoredFile>(query);
        for value in binds {
            q = q.bind(*value);
        }
        let files = q
            .fetch_all(self.pool)
            .await
            .map_err(|e| ShareboxError::Database(e.to_string()))?;
        Ok(files)
    }

    /// Check if a user is a recipient of a file.
    pub async fn is_recipient(&self, file_id: i64, user_id: i64) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM file_recipients WHERE file_id = ? AND user_id = ?)",
        )
        .bind(file_id)
        .bind(user_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| ShareboxError::Database(e.to_string()))?;

        Ok(exists)
    }

    /// User IDs a file is shared with.
    pub async fn recipients(&self, file_id: i64) -> Result<Vec<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT user_id FROM file_recipients WHERE file_id = ? ORDER BY user_id",
        )
        .bind(file_id)
        .fetch_all(self.pool)
        .await
        .map_err(|e| ShareboxError::Database(e.to_string()))?;

        Ok(ids)
    }

    /// Add recipients to a file in one transaction.
    ///
    /// Existing recipients are left alone. Returns how many were added.
    pub async fn add_recipients(&self, file_id: i64, user_ids: &[i64]) -> Result<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ShareboxError::Database(e.to_string()))?;

        let mut added = 0;
        for user_id in user_ids {
            let result = sqlx::query(
                "INSERT OR IGNORE INTO file_recipients (file_id, user_id) VALUES (?, ?)",
            )
            .bind(file_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| ShareboxError::Database(e.to_string()))?;
            added += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| ShareboxError::Database(e.to_string()))?;

        Ok(added)
    }

    /// Set or clear a file's password hash.
    pub async fn set_password(&self, id: i64, password_hash: Option<&str>) -> Result<bool> {
        let result = sqlx::query("UPDATE files SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| ShareboxError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// Update file metadata.
    pub async fn update(&self, id: i64, update: &FileUpdate) -> Result<Option<StoredFile>> {
        if update.is_empty() {
            return self.get_by_id(id).await;
        }

        let mut query: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new("UPDATE files SET ");
        let mut separated = query.separated(", ");

        if let Some(ref filename) = update.filename {
            separated.push("filename = ");
            separated.push_bind_unseparated(filename);
        }

        if let Some(folder_id) = update.folder_id {
            separated.push("folder_id = ");
            separated.push_bind_unseparated(folder_id);
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

    /// Delete a file record.
    ///
    /// Recipient rows go with it through the foreign key cascade, so the
    /// file leaves every recipient's received list in the same statement.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| ShareboxError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// Count a user's files that have at least one recipient.
    pub async fn count_shared_by_owner(&self, owner_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT f.id) FROM files f
             JOIN file_recipients r ON r.file_id = f.id
             WHERE f.owner_id = ?",
        )
        .bind(owner_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| ShareboxError::Database(e.to_string()))?;

        Ok(count)
    }

    /// Total bytes owned by a user.
    pub async fn total_size_by_owner(&self, owner_id: i64) -> Result<i64> {
        let total: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(size), 0) FROM files WHERE owner_id = ?")
                .bind(owner_id)
                .fetch_one(self.pool)
                .await
                .map_err(|e| ShareboxError::Database(e.to_string()))?;

        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NewUser, UserRepository};
    use crate::file::{FolderRepository, NewFolder};
    use crate::Database;

    async fn setup() -> (Database, i64, i64) {
        let db = Database::open_in_memory().await.unwrap();
        let users = UserRepository::new(db.pool());
        let alice = users.create(&NewUser::new("alice")).await.unwrap();
        let bob = users.create(&NewUser::new("bob")).await.unwrap();
        (db, alice.id, bob.id)
    }

    fn new_file(name: &str, owner_id: i64) -> NewStoredFile {
        NewStoredFile::new(name, name, "application/pdf", 10, owner_id)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (db, alice, _) = setup().await;
        let repo = FileRepository::new(db.pool());

        let file = repo.create(&new_file("a.pdf", alice)).await.unwrap();
        assert_eq!(file.filename, "a.pdf");
        assert_eq!(file.owner_id, alice);
        assert!(file.folder_id.is_none());
        assert!(!file.is_locked());

        let found = repo.get_by_id(file.id).await.unwrap().unwrap();
        assert_eq!(found, file);
        assert!(repo.get_by_id(9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stored_name_unique() {
        let (db, alice, _) = setup().await;
        let repo = FileRepository::new(db.pool());

        repo.create(&new_file("a.pdf", alice)).await.unwrap();
        let result = repo.create(&new_file("a.pdf", alice)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_create_within_quota() {
        let (db, alice, bob) = setup().await;
        let repo = FileRepository::new(db.pool());

        let first = repo.create_within_quota(&new_file("a.pdf", alice), 25).await.unwrap();
        assert!(first.is_some());
        let second = repo.create_within_quota(&new_file("b.pdf", alice), 25).await.unwrap();
        assert!(second.is_some());

        // 20 used, another 10 would make 30.
        let third = repo.create_within_quota(&new_file("c.pdf", alice), 25).await.unwrap();
        assert!(third.is_none());
        assert_eq!(repo.total_size_by_owner(alice).await.unwrap(), 20);

        // Usage is counted per owner.
        let other = repo.create_within_quota(&new_file("c.pdf", bob), 25).await.unwrap();
        assert_eq!(other.unwrap().owner_id, bob);

        // Landing exactly on the quota is allowed.
        let exact = repo.create_within_quota(&new_file("d.pdf", bob), 20).await.unwrap();
        assert!(exact.is_some());
    }

    #[tokio::test]
    async fn test_listings_are_scoped_by_owner() {
        let (db, alice, bob) = setup().await;
        let repo = FileRepository::new(db.pool());
        let folders = FolderRepository::new(db.pool());

        let folder = folders.create(&NewFolder::new("Docs", alice)).await.unwrap();
        repo.create(&new_file("root.pdf", alice)).await.unwrap();
        repo.create(&new_file("inner.pdf", alice).in_folder(folder.id))
            .await
            .unwrap();
        repo.create(&new_file("bob.pdf", bob)).await.unwrap();

        let root = repo.list_root_by_owner(alice).await.unwrap();
        assert_eq!(root.len(), 1);
        assert_eq!(root[0].filename, "root.pdf");

        let inner = repo.list_in_folder(alice, folder.id).await.unwrap();
        assert_eq!(inner.len(), 1);
        assert_eq!(inner[0].filename, "inner.pdf");

        // Bob guessing Alice's folder id sees nothing.
        assert!(repo.list_in_folder(bob, folder.id).await.unwrap().is_empty());

        assert_eq!(repo.list_by_owner(alice).await.unwrap().len(), 2);
        assert_eq!(repo.total_size_by_owner(alice).await.unwrap(), 20);
    }

    #[tokio::test]
    async fn test_recipients_visible_from_both_sides() {
        let (db, alice, bob) = setup().await;
        let repo = FileRepository::new(db.pool());

        let file = repo.create(&new_file("a.pdf", alice)).await.unwrap();
        assert!(!repo.is_recipient(file.id, bob).await.unwrap());

        let added = repo.add_recipients(file.id, &[bob, bob]).await.unwrap();
        assert_eq!(added, 1);

        assert!(repo.is_recipient(file.id, bob).await.unwrap());
        assert_eq!(repo.recipients(file.id).await.unwrap(), vec![bob]);
        let received = repo.list_received(bob).await.unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].id, file.id);
        assert_eq!(repo.count_shared_by_owner(alice).await.unwrap(), 1);

        // Sharing again is a no-op.
        assert_eq!(repo.add_recipients(file.id, &[bob]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_detaches_recipients() {
        let (db, alice, bob) = setup().await;
        let repo = FileRepository::new(db.pool());

        let file = repo.create(&new_file("a.pdf", alice)).await.unwrap();
        repo.add_recipients(file.id, &[bob]).await.unwrap();

        assert!(repo.delete(file.id).await.unwrap());
        assert!(!repo.delete(file.id).await.unwrap());
        assert!(repo.list_received(bob).await.unwrap().is_empty());
        assert!(!repo.is_recipient(file.id, bob).await.unwrap());
    }

    #[tokio::test]
    async fn test_set_password() {
        let (db, alice, _) = setup().await;
        let repo = FileRepository::new(db.pool());

        let file = repo.create(&new_file("a.pdf", alice)).await.unwrap();
        assert!(repo.set_password(file.id, Some("hash")).await.unwrap());
        assert!(repo.get_by_id(file.id).await.unwrap().unwrap().is_locked());

        repo.set_password(file.id, None).await.unwrap();
        assert!(!repo.get_by_id(file.id).await.unwrap().unwrap().is_locked());
    }

    #[tokio::test]
    async fn test_update() {
        let (db, alice, _) = setup().await;
        let repo = FileRepository::new(db.pool());
        let folders = FolderRepository::new(db.pool());

        let folder = folders.create(&NewFolder::new("Docs", alice)).await.unwrap();
        let file = repo.create(&new_file("a.pdf", alice)).await.unwrap();

        let updated = repo
            .update(
                file.id,
                &FileUpdate::new()
                    .filename("renamed.pdf")
                    .folder_id(Some(folder.id)),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.filename, "renamed.pdf");
        assert_eq!(updated.folder_id, Some(folder.id));
        assert_eq!(updated.stored_name, "a.pdf");

        let moved_back = repo
            .update(file.id, &FileUpdate::new().folder_id(None))
            .await
            .unwrap()
            .unwrap();
        assert!(moved_back.folder_id.is_none());

        assert!(repo
            .update(9999, &FileUpdate::new().filename("x"))
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_file_update_builder() {
        assert!(FileUpdate::new().is_empty());
        let update = FileUpdate::new().filename("x").folder_id(Some(3));
        assert_eq!(update.filename, Some("x".to_string()));
        assert_eq!(update.folder_id, Some(Some(3)));
        assert!(!update.is_empty());
    }
}
