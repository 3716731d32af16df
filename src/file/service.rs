//! File service for Sharebox.
//!
//! This module provides high-level file operations including:
//! - Upload with size limit and quota checks
//! - Authorization of reads for the delivery paths
//! - Sharing, password gating, rename/move and deletion

use tokio::io::AsyncRead;
use tracing::{info, warn};

use crate::auth::{hash_password, AccessPolicy, Operation, Principal, Target, TargetRef};
use crate::db::{Database, UserRepository};
use crate::{Result, ShareboxError};

use super::folder::FolderRepository;
use super::metadata::{FileRepository, FileUpdate, NewStoredFile, StoredFile};
use super::storage::{sanitize_filename, ContentStore};
use super::{BatchItem, DEFAULT_MAX_FILE_SIZE, DEFAULT_STORAGE_LIMIT};

/// Result of sharing a file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShareOutcome {
    /// Usernames that became recipients.
    pub added: Vec<String>,
    /// Usernames that were already recipients.
    pub already_shared: Vec<String>,
    /// Usernames that do not exist.
    pub unknown: Vec<String>,
    /// Whether the owner's own name was in the list and ignored.
    pub skipped_owner: bool,
}

/// File service for managing stored files.
pub struct FileService<'a> {
    db: &'a Database,
    store: &'a ContentStore,
    policy: &'a AccessPolicy,
    max_file_size: u64,
    storage_limit: u64,
}

impl<'a> FileService<'a> {
    /// Create a new FileService.
    pub fn new(db: &'a Database, store: &'a ContentStore, policy: &'a AccessPolicy) -> Self {
        Self {
            db,
            store,
            policy,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            storage_limit: DEFAULT_STORAGE_LIMIT,
        }
    }

    /// Set the per-file size limit.
    pub fn with_max_file_size(mut self, max_size: u64) -> Self {
        self.max_file_size = max_size;
        self
    }

    /// Set the per-user storage quota.
    pub fn with_storage_limit(mut self, limit: u64) -> Self {
        self.storage_limit = limit;
        self
    }

    /// Upload a file, streaming it into the content store.
    ///
    /// The metadata record is written only after the bytes are on disk; if
    /// the record cannot be written the blob is removed again.
    pub async fn upload<R>(
        &self,
        principal: &Principal,
        folder_id: Option<i64>,
        filename: &str,
        reader: R,
    ) -> Result<StoredFile>
    where
        R: AsyncRead + Unpin,
    {
        if let Some(folder_id) = folder_id {
            self.require_owned_folder(principal, folder_id).await?;
        }

        let files = FileRepository::new(self.db.pool());
        let used = files.total_size_by_owner(principal.user_id).await?.max(0) as u64;
        let remaining = self.storage_limit.saturating_sub(used);
        if remaining == 0 {
            return Err(ShareboxError::TooLarge("storage quota exceeded".to_string()));
        }
        let quota_bound = remaining < self.max_file_size;
        let limit = self.max_file_size.min(remaining);

        let logical_name = sanitize_filename(filename);
        let blob = match self
            .store
            .store_reader(reader, &logical_name, Some(limit))
            .await
        {
            Ok(blob) => blob,
            Err(ShareboxError::TooLarge(_)) if quota_bound => {
                return Err(ShareboxError::TooLarge("storage quota exceeded".to_string()))
            }
            Err(e) => return Err(e),
        };

        let media = ContentStore::classify(&blob.stored_name);
        let mut new_file = NewStoredFile::new(
            &logical_name,
            &blob.stored_name,
            media.media_type,
            blob.size as i64,
            principal.user_id,
        );
        if let Some(folder_id) = folder_id {
            new_file = new_file.in_folder(folder_id);
        }

        // Usage may have grown while the bytes streamed in; the insert re-checks it.
        match files.create_within_quota(&new_file, self.storage_limit).await {
            Ok(Some(file)) => {
                info!(
                    user_id = principal.user_id,
                    file_id = file.id,
                    stored_name = %file.stored_name,
                    size = file.size,
                    "file uploaded"
                );
                Ok(file)
            }
            outcome => {
                if let Err(cleanup) = self.store.delete(&blob.stored_name).await {
                    warn!(stored_name = %blob.stored_name, error = %cleanup, "failed to remove unrecorded blob");
                }
                match outcome {
                    Err(e) => Err(e),
                    _ => Err(ShareboxError::TooLarge("storage quota exceeded".to_string())),
                }
            }
        }
    }

    /// Look up a file and check `operation` against the access policy.
    ///
    /// Fails with `NotFound` if the id does not resolve and `Forbidden` if
    /// the policy denies.
    pub async fn authorize(
        &self,
        principal: &Principal,
        id: i64,
        operation: Operation,
        presented_password: Option<&str>,
    ) -> Result<StoredFile> {
        let files = FileRepository::new(self.db.pool());
        let file = files
            .get_by_id(id)
            .await?
            .ok_or_else(|| ShareboxError::NotFound("file".to_string()))?;

        let shared = file.owner_id != principal.user_id
            && files.is_recipient(file.id, principal.user_id).await?;
        self.policy.enforce(
            principal,
            &Target::file(&file, shared),
            operation,
            presented_password,
        )?;
        Ok(file)
    }

    /// Authorize a content read (download, preview, stream).
    pub async fn authorize_read(
        &self,
        principal: &Principal,
        id: i64,
        presented_password: Option<&str>,
    ) -> Result<StoredFile> {
        self.authorize(principal, id, Operation::Read, presented_password)
            .await
    }

    /// Resolve ids for an archive, keeping only files the caller may read.
    ///
    /// Ids that do not resolve or are denied are skipped; order is kept and
    /// duplicates are dropped. Storage and database failures still propagate.
    pub async fn readable_files(
        &self,
        principal: &Principal,
        ids: &[i64],
        presented_password: Option<&str>,
    ) -> Result<Vec<StoredFile>> {
        let mut readable: Vec<StoredFile> = Vec::with_capacity(ids.len());
        for &id in ids {
            if readable.iter().any(|f| f.id == id) {
                continue;
            }
            match self.authorize_read(principal, id, presented_password).await {
                Ok(file) => readable.push(file),
                Err(ShareboxError::Forbidden(_)) | Err(ShareboxError::NotFound(_)) => {
                    info!(user_id = principal.user_id, file_id = id, "skipping file in archive");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(readable)
    }

    /// Files in the principal's root (no folder).
    pub async fn list_root(&self, principal: &Principal) -> Result<Vec<StoredFile>> {
        FileRepository::new(self.db.pool())
            .list_root_by_owner(principal.user_id)
            .await
    }

    /// Files shared with the principal.
    pub async fn list_received(&self, principal: &Principal) -> Result<Vec<StoredFile>> {
        FileRepository::new(self.db.pool())
            .list_received(principal.user_id)
            .await
    }

    /// Share a file with users by name.
    pub async fn share(
        &self,
        principal: &Principal,
        id: i64,
        usernames: &[String],
    ) -> Result<ShareOutcome> {
        let file = self.authorize(principal, id, Operation::Share, None).await?;

        let (users, unknown) = UserRepository::new(self.db.pool())
            .resolve_usernames(usernames)
            .await?;

        let mut outcome = ShareOutcome {
            unknown,
            ..Default::default()
        };
        let files = FileRepository::new(self.db.pool());
        let existing = files.recipients(file.id).await?;

        let mut new_ids = Vec::new();
        for user in users {
            if user.id == file.owner_id {
                outcome.skipped_owner = true;
            } else if existing.contains(&user.id) {
                outcome.already_shared.push(user.username);
            } else {
                new_ids.push(user.id);
                outcome.added.push(user.username);
            }
        }

        if !new_ids.is_empty() {
            files.add_recipients(file.id, &new_ids).await?;
            info!(
                user_id = principal.user_id,
                file_id = file.id,
                recipients = new_ids.len(),
                "file shared"
            );
        }

        Ok(outcome)
    }

    /// Set or clear a file's access password. `None` or an empty string clears it.
    pub async fn set_password(
        &self,
        principal: &Principal,
        id: i64,
        password: Option<&str>,
    ) -> Result<()> {
        let file = self
            .authorize(principal, id, Operation::SetPassword, None)
            .await?;

        let hash = hash_optional_password(password)?;
        FileRepository::new(self.db.pool())
            .set_password(file.id, hash.as_deref())
            .await?;
        self.policy.password_changed(TargetRef::File(file.id));
        info!(
            user_id = principal.user_id,
            file_id = file.id,
            locked = hash.is_some(),
            "file password changed"
        );
        Ok(())
    }

    /// Verify a file's password and unlock it for the caller's session.
    pub async fn unlock(&self, principal: &Principal, id: i64, password: &str) -> Result<()> {
        let file = self.authorize(principal, id, Operation::Inspect, None).await?;
        let shared = file.owner_id != principal.user_id;
        self.policy
            .unlock(principal, &Target::file(&file, shared), password)
    }

    /// Rename a file or move it between the principal's folders.
    pub async fn update(
        &self,
        principal: &Principal,
        id: i64,
        update: FileUpdate,
    ) -> Result<StoredFile> {
        let file = self.authorize(principal, id, Operation::Write, None).await?;

        let mut update = update;
        if let Some(ref name) = update.filename {
            let cleaned = sanitize_filename(name);
            if name.trim().is_empty() {
                return Err(ShareboxError::Validation("filename must not be empty".to_string()));
            }
            update.filename = Some(cleaned);
        }
        if let Some(Some(folder_id)) = update.folder_id {
            self.require_owned_folder(principal, folder_id).await?;
        }

        FileRepository::new(self.db.pool())
            .update(file.id, &update)
            .await?
            .ok_or_else(|| ShareboxError::NotFound("file".to_string()))
    }

    /// Delete a file: its record first, then its blob.
    ///
    /// Returns whether a blob was actually removed. A missing blob is not an
    /// error; a blob that could not be removed is logged and surfaced.
    pub async fn delete(&self, principal: &Principal, id: i64) -> Result<bool> {
        let file = self.authorize(principal, id, Operation::Delete, None).await?;

        FileRepository::new(self.db.pool()).delete(file.id).await?;
        self.policy.password_changed(TargetRef::File(file.id));

        match self.store.delete(&file.stored_name).await {
            Ok(removed) => {
                if !removed {
                    warn!(file_id = file.id, stored_name = %file.stored_name, "blob was already missing");
                }
                info!(user_id = principal.user_id, file_id = file.id, "file deleted");
                Ok(removed)
            }
            Err(e) => {
                warn!(file_id = file.id, stored_name = %file.stored_name, error = %e, "failed to delete blob");
                Err(e)
            }
        }
    }

    /// Delete several files, reporting each one.
    pub async fn delete_many(&self, principal: &Principal, ids: &[i64]) -> Vec<BatchItem> {
        let mut results = Vec::with_capacity(ids.len());
        for &id in ids {
            let item = match self.delete(principal, id).await {
                Ok(_) => BatchItem::ok(id),
                Err(e) => BatchItem::failed(id, &e),
            };
            results.push(item);
        }
        results
    }

    async fn require_owned_folder(&self, principal: &Principal, folder_id: i64) -> Result<()> {
        let folder = FolderRepository::new(self.db.pool())
            .get_by_id(folder_id)
            .await?
            .ok_or_else(|| ShareboxError::NotFound("folder".to_string()))?;
        if folder.owner_id != principal.user_id {
            return Err(ShareboxError::Forbidden("access denied".to_string()));
        }
        Ok(())
    }
}

/// Hash a new access password; `None` or empty clears the gate.
pub(crate) fn hash_optional_password(password: Option<&str>) -> Result<Option<String>> {
    match password {
        None | Some("") => Ok(None),
        Some(password) => hash_password(password)
            .map(Some)
            .map_err(|e| ShareboxError::Validation(e.to_string())),
    }
}
