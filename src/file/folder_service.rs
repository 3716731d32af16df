//! Folder service for Sharebox.
//!
//! Folders belong to one owner, may be password gated, and form a tree.
//! Deleting a folder removes its subtree and then the content of every
//! file that lived in it.

use tracing::{info, warn};

use crate::auth::{AccessPolicy, Operation, Principal, Target, TargetRef};
use crate::db::Database;
use crate::{Result, ShareboxError};

use super::folder::{Folder, FolderRepository, FolderUpdate, NewFolder};
use super::metadata::{FileRepository, StoredFile};
use super::service::hash_optional_password;
use super::storage::ContentStore;
use super::{BatchItem, MAX_FOLDER_NAME_LENGTH};

/// A folder listing.
#[derive(Debug, Clone)]
pub struct FolderContents {
    /// The folder being listed (`None` for the root).
    pub folder: Option<Folder>,
    /// Sub-folders.
    pub folders: Vec<Folder>,
    /// Files.
    pub files: Vec<StoredFile>,
}

/// What deleting a folder removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderDeleteOutcome {
    /// Number of folders removed, the target included.
    pub folders_deleted: usize,
    /// Number of file records removed.
    pub files_deleted: usize,
    /// Stored names whose blobs could not be removed.
    pub orphaned_blobs: Vec<String>,
}

/// Folder service for managing folders.
pub struct FolderService<'a> {
    db: &'a Database,
    store: &'a ContentStore,
    policy: &'a AccessPolicy,
}

impl<'a> FolderService<'a> {
    /// Create a new FolderService.
    pub fn new(db: &'a Database, store: &'a ContentStore, policy: &'a AccessPolicy) -> Self {
        Self { db, store, policy }
    }

    /// Look up a folder and check `operation` against the access policy.
    pub async fn authorize(
        &self,
        principal: &Principal,
        id: i64,
        operation: Operation,
        presented_password: Option<&str>,
    ) -> Result<Folder> {
        let folder = FolderRepository::new(self.db.pool())
            .get_by_id(id)
            .await?
            .ok_or_else(|| ShareboxError::NotFound("folder".to_string()))?;
        self.policy.enforce(
            principal,
            &Target::folder(&folder),
            operation,
            presented_password,
        )?;
        Ok(folder)
    }

    /// Create a folder, optionally under one of the principal's folders.
    pub async fn create(
        &self,
        principal: &Principal,
        name: &str,
        parent_id: Option<i64>,
    ) -> Result<Folder> {
        let name = validate_folder_name(name)?;
        if let Some(parent_id) = parent_id {
            self.authorize(principal, parent_id, Operation::Write, None)
                .await?;
        }

        let mut new_folder = NewFolder::new(name, principal.user_id);
        if let Some(parent_id) = parent_id {
            new_folder = new_folder.with_parent(parent_id);
        }
        let folder = FolderRepository::new(self.db.pool())
            .create(&new_folder)
            .await?;
        info!(user_id = principal.user_id, folder_id = folder.id, "folder created");
        Ok(folder)
    }

    /// List the principal's root, or the contents of a folder.
    ///
    /// Listing a password-gated folder needs the password or an earlier
    /// unlock in the same session.
    pub async fn contents(
        &self,
        principal: &Principal,
        folder_id: Option<i64>,
        presented_password: Option<&str>,
    ) -> Result<FolderContents> {
        let folders = FolderRepository::new(self.db.pool());
        let files = FileRepository::new(self.db.pool());

        match folder_id {
            None => Ok(FolderContents {
                folder: None,
                folders: folders
                    .list_by_owner_and_parent(principal.user_id, None)
                    .await?,
                files: files.list_root_by_owner(principal.user_id).await?,
            }),
            Some(id) => {
                let folder = self
                    .authorize(principal, id, Operation::Read, presented_password)
                    .await?;
                Ok(FolderContents {
                    folders: folders
                        .list_by_owner_and_parent(folder.owner_id, Some(folder.id))
                        .await?,
                    files: files.list_in_folder(folder.owner_id, folder.id).await?,
                    folder: Some(folder),
                })
            }
        }
    }

    /// Set or clear a folder's password. `None` or an empty string clears it.
    pub async fn set_password(
        &self,
        principal: &Principal,
        id: i64,
        password: Option<&str>,
    ) -> Result<()> {
        let folder = self
            .authorize(principal, id, Operation::SetPassword, None)
            .await?;

        let hash = hash_optional_password(password)?;
        FolderRepository::new(self.db.pool())
            .set_password(folder.id, hash.as_deref())
            .await?;
        self.policy.password_changed(TargetRef::Folder(folder.id));
        info!(
            user_id = principal.user_id,
            folder_id = folder.id,
            locked = hash.is_some(),
            "folder password changed"
        );
        Ok(())
    }

    /// Verify a folder's password and unlock it for the caller's session.
    pub async fn unlock(&self, principal: &Principal, id: i64, password: &str) -> Result<()> {
        let folder = self.authorize(principal, id, Operation::Inspect, None).await?;
        self.policy
            .unlock(principal, &Target::folder(&folder), password)
    }

    /// Rename a folder or move it under another of the principal's folders.
    pub async fn update(
        &self,
        principal: &Principal,
        id: i64,
        update: FolderUpdate,
    ) -> Result<Folder> {
        let folder = self.authorize(principal, id, Operation::Write, None).await?;
        let repo = FolderRepository::new(self.db.pool());

        let mut update = update;
        if let Some(ref name) = update.name {
            update.name = Some(validate_folder_name(name)?.to_string());
        }
        if let Some(Some(parent_id)) = update.parent_id {
            self.authorize(principal, parent_id, Operation::Write, None)
                .await?;
            if repo.is_within(parent_id, folder.id).await? {
                return Err(ShareboxError::Validation(
                    "a folder cannot be moved into itself or its sub-folders".to_string(),
                ));
            }
        }

        repo.update(folder.id, &update)
            .await?
            .ok_or_else(|| ShareboxError::NotFound("folder".to_string()))
    }

    /// Delete a folder with all sub-folders and files, then their blobs.
    ///
    /// Blobs that cannot be removed are logged and listed in the outcome;
    /// the metadata delete is not rolled back for them.
    pub async fn delete(&self, principal: &Principal, id: i64) -> Result<FolderDeleteOutcome> {
        let folder = self.authorize(principal, id, Operation::Delete, None).await?;

        let cascade = FolderRepository::new(self.db.pool())
            .delete_cascade(folder.id)
            .await?
            .ok_or_else(|| ShareboxError::NotFound("folder".to_string()))?;

        for folder_id in &cascade.folder_ids {
            self.policy.password_changed(TargetRef::Folder(*folder_id));
        }
        for file_id in &cascade.file_ids {
            self.policy.password_changed(TargetRef::File(*file_id));
        }

        let mut orphaned_blobs = Vec::new();
        for stored_name in &cascade.stored_names {
            if let Err(e) = self.store.delete(stored_name).await {
                warn!(stored_name = %stored_name, error = %e, "failed to delete blob of cascaded file");
                orphaned_blobs.push(stored_name.clone());
            }
        }

        info!(
            user_id = principal.user_id,
            folder_id = folder.id,
            folders = cascade.folder_ids.len(),
            files = cascade.file_ids.len(),
            orphaned = orphaned_blobs.len(),
            "folder deleted"
        );

        Ok(FolderDeleteOutcome {
            folders_deleted: cascade.folder_ids.len(),
            files_deleted: cascade.file_ids.len(),
            orphaned_blobs,
        })
    }

    /// Delete several folders, reporting each one.
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
}

fn validate_folder_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ShareboxError::Validation(
            "folder name must not be empty".to_string(),
        ));
    }
    if name.chars().count() > MAX_FOLDER_NAME_LENGTH {
        return Err(ShareboxError::Validation(format!(
            "folder name must be at most {MAX_FOLDER_NAME_LENGTH} characters"
        )));
    }
    if name.contains(&['/', '\\'][..]) || name.chars().any(char::is_control) {
        return Err(ShareboxError::Validation(
            "folder name contains invalid characters".to_string(),
        ));
    }
    Ok(name)
}
