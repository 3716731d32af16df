//! File management module for Sharebox.
//!
//! This module provides:
//! - The content store with collision-safe naming
//! - Extension based media classification
//! - File and folder metadata, scoped by owner
//! - File and folder services enforcing the access policy
//! - Storage usage statistics

mod folder;
mod folder_service;
pub mod media;
mod metadata;
mod service;
mod storage;
mod usage;

pub use folder::{CascadeDelete, Folder, FolderRepository, FolderUpdate, NewFolder};
pub use folder_service::{FolderContents, FolderDeleteOutcome, FolderService};
pub use media::{classify, format_size, Category, MediaInfo, PreviewKind};
pub use metadata::{FileRepository, FileUpdate, NewStoredFile, StoredFile};
pub use service::{FileService, ShareOutcome};
pub use storage::{sanitize_filename, BlobHandle, ContentStore, StoredBlob};
pub use usage::{StorageUsage, WarningLevel};

use crate::ShareboxError;

/// Maximum length for folder names (in characters).
pub const MAX_FOLDER_NAME_LENGTH: usize = 255;

/// Default maximum file size (100MB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Default per-user storage quota (5GB).
pub const DEFAULT_STORAGE_LIMIT: u64 = 5 * 1024 * 1024 * 1024;

/// Outcome of one item in a batch operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    /// Target ID.
    pub id: i64,
    /// Whether the item succeeded.
    pub success: bool,
    /// Failure message, safe to show to the caller.
    pub error: Option<String>,
}

impl BatchItem {
    /// A successful item.
    pub fn ok(id: i64) -> Self {
        Self {
            id,
            success: true,
            error: None,
        }
    }

    /// A failed item. Internal failures are logged and reported generically.
    pub fn failed(id: i64, err: &ShareboxError) -> Self {
        let message = match err {
            ShareboxError::Forbidden(_)
            | ShareboxError::NotFound(_)
            | ShareboxError::Validation(_) => err.to_string(),
            _ => {
                tracing::error!(id, error = %err, "batch item failed");
                "internal error".to_string()
            }
        };
        Self {
            id,
            success: false,
            error: Some(message),
        }
    }
}
