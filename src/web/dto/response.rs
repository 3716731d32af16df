//! Response DTOs for Web API.

use serde::Serialize;
use utoipa::ToSchema;

use crate::datetime::to_rfc3339;
use crate::file::{
    classify, format_size, BatchItem, Category, Folder, FolderContents, FolderDeleteOutcome,
    PreviewKind, ShareOutcome, StorageUsage, StoredFile, WarningLevel,
};

// ============================================================================
// Generic Response Wrappers
// ============================================================================

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new API response.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

// ============================================================================
// Files
// ============================================================================

/// A file in a listing.
#[derive(Debug, Serialize, ToSchema)]
pub struct FileResponse {
    /// File ID.
    pub id: i64,
    /// Display name.
    pub filename: String,
    /// Media type.
    pub content_type: String,
    /// Size in bytes.
    pub size: i64,
    /// Human-readable size.
    pub size_display: String,
    /// Coarse category.
    pub category: Category,
    /// Inline preview capability.
    pub preview_type: PreviewKind,
    /// Whether the file is password gated.
    pub locked: bool,
    /// Containing folder.
    pub folder_id: Option<i64>,
    /// Owner user ID.
    pub owner_id: i64,
    /// Upload time (RFC 3339).
    pub created_at: String,
}

impl From<&StoredFile> for FileResponse {
    fn from(file: &StoredFile) -> Self {
        let media = classify(&file.stored_name);
        Self {
            id: file.id,
            filename: file.filename.clone(),
            content_type: file.content_type.clone(),
            size: file.size,
            size_display: format_size(file.size_bytes()),
            category: media.category,
            preview_type: media.preview,
            locked: file.is_locked(),
            folder_id: file.folder_id,
            owner_id: file.owner_id,
            created_at: to_rfc3339(&file.created_at),
        }
    }
}

/// Metadata and preview information for one file.
#[derive(Debug, Serialize, ToSchema)]
pub struct FileInfoResponse {
    #[serde(flatten)]
    pub file: FileResponse,
    /// Owner's username.
    pub owner_username: Option<String>,
    /// Where an inline preview can be fetched, if the type allows one.
    pub preview_url: Option<String>,
    /// Always null; thumbnails are not generated.
    pub thumbnail_url: Option<String>,
}

impl FileInfoResponse {
    /// Build the info view. Video previews go through the range endpoint.
    pub fn new(file: &StoredFile, owner_username: Option<String>) -> Self {
        let file = FileResponse::from(file);
        let preview_url = match file.preview_type {
            PreviewKind::Unsupported => None,
            PreviewKind::Video => Some(format!("/api/files/{}/stream", file.id)),
            _ => Some(format!("/api/files/{}/preview", file.id)),
        };
        Self {
            file,
            owner_username,
            preview_url,
            thumbnail_url: None,
        }
    }
}

/// A file that could not be uploaded.
#[derive(Debug, Serialize, ToSchema)]
pub struct UploadFailure {
    /// Name the client sent.
    pub filename: String,
    /// Why it failed.
    pub error: String,
}

/// Result of a multi-file upload.
#[derive(Debug, Default, Serialize, ToSchema)]
pub struct UploadResponse {
    /// Files that were stored.
    pub uploaded: Vec<FileResponse>,
    /// Files that were rejected.
    pub failed: Vec<UploadFailure>,
}

/// Result of sharing a file.
#[derive(Debug, Serialize, ToSchema)]
pub struct ShareResponse {
    /// Usernames that became recipients.
    pub added: Vec<String>,
    /// Usernames that already were recipients.
    pub already_shared: Vec<String>,
    /// Usernames that do not exist.
    pub unknown: Vec<String>,
    /// Whether the owner's own name was ignored.
    pub skipped_owner: bool,
}

impl From<ShareOutcome> for ShareResponse {
    fn from(outcome: ShareOutcome) -> Self {
        Self {
            added: outcome.added,
            already_shared: outcome.already_shared,
            unknown: outcome.unknown,
            skipped_owner: outcome.skipped_owner,
        }
    }
}

// ============================================================================
// Batch
// ============================================================================

/// One item of a batch report.
#[derive(Debug, Serialize, ToSchema)]
pub struct BatchItemResponse {
    /// Target ID.
    pub id: i64,
    /// Whether the item succeeded.
    pub success: bool,
    /// Failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-item report of a batch operation.
#[derive(Debug, Serialize, ToSchema)]
pub struct BatchResponse {
    /// Items that succeeded.
    pub succeeded: usize,
    /// Items that failed.
    pub failed: usize,
    /// Every item, in request order.
    pub results: Vec<BatchItemResponse>,
}

impl From<Vec<BatchItem>> for BatchResponse {
    fn from(items: Vec<BatchItem>) -> Self {
        let succeeded = items.iter().filter(|i| i.success).count();
        Self {
            succeeded,
            failed: items.len() - succeeded,
            results: items
                .into_iter()
                .map(|i| BatchItemResponse {
                    id: i.id,
                    success: i.success,
                    error: i.error,
                })
                .collect(),
        }
    }
}

// ============================================================================
// Folders
// ============================================================================

/// Folder information.
#[derive(Debug, Serialize, ToSchema)]
pub struct FolderResponse {
    /// Folder ID.
    pub id: i64,
    /// Folder name.
    pub name: String,
    /// Parent folder.
    pub parent_id: Option<i64>,
    /// Whether the folder is password gated.
    pub locked: bool,
    /// Creation time (RFC 3339).
    pub created_at: String,
}

impl From<&Folder> for FolderResponse {
    fn from(folder: &Folder) -> Self {
        Self {
            id: folder.id,
            name: folder.name.clone(),
            parent_id: folder.parent_id,
            locked: folder.is_locked(),
            created_at: to_rfc3339(&folder.created_at),
        }
    }
}

/// A folder listing; `folder` is null for the root.
#[derive(Debug, Serialize, ToSchema)]
pub struct FolderContentsResponse {
    pub folder: Option<FolderResponse>,
    pub folders: Vec<FolderResponse>,
    pub files: Vec<FileResponse>,
}

impl From<&FolderContents> for FolderContentsResponse {
    fn from(contents: &FolderContents) -> Self {
        Self {
            folder: contents.folder.as_ref().map(FolderResponse::from),
            folders: contents.folders.iter().map(FolderResponse::from).collect(),
            files: contents.files.iter().map(FileResponse::from).collect(),
        }
    }
}

/// What deleting a folder removed.
#[derive(Debug, Serialize, ToSchema)]
pub struct FolderDeleteResponse {
    pub folders_deleted: usize,
    pub files_deleted: usize,
    /// Blobs left behind because they could not be removed.
    pub orphaned_blobs: usize,
}

impl From<FolderDeleteOutcome> for FolderDeleteResponse {
    fn from(outcome: FolderDeleteOutcome) -> Self {
        Self {
            folders_deleted: outcome.folders_deleted,
            files_deleted: outcome.files_deleted,
            orphaned_blobs: outcome.orphaned_blobs.len(),
        }
    }
}

// ============================================================================
// Users
// ============================================================================

/// Usage of one category.
#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryUsage {
    pub category: Category,
    pub bytes: u64,
    pub display: String,
}

/// Storage statistics for the caller.
#[derive(Debug, Serialize, ToSchema)]
pub struct StorageUsageResponse {
    pub used_bytes: u64,
    pub used_display: String,
    pub limit_bytes: u64,
    pub limit_display: String,
    pub remaining_bytes: u64,
    pub remaining_display: String,
    /// Percentage of the quota in use, rounded to two decimals.
    pub percentage: f64,
    pub warning_level: WarningLevel,
    pub file_count: usize,
    pub shared_file_count: usize,
    pub categories: Vec<CategoryUsage>,
}

impl From<&StorageUsage> for StorageUsageResponse {
    fn from(usage: &StorageUsage) -> Self {
        Self {
            used_bytes: usage.used_bytes,
            used_display: format_size(usage.used_bytes),
            limit_bytes: usage.limit_bytes,
            limit_display: format_size(usage.limit_bytes),
            remaining_bytes: usage.remaining_bytes(),
            remaining_display: format_size(usage.remaining_bytes()),
            percentage: (usage.percentage() * 100.0).round() / 100.0,
            warning_level: usage.warning_level(),
            file_count: usage.file_count,
            shared_file_count: usage.shared_file_count,
            categories: Category::ALL
                .iter()
                .map(|&category| {
                    let bytes = usage.category_bytes(category);
                    CategoryUsage {
                        category,
                        bytes,
                        display: format_size(bytes),
                    }
                })
                .collect(),
        }
    }
}

/// The caller's avatar reference.
#[derive(Debug, Serialize, ToSchema)]
pub struct AvatarResponse {
    /// Stored avatar reference.
    pub avatar: String,
    /// Where the avatar is served.
    pub url: String,
}

impl AvatarResponse {
    pub fn new(avatar: String) -> Self {
        let url = format!(
            "/api/avatars/{}",
            crate::delivery::encode_filename(&avatar)
        );
        Self { avatar, url }
    }
}
