//! Request DTOs for Web API.

use std::collections::HashSet;

use serde::{Deserialize, Deserializer};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::validation::{no_control_chars, not_empty_trimmed};

/// Most ids accepted by one batch request.
pub const MAX_BATCH_IDS: usize = 1000;

/// Distinguish an absent field from an explicit `null`.
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Target folder for uploads.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UploadQuery {
    /// Folder to upload into; the root when absent.
    pub folder_id: Option<i64>,
}

/// Comma separated file ids for a multi-file download.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct IdsQuery {
    /// For example `1,2,3`.
    pub ids: String,
}

impl IdsQuery {
    /// Parse the id list; any non-numeric part is an error.
    ///
    /// Repeated ids are dropped, keeping first-seen order.
    pub fn parse(&self) -> Result<Vec<i64>, String> {
        let mut seen = HashSet::new();
        let ids = self
            .ids
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<i64>()
                    .map_err(|_| format!("invalid file id: {part}"))
            })
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter(|id| seen.insert(*id))
            .collect::<Vec<_>>();
        if ids.is_empty() {
            return Err("no file ids given".to_string());
        }
        if ids.len() > MAX_BATCH_IDS {
            return Err(format!("at most {MAX_BATCH_IDS} files per download"));
        }
        Ok(ids)
    }
}

/// Share a file with users.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ShareRequest {
    /// Usernames of the new recipients.
    #[validate(length(min = 1, max = 100, message = "Give between 1 and 100 usernames"))]
    pub usernames: Vec<String>,
}

/// Set or clear an access password.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SetPasswordRequest {
    /// New password; `null` or empty clears the gate.
    #[validate(length(max = 128, message = "Password must be at most 128 characters"))]
    #[serde(default)]
    pub password: Option<String>,
}

/// Verify an access password.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UnlockRequest {
    /// Password to verify.
    #[validate(length(min = 1, max = 128, message = "Password must be 1 to 128 characters"))]
    pub password: String,
}

/// Create a folder.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateFolderRequest {
    /// Folder name.
    #[validate(
        length(min = 1, max = 255, message = "Name must be 1 to 255 characters"),
        custom(function = "not_empty_trimmed"),
        custom(function = "no_control_chars")
    )]
    pub name: String,
    /// Parent folder; the root when absent.
    #[serde(default)]
    pub parent_id: Option<i64>,
}

/// Rename or move a file.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateFileRequest {
    /// New logical name.
    #[validate(length(min = 1, max = 255, message = "Filename must be 1 to 255 characters"))]
    #[serde(default)]
    pub filename: Option<String>,
    /// New folder; `null` moves the file to the root.
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i64>)]
    pub folder_id: Option<Option<i64>>,
}

/// Rename or move a folder.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateFolderRequest {
    /// New name.
    #[validate(
        length(min = 1, max = 255, message = "Name must be 1 to 255 characters"),
        custom(function = "no_control_chars")
    )]
    #[serde(default)]
    pub name: Option<String>,
    /// New parent; `null` moves the folder to the root.
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i64>)]
    pub parent_id: Option<Option<i64>>,
}

/// Ids for a batch operation.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BatchIdsRequest {
    /// Target ids.
    #[validate(length(min = 1, max = 1000, message = "Give between 1 and 1000 ids"))]
    pub ids: Vec<i64>,
}
