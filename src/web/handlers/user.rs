//! User handlers for Web API.

use axum::{
    extract::{Multipart, State},
    Json,
};
use futures::TryStreamExt;
use std::io;
use std::sync::Arc;
use tokio_util::io::StreamReader;

use crate::db::UserRepository;
use crate::file::{media, StorageUsage};
use crate::web::dto::{ApiResponse, AvatarResponse, StorageUsageResponse};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::AuthUser;
use crate::ShareboxError;

/// Largest accepted avatar image (5MB).
pub const MAX_AVATAR_BYTES: u64 = 5 * 1024 * 1024;

/// GET /api/users/me/storage - Storage statistics for the caller.
#[utoipa::path(
    get,
    path = "/users/me/storage",
    tag = "users",
    responses(
        (status = 200, description = "Storage usage", body = StorageUsageResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_storage_usage(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
) -> Result<Json<ApiResponse<StorageUsageResponse>>, ApiError> {
    let usage =
        StorageUsage::compute(&state.db, principal.user_id, state.storage_limit_bytes).await?;
    Ok(Json(ApiResponse::new(StorageUsageResponse::from(&usage))))
}

/// PUT /api/users/me/avatar - Upload a new avatar image.
///
/// Request body: multipart/form-data with an image part. The previous
/// avatar, if any, is deleted once the new one is recorded.
#[utoipa::path(
    put,
    path = "/users/me/avatar",
    tag = "users",
    responses(
        (status = 200, description = "Avatar replaced", body = AvatarResponse),
        (status = 400, description = "Not an image or no file provided"),
        (status = 401, description = "Unauthorized"),
        (status = 413, description = "Image too large")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn upload_avatar(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<AvatarResponse>>, ApiError> {
    let blob = loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| {
                tracing::warn!("Failed to read multipart field: {}", e);
                ApiError::bad_request("Invalid multipart data")
            })?
            .ok_or_else(|| ApiError::bad_request("No file provided"))?;
        let Some(filename) = field.file_name().map(|s| s.to_string()) else {
            continue;
        };

        if !media::classify(&filename).category.is_image() {
            return Err(ApiError::bad_request("Avatar must be an image"));
        }
        let Some(ext) = media::extension(&filename) else {
            return Err(ApiError::bad_request("Avatar must be an image"));
        };

        // Avatar names carry no part of the user's filename.
        let suggested = format!("{}-{}.{}", principal.user_id, uuid::Uuid::new_v4(), ext);
        let reader = StreamReader::new(
            field.map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
        );
        let reader = std::pin::pin!(reader);
        break state
            .avatars
            .store_reader(reader, &suggested, Some(MAX_AVATAR_BYTES))
            .await?;
    };

    let previous = match UserRepository::new(state.db.pool())
        .set_avatar(principal.user_id, Some(&blob.stored_name))
        .await
    {
        Ok(previous) => previous,
        Err(e) => {
            remove_avatar(&state, &blob.stored_name).await;
            return Err(e.into());
        }
    };

    if let Some(previous) = previous.filter(|p| *p != blob.stored_name) {
        remove_avatar(&state, &previous).await;
    }

    tracing::info!(
        user_id = principal.user_id,
        avatar = %blob.stored_name,
        "avatar replaced"
    );
    Ok(Json(ApiResponse::new(AvatarResponse::new(blob.stored_name))))
}

async fn remove_avatar(state: &AppState, stored_name: &str) {
    match state.avatars.delete(stored_name).await {
        Ok(_) => {}
        Err(ShareboxError::Validation(_)) => {
            tracing::warn!(avatar = %stored_name, "skipping invalid avatar reference");
        }
        Err(e) => {
            tracing::warn!(avatar = %stored_name, error = %e, "failed to delete avatar");
        }
    }
}
