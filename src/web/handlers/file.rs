//! File handlers for Web API.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use futures::TryStreamExt;
use std::io;
use std::sync::Arc;
use tokio_util::io::StreamReader;

use crate::auth::Operation;
use crate::db::UserRepository;
use crate::file::FileUpdate;
use crate::web::dto::{
    ApiResponse, BatchIdsRequest, BatchResponse, FileInfoResponse, FileResponse, SetPasswordRequest,
    ShareRequest, ShareResponse, UnlockRequest, UpdateFileRequest, UploadFailure, UploadQuery,
    UploadResponse, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::AuthUser;
use crate::ShareboxError;

/// POST /api/files - Upload one or more files.
///
/// Request body: multipart/form-data; every part with a filename is stored.
#[utoipa::path(
    post,
    path = "/files",
    tag = "files",
    params(UploadQuery),
    responses(
        (status = 200, description = "Upload report", body = UploadResponse),
        (status = 400, description = "Invalid multipart data"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Target folder not owned"),
        (status = 404, description = "Folder not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn upload_files(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<UploadResponse>>, ApiError> {
    if let Some(folder_id) = query.folder_id {
        state
            .folders()
            .authorize(&principal, folder_id, Operation::Write, None)
            .await?;
    }

    let files = state.files();
    let mut response = UploadResponse::default();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::warn!("Failed to read multipart field: {}", e);
        ApiError::bad_request("Invalid multipart data")
    })? {
        let Some(filename) = field.file_name().map(|s| s.to_string()) else {
            continue;
        };

        let reader = StreamReader::new(
            field.map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
        );
        let reader = std::pin::pin!(reader);

        match files
            .upload(&principal, query.folder_id, &filename, reader)
            .await
        {
            Ok(file) => response.uploaded.push(FileResponse::from(&file)),
            Err(e) => response.failed.push(UploadFailure {
                error: upload_error_message(&filename, &e),
                filename,
            }),
        }
    }

    if response.uploaded.is_empty() && response.failed.is_empty() {
        return Err(ApiError::bad_request("No file provided"));
    }

    Ok(Json(ApiResponse::new(response)))
}

fn upload_error_message(filename: &str, err: &ShareboxError) -> String {
    match err {
        ShareboxError::TooLarge(_)
        | ShareboxError::Validation(_)
        | ShareboxError::Forbidden(_)
        | ShareboxError::NotFound(_) => err.to_string(),
        // A broken multipart body surfaces as invalid data from the reader.
        ShareboxError::Storage(e) if e.kind() == io::ErrorKind::InvalidData => {
            "upload interrupted".to_string()
        }
        ShareboxError::ClientGone => "upload interrupted".to_string(),
        _ => {
            tracing::error!(filename, error = %err, "upload failed");
            "internal error".to_string()
        }
    }
}

/// GET /api/files - List files in the caller's root.
#[utoipa::path(
    get,
    path = "/files",
    tag = "files",
    responses(
        (status = 200, description = "Root files", body = Vec<FileResponse>),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
) -> Result<Json<ApiResponse<Vec<FileResponse>>>, ApiError> {
    let files = state.files().list_root(&principal).await?;
    Ok(Json(ApiResponse::new(
        files.iter().map(FileResponse::from).collect(),
    )))
}

/// GET /api/files/received - List files shared with the caller.
#[utoipa::path(
    get,
    path = "/files/received",
    tag = "files",
    responses(
        (status = 200, description = "Received files", body = Vec<FileResponse>),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_received_files(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
) -> Result<Json<ApiResponse<Vec<FileResponse>>>, ApiError> {
    let files = state.files().list_received(&principal).await?;
    Ok(Json(ApiResponse::new(
        files.iter().map(FileResponse::from).collect(),
    )))
}

/// GET /api/files/:id - File metadata and preview information.
#[utoipa::path(
    get,
    path = "/files/{id}",
    tag = "files",
    params(
        ("id" = i64, Path, description = "File ID")
    ),
    responses(
        (status = 200, description = "File details", body = FileInfoResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "File not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(file_id): Path<i64>,
) -> Result<Json<ApiResponse<FileInfoResponse>>, ApiError> {
    let file = state
        .files()
        .authorize(&principal, file_id, Operation::Inspect, None)
        .await?;

    let owner_username = UserRepository::new(state.db.pool())
        .get_by_id(file.owner_id)
        .await?
        .map(|u| u.username);

    Ok(Json(ApiResponse::new(FileInfoResponse::new(
        &file,
        owner_username,
    ))))
}

/// PATCH /api/files/:id - Rename or move a file.
#[utoipa::path(
    patch,
    path = "/files/{id}",
    tag = "files",
    params(
        ("id" = i64, Path, description = "File ID")
    ),
    request_body = UpdateFileRequest,
    responses(
        (status = 200, description = "File updated", body = FileResponse),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "File not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_file(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(file_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateFileRequest>,
) -> Result<Json<ApiResponse<FileResponse>>, ApiError> {
    let mut update = FileUpdate::new();
    if let Some(filename) = req.filename {
        update = update.filename(filename);
    }
    if let Some(folder_id) = req.folder_id {
        update = update.folder_id(folder_id);
    }
    if update.is_empty() {
        return Err(ApiError::bad_request("Nothing to update"));
    }

    let file = state.files().update(&principal, file_id, update).await?;
    Ok(Json(ApiResponse::new(FileResponse::from(&file))))
}

/// DELETE /api/files/:id - Delete a file.
#[utoipa::path(
    delete,
    path = "/files/{id}",
    tag = "files",
    params(
        ("id" = i64, Path, description = "File ID")
    ),
    responses(
        (status = 204, description = "File deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "File not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(file_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.files().delete(&principal, file_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/files/delete - Delete several files.
#[utoipa::path(
    post,
    path = "/files/delete",
    tag = "files",
    request_body = BatchIdsRequest,
    responses(
        (status = 200, description = "Per-file report", body = BatchResponse),
        (status = 401, description = "Unauthorized"),
        (status = 422, description = "Validation error")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_files(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    ValidatedJson(req): ValidatedJson<BatchIdsRequest>,
) -> Result<Json<ApiResponse<BatchResponse>>, ApiError> {
    let results = state.files().delete_many(&principal, &req.ids).await;
    Ok(Json(ApiResponse::new(BatchResponse::from(results))))
}

/// POST /api/files/:id/share - Share a file with other users.
#[utoipa::path(
    post,
    path = "/files/{id}/share",
    tag = "files",
    params(
        ("id" = i64, Path, description = "File ID")
    ),
    request_body = ShareRequest,
    responses(
        (status = 200, description = "Share report", body = ShareResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "File not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn share_file(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(file_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<ShareRequest>,
) -> Result<Json<ApiResponse<ShareResponse>>, ApiError> {
    let outcome = state
        .files()
        .share(&principal, file_id, &req.usernames)
        .await?;
    Ok(Json(ApiResponse::new(outcome.into())))
}

/// PUT /api/files/:id/password - Set or clear a file's access password.
#[utoipa::path(
    put,
    path = "/files/{id}/password",
    tag = "files",
    params(
        ("id" = i64, Path, description = "File ID")
    ),
    request_body = SetPasswordRequest,
    responses(
        (status = 204, description = "Password updated"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "File not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn set_file_password(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(file_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<SetPasswordRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .files()
        .set_password(&principal, file_id, req.password.as_deref())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/files/:id/unlock - Verify a file's access password.
///
/// On success the file stays unlocked for the rest of the session.
#[utoipa::path(
    post,
    path = "/files/{id}/unlock",
    tag = "files",
    params(
        ("id" = i64, Path, description = "File ID")
    ),
    request_body = UnlockRequest,
    responses(
        (status = 204, description = "Unlocked"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Wrong password or access denied"),
        (status = 404, description = "File not found"),
        (status = 429, description = "Too many attempts")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn unlock_file(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(file_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UnlockRequest>,
) -> Result<StatusCode, ApiError> {
    state.check_unlock_rate(principal.user_id)?;
    state
        .files()
        .unlock(&principal, file_id, &req.password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
