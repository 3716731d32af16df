//! Folder handlers for Web API.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::auth::Principal;
use crate::file::FolderUpdate;
use crate::web::dto::{
    ApiResponse, BatchIdsRequest, BatchResponse, CreateFolderRequest, FolderContentsResponse,
    FolderDeleteResponse, FolderResponse, SetPasswordRequest, UnlockRequest, UpdateFolderRequest,
    ValidatedForm, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::handlers::{AccessPassword, AppState};
use crate::web::middleware::AuthUser;

/// GET /api/folders - List the caller's root folders and files.
#[utoipa::path(
    get,
    path = "/folders",
    tag = "folders",
    responses(
        (status = 200, description = "Root listing", body = FolderContentsResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_root(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
) -> Result<Json<ApiResponse<FolderContentsResponse>>, ApiError> {
    let contents = state.folders().contents(&principal, None, None).await?;
    Ok(Json(ApiResponse::new(FolderContentsResponse::from(
        &contents,
    ))))
}

/// POST /api/folders - Create a folder.
#[utoipa::path(
    post,
    path = "/folders",
    tag = "folders",
    request_body = CreateFolderRequest,
    responses(
        (status = 201, description = "Folder created", body = FolderResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Parent not owned"),
        (status = 404, description = "Parent not found"),
        (status = 422, description = "Validation error")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_folder(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    ValidatedJson(req): ValidatedJson<CreateFolderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<FolderResponse>>), ApiError> {
    let folder = state
        .folders()
        .create(&principal, &req.name, req.parent_id)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(FolderResponse::from(&folder))),
    ))
}

/// GET /api/folders/:id - List a folder's contents.
///
/// A gated folder needs `X-Access-Password` or an earlier unlock.
#[utoipa::path(
    get,
    path = "/folders/{id}",
    tag = "folders",
    params(
        ("id" = i64, Path, description = "Folder ID"),
        ("X-Access-Password" = Option<String>, Header, description = "Access password for gated folders")
    ),
    responses(
        (status = 200, description = "Folder contents", body = FolderContentsResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Access denied or password required"),
        (status = 404, description = "Folder not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_folder(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    password: AccessPassword,
    Path(folder_id): Path<i64>,
) -> Result<Json<ApiResponse<FolderContentsResponse>>, ApiError> {
    let contents = state
        .folders()
        .contents(&principal, Some(folder_id), password.as_deref())
        .await?;
    Ok(Json(ApiResponse::new(FolderContentsResponse::from(
        &contents,
    ))))
}

/// PATCH /api/folders/:id - Rename or move a folder.
#[utoipa::path(
    patch,
    path = "/folders/{id}",
    tag = "folders",
    params(
        ("id" = i64, Path, description = "Folder ID")
    ),
    request_body = UpdateFolderRequest,
    responses(
        (status = 200, description = "Folder updated", body = FolderResponse),
        (status = 400, description = "Invalid move"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Folder not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_folder(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(folder_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateFolderRequest>,
) -> Result<Json<ApiResponse<FolderResponse>>, ApiError> {
    let mut update = FolderUpdate::new();
    if let Some(name) = req.name {
        update = update.name(name);
    }
    if let Some(parent_id) = req.parent_id {
        update = update.parent_id(parent_id);
    }
    if update.is_empty() {
        return Err(ApiError::bad_request("Nothing to update"));
    }

    let folder = state
        .folders()
        .update(&principal, folder_id, update)
        .await?;
    Ok(Json(ApiResponse::new(FolderResponse::from(&folder))))
}

/// DELETE /api/folders/:id - Delete a folder with everything in it.
#[utoipa::path(
    delete,
    path = "/folders/{id}",
    tag = "folders",
    params(
        ("id" = i64, Path, description = "Folder ID")
    ),
    responses(
        (status = 200, description = "Folder deleted", body = FolderDeleteResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Folder not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_folder(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(folder_id): Path<i64>,
) -> Result<Json<ApiResponse<FolderDeleteResponse>>, ApiError> {
    let outcome = state.folders().delete(&principal, folder_id).await?;
    Ok(Json(ApiResponse::new(outcome.into())))
}

/// POST /api/folders/delete - Delete several folders.
#[utoipa::path(
    post,
    path = "/folders/delete",
    tag = "folders",
    request_body = BatchIdsRequest,
    responses(
        (status = 200, description = "Per-folder report", body = BatchResponse),
        (status = 401, description = "Unauthorized"),
        (status = 422, description = "Validation error")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_folders(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    ValidatedJson(req): ValidatedJson<BatchIdsRequest>,
) -> Result<Json<ApiResponse<BatchResponse>>, ApiError> {
    let results = state.folders().delete_many(&principal, &req.ids).await;
    Ok(Json(ApiResponse::new(BatchResponse::from(results))))
}

/// PUT /api/folders/:id/password - Set or clear a folder's access password.
#[utoipa::path(
    put,
    path = "/folders/{id}/password",
    tag = "folders",
    params(
        ("id" = i64, Path, description = "Folder ID")
    ),
    request_body = SetPasswordRequest,
    responses(
        (status = 204, description = "Password updated"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Folder not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn set_folder_password(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(folder_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<SetPasswordRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .folders()
        .set_password(&principal, folder_id, req.password.as_deref())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/folders/:id/unlock - Verify a folder's password (JSON).
#[utoipa::path(
    post,
    path = "/folders/{id}/unlock",
    tag = "folders",
    params(
        ("id" = i64, Path, description = "Folder ID")
    ),
    request_body = UnlockRequest,
    responses(
        (status = 204, description = "Unlocked"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Wrong password or access denied"),
        (status = 404, description = "Folder not found"),
        (status = 429, description = "Too many attempts")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn unlock_folder(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(folder_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UnlockRequest>,
) -> Result<StatusCode, ApiError> {
    unlock(&state, &principal, folder_id, &req.password).await
}

/// POST /api/folders/:id/unlock-form - Verify a folder's password (form post).
#[utoipa::path(
    post,
    path = "/folders/{id}/unlock-form",
    tag = "folders",
    params(
        ("id" = i64, Path, description = "Folder ID")
    ),
    request_body(content = UnlockRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 204, description = "Unlocked"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Wrong password or access denied"),
        (status = 404, description = "Folder not found"),
        (status = 429, description = "Too many attempts")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn unlock_folder_form(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(folder_id): Path<i64>,
    ValidatedForm(req): ValidatedForm<UnlockRequest>,
) -> Result<StatusCode, ApiError> {
    unlock(&state, &principal, folder_id, &req.password).await
}

async fn unlock(
    state: &AppState,
    principal: &Principal,
    folder_id: i64,
    password: &str,
) -> Result<StatusCode, ApiError> {
    state.check_unlock_rate(principal.user_id)?;
    state
        .folders()
        .unlock(principal, folder_id, password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
