//! Content delivery handlers: download, preview, range streaming, archives
//! and avatars.
//!
//! Every handler authorizes first and only then touches the content store,
//! so a denied request never opens a blob.

use axum::{
    extract::{Path, Query, State},
    http::{header::RANGE, HeaderMap},
    response::Response,
};
use std::sync::Arc;

use crate::db::UserRepository;
use crate::web::dto::IdsQuery;
use crate::web::error::ApiError;
use crate::web::handlers::{AccessPassword, AppState};
use crate::web::middleware::AuthUser;

/// GET /api/files/:id/download - Download a file as an attachment.
#[utoipa::path(
    get,
    path = "/files/{id}/download",
    tag = "delivery",
    params(
        ("id" = i64, Path, description = "File ID"),
        ("X-Access-Password" = Option<String>, Header, description = "Access password for gated files")
    ),
    responses(
        (status = 200, description = "File content", content_type = "application/octet-stream"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Access denied or password required"),
        (status = 404, description = "File not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    password: AccessPassword,
    Path(file_id): Path<i64>,
) -> Result<Response, ApiError> {
    let file = state
        .files()
        .authorize_read(&principal, file_id, password.as_deref())
        .await?;
    Ok(state.delivery.download(&file).await?)
}

/// GET /api/files/:id/preview - Show a file inline.
#[utoipa::path(
    get,
    path = "/files/{id}/preview",
    tag = "delivery",
    params(
        ("id" = i64, Path, description = "File ID"),
        ("X-Access-Password" = Option<String>, Header, description = "Access password for gated files")
    ),
    responses(
        (status = 200, description = "Inline content"),
        (status = 400, description = "File type cannot be previewed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Access denied or password required"),
        (status = 404, description = "File not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn preview_file(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    password: AccessPassword,
    Path(file_id): Path<i64>,
) -> Result<Response, ApiError> {
    let file = state
        .files()
        .authorize_read(&principal, file_id, password.as_deref())
        .await?;
    Ok(state.delivery.preview(&file).await?)
}

/// GET /api/files/:id/stream - Stream a file, honouring `Range`.
#[utoipa::path(
    get,
    path = "/files/{id}/stream",
    tag = "delivery",
    params(
        ("id" = i64, Path, description = "File ID"),
        ("Range" = Option<String>, Header, description = "Single byte range, e.g. bytes=0-1023"),
        ("X-Access-Password" = Option<String>, Header, description = "Access password for gated files")
    ),
    responses(
        (status = 200, description = "Whole file"),
        (status = 206, description = "Requested range"),
        (status = 400, description = "Malformed range"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Access denied or password required"),
        (status = 404, description = "File not found"),
        (status = 416, description = "Range not satisfiable")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn stream_file(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    password: AccessPassword,
    Path(file_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let range = headers
        .get(RANGE)
        .map(|value| {
            value
                .to_str()
                .map_err(|_| ApiError::bad_request("Invalid Range header"))
        })
        .transpose()?;

    let file = state
        .files()
        .authorize_read(&principal, file_id, password.as_deref())
        .await?;
    Ok(state.delivery.stream(&file, range).await?)
}

/// GET /api/files/download?ids=1,2,3 - Download several files.
///
/// A single requested id is served as a plain download and fails like one.
/// Several ids are bundled into a zip archive of the files the caller can
/// read, even when only one of them is readable.
#[utoipa::path(
    get,
    path = "/files/download",
    tag = "delivery",
    params(
        IdsQuery,
        ("X-Access-Password" = Option<String>, Header, description = "Access password for gated files")
    ),
    responses(
        (status = 200, description = "File content or zip archive"),
        (status = 400, description = "Invalid id list"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "None of the files can be read"),
        (status = 404, description = "The single requested file does not exist")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn download_files(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    password: AccessPassword,
    Query(query): Query<IdsQuery>,
) -> Result<Response, ApiError> {
    let ids = query.parse().map_err(ApiError::bad_request)?;
    if let [id] = ids.as_slice() {
        let file = state
            .files()
            .authorize_read(&principal, *id, password.as_deref())
            .await?;
        return Ok(state.delivery.download(&file).await?);
    }

    let files = state
        .files()
        .readable_files(&principal, &ids, password.as_deref())
        .await?;

    tracing::info!(
        user_id = principal.user_id,
        requested = ids.len(),
        readable = files.len(),
        "multi-file download"
    );
    Ok(state.delivery.archive(&files).await?)
}

/// GET /api/avatars/:reference - Serve a user's avatar image.
#[utoipa::path(
    get,
    path = "/avatars/{reference}",
    tag = "delivery",
    params(
        ("reference" = String, Path, description = "Avatar reference")
    ),
    responses(
        (status = 200, description = "Avatar image"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Avatar not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_avatar(
    State(state): State<Arc<AppState>>,
    AuthUser(_principal): AuthUser,
    Path(reference): Path<String>,
) -> Result<Response, ApiError> {
    // Only references some user currently holds are served.
    UserRepository::new(state.db.pool())
        .get_by_avatar(&reference)
        .await?
        .ok_or_else(|| ApiError::not_found("Avatar not found"))?;

    Ok(state.delivery.avatar(&state.avatars, &reference).await?)
}
