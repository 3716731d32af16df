//! OpenAPI document for the Web API.

use axum::Json;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::file::{Category, PreviewKind, WarningLevel};
use crate::web::dto::{
    AvatarResponse, BatchIdsRequest, BatchItemResponse, BatchResponse, CategoryUsage,
    CreateFolderRequest, FileInfoResponse, FileResponse, FolderContentsResponse,
    FolderDeleteResponse, FolderResponse, SetPasswordRequest, ShareRequest, ShareResponse,
    StorageUsageResponse, UnlockRequest, UpdateFileRequest, UpdateFolderRequest, UploadFailure,
    UploadResponse,
};
use crate::web::handlers;

#[derive(OpenApi)]
#[openapi(
    info(title = "Sharebox API", description = "Multi-user file sharing"),
    servers((url = "/api")),
    paths(
        handlers::file::upload_files,
        handlers::file::list_files,
        handlers::file::list_received_files,
        handlers::file::get_file,
        handlers::file::update_file,
        handlers::file::delete_file,
        handlers::file::delete_files,
        handlers::file::share_file,
        handlers::file::set_file_password,
        handlers::file::unlock_file,
        handlers::delivery::download_file,
        handlers::delivery::preview_file,
        handlers::delivery::stream_file,
        handlers::delivery::download_files,
        handlers::delivery::get_avatar,
        handlers::folder::list_root,
        handlers::folder::create_folder,
        handlers::folder::get_folder,
        handlers::folder::update_folder,
        handlers::folder::delete_folder,
        handlers::folder::delete_folders,
        handlers::folder::set_folder_password,
        handlers::folder::unlock_folder,
        handlers::folder::unlock_folder_form,
        handlers::user::get_storage_usage,
        handlers::user::upload_avatar,
    ),
    components(schemas(
        Category,
        PreviewKind,
        WarningLevel,
        FileResponse,
        FileInfoResponse,
        UploadFailure,
        UploadResponse,
        ShareRequest,
        ShareResponse,
        SetPasswordRequest,
        UnlockRequest,
        UpdateFileRequest,
        BatchIdsRequest,
        BatchItemResponse,
        BatchResponse,
        CreateFolderRequest,
        UpdateFolderRequest,
        FolderResponse,
        FolderContentsResponse,
        FolderDeleteResponse,
        CategoryUsage,
        StorageUsageResponse,
        AvatarResponse,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "files", description = "Upload, listing, sharing and password gates"),
        (name = "delivery", description = "Downloads, previews, streaming and archives"),
        (name = "folders", description = "Folder tree"),
        (name = "users", description = "Storage usage and avatars")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// GET /api-docs/openapi.json
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
