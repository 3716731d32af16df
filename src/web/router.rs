//! Router configuration for Web API.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers::{
    create_folder, delete_file, delete_files, delete_folder, delete_folders, download_file,
    download_files, get_avatar, get_file, get_folder, get_storage_usage, list_files,
    list_received_files, list_root, preview_file, set_file_password, set_folder_password,
    share_file, stream_file, unlock_file, unlock_folder, unlock_folder_form, update_file,
    update_folder, upload_avatar, upload_files, AppState, MAX_AVATAR_BYTES,
};
use super::middleware::{create_cors_layer, jwt_auth, security_headers, JwtState};
use super::openapi::openapi_json;

/// Multipart overhead allowed on top of the avatar size limit.
const MULTIPART_SLACK: usize = 64 * 1024;

/// Create the main API router.
pub fn create_router(
    app_state: Arc<AppState>,
    jwt_state: Arc<JwtState>,
    cors_origins: &[String],
) -> Router {
    // Uploads are bounded while streaming, so the body limit is lifted there
    let file_routes = Router::new()
        .route(
            "/",
            post(upload_files)
                .layer(DefaultBodyLimit::disable())
                .get(list_files),
        )
        .route("/received", get(list_received_files))
        .route("/delete", post(delete_files))
        .route("/download", get(download_files))
        .route(
            "/:id",
            get(get_file).patch(update_file).delete(delete_file),
        )
        .route("/:id/download", get(download_file))
        .route("/:id/preview", get(preview_file))
        .route("/:id/stream", get(stream_file))
        .route("/:id/share", post(share_file))
        .route("/:id/password", put(set_file_password))
        .route("/:id/unlock", post(unlock_file));

    let folder_routes = Router::new()
        .route("/", get(list_root).post(create_folder))
        .route("/delete", post(delete_folders))
        .route(
            "/:id",
            get(get_folder).patch(update_folder).delete(delete_folder),
        )
        .route("/:id/password", put(set_folder_password))
        .route("/:id/unlock", post(unlock_folder))
        .route("/:id/unlock-form", post(unlock_folder_form));

    let user_routes = Router::new()
        .route("/me/storage", get(get_storage_usage))
        .route(
            "/me/avatar",
            put(upload_avatar).layer(DefaultBodyLimit::max(
                MAX_AVATAR_BYTES as usize + MULTIPART_SLACK,
            )),
        );

    let api_routes = Router::new()
        .nest("/files", file_routes)
        .nest("/folders", folder_routes)
        .nest("/users", user_routes)
        .route("/avatars/:reference", get(get_avatar));

    // Clone jwt_state for the middleware closure
    let jwt_state_for_middleware = jwt_state.clone();

    Router::new()
        .nest("/api", api_routes)
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(cors_origins))
                .layer(middleware::from_fn(security_headers))
                .layer(middleware::from_fn(move |req, next| {
                    let state = jwt_state_for_middleware.clone();
                    jwt_auth(state, req, next)
                })),
        )
        .with_state(app_state)
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}
