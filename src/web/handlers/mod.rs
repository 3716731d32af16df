//! API handlers for Sharebox.

pub mod delivery;
pub mod file;
pub mod folder;
pub mod user;

pub use delivery::*;
pub use file::*;
pub use folder::*;
pub use user::*;

use axum::{extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;

use crate::auth::{AccessPolicy, UnlockStore};
use crate::config::Config;
use crate::db::Database;
use crate::delivery::DeliveryEngine;
use crate::file::{ContentStore, FileService, FolderService};
use crate::web::error::ApiError;
use crate::web::middleware::RateLimitState;
use crate::Result;

/// Header carrying an access password for gated files and folders.
pub const ACCESS_PASSWORD_HEADER: &str = "x-access-password";

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Metadata directory.
    pub db: Database,
    /// Content store for uploaded files.
    pub store: ContentStore,
    /// Content store for avatars.
    pub avatars: ContentStore,
    /// Access rules and unlock tokens.
    pub policy: AccessPolicy,
    /// Response builder for stored content.
    pub delivery: DeliveryEngine,
    /// Throttle for password attempts.
    pub rate_limits: Arc<RateLimitState>,
    /// Maximum size of a single upload in bytes.
    pub max_upload_bytes: u64,
    /// Per-user storage quota in bytes.
    pub storage_limit_bytes: u64,
}

impl AppState {
    /// Build the state from configuration, creating store directories as needed.
    pub fn new(db: Database, config: &Config) -> Result<Self> {
        let store = ContentStore::new(&config.files.storage_path)?;
        let avatars = store.scoped(&config.files.avatar_dir)?;
        let policy = AccessPolicy::new(
            Arc::new(UnlockStore::new()),
            config.access.owner_bypasses_password,
        );
        let delivery = DeliveryEngine::new(store.clone(), config.files.temp_dir())
            .with_chunk_size(config.files.stream_chunk_size)
            .with_preview_cache_secs(config.files.preview_cache_secs);

        Ok(Self {
            db,
            store,
            avatars,
            policy,
            delivery,
            rate_limits: Arc::new(RateLimitState::new(
                config.access.unlock_attempts_per_minute,
            )),
            max_upload_bytes: config.files.max_upload_bytes(),
            storage_limit_bytes: config.files.storage_limit_bytes(),
        })
    }

    /// File operations with the configured limits.
    pub fn files(&self) -> FileService<'_> {
        FileService::new(&self.db, &self.store, &self.policy)
            .with_max_file_size(self.max_upload_bytes)
            .with_storage_limit(self.storage_limit_bytes)
    }

    /// Folder operations.
    pub fn folders(&self) -> FolderService<'_> {
        FolderService::new(&self.db, &self.store, &self.policy)
    }

    /// Reject the request when the caller is out of unlock attempts.
    pub fn check_unlock_rate(&self, user_id: i64) -> std::result::Result<(), ApiError> {
        if self.rate_limits.check_unlock(user_id) {
            Ok(())
        } else {
            Err(ApiError::too_many_requests(
                "Too many password attempts, try again later",
            ))
        }
    }
}

/// Access password presented with the request, if any.
#[derive(Debug, Clone, Default)]
pub struct AccessPassword(pub Option<String>);

impl AccessPassword {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl<S> FromRequestParts<S> for AccessPassword
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = std::result::Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let password = match parts.headers.get(ACCESS_PASSWORD_HEADER) {
                None => None,
                Some(value) => {
                    let value = value
                        .to_str()
                        .map_err(|_| ApiError::bad_request("Invalid access password header"))?;
                    Some(value.to_string()).filter(|v| !v.is_empty())
                }
            };
            Ok(AccessPassword(password))
        })
    }
}
