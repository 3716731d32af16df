//! Test helpers for Web API integration tests.
//!
//! Provides a TestApp wrapping an axum-test server over an in-memory
//! database and a throwaway content store.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderName;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::{TestResponse, TestServer};
use serde_json::Value;
use tempfile::TempDir;

use sharebox::config::Config;
use sharebox::db::{NewUser, UserRepository};
use sharebox::web::handlers::AppState;
use sharebox::web::middleware::JwtState;
use sharebox::web::router::create_router;
use sharebox::Database;

/// Secret used to mint test session tokens.
pub const TEST_SECRET: &str = "test-secret-key-for-testing-only";

/// Header name for access passwords.
pub fn access_password() -> HeaderName {
    HeaderName::from_static("x-access-password")
}

/// A provisioned user with a session token.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: i64,
    pub username: String,
    pub token: String,
}

impl TestUser {
    /// Value for the Authorization header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// A running API with its backing stores.
pub struct TestApp {
    pub server: TestServer,
    pub db: Database,
    pub state: Arc<AppState>,
    pub jwt: Arc<JwtState>,
    pub dir: TempDir,
}

impl TestApp {
    /// Create an app with the default configuration.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create an app after adjusting the configuration.
    pub async fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");

        let mut config = Config::default();
        config.server.jwt_secret = TEST_SECRET.to_string();
        config.files.storage_path = dir.path().join("files").to_string_lossy().into_owned();
        config.files.temp_path = Some(dir.path().join("tmp").to_string_lossy().into_owned());
        config.access.unlock_attempts_per_minute = 100;
        adjust(&mut config);

        if let Some(temp) = &config.files.temp_path {
            std::fs::create_dir_all(temp).expect("Failed to create temp path");
        }

        let db = Database::open_in_memory()
            .await
            .expect("Failed to create test database");
        let state = Arc::new(AppState::new(db.clone(), &config).expect("Failed to build state"));
        let jwt = Arc::new(JwtState::new(TEST_SECRET));

        let router = create_router(state.clone(), jwt.clone(), &config.server.cors_origins);
        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            db,
            state,
            jwt,
            dir,
        }
    }

    /// Provision a user and mint a session token.
    pub async fn user(&self, username: &str) -> TestUser {
        let user = UserRepository::new(self.db.pool())
            .create(&NewUser::new(username))
            .await
            .expect("Failed to create user");
        TestUser {
            id: user.id,
            username: user.username,
            token: self.token(user.id, username),
        }
    }

    /// Mint a fresh session token, i.e. a new session, for a user.
    pub fn token(&self, user_id: i64, username: &str) -> String {
        self.jwt
            .issue(user_id, username, Duration::from_secs(3600))
            .expect("Failed to issue token")
    }

    /// Upload files as one multipart request.
    pub async fn upload_many(
        &self,
        user: &TestUser,
        folder_id: Option<i64>,
        files: &[(&str, &[u8])],
    ) -> TestResponse {
        let mut form = MultipartForm::new();
        for (name, content) in files {
            form = form.add_part("file", Part::bytes(content.to_vec()).file_name(*name));
        }
        let mut request = self
            .server
            .post("/api/files")
            .add_header(AUTHORIZATION, user.bearer());
        if let Some(folder_id) = folder_id {
            request = request.add_query_param("folder_id", folder_id);
        }
        request.multipart(form).await
    }

    /// Upload one file to the root and return its JSON description.
    pub async fn upload(&self, user: &TestUser, name: &str, content: &[u8]) -> Value {
        self.upload_into(user, None, name, content).await
    }

    /// Upload one file into a folder and return its JSON description.
    pub async fn upload_into(
        &self,
        user: &TestUser,
        folder_id: Option<i64>,
        name: &str,
        content: &[u8],
    ) -> Value {
        let response = self.upload_many(user, folder_id, &[(name, content)]).await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["data"]["failed"].as_array().unwrap().len(), 0, "{body}");
        body["data"]["uploaded"][0].clone()
    }

    /// Create a folder and return its id.
    pub async fn folder(&self, user: &TestUser, name: &str, parent_id: Option<i64>) -> i64 {
        let response = self
            .server
            .post("/api/folders")
            .add_header(AUTHORIZATION, user.bearer())
            .json(&serde_json::json!({ "name": name, "parent_id": parent_id }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        response.json::<Value>()["data"]["id"].as_i64().unwrap()
    }

    /// Path of the store root.
    pub fn store_root(&self) -> std::path::PathBuf {
        self.state.store.root().to_path_buf()
    }
}

/// Id of an uploaded file's JSON description.
pub fn file_id(file: &Value) -> i64 {
    file["id"].as_i64().unwrap()
}
