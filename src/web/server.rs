//! Web server for Sharebox.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;

use crate::auth::UnlockStore;
use crate::config::Config;
use crate::{Database, Result, ShareboxError};

use super::handlers::AppState;
use super::middleware::JwtState;
use super::router::{create_health_router, create_router};

/// How often expired unlock tokens are pruned.
const UNLOCK_PRUNE_INTERVAL_SECS: u64 = 300;

/// Web server for the API.
pub struct WebServer {
    /// Server address.
    addr: SocketAddr,
    /// Application state.
    app_state: Arc<AppState>,
    /// JWT state.
    jwt_state: Arc<JwtState>,
    /// Allowed CORS origins.
    cors_origins: Vec<String>,
}

impl WebServer {
    /// Create a new web server.
    pub fn new(config: &Config, db: Database) -> Result<Self> {
        let addr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .map_err(|e| ShareboxError::Config(format!("invalid server address: {e}")))?;

        let app_state = AppState::new(db, config)?;
        tracing::info!("File storage initialized at: {}", config.files.storage_path);

        Ok(Self {
            addr,
            app_state: Arc::new(app_state),
            jwt_state: Arc::new(JwtState::new(&config.server.jwt_secret)),
            cors_origins: config.server.cors_origins.clone(),
        })
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Start the unlock token pruning background task.
    fn start_unlock_prune_task(unlocks: Arc<UnlockStore>) {
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(UNLOCK_PRUNE_INTERVAL_SECS));

            // Skip the first immediate tick
            interval.tick().await;

            loop {
                interval.tick().await;
                let pruned = unlocks.prune_expired(chrono::Utc::now());
                if pruned > 0 {
                    tracing::info!(pruned, "Pruned expired unlock tokens");
                } else {
                    tracing::debug!("No expired unlock tokens to prune");
                }
            }
        });
    }

    fn into_router(self) -> (Router, Arc<AppState>) {
        let app_state = self.app_state.clone();
        let router = create_router(self.app_state, self.jwt_state, &self.cors_origins)
            .merge(create_health_router());
        (router, app_state)
    }

    fn start_background_tasks(app_state: &AppState) {
        Self::start_unlock_prune_task(app_state.policy.unlocks().clone());
        app_state.rate_limits.clone().start_cleanup_task();
        tracing::info!("Background cleanup tasks started");
    }

    /// Run the web server.
    pub async fn run(self) -> std::result::Result<(), std::io::Error> {
        let addr = self.addr;
        let (router, app_state) = self.into_router();

        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        // Start background tasks after successful bind
        Self::start_background_tasks(&app_state);

        tracing::info!("Web server listening on http://{}", local_addr);

        axum::serve(listener, router).await
    }

    /// Run the server and return the actual bound address.
    ///
    /// This is useful for testing when binding to port 0.
    pub async fn run_with_addr(self) -> std::result::Result<SocketAddr, std::io::Error> {
        let addr = self.addr;
        let (router, app_state) = self.into_router();

        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        Self::start_background_tasks(&app_state);

        tracing::info!("Web server listening on http://{}", local_addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!("Web server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn create_test_config(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 0; // Use random port
        config.server.jwt_secret = "test-secret-key".to_string();
        config.files.storage_path = dir.join("files").to_string_lossy().into_owned();
        config
    }

    #[tokio::test]
    async fn test_web_server_new() {
        let dir = tempfile::tempdir().unwrap();
        let config = create_test_config(dir.path());
        let db = Database::open_in_memory().await.unwrap();

        let server = WebServer::new(&config, db).unwrap();
        assert_eq!(server.addr().ip().to_string(), "127.0.0.1");
    }

    #[tokio::test]
    async fn test_web_server_invalid_address() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = create_test_config(dir.path());
        config.server.host = "not an address".to_string();
        let db = Database::open_in_memory().await.unwrap();

        assert!(matches!(
            WebServer::new(&config, db),
            Err(ShareboxError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_web_server_run() {
        let dir = tempfile::tempdir().unwrap();
        let config = create_test_config(dir.path());
        let db = Database::open_in_memory().await.unwrap();

        let server = WebServer::new(&config, db).unwrap();
        let addr = server.run_with_addr().await.unwrap();

        // Test health endpoint
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("OK"));
    }
}
