//! Web API module for Sharebox.
//!
//! This module exposes the file sharing service over HTTP: uploads,
//! listings, sharing and password gates, plus the delivery routes for
//! downloads, previews, range streaming and archives.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::{create_health_router, create_router};
pub use server::WebServer;
