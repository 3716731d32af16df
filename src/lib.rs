//! Sharebox - multi-user file sharing service
//!
//! Stores uploaded content under collision-safe names, decides who may see
//! what, and streams downloads, previews, byte ranges and zip archives.

pub mod auth;
pub mod config;
pub mod datetime;
pub mod db;
pub mod delivery;
pub mod error;
pub mod file;
pub mod logging;
pub mod web;

pub use auth::{AccessPolicy, Operation, Principal, UnlockStore};
pub use config::Config;
pub use db::{Database, NewUser, User, UserRepository};
pub use delivery::DeliveryEngine;
pub use error::{Result, ShareboxError};
pub use file::{ContentStore, FileService, FolderService, StoredFile};
