//! Authentication and authorization module for Sharebox.
//!
//! This module provides access password hashing, the access policy for
//! files and folders, and the session-scoped unlock tokens it relies on.

mod password;
mod policy;
mod principal;
mod unlock;

pub use password::{
    hash_password, validate_password, verify_password, PasswordError, MAX_PASSWORD_LENGTH,
};
pub use policy::{AccessPolicy, Decision, DenyReason, Operation, Target};
pub use principal::Principal;
pub use unlock::{TargetRef, UnlockStore};
