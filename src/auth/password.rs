//! Access password hashing and validation for Sharebox.
//!
//! Uses Argon2id with a random salt per hash. Plaintext passwords are
//! never stored or compared.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Params,
};
use rand_core::OsRng;
use thiserror::Error;

/// Minimum access password length, in characters.
pub const MIN_PASSWORD_LENGTH: usize = 1;

/// Maximum access password length, in characters.
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Password-related errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PasswordError {
    /// Password is empty.
    #[error("password must be at least {MIN_PASSWORD_LENGTH} character")]
    TooShort,

    /// Password is too long.
    #[error("password must be at most {MAX_PASSWORD_LENGTH} characters")]
    TooLong,

    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    HashError(String),

    /// Password hash is invalid.
    #[error("invalid password hash format")]
    InvalidHash,

    /// Password verification failed (wrong password).
    #[error("password verification failed")]
    VerificationFailed,
}

/// Create the Argon2 hasher.
///
/// Parameters:
/// - Memory cost: 19 MiB (19456 KiB)
/// - Time cost: 2 iterations
/// - Parallelism: 1 lane
fn create_argon2() -> Result<Argon2<'static>, PasswordError> {
    let params =
        Params::new(19456, 2, 1, None).map_err(|e| PasswordError::HashError(e.to_string()))?;
    Ok(Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        params,
    ))
}

/// Hash an access password using Argon2id.
///
/// Returns a PHC-formatted hash string that includes the salt and parameters.
///
/// # Examples
///
/// ```
/// use sharebox::auth::hash_password;
///
/// let hash = hash_password("open sesame").unwrap();
/// assert!(hash.starts_with("$argon2id$"));
/// ```
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    validate_password(password)?;

    let salt = SaltString::generate(&mut OsRng);
    let hash = create_argon2()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(e.to_string()))?;

    Ok(hash.to_string())
}

/// Verify a password against a stored hash.
///
/// Returns `Ok(())` if the password matches, or an error if it doesn't.
pub fn verify_password(password: &str, hash: &str) -> Result<(), PasswordError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHash)?;

    // Parameters come from the parsed hash.
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| PasswordError::VerificationFailed)
}

/// Validate access password requirements (1 to 128 characters).
pub fn validate_password(password: &str) -> Result<(), PasswordError> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LENGTH {
        return Err(PasswordError::TooShort);
    }
    if len > MAX_PASSWORD_LENGTH {
        return Err(PasswordError::TooLong);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password_success() {
        let hash = hash_password("secret").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("$v=19$"));
        assert!(!hash.contains("secret"));
    }

    #[test]
    fn test_hash_password_unique_salts() {
        let hash1 = hash_password("same").unwrap();
        let hash2 = hash_password("same").unwrap();
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("mật khẩu").unwrap();
        assert!(verify_password("mật khẩu", &hash).is_ok());
        assert_eq!(
            verify_password("wrong", &hash),
            Err(PasswordError::VerificationFailed)
        );
    }

    #[test]
    fn test_verify_invalid_hash() {
        assert_eq!(
            verify_password("secret", "not-a-hash"),
            Err(PasswordError::InvalidHash)
        );
    }

    #[test]
    fn test_validate_password_bounds() {
        assert_eq!(validate_password(""), Err(PasswordError::TooShort));
        assert!(validate_password("x").is_ok());
        assert!(validate_password(&"あ".repeat(128)).is_ok());
        assert_eq!(
            validate_password(&"a".repeat(129)),
            Err(PasswordError::TooLong)
        );
    }
}
