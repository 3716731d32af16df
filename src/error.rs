//! Error types for Sharebox.

use std::io;

use thiserror::Error;

/// Common error type for Sharebox.
#[derive(Error, Debug)]
pub enum ShareboxError {
    /// Database error.
    ///
    /// Errors from sqlx are converted into this variant.
    #[error("database error: {0}")]
    Database(String),

    /// Database connection error.
    #[error("database connection error: {0}")]
    DatabaseConnection(String),

    /// Read or write failure in the content store.
    ///
    /// I/O errors caused by a peer disconnect convert into `ClientGone`.
    #[error("storage error: {0}")]
    Storage(#[source] io::Error),

    /// Authentication error.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Access was denied by the access policy.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Malformed or unsupported request.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Upload exceeds the size limit or the owner's quota.
    #[error("payload too large: {0}")]
    TooLarge(String),

    /// Requested byte range lies outside the resource.
    #[error("range not satisfiable (size {size})")]
    RangeNotSatisfiable {
        /// Total size of the resource in bytes.
        size: u64,
    },

    /// The client went away while a response was being written.
    #[error("client disconnected")]
    ClientGone,

    /// Archive packaging failed.
    #[error("archive error: {0}")]
    Archive(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Failure that is neither the caller's nor the storage's fault.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ShareboxError {
    /// Whether this error signals a disconnected client rather than a fault.
    pub fn is_client_gone(&self) -> bool {
        match self {
            ShareboxError::ClientGone => true,
            ShareboxError::Storage(e) => is_disconnect(e),
            _ => false,
        }
    }
}

/// Classify an I/O error as a peer disconnect by its kind.
pub fn is_disconnect(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
    )
}

impl From<io::Error> for ShareboxError {
    fn from(e: io::Error) -> Self {
        if is_disconnect(&e) {
            ShareboxError::ClientGone
        } else {
            ShareboxError::Storage(e)
        }
    }
}

impl From<sqlx::Error> for ShareboxError {
    fn from(e: sqlx::Error) -> Self {
        ShareboxError::Database(e.to_string())
    }
}

impl From<zip::result::ZipError> for ShareboxError {
    fn from(e: zip::result::ZipError) -> Self {
        match e {
            zip::result::ZipError::Io(io_err) => io_err.into(),
            other => ShareboxError::Archive(other.to_string()),
        }
    }
}

/// Result type alias for Sharebox operations.
pub type Result<T> = std::result::Result<T, ShareboxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forbidden_error_display() {
        let err = ShareboxError::Forbidden("not a recipient".to_string());
        assert_eq!(err.to_string(), "forbidden: not a recipient");
    }

    #[test]
    fn test_not_found_error_display() {
        let err = ShareboxError::NotFound("file".to_string());
        assert_eq!(err.to_string(), "file not found");
    }

    #[test]
    fn test_range_error_display() {
        let err = ShareboxError::RangeNotSatisfiable { size: 42 };
        assert_eq!(err.to_string(), "range not satisfiable (size 42)");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err: ShareboxError = io_err.into();
        assert!(matches!(err, ShareboxError::Storage(_)));
        assert!(!err.is_client_gone());
    }

    #[test]
    fn test_client_gone_classified_by_kind() {
        for kind in [
            io::ErrorKind::BrokenPipe,
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::ConnectionAborted,
        ] {
            let err: ShareboxError = io::Error::new(kind, "whatever text").into();
            assert!(matches!(err, ShareboxError::ClientGone), "{kind:?}");
            assert!(err.is_client_gone(), "{kind:?}");

            let zipped: ShareboxError = zip::result::ZipError::Io(io::Error::from(kind)).into();
            assert!(matches!(zipped, ShareboxError::ClientGone), "{kind:?}");
        }
        // Built directly, a disconnect inside `Storage` still classifies.
        assert!(ShareboxError::Storage(io::Error::from(io::ErrorKind::BrokenPipe)).is_client_gone());
    }

    #[test]
    fn test_message_text_does_not_imply_disconnect() {
        let err: ShareboxError =
            io::Error::new(io::ErrorKind::Other, "Connection reset by peer").into();
        assert!(!err.is_client_gone());
    }

    #[test]
    fn test_result_alias() {
        fn sample_err() -> Result<i32> {
            Err(ShareboxError::Validation("bad".to_string()))
        }
        assert!(sample_err().is_err());
    }
}
