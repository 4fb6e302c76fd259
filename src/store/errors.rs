//! # Store Errors
//!
//! SQLite failures classified the way the resource layer reports them.

use rusqlite::ErrorCode;
use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Storage errors
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Unique, foreign-key, not-null or check constraint violated
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Transient failure: busy, locked, I/O, disk full
    #[error("Operational error: {0}")]
    Operational(String),

    /// Connection mutex poisoned by a panicking holder
    #[error("Storage lock poisoned")]
    LockPoisoned,

    /// Anything else; not recoverable by the caller
    #[error("Storage error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, message) => {
                let message = message.clone().unwrap_or_else(|| failure.to_string());
                match failure.code {
                    ErrorCode::ConstraintViolation => StoreError::Integrity(message),
                    ErrorCode::DatabaseBusy
                    | ErrorCode::DatabaseLocked
                    | ErrorCode::SystemIoFailure
                    | ErrorCode::DiskFull
                    | ErrorCode::CannotOpen
                    | ErrorCode::ReadOnly
                    | ErrorCode::OperationInterrupted
                    | ErrorCode::FileLockingProtocolFailed => StoreError::Operational(message),
                    _ => StoreError::Internal(message),
                }
            }
            _ => StoreError::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::ffi;

    fn failure(code: std::os::raw::c_int) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(ffi::Error::new(code), Some("boom".to_string()))
    }

    #[test]
    fn test_classification() {
        assert!(matches!(
            StoreError::from(failure(ffi::SQLITE_CONSTRAINT)),
            StoreError::Integrity(_)
        ));
        assert!(matches!(
            StoreError::from(failure(ffi::SQLITE_BUSY)),
            StoreError::Operational(_)
        ));
        assert!(matches!(
            StoreError::from(rusqlite::Error::QueryReturnedNoRows),
            StoreError::Internal(_)
        ));
    }
}
