//! CLI-specific error types
//!
//! Every CLI error ends the process with a non-zero exit code.

use std::io;

use thiserror::Error;

use crate::auth::AuthError;
use crate::rest_api::RestError;
use crate::store::StoreError;

/// CLI error
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration file missing, unreadable or invalid
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error (stdout, filesystem)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Database could not be opened or migrated
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Token could not be minted
    #[error("token error: {0}")]
    Token(#[from] AuthError),

    /// Startup failed after configuration was loaded
    #[error("boot failed: {0}")]
    BootFailed(String),
}

impl CliError {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            CliError::Config(_) => "RETAILPOS_CLI_CONFIG_ERROR",
            CliError::Io(_) => "RETAILPOS_CLI_IO_ERROR",
            CliError::Store(_) => "RETAILPOS_CLI_STORE_ERROR",
            CliError::Token(_) => "RETAILPOS_CLI_TOKEN_ERROR",
            CliError::BootFailed(_) => "RETAILPOS_CLI_BOOT_FAILED",
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        CliError::Config(msg.into())
    }

    pub fn boot_failed(msg: impl Into<String>) -> Self {
        CliError::BootFailed(msg.into())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Io(io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

impl From<RestError> for CliError {
    fn from(e: RestError) -> Self {
        CliError::BootFailed(e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(CliError::config_error("x").code(), "RETAILPOS_CLI_CONFIG_ERROR");
        assert_eq!(
            CliError::from(StoreError::LockPoisoned).code(),
            "RETAILPOS_CLI_STORE_ERROR"
        );
    }

    #[test]
    fn test_display_includes_message() {
        let err = CliError::config_error("port must be > 0");
        assert_eq!(err.to_string(), "configuration error: port must be > 0");
    }
}
