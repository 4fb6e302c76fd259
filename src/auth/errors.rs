//! # Auth Errors
//!
//! Error types for the authentication module.

use thiserror::Error;

/// Result type for auth operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Authentication and authorization errors
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    // ==================
    // Authentication Errors
    // ==================

    /// Resource requires a bearer token
    #[error("Authentication required")]
    AuthenticationRequired,

    /// Authorization header present but not a bearer token
    #[error("Malformed authorization header")]
    MalformedHeader,

    // ==================
    // JWT Errors
    // ==================

    /// JWT token is malformed
    #[error("Malformed token")]
    MalformedToken,

    /// JWT token has expired
    #[error("Token expired")]
    TokenExpired,

    /// JWT signature is invalid
    #[error("Invalid token signature")]
    InvalidSignature,

    // ==================
    // Role Errors
    // ==================

    /// A role in `roles_required` is not held
    #[error("Missing required role: {0}")]
    MissingRole(String),

    /// None of `roles_accepted` is held
    #[error("None of the accepted roles is held")]
    RoleNotAccepted,

    // ==================
    // Internal Errors
    // ==================

    /// Token generation failed
    #[error("Internal error: token generation failed")]
    TokenGenerationFailed,
}

impl AuthError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            // 401 Unauthorized
            AuthError::AuthenticationRequired => 401,
            AuthError::MalformedHeader => 401,
            AuthError::MalformedToken => 401,
            AuthError::TokenExpired => 401,
            AuthError::InvalidSignature => 401,

            // 403 Forbidden
            AuthError::MissingRole(_) => 403,
            AuthError::RoleNotAccepted => 403,

            // 500 Internal Server Error
            AuthError::TokenGenerationFailed => 500,
        }
    }

    /// Returns whether this error should be logged at warn level
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(AuthError::AuthenticationRequired.status_code(), 401);
        assert_eq!(AuthError::TokenExpired.status_code(), 401);
        assert_eq!(AuthError::MissingRole("admin".into()).status_code(), 403);
        assert_eq!(AuthError::RoleNotAccepted.status_code(), 403);
        assert_eq!(AuthError::TokenGenerationFailed.status_code(), 500);
    }

    #[test]
    fn test_client_errors() {
        assert!(AuthError::InvalidSignature.is_client_error());
        assert!(!AuthError::TokenGenerationFailed.is_client_error());
    }
}
