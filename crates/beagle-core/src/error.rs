//! Core error types for the Beagle server.
//!
//! [`BeagleError`] covers HTTP-facing failures (authentication, authorization,
//! bad input), collaborator failures (user store, hashing), and fatal startup
//! failures (configuration). Each variant maps to an HTTP status code via
//! [`BeagleError::status_code`].

use thiserror::Error;

/// The primary error type for the Beagle server.
#[derive(Error, Debug)]
pub enum BeagleError {
    // ── HTTP errors ──────────────────────────────────────────────────

    /// HTTP 400 Bad Request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// HTTP 401 Unauthorized.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// HTTP 403 Forbidden / Permission Denied.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// HTTP 409 Conflict.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// HTTP 500 Internal Server Error.
    #[error("Internal server error: {0}")]
    InternalServerError(String),

    // ── Collaborators ────────────────────────────────────────────────

    /// The user store failed to answer a lookup.
    #[error("User store error: {0}")]
    UserStoreError(String),

    /// The password hasher failed (malformed hash, worker panic, ...).
    #[error("Password hashing error: {0}")]
    HashingError(String),

    // ── Configuration ────────────────────────────────────────────────

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The server is improperly configured.
    #[error("Improperly configured: {0}")]
    ImproperlyConfigured(String),
}

impl BeagleError {
    /// Returns the HTTP status code associated with this error.
    ///
    /// - `BadRequest` -> 400
    /// - `Unauthorized` -> 401
    /// - `PermissionDenied` -> 403
    /// - `Conflict` -> 409
    /// - Everything else -> 500
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::PermissionDenied(_) => 403,
            Self::Conflict(_) => 409,
            Self::InternalServerError(_)
            | Self::UserStoreError(_)
            | Self::HashingError(_)
            | Self::ConfigurationError(_)
            | Self::ImproperlyConfigured(_) => 500,
        }
    }

    /// Returns `true` for errors that must abort startup.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigurationError(_) | Self::ImproperlyConfigured(_)
        )
    }
}

/// A convenience type alias for `Result<T, BeagleError>`.
pub type BeagleResult<T> = Result<T, BeagleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beagle_error_status_codes() {
        assert_eq!(BeagleError::BadRequest("x".into()).status_code(), 400);
        assert_eq!(BeagleError::Unauthorized("x".into()).status_code(), 401);
        assert_eq!(BeagleError::PermissionDenied("x".into()).status_code(), 403);
        assert_eq!(BeagleError::Conflict("x".into()).status_code(), 409);
        assert_eq!(BeagleError::InternalServerError("x".into()).status_code(), 500);
        assert_eq!(BeagleError::UserStoreError("x".into()).status_code(), 500);
        assert_eq!(BeagleError::HashingError("x".into()).status_code(), 500);
        assert_eq!(BeagleError::ConfigurationError("x".into()).status_code(), 500);
    }

    #[test]
    fn test_beagle_error_display() {
        let err = BeagleError::Unauthorized("Invalid credentials.".into());
        assert_eq!(err.to_string(), "Unauthorized: Invalid credentials.");
    }

    #[test]
    fn test_configuration_errors_are_fatal() {
        assert!(BeagleError::ConfigurationError("bad rule".into()).is_fatal());
        assert!(BeagleError::ImproperlyConfigured("no catch-all".into()).is_fatal());
        assert!(!BeagleError::Unauthorized("x".into()).is_fatal());
        assert!(!BeagleError::UserStoreError("x".into()).is_fatal());
    }
}
