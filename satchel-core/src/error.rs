//! Error types for session operations.

use thiserror::Error;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Session-specific errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A key pair was rejected when building a key ring
    #[error("Invalid key length: {0}")]
    InvalidKeyLength(String),

    /// No key pair in the ring verifies the token, or it is malformed
    #[error("Invalid session token: {0}")]
    InvalidToken(String),

    /// Token verified but is older than the codec's maximum age
    #[error("Session token expired: {0}")]
    Expired(String),

    /// Encoded token does not fit the configured maximum length
    #[error("Encoded session token is {0} bytes, over the configured maximum")]
    TokenTooLong(usize),

    /// Backend I/O, timeout or persistence-encoding failure
    #[error("Session backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Stored value does not have the shape the caller asked for
    #[error("Type mismatch for session key '{key}': {reason}")]
    TypeMismatch { key: String, reason: String },

    /// Value could not be converted into a session value
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl SessionError {
    /// Whether this error came from decoding a client token.
    ///
    /// Token errors never abort a request: the session degrades to a fresh one.
    pub fn is_token_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidToken(_) | Self::Expired(_) | Self::TokenTooLong(_)
        )
    }

    /// Whether this error indicates the backend could not be reached.
    pub fn is_backend_unavailable(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_))
    }

    /// Shorthand used by backends when mapping driver errors.
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::BackendUnavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(SessionError::InvalidToken("bad".into()).is_token_error());
        assert!(SessionError::Expired("old".into()).is_token_error());
        assert!(SessionError::TokenTooLong(5000).is_token_error());
        assert!(!SessionError::unavailable("down").is_token_error());

        assert!(SessionError::unavailable("down").is_backend_unavailable());
        assert!(!SessionError::Config("x".into()).is_backend_unavailable());
    }

    #[test]
    fn test_error_display() {
        let err = SessionError::TypeMismatch {
            key: "count".to_string(),
            reason: "expected i64".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Type mismatch for session key 'count': expected i64"
        );
    }
}
