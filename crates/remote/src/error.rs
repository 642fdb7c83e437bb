//! Error taxonomy for calls against the remote API.

use thiserror::Error;

pub type RemoteResult<T> = Result<T, RemoteError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Missing or rejected credential.
    #[error("authentication rejected ({status}): {message}")]
    Auth { status: u16, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    /// The server refused the request as malformed or conflicting.
    #[error("request rejected ({status}): {message}")]
    Validation { status: u16, message: String },

    /// 5xx and 429 responses.
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Connect failures, timeouts, truncated bodies.
    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Classifies a non-success HTTP status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::Auth { status, message },
            404 => Self::NotFound(message),
            429 | 500..=599 => Self::Server { status, message },
            _ => Self::Validation { status, message },
        }
    }

    /// Whether repeating the same request later can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Server { .. })
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::Decode(err.to_string());
        }
        if let Some(status) = err.status() {
            return Self::from_status(status.as_u16(), err.to_string());
        }
        Self::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(matches!(RemoteError::from_status(401, "x"), RemoteError::Auth { .. }));
        assert!(matches!(RemoteError::from_status(403, "x"), RemoteError::Auth { .. }));
        assert!(matches!(RemoteError::from_status(404, "x"), RemoteError::NotFound(_)));
        assert!(matches!(
            RemoteError::from_status(422, "x"),
            RemoteError::Validation { status: 422, .. }
        ));
        assert!(matches!(
            RemoteError::from_status(409, "x"),
            RemoteError::Validation { .. }
        ));
        assert!(matches!(
            RemoteError::from_status(503, "x"),
            RemoteError::Server { status: 503, .. }
        ));
        assert!(matches!(
            RemoteError::from_status(429, "x"),
            RemoteError::Server { .. }
        ));
    }

    #[test]
    fn transient_errors() {
        assert!(RemoteError::Network("reset".into()).is_transient());
        assert!(RemoteError::from_status(502, "bad gateway").is_transient());
        assert!(!RemoteError::from_status(401, "nope").is_transient());
        assert!(!RemoteError::NotFound("agent".into()).is_transient());
        assert!(!RemoteError::Decode("eof".into()).is_transient());
    }

    #[test]
    fn error_display() {
        let err = RemoteError::from_status(500, "boom");
        assert_eq!(err.to_string(), "server error (500): boom");
    }
}
