//! Backend error types
//!
//! Errors raised while talking to the search backend. Every variant that
//! originates from a response keeps the raw body for diagnostics.

use thiserror::Error;

/// Errors that can occur when calling the search backend
#[derive(Error, Debug)]
pub enum BackendError {
    /// The HTTP request could not be sent or the body could not be read
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend answered with a non-success status
    #[error("Backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not the JSON we expected
    #[error("Undecodable response: {message}")]
    Decode { message: String, body: String },

    /// A multi-search sub-request reported an error
    #[error("Search failed: {message}")]
    Search { message: String, body: String },

    /// The request body could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A configured header value cannot be sent over HTTP
    #[error("Invalid {name} header: {message}")]
    InvalidHeader { name: String, message: String },
}

impl BackendError {
    /// Raw response body attached to this error, if any
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Status { body, .. } | Self::Decode { body, .. } | Self::Search { body, .. } => {
                Some(body)
            }
            Self::Request(_) | Self::Serialization(_) | Self::InvalidHeader { .. } => None,
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Serialization(err.to_string())
    }
}

/// Result type alias for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BackendError::Status {
            status: 502,
            body: "bad gateway".to_string(),
        };
        assert_eq!(err.to_string(), "Backend returned status 502: bad gateway");
    }

    #[test]
    fn test_body_is_attached() {
        let err = BackendError::Decode {
            message: "expected value".to_string(),
            body: "<html>".to_string(),
        };
        assert_eq!(err.body(), Some("<html>"));

        let err = BackendError::Serialization("oops".to_string());
        assert_eq!(err.body(), None);
    }
}
