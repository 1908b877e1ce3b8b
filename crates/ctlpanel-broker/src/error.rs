//! Error types for ctlpanel-broker

use thiserror::Error;

/// Errors produced by a call against the REST proxy
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request could not be sent or the connection failed mid-flight
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    /// The proxy answered with a non-success status
    #[error("{url} returned HTTP {status}: {body}")]
    Status { url: String, status: u16, body: String },

    /// The response body was not the JSON shape the proxy documents
    #[error("unexpected response from {url}: {message}")]
    InvalidResponse { url: String, message: String },

    /// The request body could not be serialized
    #[error("could not encode request body: {0}")]
    Encode(String),
}

impl TransportError {
    pub(crate) fn request(url: &str, err: reqwest::Error) -> Self {
        TransportError::Request {
            url: url.to_string(),
            message: err.to_string(),
        }
    }

    /// HTTP status code, when the proxy answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Response body of a rejected request, if any.
    pub fn body(&self) -> Option<&str> {
        match self {
            TransportError::Status { body, .. } => Some(body),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Encode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_display_includes_body() {
        let err = TransportError::Status {
            url: "http://proxy/topics/cmd".to_string(),
            status: 422,
            body: "schema mismatch".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("422"));
        assert!(msg.contains("schema mismatch"));
        assert_eq!(err.status(), Some(422));
        assert_eq!(err.body(), Some("schema mismatch"));
    }

    #[test]
    fn request_error_has_no_status() {
        let err = TransportError::Request {
            url: "http://proxy".to_string(),
            message: "connection refused".to_string(),
        };
        assert_eq!(err.status(), None);
        assert_eq!(err.body(), None);
    }
}
