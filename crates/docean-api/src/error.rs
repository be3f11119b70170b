//! API error types

use serde::Deserialize;
use thiserror::Error;

/// An error response returned by the DigitalOcean API
///
/// The HTTP status is always present; `id` and `message` come from the
/// JSON error body when the API sent one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{method} {url}: {status} {message}")]
pub struct ApiError {
    pub method: String,
    pub url: String,
    pub status: u16,
    /// Machine readable error id, e.g. `not_found` or `unprocessable_entity`
    pub id: String,
    pub message: String,
    pub request_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub request_id: Option<String>,
}

impl ApiError {
    pub(crate) fn from_body(method: &str, url: &str, status: u16, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        let message = if parsed.message.is_empty() {
            body.trim().to_string()
        } else {
            parsed.message
        };
        Self {
            method: method.to_string(),
            url: url.to_string(),
            status,
            id: parsed.id,
            message,
            request_id: parsed.request_id,
        }
    }

    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            method: String::new(),
            url: String::new(),
            status,
            id: String::new(),
            message: message.into(),
            request_id: None,
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(#[from] docean_config::ConfigError),

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl Error {
    /// HTTP status of an API error response
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api(e) => Some(e.status),
            Error::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_precondition_failed(&self) -> bool {
        self.status() == Some(412)
    }

    pub fn is_unprocessable(&self) -> bool {
        self.status() == Some(422)
    }

    /// Whether a transport layer retry can help: rate limiting or a
    /// server-side failure
    pub fn is_retryable_transport(&self) -> bool {
        match self {
            Error::Api(e) => is_retryable_status(e.status),
            Error::Transport(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// The API message, or the rendered error for non-API failures
    pub fn message(&self) -> String {
        match self {
            Error::Api(e) => e.message.clone(),
            other => other.to_string(),
        }
    }
}

pub(crate) fn is_retryable_status(status: u16) -> bool {
    status == 429 || ((500..600).contains(&status) && status != 501)
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_parsing() {
        let err = ApiError::from_body(
            "DELETE",
            "https://api.digitalocean.com/v2/projects/p1",
            412,
            r#"{"id":"precondition_failed","message":"cannot delete a project with resources","request_id":"r-1"}"#,
        );
        assert_eq!(err.status, 412);
        assert_eq!(err.id, "precondition_failed");
        assert_eq!(err.message, "cannot delete a project with resources");
        assert_eq!(err.request_id.as_deref(), Some("r-1"));
    }

    #[test]
    fn test_non_json_body_is_kept_as_message() {
        let err = ApiError::from_body("GET", "/v2/x", 502, "Bad Gateway\n");
        assert_eq!(err.id, "");
        assert_eq!(err.message, "Bad Gateway");
    }

    #[test]
    fn test_status_classification() {
        let not_found: Error = ApiError::new(404, "not found").into();
        assert!(not_found.is_not_found());
        assert!(!not_found.is_retryable_transport());

        let limited: Error = ApiError::new(429, "slow down").into();
        assert!(limited.is_retryable_transport());

        let unavailable: Error = ApiError::new(503, "unavailable").into();
        assert!(unavailable.is_retryable_transport());

        let not_implemented: Error = ApiError::new(501, "nope").into();
        assert!(!not_implemented.is_retryable_transport());

        let invalid: Error = ApiError::new(422, "bad size").into();
        assert!(invalid.is_unprocessable());
        assert!(!invalid.is_retryable_transport());
    }
}
