//! Engine error types

use std::time::Duration;
use thiserror::Error;

/// Reconciliation engine errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error(transparent)]
    Api(#[from] docean_api::Error),

    /// A wait gave up with a caller supplied message
    #[error("{0}")]
    Timeout(String),

    #[error(
        "timeout while waiting for state to become '{}' (last state: '{last_state}', timeout: {timeout:?})",
        expected.join(", ")
    )]
    WaitTimeout {
        expected: Vec<String>,
        last_state: String,
        timeout: Duration,
    },

    #[error("unexpected state '{state}', wanted target '{}'", expected.join(", "))]
    UnexpectedState { state: String, expected: Vec<String> },

    #[error("couldn't find resource ({checks} retries)")]
    NotFound { checks: u32 },

    #[error("action {id} ({action_type}) errored")]
    ActionFailed { id: i64, action_type: String },

    #[error("context cancelled")]
    Cancelled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,

    #[error("attribute '{path}': {reason}")]
    Attribute { path: String, reason: String },

    #[error("sets are incomparable: hasher '{left}' differs from '{right}'")]
    IncomparableSets { left: String, right: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("state upgrade failed: {0}")]
    StateUpgrade(String),

    #[error("state file error: {0}")]
    StateError(String),

    #[error("data source: {0}")]
    DataList(String),

    #[error("sweeper: {0}")]
    Sweep(String),

    #[error("{0}")]
    Message(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    pub fn msg(message: impl Into<String>) -> Self {
        CloudError::Message(message.into())
    }

    pub fn attribute(path: impl Into<String>, reason: impl Into<String>) -> Self {
        CloudError::Attribute {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// The underlying SDK error, if any
    pub fn api(&self) -> Option<&docean_api::Error> {
        match self {
            CloudError::Api(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.api().is_some_and(|e| e.is_not_found())
    }

    pub fn is_precondition_failed(&self) -> bool {
        self.api().is_some_and(|e| e.is_precondition_failed())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            CloudError::Timeout(_) | CloudError::WaitTimeout { .. } | CloudError::DeadlineExceeded
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, CloudError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
