//! Error types for the Permit client

use thiserror::Error;

/// Errors that can occur when talking to the PDP or the approvals API
#[derive(Debug, Error)]
pub enum PermitError {
    /// The service answered with a non-2xx status
    #[error("Request failed with status code {status}: {body}")]
    PolicyRequestFailed {
        /// Which client operation was running (e.g. "create_access_request")
        operation: &'static str,
        status: u16,
        body: String,
    },

    /// Invalid request rejected locally, before anything was sent
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// Invalid response (failed to parse API response)
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Configuration error (missing API key, bad URL, etc.)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PermitError {
    /// HTTP status of a failed request, if the service answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            PermitError::PolicyRequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true for errors that may go away on their own
    ///
    /// The client itself never retries; this is a hint for callers.
    pub fn is_transient(&self) -> bool {
        match self {
            PermitError::Network(_) => true,
            PermitError::PolicyRequestFailed { status, .. } => {
                matches!(status, 408 | 429 | 500..=599)
            }
            _ => false,
        }
    }

    /// Classify an HTTP error into an appropriate error variant
    pub fn from_reqwest_error(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PermitError::Network(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            PermitError::Network(format!("Connection failed: {}", err))
        } else if err.is_request() {
            PermitError::Network(format!("Request failed: {}", err))
        } else if err.is_decode() {
            PermitError::InvalidResponse(err.to_string())
        } else {
            PermitError::Network(err.to_string())
        }
    }
}
