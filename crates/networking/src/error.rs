//! Networking errors

use thiserror::Error;

/// Networking errors
#[derive(Debug, Error)]
pub enum Error {
    /// Transport failure: connection, timeout, body read
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body was not the expected JSON
    #[error("Invalid JSON response: {0}")]
    Json(#[from] serde_json::Error),

    /// The server answered with a non-success status
    #[error("API error {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body, or the status reason when the body is empty
        message: String,
    },

    /// Client configuration could not be applied
    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// HTTP status of an API error
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Network(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }
}

/// Result type for networking operations
pub type Result<T> = std::result::Result<T, Error>;
