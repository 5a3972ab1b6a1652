//! Error type shared by the request executor and the endpoint façades.

use std::path::PathBuf;

use thiserror::Error;

use super::storage::StorageError;

/// Message used when a non-2xx response carries no body.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong";

#[derive(Debug, Error)]
pub enum ApiError {
    /// The backend answered with a non-2xx status.
    ///
    /// `message` is the raw response body, or a generic text when the body was empty.
    #[error("API request failed ({status}): {message}")]
    Status { status: u16, message: String },

    /// Transport-level failure (DNS, refused connection, timeout, broken body).
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// A non-empty 2xx body was not valid JSON, or did not match the expected shape.
    #[error("Failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Token storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to read upload {}: {source}", path.display())]
    Upload {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// The terminal error of a request whose refresh attempt failed.
    pub fn unauthorized() -> Self {
        ApiError::Status {
            status: 401,
            message: "Unauthorized".to_string(),
        }
    }

    /// HTTP status carried by the error, if the backend produced one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status_code() == Some(401)
    }
}
