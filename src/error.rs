//! Error types for the teams_export crate.

use thiserror::Error;

/// Errors that can occur while exporting artifact metadata.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Listing {url} failed ({status}): {message}")]
    ListingError {
        url: String,
        status: u16,
        message: String,
    },

    #[error("Malformed response from {url}: {source}")]
    MalformedResponse {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Failed to write output: {0}")]
    OutputError(#[from] std::io::Error),

    #[error("Export cancelled")]
    Cancelled,

    #[error("Artifact output closed before the walk finished")]
    SinkClosed,
}

impl ExportError {
    /// HTTP status carried by a listing failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ExportError::ListingError { status, .. } => Some(*status),
            ExportError::HttpError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result type alias for ExportError.
pub type Result<T> = std::result::Result<T, ExportError>;
