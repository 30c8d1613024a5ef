//! Extraction error types.

use thiserror::Error;

/// Errors from a page-level call to the vision service.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Vision API key not set (expected in ${var})")]
    MissingApiKey { var: String },

    #[error("Request to the vision service timed out")]
    Timeout,

    #[error("Rate limited by the vision service")]
    RateLimited,

    #[error("Vision service unavailable")]
    ServiceUnavailable,

    #[error("Vision service returned HTTP {status}: {detail}")]
    Api { status: u16, detail: String },

    #[error("Vision service returned an empty response")]
    EmptyResponse,

    #[error("Could not parse vision response: {0}")]
    Malformed(String),

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ExtractError {
    /// Transient failures are retried with backoff; everything else
    /// surfaces immediately. Parse failures have their own single-retry
    /// rule in the client.
    pub fn is_transient(&self) -> bool {
        match self {
            ExtractError::Timeout
            | ExtractError::RateLimited
            | ExtractError::ServiceUnavailable
            | ExtractError::EmptyResponse => true,
            ExtractError::Api { status, .. } => *status >= 500,
            ExtractError::Transport(_) => true,
            ExtractError::MissingApiKey { .. } | ExtractError::Malformed(_) => false,
        }
    }
}
