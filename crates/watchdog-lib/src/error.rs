// crates/watchdog-lib/src/error.rs

//! Central error type for the session watchdog.
use reqwest::StatusCode;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unexpected status {status} from {url}")]
    Status { status: StatusCode, url: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the failure is worth logging and moving on from.
    ///
    /// Transport problems and server hiccups are transient; a bad
    /// configuration or a client-side bug is not.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::Http(_) => true,
            AppError::Status { status, .. } => status.is_server_error(),
            _ => false,
        }
    }
}
