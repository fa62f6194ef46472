//! Error types for the cloud session

use thiserror::Error;
use tokio_tungstenite::tungstenite;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Invalid server URL: {url}")]
    InvalidUrl { url: String },

    #[error("Invalid cloud configuration: {0}")]
    InvalidConfig(String),

    #[error("No auth token configured")]
    MissingToken,

    #[error("Cloud session not connected")]
    NotConnected,

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed message: {0}")]
    MalformedMessage(String),
}

/// Result type for cloud operations
pub type CloudResult<T> = Result<T, CloudError>;
