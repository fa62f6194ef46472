//! Error handling for the glasslink CLI

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Glasses error: {0}")]
    Ble(#[from] glasslink_ble::BleError),

    #[error("Cloud error: {0}")]
    Cloud(#[from] glasslink_cloud::CloudError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] glasslink_core::GlasslinkError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("TOML encoding error: {0}")]
    TomlEncoding(#[from] toml::ser::Error),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
