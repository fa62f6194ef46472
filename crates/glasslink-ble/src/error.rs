//! Error types for the glasses link

use glasslink_core::{GlasslinkError, Side};
use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors specific to the BLE link
#[derive(Error, Debug)]
pub enum BleError {
    #[error("Invalid BLE configuration: {0}")]
    InvalidConfig(String),

    #[error("BLE adapter not available")]
    AdapterNotAvailable,

    #[error("BLE error: {0}")]
    Btle(#[from] btleplug::Error),

    #[error("Connection to {side} arm timed out")]
    ConnectionTimeout { side: Side },

    #[error("Characteristic not found on {side} arm: {characteristic}")]
    CharacteristicNotFound { side: Side, characteristic: String },

    #[error("{0} arm is not connected")]
    LinkNotConnected(Side),

    #[error("Command queue closed")]
    QueueClosed,

    #[error("Controller stopped")]
    ControllerStopped,

    #[error("Glasses not ready within {0:?}")]
    NotReady(std::time::Duration),

    #[error("Protocol error: {0}")]
    Protocol(#[from] GlasslinkError),

    #[error("Pairing persistence error: {0}")]
    Persistence(String),
}

/// Result type for BLE operations
pub type BleResult<T> = Result<T, BleError>;
