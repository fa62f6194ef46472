//! Error types for the glasslink core crate

use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors raised while building or decoding device frames
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GlasslinkError {
    #[error("Payload needs {frames} frames, the multi-frame header allows at most {max}")]
    PayloadTooLarge { frames: usize, max: usize },

    #[error("Frame size {frame_size} leaves no room for a {header_len}-byte header")]
    FrameTooSmall { frame_size: usize, header_len: usize },

    #[error("Invalid argument {name}: {reason}")]
    InvalidArgument { name: &'static str, reason: String },
}

impl GlasslinkError {
    /// Shorthand for an argument that is outside its accepted range
    pub fn invalid_argument(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }
}

/// Result type for core operations
pub type Result<T> = core::result::Result<T, GlasslinkError>;
