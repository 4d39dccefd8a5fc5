//! Error types for vision operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for vision operations.
pub type VisionResult<T> = Result<T, VisionError>;

/// Errors that can occur while acquiring or processing frames.
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("No frame available")]
    NoFrame,

    #[error("Frame acquisition failed: {0}")]
    Acquisition(String),

    #[error("Frame source not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("Image operation failed: {0}")]
    ImageOp(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image decode error: {0}")]
    Image(#[from] image::ImageError),
}

impl VisionError {
    /// Create an acquisition failure error.
    pub fn acquisition(message: impl Into<String>) -> Self {
        Self::Acquisition(message.into())
    }

    /// Create an image operation failure error.
    pub fn image_op(message: impl Into<String>) -> Self {
        Self::ImageOp(message.into())
    }

    /// Create an invalid frame error.
    pub fn invalid_frame(message: impl Into<String>) -> Self {
        Self::InvalidFrame(message.into())
    }

    /// Returns true if the error means the frame source can no longer deliver.
    pub fn is_acquisition(&self) -> bool {
        matches!(
            self,
            Self::NoFrame | Self::Acquisition(_) | Self::SourceNotFound(_) | Self::Io(_) | Self::Image(_)
        )
    }
}
