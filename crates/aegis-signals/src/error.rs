//! Error types for signal extraction.

use thiserror::Error;

/// Result type alias for signal operations.
pub type Result<T> = std::result::Result<T, SignalError>;

/// Errors raised while measuring a frame.
///
/// Every variant is local to the frame that produced it. A monitoring
/// session skips the frame and continues with the next one.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignalError {
    /// The frame buffer is empty or does not match its declared shape.
    #[error("invalid frame: {reason}")]
    InvalidFrame {
        /// What was wrong with the buffer.
        reason: String,
    },

    /// A frame pair used for optical flow has different dimensions.
    #[error(
        "frame is {current_width}x{current_height} but previous frame is \
         {previous_width}x{previous_height}"
    )]
    DimensionMismatch {
        /// Width of the current frame.
        current_width: u32,
        /// Height of the current frame.
        current_height: u32,
        /// Width of the previous frame.
        previous_width: u32,
        /// Height of the previous frame.
        previous_height: u32,
    },
}

impl SignalError {
    /// Shorthand for [`SignalError::InvalidFrame`].
    pub fn invalid_frame(reason: impl Into<String>) -> Self {
        Self::InvalidFrame {
            reason: reason.into(),
        }
    }
}
