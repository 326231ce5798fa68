//! Error types for the token protocol.
//!
//! A token mismatch is not an error: it is the protocol's detection result
//! and is reported through [`crate::TokenCheck`]. Errors here cover bad keys,
//! bad input text and bad configuration.

use thiserror::Error;

/// Result type alias for token operations.
pub type Result<T> = std::result::Result<T, TokenError>;

/// Errors raised by the token protocol.
///
/// # Security Notes
///
/// No variant ever carries secret key material.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// No shared secret was supplied.
    #[error("shared secret is empty")]
    EmptySecret,

    /// The shared secret could not be decoded.
    #[error("shared secret is not valid {encoding}: {reason}")]
    InvalidSecretEncoding {
        /// Expected encoding.
        encoding: &'static str,
        /// Decoder message.
        reason: String,
    },

    /// A token is not exactly four decimal digits.
    #[error("invalid token {0:?}: expected four decimal digits")]
    InvalidToken(String),

    /// Watermark text does not carry a token and timestamp.
    #[error("invalid watermark text {text:?}: {reason}")]
    InvalidWatermarkText {
        /// The rejected text.
        text: String,
        /// What was missing or malformed.
        reason: String,
    },

    /// A protocol parameter is out of range.
    #[error("invalid token config: {0}")]
    InvalidConfig(String),
}
