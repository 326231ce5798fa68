//! Error types for the temporal tracker.

use thiserror::Error;

/// Result type alias for monitor operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Errors raised by tracker configuration.
///
/// Tracker updates themselves cannot fail; only a configuration that would
/// make the reposition criteria meaningless is rejected.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MonitorError {
    /// A tracker parameter is out of range.
    #[error("invalid tracker config: {field} {reason}")]
    InvalidConfig {
        /// Name of the offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

impl MonitorError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}
