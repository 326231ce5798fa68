//! Error types for AEGIS Core.

use thiserror::Error;

/// Core error type for feed integrity operations.
///
/// Per-frame errors (a bad frame, a failed remediation) never end a
/// session; the coordinator reports them and carries on with the next
/// frame.
#[derive(Debug, Error)]
pub enum AegisError {
    /// Frame measurement failed (malformed frame, size mismatch).
    #[error("Signal error: {0}")]
    Signal(#[from] aegis_signals::SignalError),

    /// Tracker configuration rejected.
    #[error("Monitor error: {0}")]
    Monitor(#[from] aegis_monitor::MonitorError),

    /// Token protocol error (missing secret, bad token text).
    #[error("Token error: {0}")]
    Token(#[from] aegis_token::TokenError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A remediation collaborator failed.
    #[error("Remediation failed: {0}")]
    Remediation(String),
}
