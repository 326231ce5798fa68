//! Verdict types for feed integrity results.

use aegis_monitor::RepositionCheck;
use aegis_signals::{FrameSample, GlareReading, SignalVector};
use aegis_token::TokenMismatch;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The primary verdict for one frame.
///
/// Only one tag is surfaced per frame, chosen by severity:
/// `Tampered > Repositioned > Shaken > Blurred > Glare > Nominal`.
/// Every sub-flag stays visible in the accompanying [`SignalVector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Verdict {
    /// No anomaly.
    Nominal,

    /// Lens defocused, smeared or covered.
    Blurred,

    /// Camera vibrating or knocked.
    Shaken,

    /// Sensor blinded by a light source.
    Glare,

    /// Camera aim has moved; the scene baseline is invalid.
    Repositioned,

    /// The feed is not authentic.
    Tampered {
        /// Evidence.
        reason: TamperReason,
    },
}

impl Verdict {
    /// Create a Tampered verdict from a token mismatch.
    pub fn tampered(mismatch: TokenMismatch) -> Self {
        Self::Tampered {
            reason: TamperReason::TokenMismatch(mismatch),
        }
    }

    /// Returns true for Nominal.
    pub fn is_nominal(&self) -> bool {
        matches!(self, Self::Nominal)
    }

    /// Returns true for Tampered.
    pub fn is_tampered(&self) -> bool {
        matches!(self, Self::Tampered { .. })
    }

    /// Severity rank, 0 for Nominal up to 5 for Tampered.
    pub fn severity(&self) -> u8 {
        match self {
            Self::Nominal => 0,
            Self::Glare => 1,
            Self::Blurred => 2,
            Self::Shaken => 3,
            Self::Repositioned => 4,
            Self::Tampered { .. } => 5,
        }
    }

    /// Short lowercase label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Nominal => "nominal",
            Self::Blurred => "blurred",
            Self::Shaken => "shaken",
            Self::Glare => "glare",
            Self::Repositioned => "repositioned",
            Self::Tampered { .. } => "tampered",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tampered { reason } => write!(f, "tampered: {}", reason),
            other => f.write_str(other.label()),
        }
    }
}

/// Why a feed was judged not authentic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TamperReason {
    /// The watermark token did not match the expected one.
    TokenMismatch(TokenMismatch),
}

impl std::fmt::Display for TamperReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TokenMismatch(mismatch) => write!(f, "{}", mismatch),
        }
    }
}

/// Everything the coordinator reports for one frame.
#[derive(Debug, Clone)]
pub struct Assessment {
    /// Session that produced this assessment.
    pub session_id: Uuid,

    /// 1-based index of the frame within the session.
    pub frame_index: u64,

    /// Primary verdict, authenticity merged in.
    pub verdict: Verdict,

    /// Verdict from visual signals alone.
    pub visual_verdict: Verdict,

    /// Full per-frame measurements.
    pub signals: SignalVector,

    /// Reposition criteria detail.
    pub reposition: RepositionCheck,

    /// True when no previous frame was available, so motion was not
    /// measured.
    pub cold_start: bool,

    /// Glare reading with the coarse luminance histogram and, for the
    /// loss-of-detail strategy, the tone split.
    pub glare: GlareReading,

    /// Enhanced frame from the remediation collaborator, if one ran.
    pub remediated: Option<FrameSample>,
}
