//! Tamper decision rules.
//!
//! The engine turns one frame's [`SignalVector`] plus the stream's reposition
//! state into a single [`Verdict`]. It holds no per-frame state of its own;
//! all history lives in the [`TemporalTracker`] it is handed.
//!
//! ## Precedence
//!
//! | Rank | Verdict | Invalidates |
//! |------|---------|-------------|
//! | 1 | Repositioned | every other reading (the scene changed) |
//! | 2 | Shaken | sharpness and glare for this frame |
//! | 3 | Blurred | may mask genuine glare |
//! | 4 | Glare | - |
//! | 5 | Nominal | - |
//!
//! Authenticity is merged on top by [`merge_authenticity`]: a token mismatch
//! outranks every visual verdict.

use crate::verdict::Verdict;
use aegis_monitor::{RepositionCheck, TemporalTracker, TrackerConfig};
use aegis_signals::SignalVector;
use aegis_token::TokenMismatch;
use tracing::debug;

/// Result of one engine decision.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// Visual verdict.
    pub verdict: Verdict,
    /// Reposition criteria detail.
    pub reposition: RepositionCheck,
}

/// Combines per-frame signals and reposition state into a verdict.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TamperDecisionEngine {
    threshold_shift: f64,
}

impl TamperDecisionEngine {
    /// Creates an engine judging reposition against `threshold_shift`.
    #[must_use]
    pub const fn new(threshold_shift: f64) -> Self {
        Self { threshold_shift }
    }

    /// Creates an engine from tracker configuration.
    #[must_use]
    pub const fn from_config(config: &TrackerConfig) -> Self {
        Self::new(config.threshold_shift)
    }

    /// The reposition threshold in use.
    #[must_use]
    pub const fn threshold_shift(&self) -> f64 {
        self.threshold_shift
    }

    /// Decides the visual verdict for a frame whose shift has already been
    /// recorded in `tracker`.
    #[must_use]
    pub fn decide(&self, signals: &SignalVector, tracker: &TemporalTracker) -> Decision {
        let reposition = tracker.evaluate(self.threshold_shift);
        let verdict = Self::classify(signals, reposition.is_repositioned());
        debug!(verdict = verdict.label(), "visual decision");
        Decision {
            verdict,
            reposition,
        }
    }

    /// Applies the precedence rules.
    ///
    /// # Example
    ///
    /// ```rust
    /// use aegis_core::{SignalVector, TamperDecisionEngine, Verdict};
    ///
    /// let signals = SignalVector { is_blurred: true, is_glare: true, ..Default::default() };
    /// assert_eq!(TamperDecisionEngine::classify(&signals, false), Verdict::Blurred);
    /// assert_eq!(TamperDecisionEngine::classify(&signals, true), Verdict::Repositioned);
    /// ```
    #[must_use]
    pub fn classify(signals: &SignalVector, repositioned: bool) -> Verdict {
        if repositioned {
            Verdict::Repositioned
        } else if signals.is_shaken {
            Verdict::Shaken
        } else if signals.is_blurred {
            Verdict::Blurred
        } else if signals.is_glare {
            Verdict::Glare
        } else {
            Verdict::Nominal
        }
    }
}

impl Default for TamperDecisionEngine {
    fn default() -> Self {
        Self::from_config(&TrackerConfig::default())
    }
}

/// Merges the stream's authenticity state into a visual verdict.
#[must_use]
pub fn merge_authenticity(visual: Verdict, mismatch: Option<&TokenMismatch>) -> Verdict {
    match mismatch {
        Some(mismatch) => Verdict::tampered(*mismatch),
        None => visual,
    }
}
