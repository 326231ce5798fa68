//! Configuration types for AEGIS.
//!
//! Every threshold is deployment- and resolution-specific, so the whole
//! surface is loadable from JSON. Missing sections and fields take the
//! documented defaults; the shared secret is the one value with no default.
//!
//! ```json
//! {
//!   "signals": { "blur_threshold": 80.0, "glare": { "strategy": "loss_of_detail" } },
//!   "tracker": { "threshold_shift": 6.0 },
//!   "token":   { "secret": "…", "skew_tolerance_secs": 0 },
//!   "global":  { "remediation": false }
//! }
//! ```

use crate::error::AegisError;
use crate::Result;
use aegis_monitor::TrackerConfig;
use aegis_signals::{GlareConfig, SignalConfig};
use aegis_token::TokenConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for one integrity coordinator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AegisConfig {
    /// Per-frame metric thresholds.
    pub signals: SignalConfig,

    /// Reposition tracker parameters.
    pub tracker: TrackerConfig,

    /// Token protocol parameters and shared secret.
    pub token: TokenConfig,

    /// Global settings.
    pub global: GlobalConfig,
}

impl AegisConfig {
    /// Parses a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`AegisError::Config`] for malformed JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| AegisError::Config(format!("invalid JSON: {e}")))
    }

    /// Loads a JSON file. Does not validate; call [`AegisConfig::validate`].
    ///
    /// # Errors
    ///
    /// Returns [`AegisError::Config`] if the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| AegisError::Config(format!("cannot read {}: {e}", path.display())))?;
        serde_json::from_str(&text)
            .map_err(|e| AegisError::Config(format!("invalid JSON in {}: {e}", path.display())))
    }

    /// Sets the shared secret.
    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.token.secret = secret.into();
        self
    }

    /// Checks every section.
    ///
    /// # Errors
    ///
    /// Returns the first problem found: [`AegisError::Config`] for signal
    /// thresholds, [`AegisError::Monitor`] for tracker parameters and
    /// [`AegisError::Token`] for protocol parameters.
    pub fn validate(&self) -> Result<()> {
        let signals = &self.signals;
        for (name, value) in [
            ("blur_threshold", signals.blur_threshold),
            ("shake_threshold", signals.shake_threshold),
            ("low_light_threshold", signals.low_light_threshold),
        ] {
            if !(value > 0.0) {
                return Err(AegisError::Config(format!("signals.{name} must be positive, got {value}")));
            }
        }
        if signals.flow.levels == 0 || signals.flow.window == 0 || signals.flow.iterations == 0 {
            return Err(AegisError::Config(
                "signals.flow levels, window and iterations must be at least 1".into(),
            ));
        }
        let glare_pct = match signals.glare {
            GlareConfig::WhitePercentage(s) => s.threshold_pct,
            GlareConfig::LossOfDetail(s) => s.mid_pct_max,
        };
        if !(0.0..=100.0).contains(&glare_pct) {
            return Err(AegisError::Config(format!(
                "signals.glare percentage {glare_pct} not in [0, 100]"
            )));
        }

        self.tracker.validate()?;
        self.token.validate()?;
        Ok(())
    }
}

/// Global AEGIS settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Hand glare and low-light frames to the remediation collaborator.
    pub remediation: bool,

    /// Treat a change of frame size as a new baseline instead of an error.
    pub rebaseline_on_resize: bool,

    /// Log every assessment through the tracing sink.
    pub audit_logging: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            remediation: true,
            rebaseline_on_resize: true,
            audit_logging: true,
        }
    }
}
