//! Token protocol configuration.

use crate::error::{Result, TokenError};
use crate::token::SecretKey;
use serde::{Deserialize, Serialize};

/// Default seconds between watermark visibility flips.
pub const VISIBILITY_FLIP_INTERVAL: u64 = 10;

/// How the configured secret string is turned into key bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretEncoding {
    /// The UTF-8 bytes of the string.
    #[default]
    Utf8,
    /// Hex-encoded bytes.
    Hex,
}

/// Issuer and validator parameters.
///
/// The secret has no default: an unconfigured secret fails with
/// [`TokenError::EmptySecret`] when a key is requested.
///
/// # Example
///
/// ```rust
/// use aegis_token::TokenConfig;
///
/// let config = TokenConfig::new()
///     .with_secret("shared-secret")
///     .with_skew_tolerance(0);
/// assert!(config.validate().is_ok());
/// assert!(config.secret_key().is_ok());
/// ```
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Shared secret. Never serialized back out.
    #[serde(skip_serializing)]
    pub secret: String,
    /// Encoding of `secret`.
    pub secret_encoding: SecretEncoding,
    /// Seconds per visibility state (high, then low).
    pub flip_interval_secs: u64,
    /// Opacity during the high state.
    pub high_opacity: f64,
    /// Opacity during the low state.
    pub low_opacity: f64,
    /// Symmetric clock-skew tolerance, seconds. Zero for exact matching.
    pub skew_tolerance_secs: u64,
    /// Seconds of expected tokens the validator keeps.
    pub window_horizon_secs: u64,
    /// Stop sequence validation at the first mismatch.
    pub short_circuit: bool,
}

impl TokenConfig {
    /// Creates a config with default values and no secret.
    ///
    /// Defaults:
    /// - Flip interval: 10 s (opacity 1.0, then 0.2)
    /// - Skew tolerance: ±2 s
    /// - Window horizon: 30 s
    /// - Short-circuit: on
    #[must_use]
    pub const fn new() -> Self {
        Self {
            secret: String::new(),
            secret_encoding: SecretEncoding::Utf8,
            flip_interval_secs: VISIBILITY_FLIP_INTERVAL,
            high_opacity: 1.0,
            low_opacity: 0.2,
            skew_tolerance_secs: 2,
            window_horizon_secs: 30,
            short_circuit: true,
        }
    }

    /// Sets the shared secret.
    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = secret.into();
        self
    }

    /// Sets the secret encoding.
    #[must_use]
    pub const fn with_secret_encoding(mut self, encoding: SecretEncoding) -> Self {
        self.secret_encoding = encoding;
        self
    }

    /// Sets the visibility flip interval.
    #[must_use]
    pub const fn with_flip_interval(mut self, secs: u64) -> Self {
        self.flip_interval_secs = secs;
        self
    }

    /// Sets the clock-skew tolerance.
    #[must_use]
    pub const fn with_skew_tolerance(mut self, secs: u64) -> Self {
        self.skew_tolerance_secs = secs;
        self
    }

    /// Sets the validator window horizon.
    #[must_use]
    pub const fn with_window_horizon(mut self, secs: u64) -> Self {
        self.window_horizon_secs = secs;
        self
    }

    /// Enables or disables short-circuit sequence validation.
    #[must_use]
    pub const fn with_short_circuit(mut self, enabled: bool) -> Self {
        self.short_circuit = enabled;
        self
    }

    /// Decodes the configured secret.
    ///
    /// # Errors
    ///
    /// [`TokenError::EmptySecret`] if no secret is set, or
    /// [`TokenError::InvalidSecretEncoding`] if it does not decode.
    pub fn secret_key(&self) -> Result<SecretKey> {
        match self.secret_encoding {
            SecretEncoding::Utf8 => SecretKey::new(self.secret.as_bytes()),
            SecretEncoding::Hex => SecretKey::from_hex(&self.secret),
        }
    }

    /// Checks the protocol parameters (not the secret).
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InvalidConfig`] for a zero flip interval, an
    /// opacity outside `[0, 1]`, or a skew tolerance wider than the window.
    pub fn validate(&self) -> Result<()> {
        if self.flip_interval_secs == 0 {
            return Err(TokenError::InvalidConfig(
                "flip_interval_secs must be at least 1".into(),
            ));
        }
        for (name, value) in [("high_opacity", self.high_opacity), ("low_opacity", self.low_opacity)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(TokenError::InvalidConfig(format!("{name} {value} not in [0, 1]")));
            }
        }
        if self.skew_tolerance_secs > self.window_horizon_secs {
            return Err(TokenError::InvalidConfig(format!(
                "skew tolerance {}s exceeds window horizon {}s",
                self.skew_tolerance_secs, self.window_horizon_secs
            )));
        }
        Ok(())
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &if self.secret.is_empty() { "<unset>" } else { "<redacted>" })
            .field("secret_encoding", &self.secret_encoding)
            .field("flip_interval_secs", &self.flip_interval_secs)
            .field("high_opacity", &self.high_opacity)
            .field("low_opacity", &self.low_opacity)
            .field("skew_tolerance_secs", &self.skew_tolerance_secs)
            .field("window_horizon_secs", &self.window_horizon_secs)
            .field("short_circuit", &self.short_circuit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TokenConfig::default();
        assert_eq!(config.flip_interval_secs, 10);
        assert_eq!(config.skew_tolerance_secs, 2);
        assert_eq!(config.window_horizon_secs, 30);
        assert!(config.short_circuit);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_secret_never_defaulted() {
        assert_eq!(TokenConfig::default().secret_key().unwrap_err(), TokenError::EmptySecret);
    }

    #[test]
    fn test_hex_secret() {
        let config = TokenConfig::new()
            .with_secret("61656769732d746573742d736563726574")
            .with_secret_encoding(SecretEncoding::Hex);
        let key = config.secret_key().unwrap();
        assert_eq!(key.token_at(100).to_string(), "4556");
    }

    #[test]
    fn test_validation() {
        assert!(TokenConfig::new().with_flip_interval(0).validate().is_err());
        assert!(TokenConfig::new().with_skew_tolerance(31).validate().is_err());
        assert!(TokenConfig::new().with_skew_tolerance(0).validate().is_ok());
    }

    #[test]
    fn test_secret_not_serialized_or_printed() {
        let config = TokenConfig::new().with_secret("hunter2");
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(!format!("{config:?}").contains("hunter2"));
    }

    #[test]
    fn test_partial_json() {
        let config: TokenConfig =
            serde_json::from_str(r#"{"secret": "abc", "skew_tolerance_secs": 0}"#).unwrap();
        assert_eq!(config.secret, "abc");
        assert_eq!(config.skew_tolerance_secs, 0);
        assert_eq!(config.window_horizon_secs, 30);
    }
}
