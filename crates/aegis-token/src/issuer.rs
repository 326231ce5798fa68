//! # Watermark Issuer
//!
//! Stamps outgoing frames with the token for the current second.
//!
//! ## Per-second Stability
//!
//! Every frame rendered within one wall-clock second must carry the same
//! watermark, even when several render threads race across a second
//! boundary. The issuer keeps the last issued second behind a mutex and
//! follows a read-cached-or-compute-and-cache contract:
//!
//! ```text
//! lock ─▶ cached.second == now ? ─ yes ─▶ return cached
//!                   │ no
//!                   └─▶ derive token, render text, replace cache ─▶ return
//! ```
//!
//! ## Visibility Schedule
//!
//! Opacity alternates every `flip_interval` seconds, independent of the
//! token: high for `t mod 2i < i`, low otherwise. A watermark that is
//! sometimes faint is harder to key out, yet stays readable often enough
//! for validation.

use crate::clock::{Clock, SystemClock};
use crate::config::TokenConfig;
use crate::error::Result;
use crate::token::{SecretKey, WatermarkToken};
use crate::watermark::format_watermark;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

/// Everything needed to draw one frame's watermark.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedWatermark {
    /// Second the token belongs to.
    pub unix_second: i64,
    /// The token.
    pub token: WatermarkToken,
    /// Signature text to burn in.
    pub text: String,
    /// Rendering opacity.
    pub opacity: f64,
}

/// Opacity schedule shared by issuers and tooling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilitySchedule {
    flip_interval: i64,
    high: f64,
    low: f64,
}

impl VisibilitySchedule {
    /// Builds the schedule from config. A zero interval is treated as one.
    #[must_use]
    pub fn from_config(config: &TokenConfig) -> Self {
        Self {
            flip_interval: i64::try_from(config.flip_interval_secs.max(1)).unwrap_or(i64::MAX / 2),
            high: config.high_opacity,
            low: config.low_opacity,
        }
    }

    /// Opacity at `unix_second`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use aegis_token::{TokenConfig, VisibilitySchedule};
    ///
    /// let schedule = VisibilitySchedule::from_config(&TokenConfig::default());
    /// assert_eq!(schedule.opacity_at(9), 1.0);
    /// assert_eq!(schedule.opacity_at(10), 0.2);
    /// assert_eq!(schedule.opacity_at(20), 1.0);
    /// ```
    #[must_use]
    pub fn opacity_at(&self, unix_second: i64) -> f64 {
        if unix_second.rem_euclid(2 * self.flip_interval) < self.flip_interval {
            self.high
        } else {
            self.low
        }
    }
}

impl Default for VisibilitySchedule {
    fn default() -> Self {
        Self::from_config(&TokenConfig::default())
    }
}

/// Issues the current watermark for one outgoing stream.
///
/// Safe to share across render threads (`&self` methods only).
///
/// # Example
///
/// ```rust
/// use aegis_token::{ManualClock, TokenConfig, WatermarkIssuer};
///
/// let config = TokenConfig::new().with_secret("aegis-test-secret");
/// let issuer = WatermarkIssuer::with_clock(&config, ManualClock::new(100))?;
///
/// let mark = issuer.issue();
/// assert_eq!(mark.token.to_string(), "4556");
/// assert_eq!(mark.text, "TST-H:4556 | T:19700101-000140");
/// assert_eq!(mark.opacity, 1.0);
/// # Ok::<(), aegis_token::TokenError>(())
/// ```
#[derive(Debug)]
pub struct WatermarkIssuer<C: Clock = SystemClock> {
    key: SecretKey,
    schedule: VisibilitySchedule,
    clock: C,
    cache: Mutex<Option<IssuedWatermark>>,
}

impl WatermarkIssuer<SystemClock> {
    /// Creates an issuer on the system clock.
    ///
    /// # Errors
    ///
    /// Fails if the secret is missing or undecodable, or the config is
    /// invalid.
    pub fn new(config: &TokenConfig) -> Result<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> WatermarkIssuer<C> {
    /// Creates an issuer on a custom clock.
    ///
    /// # Errors
    ///
    /// Same as [`WatermarkIssuer::new`].
    pub fn with_clock(config: &TokenConfig, clock: C) -> Result<Self> {
        config.validate()?;
        let key = config.secret_key()?;
        info!(key = key.fingerprint(), "watermark issuer ready");
        Ok(Self {
            key,
            schedule: VisibilitySchedule::from_config(config),
            clock,
            cache: Mutex::new(None),
        })
    }

    /// The issuer's clock.
    #[must_use]
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// The opacity schedule.
    #[must_use]
    pub const fn schedule(&self) -> &VisibilitySchedule {
        &self.schedule
    }

    /// Key fingerprint, for logs.
    #[must_use]
    pub fn key_fingerprint(&self) -> &str {
        self.key.fingerprint()
    }

    /// Watermark for the current second, cached for the rest of it.
    pub fn issue(&self) -> IssuedWatermark {
        let now = self.clock.now_unix();
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = cache.as_ref().filter(|c| c.unix_second == now) {
            return cached.clone();
        }
        let issued = self.watermark_at(now);
        debug!(second = now, token = %issued.token, "watermark rotated");
        *cache = Some(issued.clone());
        issued
    }

    /// Token for the current second.
    pub fn current_token(&self) -> WatermarkToken {
        self.issue().token
    }

    /// Watermark for an arbitrary second, bypassing the cache.
    #[must_use]
    pub fn watermark_at(&self, unix_second: i64) -> IssuedWatermark {
        let token = self.key.token_at(unix_second);
        IssuedWatermark {
            unix_second,
            token,
            text: format_watermark(token, unix_second),
            opacity: self.schedule.opacity_at(unix_second),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::TokenError;
    use std::sync::Arc;
    use std::thread;

    fn config() -> TokenConfig {
        TokenConfig::new().with_secret("aegis-test-secret")
    }

    #[test]
    fn test_requires_secret() {
        let err = WatermarkIssuer::with_clock(&TokenConfig::new(), ManualClock::new(0)).unwrap_err();
        assert_eq!(err, TokenError::EmptySecret);
    }

    #[test]
    fn test_token_stable_within_second() {
        let issuer = WatermarkIssuer::with_clock(&config(), ManualClock::new(105)).unwrap();
        let a = issuer.issue();
        let b = issuer.issue();
        assert_eq!(a, b);
        assert_eq!(a.token.to_string(), "3581");
    }

    #[test]
    fn test_token_rotates_with_second() {
        let issuer = WatermarkIssuer::with_clock(&config(), ManualClock::new(100)).unwrap();
        assert_eq!(issuer.current_token().to_string(), "4556");
        issuer.clock().advance(1);
        assert_eq!(issuer.current_token().to_string(), "6512");
    }

    #[test]
    fn test_opacity_schedule() {
        let schedule = VisibilitySchedule::default();
        for t in 0..10 {
            assert_eq!(schedule.opacity_at(t), 1.0);
            assert_eq!(schedule.opacity_at(t + 10), 0.2);
        }
        assert_eq!(schedule.opacity_at(-1), 0.2);
        assert_eq!(schedule.opacity_at(-11), 1.0);
    }

    #[test]
    fn test_custom_flip_interval() {
        let schedule = VisibilitySchedule::from_config(&config().with_flip_interval(3));
        let pattern: Vec<f64> = (0..6).map(|t| schedule.opacity_at(t)).collect();
        assert_eq!(pattern, vec![1.0, 1.0, 1.0, 0.2, 0.2, 0.2]);
    }

    #[test]
    fn test_concurrent_renders_agree() {
        let issuer = Arc::new(WatermarkIssuer::with_clock(&config(), ManualClock::new(110)).unwrap());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let issuer = Arc::clone(&issuer);
                thread::spawn(move || (0..100).map(|_| issuer.issue().text).collect::<Vec<_>>())
            })
            .collect();
        for handle in handles {
            for text in handle.join().unwrap() {
                assert_eq!(text, "TST-H:8350 | T:19700101-000150");
            }
        }
    }
}
