//! # Token Validator
//!
//! Recomputes the expected token for every observed second and flags the
//! first deviation.
//!
//! ## Threat Model
//!
//! | Attack | What the validator sees | Result |
//! |--------|-------------------------|--------|
//! | Replay of recorded footage | old tokens at new seconds | `Mismatch` on the first replayed second |
//! | Looping a short clip | a repeating token sub-sequence | `Mismatch` on the first repeat |
//! | Forged watermark without the key | random tokens | `Mismatch` (p ≈ 0.9999 per second) |
//! | Honest feed with clock drift | right token, off by a second or two | `Match` within the skew tolerance |
//!
//! Token validity is bound to absolute time, not stream position, so a
//! replay fails on its first frame; no loop-pattern analysis is needed.
//!
//! ## Matching Rule
//!
//! For an observation at second `t` with tolerance `s`, the expected tokens
//! for `t, t-1, t+1, ... t-s, t+s` are tried in that order. The first equal
//! one is a match at that offset; none equal is a mismatch. Expected tokens
//! are memoised in an [`ExpectedTokenWindow`] pruned to the last
//! `horizon` seconds.
//!
//! ## Inconclusive Observations
//!
//! An observation is *not* judged when it is older than `horizon` seconds
//! behind the newest matched second, or (with a reference clock) more than
//! the skew tolerance from the reference time. Those are reported as
//! [`Inconclusive::ClockSkewExceeded`], never as tampering.
//!
//! Only matched observations move the window forward. A forged second far
//! in the future is a mismatch and leaves the window where it was.

use crate::clock::Clock;
use crate::config::TokenConfig;
use crate::error::Result;
use crate::token::{SecretKey, WatermarkToken};
use crate::watermark::Observation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Expected tokens for a bounded set of recent seconds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpectedTokenWindow {
    horizon: i64,
    entries: BTreeMap<i64, WatermarkToken>,
    newest: Option<i64>,
}

impl ExpectedTokenWindow {
    /// Creates an empty window keeping `horizon` seconds.
    #[must_use]
    pub fn new(horizon: u64) -> Self {
        Self {
            horizon: i64::try_from(horizon).unwrap_or(i64::MAX / 4),
            entries: BTreeMap::new(),
            newest: None,
        }
    }

    /// Seconds kept behind the newest second seen.
    #[must_use]
    pub const fn horizon(&self) -> i64 {
        self.horizon
    }

    /// Newest matched second.
    #[must_use]
    pub const fn newest(&self) -> Option<i64> {
        self.newest
    }

    /// Number of memoised seconds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is memoised.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Expected token at `unix_second`, derived on first use.
    pub fn expected(&mut self, key: &SecretKey, unix_second: i64) -> WatermarkToken {
        *self
            .entries
            .entry(unix_second)
            .or_insert_with(|| key.token_at(unix_second))
    }

    /// Whether `unix_second` is too old to judge.
    #[must_use]
    pub fn is_stale(&self, unix_second: i64) -> bool {
        self.newest
            .is_some_and(|newest| unix_second < newest.saturating_sub(self.horizon))
    }

    /// Records `unix_second` as matched and drops entries that fell out
    /// of the window, keeping `slack` extra seconds for skew lookups.
    pub fn advance(&mut self, unix_second: i64, slack: i64) {
        let newest = self.newest.map_or(unix_second, |n| n.max(unix_second));
        self.newest = Some(newest);
        self.prune(slack);
    }

    /// Drops entries outside `[newest - horizon - slack, newest + slack]`.
    /// With nothing matched yet, drops everything.
    pub fn prune(&mut self, slack: i64) {
        let before = self.entries.len();
        match self.newest {
            Some(newest) => {
                let cutoff = newest.saturating_sub(self.horizon).saturating_sub(slack);
                self.entries = self.entries.split_off(&cutoff);
                if let Some(ceiling) = newest.checked_add(slack).and_then(|c| c.checked_add(1)) {
                    let _ = self.entries.split_off(&ceiling);
                }
            }
            None => self.entries.clear(),
        }
        let pruned = before - self.entries.len();
        if pruned > 0 {
            debug!(pruned, newest = ?self.newest, "expected-token window pruned");
        }
    }
}

/// A token that matched nothing within the tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMismatch {
    /// Second of the offending observation.
    pub unix_second: i64,
    /// Token read from the feed.
    pub observed: WatermarkToken,
    /// Token the key produces for that exact second.
    pub expected: WatermarkToken,
}

impl fmt::Display for TokenMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "token mismatch at {} (observed {}, expected {})",
            self.unix_second, self.observed, self.expected
        )
    }
}

/// Why an observation could not be judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Inconclusive {
    /// The observation is too old for the window, or too far from the
    /// reference clock.
    ClockSkewExceeded {
        /// Observed second.
        unix_second: i64,
        /// Reference second it was compared against.
        reference: i64,
        /// Allowed distance, seconds.
        allowed: i64,
    },
}

impl fmt::Display for Inconclusive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClockSkewExceeded {
                unix_second,
                reference,
                allowed,
            } => write!(
                f,
                "clock skew exceeded: second {unix_second} is more than {allowed}s from {reference}"
            ),
        }
    }
}

/// Result of checking one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenCheck {
    /// The token matched the expected token `offset` seconds away.
    Match {
        /// Skew at which it matched (0 for an exact match).
        offset: i64,
    },
    /// Tampering evidence.
    Mismatch(TokenMismatch),
    /// Not judged.
    Inconclusive(Inconclusive),
}

impl TokenCheck {
    /// Returns true for a match.
    #[must_use]
    pub const fn is_match(&self) -> bool {
        matches!(self, Self::Match { .. })
    }

    /// Returns true for a mismatch.
    #[must_use]
    pub const fn is_mismatch(&self) -> bool {
        matches!(self, Self::Mismatch(_))
    }

    /// Returns true unless inconclusive.
    #[must_use]
    pub const fn is_conclusive(&self) -> bool {
        !matches!(self, Self::Inconclusive(_))
    }
}

/// Outcome of validating an observation log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Observations examined.
    pub checked: usize,
    /// Observations that matched.
    pub matched: usize,
    /// Observations that could not be judged.
    pub inconclusive: usize,
    /// Every mismatch found, in log order.
    pub mismatches: Vec<TokenMismatch>,
    /// True if validation stopped at the first mismatch.
    pub stopped_early: bool,
}

impl ValidationReport {
    /// Returns true if any mismatch was found.
    #[must_use]
    pub fn is_tampered(&self) -> bool {
        !self.mismatches.is_empty()
    }

    /// The first mismatch, which is the conclusive evidence.
    #[must_use]
    pub fn first_mismatch(&self) -> Option<&TokenMismatch> {
        self.mismatches.first()
    }
}

/// Validates observed tokens for one stream.
///
/// Shared state (the expected-token window) sits behind a mutex, so one
/// validator can serve concurrent callers.
///
/// # Example
///
/// ```rust
/// use aegis_token::{Observation, TokenCheck, TokenConfig, TokenValidator};
///
/// let config = TokenConfig::new().with_secret("aegis-test-secret");
/// let validator = TokenValidator::new(&config)?;
///
/// // Genuine: second 100 carries 4556.
/// let genuine = Observation::parse(100, "4556")?;
/// assert_eq!(validator.check(&genuine), TokenCheck::Match { offset: 0 });
///
/// // Replayed: second 110 carries the token from 105.
/// let replayed = Observation::parse(110, "3581")?;
/// assert!(validator.check(&replayed).is_mismatch());
/// # Ok::<(), aegis_token::TokenError>(())
/// ```
pub struct TokenValidator {
    key: SecretKey,
    tolerance: i64,
    short_circuit: bool,
    reference: Option<Box<dyn Clock>>,
    window: Mutex<ExpectedTokenWindow>,
}

impl TokenValidator {
    /// Creates a validator without a reference clock; staleness is judged
    /// only against the newest second already observed.
    ///
    /// # Errors
    ///
    /// Fails if the secret is missing or undecodable, or the config is
    /// invalid.
    pub fn new(config: &TokenConfig) -> Result<Self> {
        config.validate()?;
        let key = config.secret_key()?;
        info!(
            key = key.fingerprint(),
            tolerance = config.skew_tolerance_secs,
            horizon = config.window_horizon_secs,
            "token validator ready"
        );
        Ok(Self {
            key,
            tolerance: i64::try_from(config.skew_tolerance_secs).unwrap_or(0),
            short_circuit: config.short_circuit,
            reference: None,
            window: Mutex::new(ExpectedTokenWindow::new(config.window_horizon_secs)),
        })
    }

    /// Also leaves unjudged any observation more than the skew tolerance
    /// from `clock`'s time.
    #[must_use]
    pub fn with_reference_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.reference = Some(Box::new(clock));
        self
    }

    /// Symmetric skew tolerance, seconds.
    #[must_use]
    pub const fn tolerance(&self) -> i64 {
        self.tolerance
    }

    /// Checks one observation.
    pub fn check(&self, observation: &Observation) -> TokenCheck {
        let t = observation.unix_second;
        let mut window = self.window.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(inconclusive) = self.skew_gate(&window, t) {
            debug!(%inconclusive, "observation not judged");
            return TokenCheck::Inconclusive(inconclusive);
        }

        let mut result = None;
        for offset in skew_offsets(self.tolerance) {
            let Some(second) = t.checked_add(offset) else {
                continue;
            };
            if window.expected(&self.key, second) == observation.token {
                result = Some(TokenCheck::Match { offset });
                break;
            }
        }
        let check = result.unwrap_or_else(|| {
            TokenCheck::Mismatch(TokenMismatch {
                unix_second: t,
                observed: observation.token,
                expected: window.expected(&self.key, t),
            })
        });

        if check.is_match() {
            window.advance(t, self.tolerance);
        } else {
            window.prune(self.tolerance);
        }
        match &check {
            TokenCheck::Mismatch(mismatch) => warn!(%mismatch, "watermark token mismatch"),
            TokenCheck::Match { offset } if *offset != 0 => {
                debug!(second = t, offset, "token matched within skew tolerance");
            }
            _ => {}
        }
        check
    }

    fn skew_gate(&self, window: &ExpectedTokenWindow, t: i64) -> Option<Inconclusive> {
        if window.is_stale(t) {
            return window.newest().map(|reference| Inconclusive::ClockSkewExceeded {
                unix_second: t,
                reference,
                allowed: window.horizon(),
            });
        }
        let reference = self.reference.as_ref()?.now_unix();
        (t.abs_diff(reference) > self.tolerance.unsigned_abs()).then_some(
            Inconclusive::ClockSkewExceeded {
                unix_second: t,
                reference,
                allowed: self.tolerance,
            },
        )
    }

    /// Checks an ordered log of observations.
    ///
    /// With short-circuiting on (the default), stops at the first mismatch:
    /// one mismatch is already conclusive.
    pub fn validate_sequence<'a, I>(&self, observations: I) -> ValidationReport
    where
        I: IntoIterator<Item = &'a Observation>,
    {
        let mut report = ValidationReport::default();
        for observation in observations {
            report.checked += 1;
            match self.check(observation) {
                TokenCheck::Match { .. } => report.matched += 1,
                TokenCheck::Inconclusive(_) => report.inconclusive += 1,
                TokenCheck::Mismatch(mismatch) => {
                    report.mismatches.push(mismatch);
                    if self.short_circuit {
                        report.stopped_early = true;
                        break;
                    }
                }
            }
        }
        info!(
            checked = report.checked,
            matched = report.matched,
            inconclusive = report.inconclusive,
            mismatches = report.mismatches.len(),
            "token log validated"
        );
        report
    }

    /// Forgets every observed second.
    pub fn reset(&self) {
        let mut window = self.window.lock().unwrap_or_else(PoisonError::into_inner);
        *window = ExpectedTokenWindow::new(window.horizon().unsigned_abs());
    }

    /// Snapshot of the expected-token window.
    #[must_use]
    pub fn window(&self) -> ExpectedTokenWindow {
        self.window
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenValidator")
            .field("key", &self.key)
            .field("tolerance", &self.tolerance)
            .field("short_circuit", &self.short_circuit)
            .field("reference", &self.reference)
            .finish_non_exhaustive()
    }
}

/// `0, -1, +1, -2, +2, ...` up to `tolerance`.
fn skew_offsets(tolerance: i64) -> impl Iterator<Item = i64> {
    std::iter::once(0).chain((1..=tolerance.max(0)).flat_map(|d| [-d, d]))
}
