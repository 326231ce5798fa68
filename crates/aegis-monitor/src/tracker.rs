//! # Temporal Reposition Tracker
//!
//! Turns a stream of per-frame directional shifts into a stable answer to
//! "has this camera been turned?".
//!
//! ## Threat Model
//!
//! | Attack | Instantaneous shift | Direction | Caught by |
//! |--------|---------------------|-----------|-----------|
//! | Camera knocked aside | large | any | fast criterion |
//! | Camera slowly panned away | small | consistent | slow criterion |
//! | Vibration / handheld jitter | small or large | random | neither |
//!
//! A single magnitude threshold cannot separate a creeping pan from random
//! shake, so two criteria run side by side and are OR-combined.
//!
//! ## Algorithm
//!
//! ```text
//! update(m, x, y):
//!     s  = α·m + (1-α)·s_prev          (s = m on the first sample)
//!     d  = (x, y) / m   if m > 0.5 else (0, 0)
//!     history.push((s, d))             (FIFO, capacity 15)
//!
//! fast: ≥2 of the last 3 s exceed 1.8·T
//! slow: ≥4 of the last 6 s exceed 0.6·T, and the non-zero d of those
//!       entries (≥3 of them) align with their mean direction:
//!       mean(d · μ/(|μ| + ε)) > 0.5
//! ```
//!
//! Smoothed magnitude and direction live in one record per frame, so the
//! two histories can never drift apart in length.

use crate::error::{MonitorError, Result};
use crate::history::BoundedHistory;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default history capacity.
pub const MAX_HISTORY: usize = 15;

/// Guards the mean-direction normalisation against division by zero.
const DIRECTION_EPSILON: f64 = 1e-6;

/// Tracker parameters.
///
/// # Example
///
/// ```rust
/// use aegis_monitor::TrackerConfig;
///
/// let config = TrackerConfig::new()
///     .with_alpha(0.3)
///     .with_threshold_shift(6.0);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// EMA smoothing factor in `(0, 1]`.
    pub alpha: f64,
    /// History capacity.
    pub capacity: usize,
    /// Reposition threshold `T`, pixels per frame.
    pub threshold_shift: f64,
    /// Raw magnitude above which a direction is recorded.
    pub direction_floor: f64,
    /// Entries examined by the fast criterion.
    pub fast_window: usize,
    /// Fast criterion fires on smoothed values above `fast_factor · T`.
    pub fast_factor: f64,
    /// Entries above the fast level needed to fire.
    pub fast_min_hits: usize,
    /// Entries examined by the slow criterion.
    pub slow_window: usize,
    /// An entry is significant above `slow_factor · T`.
    pub slow_factor: f64,
    /// Significant entries needed before directions are checked.
    pub slow_min_hits: usize,
    /// Non-zero directions needed among the significant entries.
    pub slow_min_directions: usize,
    /// Mean alignment above which motion is a sustained reposition.
    pub consistency_threshold: f64,
}

impl TrackerConfig {
    /// Creates a config with default values.
    ///
    /// Defaults:
    /// - Alpha: 0.25
    /// - Capacity: 15
    /// - Threshold: 10.0 px
    /// - Fast: 2 of 3 above 1.8·T
    /// - Slow: 4 of 6 above 0.6·T, 3 directions, alignment > 0.5
    #[must_use]
    pub const fn new() -> Self {
        Self {
            alpha: 0.25,
            capacity: MAX_HISTORY,
            threshold_shift: 10.0,
            direction_floor: 0.5,
            fast_window: 3,
            fast_factor: 1.8,
            fast_min_hits: 2,
            slow_window: 6,
            slow_factor: 0.6,
            slow_min_hits: 4,
            slow_min_directions: 3,
            consistency_threshold: 0.5,
        }
    }

    /// Sets the smoothing factor.
    #[must_use]
    pub const fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Sets the history capacity.
    #[must_use]
    pub const fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the reposition threshold.
    #[must_use]
    pub const fn with_threshold_shift(mut self, threshold: f64) -> Self {
        self.threshold_shift = threshold;
        self
    }

    /// Sets the alignment threshold of the slow criterion.
    #[must_use]
    pub const fn with_consistency_threshold(mut self, threshold: f64) -> Self {
        self.consistency_threshold = threshold;
        self
    }

    /// Checks that every parameter is in range.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(MonitorError::invalid("alpha", format!("{} not in (0, 1]", self.alpha)));
        }
        if self.fast_window == 0 || self.slow_window == 0 {
            return Err(MonitorError::invalid("window", "must be at least 1"));
        }
        if self.capacity < self.slow_window.max(self.fast_window) {
            return Err(MonitorError::invalid(
                "capacity",
                format!(
                    "{} is smaller than the largest criterion window ({})",
                    self.capacity,
                    self.slow_window.max(self.fast_window)
                ),
            ));
        }
        if self.fast_min_hits > self.fast_window {
            return Err(MonitorError::invalid("fast_min_hits", "exceeds fast_window"));
        }
        if self.slow_min_hits > self.slow_window {
            return Err(MonitorError::invalid("slow_min_hits", "exceeds slow_window"));
        }
        for (field, value) in [
            ("threshold_shift", self.threshold_shift),
            ("fast_factor", self.fast_factor),
            ("slow_factor", self.slow_factor),
        ] {
            if !(value > 0.0) {
                return Err(MonitorError::invalid(field, format!("{value} must be positive")));
            }
        }
        if self.direction_floor < 0.0 {
            return Err(MonitorError::invalid("direction_floor", "must not be negative"));
        }
        Ok(())
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// One frame's entry in the tracker history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    /// EMA-smoothed shift magnitude.
    pub smoothed: f64,
    /// Unit direction of the raw shift, or `(0, 0)` below the floor.
    pub direction: (f64, f64),
}

impl MotionSample {
    fn has_direction(&self) -> bool {
        self.direction != (0.0, 0.0)
    }
}

/// Which reposition criteria fired, and why.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositionCheck {
    /// Abrupt knock.
    pub fast: bool,
    /// Sustained directional drift.
    pub slow: bool,
    /// Alignment of significant directions, when the slow criterion got
    /// far enough to compute it.
    pub consistency: Option<f64>,
}

impl RepositionCheck {
    /// Returns true if either criterion fired.
    #[inline]
    #[must_use]
    pub const fn is_repositioned(&self) -> bool {
        self.fast || self.slow
    }
}

/// Per-stream smoothing and reposition detection.
///
/// One tracker per monitored stream; trackers share nothing, so streams can
/// run on separate threads.
///
/// # Example
///
/// ```rust
/// use aegis_monitor::{TemporalTracker, TrackerConfig};
///
/// let mut tracker = TemporalTracker::new(TrackerConfig::default())?;
///
/// // Camera knocked hard to the right.
/// tracker.update(20.0, 20.0, 0.0);
/// tracker.update(20.0, 20.0, 0.0);
/// assert!(tracker.is_repositioned(10.0));
/// # Ok::<(), aegis_monitor::MonitorError>(())
/// ```
#[derive(Debug, Clone)]
pub struct TemporalTracker {
    config: TrackerConfig,
    history: BoundedHistory<MotionSample>,
}

impl TemporalTracker {
    /// Creates a tracker.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::InvalidConfig`] if the config fails
    /// [`TrackerConfig::validate`].
    pub fn new(config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            history: BoundedHistory::new(config.capacity),
            config,
        })
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Records one frame's directional shift.
    ///
    /// # Arguments
    ///
    /// * `magnitude` - Norm of the median shift
    /// * `shift_x`, `shift_y` - Median shift components
    ///
    /// # Returns
    ///
    /// The recorded sample.
    pub fn update(&mut self, magnitude: f64, shift_x: f64, shift_y: f64) -> MotionSample {
        let alpha = self.config.alpha;
        let smoothed = match self.history.latest() {
            Some(prev) => alpha * magnitude + (1.0 - alpha) * prev.smoothed,
            None => magnitude,
        };
        let direction = if magnitude > self.config.direction_floor {
            (shift_x / magnitude, shift_y / magnitude)
        } else {
            (0.0, 0.0)
        };

        let sample = MotionSample {
            smoothed,
            direction,
        };
        self.history.push(sample);
        sample
    }

    /// Returns true if the camera has been repositioned, judged against
    /// `threshold_shift`.
    #[must_use]
    pub fn is_repositioned(&self, threshold_shift: f64) -> bool {
        self.evaluate(threshold_shift).is_repositioned()
    }

    /// Runs both criteria against `threshold_shift`.
    #[must_use]
    pub fn evaluate(&self, threshold_shift: f64) -> RepositionCheck {
        if self.history.len() < 2 {
            return RepositionCheck::default();
        }

        let fast = self.fast_criterion(threshold_shift);
        let (slow, consistency) = self.slow_criterion(threshold_shift);

        if fast || slow {
            debug!(
                fast,
                slow,
                consistency = consistency.unwrap_or(0.0),
                smoothed = self.smoothed().unwrap_or(0.0),
                "reposition criteria met"
            );
        }
        RepositionCheck {
            fast,
            slow,
            consistency,
        }
    }

    fn fast_criterion(&self, threshold_shift: f64) -> bool {
        let level = self.config.fast_factor * threshold_shift;
        let hits = self
            .history
            .recent(self.config.fast_window)
            .filter(|s| s.smoothed > level)
            .count();
        hits >= self.config.fast_min_hits
    }

    fn slow_criterion(&self, threshold_shift: f64) -> (bool, Option<f64>) {
        let window = self.config.slow_window;
        if self.history.len() < window {
            return (false, None);
        }

        let level = self.config.slow_factor * threshold_shift;
        let significant: Vec<&MotionSample> = self
            .history
            .recent(window)
            .filter(|s| s.smoothed > level)
            .collect();
        if significant.len() < self.config.slow_min_hits {
            return (false, None);
        }

        let directions: Vec<(f64, f64)> = significant
            .iter()
            .filter(|s| s.has_direction())
            .map(|s| s.direction)
            .collect();
        if directions.len() < self.config.slow_min_directions {
            return (false, None);
        }

        let n = directions.len() as f64;
        let (sum_x, sum_y) = directions
            .iter()
            .fold((0.0, 0.0), |(ax, ay), (dx, dy)| (ax + dx, ay + dy));
        let (mean_x, mean_y) = (sum_x / n, sum_y / n);
        let norm = mean_x.hypot(mean_y);
        if norm <= 0.0 {
            return (false, Some(0.0));
        }

        let (unit_x, unit_y) = (
            mean_x / (norm + DIRECTION_EPSILON),
            mean_y / (norm + DIRECTION_EPSILON),
        );
        let consistency = directions
            .iter()
            .map(|(dx, dy)| dx * unit_x + dy * unit_y)
            .sum::<f64>()
            / n;

        (consistency > self.config.consistency_threshold, Some(consistency))
    }

    /// Number of frames in the history.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Returns true before the first update (or after a reset).
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Latest smoothed magnitude.
    #[must_use]
    pub fn smoothed(&self) -> Option<f64> {
        self.history.latest().map(|s| s.smoothed)
    }

    /// Smoothed magnitudes, oldest first.
    pub fn shift_history(&self) -> impl Iterator<Item = f64> + '_ {
        self.history.iter().map(|s| s.smoothed)
    }

    /// Recorded directions, oldest first.
    pub fn direction_history(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.history.iter().map(|s| s.direction)
    }

    /// Full per-frame records, oldest first.
    #[must_use]
    pub const fn samples(&self) -> &BoundedHistory<MotionSample> {
        &self.history
    }

    /// Forgets every frame. The next update seeds the EMA afresh.
    pub fn reset(&mut self) {
        debug!(frames = self.history.len(), "tracker reset");
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> TemporalTracker {
        TemporalTracker::new(TrackerConfig::default()).unwrap()
    }

    #[test]
    fn test_ema_seeds_with_first_value() {
        let mut t = tracker();
        assert_eq!(t.update(8.0, 8.0, 0.0).smoothed, 8.0);
        // 0.25·0 + 0.75·8
        assert_eq!(t.update(0.0, 0.0, 0.0).smoothed, 6.0);
        // 0.25·4 + 0.75·6
        assert_eq!(t.update(4.0, 0.0, 4.0).smoothed, 5.5);
    }

    #[test]
    fn test_direction_floor() {
        let mut t = tracker();
        assert_eq!(t.update(0.5, 0.3, 0.4).direction, (0.0, 0.0));
        let d = t.update(5.0, 3.0, 4.0).direction;
        assert!((d.0 - 0.6).abs() < 1e-12);
        assert!((d.1 - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_histories_stay_aligned() {
        let mut t = tracker();
        for i in 0..40 {
            t.update(f64::from(i), 1.0, 0.0);
            assert_eq!(t.shift_history().count(), t.direction_history().count());
        }
        assert_eq!(t.len(), MAX_HISTORY);
    }

    #[test]
    fn test_single_frame_never_repositioned() {
        let mut t = tracker();
        t.update(500.0, 500.0, 0.0);
        assert_eq!(t.evaluate(10.0), RepositionCheck::default());
    }

    #[test]
    fn test_fast_criterion_on_knock() {
        let mut t = tracker();
        t.update(20.0, 20.0, 0.0);
        t.update(20.0, 20.0, 0.0);
        let check = t.evaluate(10.0);
        assert!(check.fast);
        assert!(!check.slow);
    }

    #[test]
    fn test_fast_criterion_needs_two_hits() {
        let mut t = tracker();
        t.update(0.0, 0.0, 0.0);
        t.update(0.0, 0.0, 0.0);
        // One large spike: smoothed 0.25·100 = 25, then decays to 18.75.
        t.update(100.0, 100.0, 0.0);
        assert!(!t.evaluate(10.0).fast);
        t.update(0.0, 0.0, 0.0);
        // 25 and 18.75 both exceed 18
        assert!(t.evaluate(10.0).fast);
    }

    #[test]
    fn test_slow_criterion_on_consistent_drift() {
        let mut t = tracker();
        for _ in 0..5 {
            t.update(8.0, 8.0, 0.0);
            assert!(!t.is_repositioned(10.0));
        }
        t.update(8.0, 8.0, 0.0);
        let check = t.evaluate(10.0);
        assert!(!check.fast);
        assert!(check.slow);
        assert!(check.consistency.unwrap() > 0.99);
    }

    #[test]
    fn test_alternating_drift_is_jitter() {
        let mut t = tracker();
        for i in 0..6 {
            let x = if i % 2 == 0 { 8.0 } else { -8.0 };
            t.update(8.0, x, 0.0);
        }
        let check = t.evaluate(10.0);
        assert!(!check.is_repositioned());
        assert_eq!(check.consistency, Some(0.0));
    }

    #[test]
    fn test_rotating_drift_is_jitter() {
        let mut t = tracker();
        let dirs = [(1.0, 0.0), (0.0, 1.0), (-1.0, 0.0), (0.0, -1.0), (1.0, 0.0), (0.0, 1.0)];
        for (x, y) in dirs {
            t.update(8.0, 8.0 * x, 8.0 * y);
        }
        let check = t.evaluate(10.0);
        assert!(!check.slow);
        let consistency = check.consistency.unwrap();
        assert!((consistency - 0.2357).abs() < 1e-3, "consistency {consistency}");
    }

    #[test]
    fn test_slow_criterion_needs_directions() {
        let mut t = tracker();
        // Every entry is significant at T = 0.5, but each raw shift is
        // below the direction floor.
        for _ in 0..6 {
            t.update(0.4, 0.4, 0.0);
        }
        let check = t.evaluate(0.5);
        assert!(!check.slow);
        assert_eq!(check.consistency, None);
    }

    #[test]
    fn test_slow_criterion_needs_sustained_magnitude() {
        let mut t = tracker();
        t.update(8.0, 8.0, 0.0);
        for _ in 0..5 {
            t.update(0.4, 0.4, 0.0);
        }
        // Smoothed decays 8 → 6.1 → 4.675, so only two entries exceed 6.
        assert!(!t.evaluate(10.0).slow);
    }

    #[test]
    fn test_reset_clears_history() {
        let mut t = tracker();
        t.update(20.0, 20.0, 0.0);
        t.update(20.0, 20.0, 0.0);
        t.reset();
        assert!(t.is_empty());
        assert!(!t.is_repositioned(10.0));
        assert_eq!(t.update(3.0, 3.0, 0.0).smoothed, 3.0);
    }

    #[test]
    fn test_config_validation() {
        assert!(TrackerConfig::new().validate().is_ok());
        assert!(TrackerConfig::new().with_alpha(0.0).validate().is_err());
        assert!(TrackerConfig::new().with_alpha(1.0).validate().is_ok());
        assert!(TrackerConfig::new().with_alpha(1.5).validate().is_err());
        assert!(TrackerConfig::new().with_capacity(5).validate().is_err());
        assert!(TrackerConfig::new().with_threshold_shift(0.0).validate().is_err());
        assert!(TrackerConfig::new().with_threshold_shift(f64::NAN).validate().is_err());
    }

    #[test]
    fn test_config_partial_json() {
        let config: TrackerConfig = serde_json::from_str(r#"{"alpha": 0.5}"#).unwrap();
        assert_eq!(config.alpha, 0.5);
        assert_eq!(config.capacity, MAX_HISTORY);
    }
}
