//! # AEGIS Monitor
//!
//! Per-stream temporal state for camera feed integrity: EMA-smoothed shift
//! magnitudes, unit direction history and the dual reposition criteria.
//!
//! ## Components
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`TemporalTracker`] | Smoothing plus fast/slow reposition criteria |
//! | [`TrackerConfig`] | Thresholds, smoothing factor and window sizes |
//! | [`BoundedHistory`] | Fixed-capacity FIFO with oldest-first eviction |
//!
//! ## Quick Start
//!
//! ```rust
//! use aegis_monitor::{TemporalTracker, TrackerConfig};
//!
//! let mut tracker = TemporalTracker::new(TrackerConfig::default())?;
//!
//! // Camera creeping right by 8 px/frame against a 10 px threshold.
//! for _ in 0..6 {
//!     tracker.update(8.0, 8.0, 0.0);
//! }
//! let check = tracker.evaluate(10.0);
//! assert!(check.slow && !check.fast);
//! # Ok::<(), aegis_monitor::MonitorError>(())
//! ```
//!
//! ## Concurrency
//!
//! A tracker is a strictly sequential accumulator: feed it frames in stream
//! order from one task. Separate streams get separate trackers.

mod error;
mod history;
mod tracker;

pub use error::{MonitorError, Result};
pub use history::BoundedHistory;
pub use tracker::{MotionSample, RepositionCheck, TemporalTracker, TrackerConfig, MAX_HISTORY};
