//! # Reposition Scenario Tests
//!
//! | Scenario | Shifts fed | Expected |
//! |----------|-----------|----------|
//! | Knock | 3 frames at 2.5·T | fast criterion |
//! | Creeping pan | 6+ frames at 0.8·T, one direction | slow criterion |
//! | Jitter | 6 frames at 0.8·T, alternating sign | nothing |
//! | Long session | thousands of frames | capacity never exceeded |

use aegis_monitor::{TemporalTracker, TrackerConfig, MAX_HISTORY};
use proptest::prelude::*;

const T: f64 = 10.0;

fn tracker() -> TemporalTracker {
    TemporalTracker::new(TrackerConfig::default()).unwrap()
}

// =============================================================================
// DETECTION
// =============================================================================

#[test]
fn test_knock_triggers_fast_path() {
    let mut t = tracker();
    for _ in 0..3 {
        t.update(25.0, 0.0, -25.0);
    }
    let check = t.evaluate(T);
    assert!(check.fast);
    assert!(check.is_repositioned());
}

#[test]
fn test_creeping_pan_triggers_slow_path() {
    let mut t = tracker();
    for _ in 0..8 {
        t.update(8.0, -4.8, 6.4);
    }
    let check = t.evaluate(T);
    assert!(!check.fast);
    assert!(check.slow);
}

#[test]
fn test_pan_stays_detected_while_sustained() {
    let mut t = tracker();
    for frame in 0..30 {
        t.update(8.0, 8.0, 0.0);
        if frame >= 5 {
            assert!(t.is_repositioned(T), "frame {frame}");
        }
    }
}

#[test]
fn test_pan_clears_after_camera_settles() {
    let mut t = tracker();
    for _ in 0..6 {
        t.update(8.0, 8.0, 0.0);
    }
    assert!(t.is_repositioned(T));
    for _ in 0..10 {
        t.update(0.0, 0.0, 0.0);
    }
    assert!(!t.is_repositioned(T));
}

// =============================================================================
// FALSE POSITIVE RESISTANCE
// =============================================================================

#[test]
fn test_alternating_jitter_ignored() {
    let mut t = tracker();
    for i in 0..6 {
        let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
        t.update(8.0, 0.0, 8.0 * sign);
    }
    assert!(!t.is_repositioned(T));
}

#[test]
fn test_still_camera_ignored() {
    let mut t = tracker();
    for _ in 0..100 {
        t.update(0.0, 0.0, 0.0);
    }
    assert!(!t.is_repositioned(T));
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    #[test]
    fn prop_history_never_exceeds_capacity(
        shifts in prop::collection::vec((0.0f64..50.0, -50.0f64..50.0, -50.0f64..50.0), 0..200)
    ) {
        let mut t = tracker();
        for (m, x, y) in shifts {
            t.update(m, x, y);
            prop_assert!(t.len() <= MAX_HISTORY);
            prop_assert_eq!(t.shift_history().count(), t.direction_history().count());
        }
    }

    #[test]
    fn prop_oldest_evicted_first(values in prop::collection::vec(0.0f64..100.0, 16..60)) {
        // alpha = 1 makes the smoothed value equal the raw value.
        let config = TrackerConfig::new().with_alpha(1.0);
        let mut t = TemporalTracker::new(config).unwrap();
        for &v in &values {
            t.update(v, v, 0.0);
        }
        let kept: Vec<f64> = t.shift_history().collect();
        prop_assert_eq!(&kept[..], &values[values.len() - MAX_HISTORY..]);
    }

    #[test]
    fn prop_consistency_is_bounded(
        angles in prop::collection::vec(0.0f64..std::f64::consts::TAU, 6)
    ) {
        let mut t = tracker();
        for a in &angles {
            t.update(8.0, 8.0 * a.cos(), 8.0 * a.sin());
        }
        let check = t.evaluate(T);
        prop_assert!(!check.fast);
        if let Some(c) = check.consistency {
            prop_assert!((-1.0..=1.0).contains(&c));
        }
    }
}
