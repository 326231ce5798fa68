//! # Shake and Directional Shift
//!
//! Two readings of the same dense flow field:
//!
//! | Reading | Statistic | Answers |
//! |---------|-----------|---------|
//! | Shake | mean vector magnitude | "is the whole image moving?" |
//! | Directional shift | per-axis median of non-noise vectors | "which way, and how far?" |
//!
//! Shake uses the mean on purpose: vibration moves every pixel a little in
//! changing directions, which a mean of magnitudes accumulates. The shift
//! uses medians so a person walking through the scene does not read as the
//! camera turning.
//!
//! Two noise floors keep sensor jitter out of the shift estimate: vectors
//! at or below [`FLOW_NOISE_FLOOR`] are discarded before the median, and a
//! median vector shorter than [`SHIFT_SNAP_FLOOR`] is snapped to zero.

use crate::error::Result;
use crate::flow::{dense_flow, FlowField, FlowParams};
use image::GrayImage;
use serde::{Deserialize, Serialize};

/// Default mean flow magnitude above which the camera is shaking.
///
/// Depends on resolution and frame rate; 5 px/frame suits 640x480 @ 30 fps.
pub const DEFAULT_SHAKE_THRESHOLD: f64 = 5.0;

/// Vectors with magnitude at or below this are ignored by the shift median.
pub const FLOW_NOISE_FLOOR: f64 = 0.1;

/// Median shifts shorter than this are reported as exactly zero.
pub const SHIFT_SNAP_FLOOR: f64 = 0.2;

/// Robust whole-frame translation between two frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectionalShift {
    /// Median horizontal motion, pixels.
    pub shift_x: f64,
    /// Median vertical motion, pixels.
    pub shift_y: f64,
    /// Euclidean norm of `(shift_x, shift_y)`.
    pub magnitude: f64,
}

impl DirectionalShift {
    /// No motion.
    pub const ZERO: Self = Self {
        shift_x: 0.0,
        shift_y: 0.0,
        magnitude: 0.0,
    };

    /// Whether the shift was snapped to (or measured as) zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.magnitude == 0.0
    }
}

impl FlowField {
    /// Per-axis median of vectors above the noise floor, snapped to zero
    /// below [`SHIFT_SNAP_FLOOR`].
    #[must_use]
    pub fn dominant_shift(&self) -> DirectionalShift {
        let (mut xs, mut ys): (Vec<f64>, Vec<f64>) = self
            .vectors()
            .map(|(u, v)| (f64::from(u), f64::from(v)))
            .filter(|(u, v)| u.hypot(*v) > FLOW_NOISE_FLOOR)
            .unzip();

        let (Some(shift_x), Some(shift_y)) = (median(&mut xs), median(&mut ys)) else {
            return DirectionalShift::ZERO;
        };
        let magnitude = shift_x.hypot(shift_y);
        if magnitude < SHIFT_SNAP_FLOOR {
            return DirectionalShift::ZERO;
        }
        DirectionalShift {
            shift_x,
            shift_y,
            magnitude,
        }
    }
}

/// Median of a slice, averaging the middle pair for even lengths.
fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some(0.5 * (values[mid - 1] + values[mid]))
    } else {
        Some(values[mid])
    }
}

/// Checks for camera shake between two consecutive frames.
///
/// # Returns
///
/// `(is_shaken, avg_magnitude)` with `is_shaken = avg_magnitude > threshold`.
///
/// # Errors
///
/// Fails on empty frames or a dimension mismatch.
pub fn check_shake(
    gray: &GrayImage,
    prev_gray: &GrayImage,
    threshold: f64,
    params: &FlowParams,
) -> Result<(bool, f64)> {
    let magnitude = dense_flow(gray, prev_gray, params)?.mean_magnitude();
    Ok((magnitude > threshold, magnitude))
}

/// Measures the robust translation between two consecutive frames.
///
/// # Errors
///
/// Fails on empty frames or a dimension mismatch.
pub fn directional_shift(
    gray: &GrayImage,
    prev_gray: &GrayImage,
    params: &FlowParams,
) -> Result<DirectionalShift> {
    Ok(dense_flow(gray, prev_gray, params)?.dominant_shift())
}
