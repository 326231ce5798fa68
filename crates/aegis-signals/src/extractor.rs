//! Per-frame signal extraction.
//!
//! [`SignalExtractor`] runs every metric in this crate over one frame (and
//! the previous frame's luminance, when there is one) and packs the results
//! into a [`SignalVector`]. It holds configuration only, no per-stream
//! state, so one extractor can serve any number of streams.

use crate::blur::{laplacian_variance, DEFAULT_BLUR_THRESHOLD};
use crate::error::Result;
use crate::flow::{dense_flow, FlowParams};
use crate::frame::FrameSample;
use crate::glare::{GlareConfig, GlareReading, GlareStrategy, LumaHistogram};
use crate::motion::{DirectionalShift, DEFAULT_SHAKE_THRESHOLD};
use image::GrayImage;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Default mean luminance below which a frame is considered low-light.
pub const DEFAULT_LOW_LIGHT_THRESHOLD: f64 = 70.0;

/// Thresholds and parameters for signal extraction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Laplacian variance below which a frame is blurred.
    pub blur_threshold: f64,
    /// Mean flow magnitude above which the camera is shaking.
    pub shake_threshold: f64,
    /// Mean luminance below which a frame is low-light.
    pub low_light_threshold: f64,
    /// Glare strategy and its thresholds.
    pub glare: GlareConfig,
    /// Optical-flow solver parameters.
    pub flow: FlowParams,
}

impl SignalConfig {
    /// Creates a config with default values.
    ///
    /// Defaults:
    /// - Blur threshold: 50.0
    /// - Shake threshold: 5.0
    /// - Low-light threshold: 70.0
    /// - Glare: pure-white percentage, 10%
    #[must_use]
    pub fn new() -> Self {
        Self {
            blur_threshold: DEFAULT_BLUR_THRESHOLD,
            shake_threshold: DEFAULT_SHAKE_THRESHOLD,
            low_light_threshold: DEFAULT_LOW_LIGHT_THRESHOLD,
            glare: GlareConfig::default(),
            flow: FlowParams::default(),
        }
    }

    /// Sets the blur threshold.
    #[must_use]
    pub const fn with_blur_threshold(mut self, threshold: f64) -> Self {
        self.blur_threshold = threshold;
        self
    }

    /// Sets the shake threshold.
    #[must_use]
    pub const fn with_shake_threshold(mut self, threshold: f64) -> Self {
        self.shake_threshold = threshold;
        self
    }

    /// Sets the low-light threshold.
    #[must_use]
    pub const fn with_low_light_threshold(mut self, threshold: f64) -> Self {
        self.low_light_threshold = threshold;
        self
    }

    /// Sets the glare strategy.
    #[must_use]
    pub const fn with_glare(mut self, glare: GlareConfig) -> Self {
        self.glare = glare;
        self
    }

    /// Sets the optical-flow parameters.
    #[must_use]
    pub const fn with_flow(mut self, flow: FlowParams) -> Self {
        self.flow = flow;
        self
    }
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Measurements for one frame.
///
/// Motion fields (`shake_magnitude`, `shift_*`) are zero on the first frame
/// of a session, when there is no previous frame to compare against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalVector {
    /// Laplacian variance.
    pub blur_variance: f64,
    /// `blur_variance < blur_threshold`.
    pub is_blurred: bool,
    /// Mean optical-flow magnitude.
    pub shake_magnitude: f64,
    /// `shake_magnitude > shake_threshold`.
    pub is_shaken: bool,
    /// Bright-pixel percentage as the glare strategy defines it.
    pub glare_pct: f64,
    /// Glare strategy verdict.
    pub is_glare: bool,
    /// Median horizontal shift.
    pub shift_x: f64,
    /// Median vertical shift.
    pub shift_y: f64,
    /// Norm of the median shift.
    pub shift_magnitude: f64,
    /// Mean luminance.
    pub mean_luma: f64,
    /// `mean_luma < low_light_threshold`.
    pub is_low_light: bool,
}

impl SignalVector {
    /// The directional shift part of the vector.
    #[must_use]
    pub const fn shift(&self) -> DirectionalShift {
        DirectionalShift {
            shift_x: self.shift_x,
            shift_y: self.shift_y,
            magnitude: self.shift_magnitude,
        }
    }
}

/// Everything measured for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// The per-frame signal vector.
    pub signals: SignalVector,
    /// Full glare reading, including the coarse histogram.
    pub glare: GlareReading,
    /// Whether motion was measured (false on a session's first frame).
    pub motion_measured: bool,
}

/// Stateless per-frame metric computation.
///
/// # Example
///
/// ```rust
/// use aegis_signals::{FrameSample, SignalConfig, SignalExtractor};
/// use image::{GrayImage, Luma};
///
/// let extractor = SignalExtractor::new(SignalConfig::default());
/// let frame = FrameSample::from_luma(GrayImage::from_pixel(32, 32, Luma([128])))?;
///
/// let first = extractor.extract(&frame, None)?;
/// assert!(!first.motion_measured);
/// assert!(first.signals.is_blurred); // flat grey has no edges
///
/// let second = extractor.extract(&frame, Some(frame.luma()))?;
/// assert!(second.motion_measured);
/// assert!(!second.signals.is_shaken);
/// # Ok::<(), aegis_signals::SignalError>(())
/// ```
#[derive(Debug)]
pub struct SignalExtractor {
    config: SignalConfig,
    glare: Box<dyn GlareStrategy>,
}

impl SignalExtractor {
    /// Creates an extractor, building the configured glare strategy.
    #[must_use]
    pub fn new(config: SignalConfig) -> Self {
        Self {
            glare: config.glare.build(),
            config,
        }
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &SignalConfig {
        &self.config
    }

    /// Name of the active glare strategy.
    #[must_use]
    pub fn glare_strategy(&self) -> &'static str {
        self.glare.name()
    }

    /// Measures one frame.
    ///
    /// `previous` is the luminance of the frame before this one in the same
    /// stream; pass `None` for the first frame.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SignalError::InvalidFrame`] for malformed input and
    /// [`crate::SignalError::DimensionMismatch`] if `previous` has a
    /// different size.
    pub fn extract(&self, frame: &FrameSample, previous: Option<&GrayImage>) -> Result<Extraction> {
        let gray = frame.luma();

        let blur_variance = laplacian_variance(gray)?;
        let histogram = LumaHistogram::from_luma(gray)?;
        let glare = self.glare.assess(&histogram);
        let mean_luma = mean_luma(&histogram);

        let (shake_magnitude, shift) = match previous {
            Some(prev) => {
                let field = dense_flow(gray, prev, &self.config.flow)?;
                (field.mean_magnitude(), field.dominant_shift())
            }
            None => (0.0, DirectionalShift::ZERO),
        };

        let signals = SignalVector {
            blur_variance,
            is_blurred: blur_variance < self.config.blur_threshold,
            shake_magnitude,
            is_shaken: shake_magnitude > self.config.shake_threshold,
            glare_pct: glare.white_pct,
            is_glare: glare.is_glare,
            shift_x: shift.shift_x,
            shift_y: shift.shift_y,
            shift_magnitude: shift.magnitude,
            mean_luma,
            is_low_light: mean_luma < self.config.low_light_threshold,
        };

        trace!(
            blur = blur_variance,
            shake = shake_magnitude,
            glare = glare.white_pct,
            shift = shift.magnitude,
            "frame measured"
        );

        Ok(Extraction {
            signals,
            glare,
            motion_measured: previous.is_some(),
        })
    }
}

fn mean_luma(histogram: &LumaHistogram) -> f64 {
    if histogram.total() == 0 {
        return 0.0;
    }
    let weighted: f64 = histogram
        .bins()
        .iter()
        .enumerate()
        .map(|(value, &count)| value as f64 * count as f64)
        .sum();
    weighted / histogram.total() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glare::LossOfDetail;
    use image::Luma;

    fn frame(v: u8) -> FrameSample {
        FrameSample::from_luma(GrayImage::from_pixel(24, 24, Luma([v]))).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = SignalConfig::default();
        assert_eq!(config.blur_threshold, 50.0);
        assert_eq!(config.shake_threshold, 5.0);
        assert_eq!(config.low_light_threshold, 70.0);
        assert_eq!(config.flow, FlowParams::default());
    }

    #[test]
    fn test_config_builder() {
        let config = SignalConfig::new()
            .with_blur_threshold(80.0)
            .with_shake_threshold(1.1)
            .with_glare(GlareConfig::LossOfDetail(LossOfDetail::tuned()));
        assert_eq!(config.blur_threshold, 80.0);
        assert_eq!(config.shake_threshold, 1.1);
        assert_eq!(SignalExtractor::new(config).glare_strategy(), "loss_of_detail");
    }

    #[test]
    fn test_config_partial_json() {
        let config: SignalConfig = serde_json::from_str(r#"{"shake_threshold": 2.5}"#).unwrap();
        assert_eq!(config.shake_threshold, 2.5);
        assert_eq!(config.blur_threshold, DEFAULT_BLUR_THRESHOLD);
    }

    #[test]
    fn test_first_frame_skips_motion() {
        let extractor = SignalExtractor::new(SignalConfig::default());
        let out = extractor.extract(&frame(128), None).unwrap();
        assert!(!out.motion_measured);
        assert_eq!(out.signals.shake_magnitude, 0.0);
        assert_eq!(out.signals.shift(), DirectionalShift::ZERO);
    }

    #[test]
    fn test_low_light() {
        let extractor = SignalExtractor::new(SignalConfig::default());
        let dark = extractor.extract(&frame(30), None).unwrap();
        assert!(dark.signals.is_low_light);
        assert!((dark.signals.mean_luma - 30.0).abs() < 1e-9);
        let bright = extractor.extract(&frame(180), None).unwrap();
        assert!(!bright.signals.is_low_light);
    }

    #[test]
    fn test_glare_flag_follows_strategy() {
        let extractor = SignalExtractor::new(SignalConfig::default());
        let out = extractor.extract(&frame(255), None).unwrap();
        assert!(out.signals.is_glare);
        assert_eq!(out.signals.glare_pct, 100.0);
        assert_eq!(out.glare.buckets.len(), 26);
    }

    #[test]
    fn test_mismatched_previous_frame() {
        let extractor = SignalExtractor::new(SignalConfig::default());
        let prev = GrayImage::new(10, 10);
        assert!(extractor.extract(&frame(10), Some(&prev)).is_err());
    }
}
