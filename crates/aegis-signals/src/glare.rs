//! # Glare Detection Strategies
//!
//! A light aimed into the lens (torch, laser pointer, reflected sun) blinds
//! the sensor without touching the camera. Two histogram heuristics catch
//! it, exposed as interchangeable [`GlareStrategy`] implementations:
//!
//! | Strategy | Fires when | Best at |
//! |----------|------------|---------|
//! | [`WhitePercentage`] | `> threshold_pct` of pixels are at least `white_level` | Plain highlight blow-out |
//! | [`LossOfDetail`] | many dark pixels AND some bright pixels AND few mid-tones | Washed-out / crushed frames |
//!
//! The loss-of-detail strategy reflects how auto-exposure reacts to a bright
//! source in frame: the sensor stops down, the scene sinks into shadow and
//! only the source itself stays bright. A pure-white count misses that case.
//!
//! Both strategies read a single 256-bin [`LumaHistogram`], and every reading
//! carries the coarse 26-bucket histogram for display collaborators.

use crate::error::Result;
use crate::frame::{ensure_valid, FrameSample};
use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Intensity at and above which a pixel counts as pure white.
pub const WHITE_LEVEL: u8 = 250;

/// Default percentage of pure-white pixels that signals glare.
pub const DEFAULT_GLARE_THRESHOLD_PCT: f64 = 10.0;

/// Number of coarse buckets reported for display (~10 intensity levels each).
pub const HISTOGRAM_BUCKETS: usize = 26;

/// A 256-bin luminance histogram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LumaHistogram {
    bins: [u64; 256],
    total: u64,
}

impl LumaHistogram {
    /// Counts every pixel of a luminance plane.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SignalError::InvalidFrame`] for an empty plane.
    pub fn from_luma(gray: &GrayImage) -> Result<Self> {
        ensure_valid(gray)?;
        let mut bins = [0u64; 256];
        for &v in gray.as_raw() {
            bins[usize::from(v)] += 1;
        }
        Ok(Self {
            bins,
            total: gray.as_raw().len() as u64,
        })
    }

    /// Total number of pixels counted.
    #[inline]
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.total
    }

    /// Raw per-intensity counts.
    #[inline]
    #[must_use]
    pub const fn bins(&self) -> &[u64; 256] {
        &self.bins
    }

    /// Number of pixels with intensity in `lo..hi`.
    #[must_use]
    pub fn count_range(&self, lo: usize, hi: usize) -> u64 {
        let hi = hi.min(256);
        if lo >= hi {
            return 0;
        }
        self.bins[lo..hi].iter().sum()
    }

    /// Percentage of pixels with intensity in `lo..hi`.
    #[must_use]
    pub fn percentage(&self, lo: usize, hi: usize) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.count_range(lo, hi) as f64 / self.total as f64 * 100.0
    }

    /// Re-bins into `buckets` equal-width ranges over `[0, 256)`.
    #[must_use]
    pub fn bucketed(&self, buckets: usize) -> Vec<u64> {
        let buckets = buckets.max(1);
        let mut out = vec![0u64; buckets];
        for (value, &count) in self.bins.iter().enumerate() {
            out[value * buckets / 256] += count;
        }
        out
    }
}

/// Dark / mid / bright split used by the loss-of-detail metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToneBreakdown {
    /// Percentage of pixels below the dark cut.
    pub dark_pct: f64,
    /// Percentage of pixels between the cuts.
    pub mid_pct: f64,
    /// Percentage of pixels at or above the bright cut.
    pub bright_pct: f64,
}

/// Output of a glare strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlareReading {
    /// Whether the strategy judged the frame glare-blinded.
    pub is_glare: bool,
    /// Percentage of bright pixels as the strategy defines them.
    pub white_pct: f64,
    /// Tone split, for strategies that compute one.
    pub tones: Option<ToneBreakdown>,
    /// Coarse histogram with [`HISTOGRAM_BUCKETS`] buckets.
    pub buckets: Vec<u64>,
}

/// A glare heuristic over a luminance histogram.
pub trait GlareStrategy: fmt::Debug + Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Judges one frame's histogram.
    fn assess(&self, histogram: &LumaHistogram) -> GlareReading;
}

/// Fires when too many pixels are pure white.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhitePercentage {
    /// Intensity at and above which a pixel is white.
    pub white_level: u8,
    /// Percentage of white pixels that signals glare.
    pub threshold_pct: f64,
}

impl Default for WhitePercentage {
    fn default() -> Self {
        Self {
            white_level: WHITE_LEVEL,
            threshold_pct: DEFAULT_GLARE_THRESHOLD_PCT,
        }
    }
}

impl GlareStrategy for WhitePercentage {
    fn name(&self) -> &'static str {
        "white_percentage"
    }

    fn assess(&self, histogram: &LumaHistogram) -> GlareReading {
        let white_pct = histogram.percentage(usize::from(self.white_level), 256);
        GlareReading {
            is_glare: white_pct > self.threshold_pct,
            white_pct,
            tones: None,
            buckets: histogram.bucketed(HISTOGRAM_BUCKETS),
        }
    }
}

/// Fires when the frame has lost its mid-tones to shadow and highlight.
///
/// All three conditions must hold:
/// `dark_pct > dark_pct_min`, `bright_pct > bright_pct_min` and
/// `mid_pct < mid_pct_max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LossOfDetail {
    /// Intensities below this are dark.
    pub dark_cut: u8,
    /// Intensities at or above this are bright.
    pub bright_cut: u8,
    /// Minimum dark percentage.
    pub dark_pct_min: f64,
    /// Minimum bright percentage.
    pub bright_pct_min: f64,
    /// Maximum mid-tone percentage.
    pub mid_pct_max: f64,
}

impl LossOfDetail {
    /// Field-tuned cut points (50 / 252) for indoor cameras facing windows.
    #[must_use]
    pub fn tuned() -> Self {
        Self {
            dark_cut: 50,
            bright_cut: 252,
            ..Self::default()
        }
    }
}

impl Default for LossOfDetail {
    fn default() -> Self {
        Self {
            dark_cut: 40,
            bright_cut: 250,
            dark_pct_min: 30.0,
            bright_pct_min: 1.0,
            mid_pct_max: 60.0,
        }
    }
}

impl GlareStrategy for LossOfDetail {
    fn name(&self) -> &'static str {
        "loss_of_detail"
    }

    fn assess(&self, histogram: &LumaHistogram) -> GlareReading {
        let dark = usize::from(self.dark_cut);
        let bright = usize::from(self.bright_cut).max(dark);
        let tones = ToneBreakdown {
            dark_pct: histogram.percentage(0, dark),
            mid_pct: histogram.percentage(dark, bright),
            bright_pct: histogram.percentage(bright, 256),
        };
        GlareReading {
            is_glare: tones.dark_pct > self.dark_pct_min
                && tones.bright_pct > self.bright_pct_min
                && tones.mid_pct < self.mid_pct_max,
            white_pct: tones.bright_pct,
            tones: Some(tones),
            buckets: histogram.bucketed(HISTOGRAM_BUCKETS),
        }
    }
}

/// Serializable choice of glare strategy.
///
/// ```json
/// { "strategy": "loss_of_detail", "dark_cut": 50, "bright_cut": 252 }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum GlareConfig {
    /// See [`WhitePercentage`].
    WhitePercentage(WhitePercentage),
    /// See [`LossOfDetail`].
    LossOfDetail(LossOfDetail),
}

impl GlareConfig {
    /// Builds the configured strategy.
    #[must_use]
    pub fn build(&self) -> Box<dyn GlareStrategy> {
        match *self {
            Self::WhitePercentage(s) => Box::new(s),
            Self::LossOfDetail(s) => Box::new(s),
        }
    }
}

impl Default for GlareConfig {
    fn default() -> Self {
        Self::WhitePercentage(WhitePercentage::default())
    }
}

/// Pure-white glare check on a full frame.
///
/// # Returns
///
/// `(is_glare, white_pct, buckets)` where `buckets` is the
/// [`HISTOGRAM_BUCKETS`]-bucket histogram.
///
/// # Errors
///
/// Returns [`crate::SignalError::InvalidFrame`] for an empty frame.
pub fn check_glare(frame: &FrameSample, threshold_pct: f64) -> Result<(bool, f64, Vec<u64>)> {
    let histogram = LumaHistogram::from_luma(frame.luma())?;
    let strategy = WhitePercentage {
        threshold_pct,
        ..WhitePercentage::default()
    };
    let reading = strategy.assess(&histogram);
    Ok((reading.is_glare, reading.white_pct, reading.buckets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn uniform(v: u8) -> LumaHistogram {
        LumaHistogram::from_luma(&GrayImage::from_pixel(10, 10, Luma([v]))).unwrap()
    }

    /// 100 pixels: `dark` at 10, `bright` at 255, the rest at 128.
    fn mixed(dark: u32, bright: u32) -> LumaHistogram {
        let gray = GrayImage::from_fn(10, 10, |x, y| {
            let i = y * 10 + x;
            if i < dark {
                Luma([10])
            } else if i < dark + bright {
                Luma([255])
            } else {
                Luma([128])
            }
        });
        LumaHistogram::from_luma(&gray).unwrap()
    }

    #[test]
    fn test_bucketing_matches_even_split() {
        let hist = uniform(255);
        let buckets = hist.bucketed(HISTOGRAM_BUCKETS);
        assert_eq!(buckets.len(), 26);
        assert_eq!(buckets[25], 100);
        assert_eq!(uniform(0).bucketed(HISTOGRAM_BUCKETS)[0], 100);
        // 9.846 levels per bucket
        assert_eq!(uniform(10).bucketed(HISTOGRAM_BUCKETS)[1], 100);
    }

    #[test]
    fn test_white_percentage() {
        let strategy = WhitePercentage::default();
        assert!(!strategy.assess(&uniform(0)).is_glare);
        assert!(strategy.assess(&uniform(255)).is_glare);
        assert!(!strategy.assess(&uniform(249)).is_glare);
        let reading = strategy.assess(&mixed(0, 11));
        assert!(reading.is_glare);
        assert!((reading.white_pct - 11.0).abs() < 1e-9);
        assert!(!strategy.assess(&mixed(0, 10)).is_glare);
    }

    #[test]
    fn test_loss_of_detail_requires_all_three() {
        let strategy = LossOfDetail::default();
        // 40 dark, 5 bright, 55 mid
        assert!(strategy.assess(&mixed(40, 5)).is_glare);
        // not enough dark
        assert!(!strategy.assess(&mixed(20, 5)).is_glare);
        // no bright
        assert!(!strategy.assess(&mixed(40, 0)).is_glare);
        // too much mid-tone
        assert!(!strategy.assess(&mixed(31, 2)).is_glare);
    }

    #[test]
    fn test_loss_of_detail_extremes() {
        let strategy = LossOfDetail::default();
        assert!(!strategy.assess(&uniform(0)).is_glare);
        assert!(!strategy.assess(&uniform(255)).is_glare);
        let tones = strategy.assess(&uniform(0)).tones.unwrap();
        assert_eq!(tones.dark_pct, 100.0);
    }

    #[test]
    fn test_tuned_cut_points() {
        let tuned = LossOfDetail::tuned();
        assert_eq!((tuned.dark_cut, tuned.bright_cut), (50, 252));
        // 45 is mid-tone by default, dark once tuned
        let hist = uniform(45);
        assert_eq!(LossOfDetail::default().assess(&hist).tones.unwrap().mid_pct, 100.0);
        assert_eq!(tuned.assess(&hist).tones.unwrap().dark_pct, 100.0);
    }

    #[test]
    fn test_config_selects_strategy() {
        let json = r#"{"strategy":"loss_of_detail","dark_cut":50,"bright_cut":252}"#;
        let config: GlareConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config, GlareConfig::LossOfDetail(LossOfDetail::tuned()));
        assert_eq!(config.build().name(), "loss_of_detail");
        assert_eq!(GlareConfig::default().build().name(), "white_percentage");
    }
}
