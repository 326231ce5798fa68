//! # AEGIS Signals
//!
//! Stateless per-frame measurements for camera feed integrity.
//!
//! ## Threat Coverage
//!
//! | Signal | Module | Physical attack it exposes |
//! |--------|--------|----------------------------|
//! | Blur | [`blur`] | Lens smeared, covered or refocused |
//! | Shake | [`motion`] | Camera knocked or vibrated |
//! | Glare | [`glare`] | Light source aimed into the lens |
//! | Directional shift | [`motion`] | Camera turned away (fed into the tracker) |
//! | Low light | [`SignalExtractor`] | Lights cut or lens shaded |
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      SignalExtractor                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  FrameSample ──▶ luma ──┬──▶ Laplacian variance  (blur)      │
//! │                         ├──▶ LumaHistogram ──▶ GlareStrategy │
//! │  previous luma ─────────┴──▶ dense_flow ──┬──▶ mean (shake)  │
//! │                                           └──▶ median (shift)│
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing in this crate keeps state between calls. The caller owns the
//! previous frame's luminance plane and passes it back in.
//!
//! ## Usage
//!
//! ```rust
//! use aegis_signals::{FrameSample, SignalConfig, SignalExtractor};
//! use image::{GrayImage, Luma};
//!
//! let extractor = SignalExtractor::new(SignalConfig::default());
//! let frame = FrameSample::from_luma(GrayImage::from_pixel(16, 16, Luma([255])))?;
//! let out = extractor.extract(&frame, None)?;
//! assert!(out.signals.is_glare);
//! # Ok::<(), aegis_signals::SignalError>(())
//! ```

pub mod blur;
mod error;
mod extractor;
pub mod flow;
mod frame;
pub mod glare;
pub mod motion;

pub use error::{Result, SignalError};
pub use extractor::{
    Extraction, SignalConfig, SignalExtractor, SignalVector, DEFAULT_LOW_LIGHT_THRESHOLD,
};
pub use flow::{dense_flow, FlowField, FlowParams};
pub use frame::{luminance, FrameSample};
pub use glare::{
    GlareConfig, GlareReading, GlareStrategy, LossOfDetail, LumaHistogram, ToneBreakdown,
    WhitePercentage,
};
pub use motion::DirectionalShift;

// Re-exported so callers can build frames without naming `image` directly.
pub use image;
