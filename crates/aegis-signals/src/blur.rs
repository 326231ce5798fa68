//! # Laplacian-Variance Blur Detection
//!
//! A defocused, smeared or deliberately obscured lens removes high spatial
//! frequencies. The second derivative of the luminance plane responds only
//! to those frequencies, so the spread of the Laplacian response across the
//! frame is a direct sharpness score.
//!
//! ## Threat Model
//!
//! | Attack | Effect on the frame | Laplacian variance |
//! |--------|---------------------|--------------------|
//! | Vaseline / tape on lens | Uniform defocus | Collapses |
//! | Refocusing the lens | Global blur | Collapses |
//! | Fogged housing | Low contrast, soft edges | Drops sharply |
//!
//! ## Algorithm
//!
//! ```text
//!            | 0  1  0 |
//! L = I  *   | 1 -4  1 |      var(L) = mean(L²) - mean(L)²
//!            | 0  1  0 |
//! ```
//!
//! Borders use reflect-101 so the image edge never reads as a step.
//!
//! ## References
//!
//! - Pech-Pacheco, J. L. et al. (2000). "Diatom autofocusing in brightfield
//!   microscopy: a comparative study". *ICPR 2000*, vol. 3, 314-317.

use crate::error::Result;
use crate::frame::{ensure_valid, reflect_101};
use image::GrayImage;

/// Default variance below which a frame counts as blurred.
///
/// Tuned for 640x480 consumer cameras; higher resolutions with the same
/// optics produce lower per-pixel variance and need a lower threshold.
pub const DEFAULT_BLUR_THRESHOLD: f64 = 50.0;

/// Variance of the 4-neighbour Laplacian over every pixel.
///
/// # Errors
///
/// Returns [`crate::SignalError::InvalidFrame`] for an empty plane.
///
/// # Example
///
/// ```rust
/// use aegis_signals::blur::laplacian_variance;
/// use image::{GrayImage, Luma};
///
/// let flat = GrayImage::from_pixel(8, 8, Luma([128]));
/// assert_eq!(laplacian_variance(&flat)?, 0.0);
/// # Ok::<(), aegis_signals::SignalError>(())
/// ```
pub fn laplacian_variance(gray: &GrayImage) -> Result<f64> {
    ensure_valid(gray)?;

    let (w, h) = (gray.width() as usize, gray.height() as usize);
    let px = gray.as_raw();
    let at = |x: isize, y: isize| -> f64 {
        f64::from(px[reflect_101(y, h) * w + reflect_101(x, w)])
    };

    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for y in 0..h as isize {
        for x in 0..w as isize {
            let response =
                at(x - 1, y) + at(x + 1, y) + at(x, y - 1) + at(x, y + 1) - 4.0 * at(x, y);
            sum += response;
            sum_sq += response * response;
        }
    }

    let n = (w * h) as f64;
    let mean = sum / n;
    Ok((sum_sq / n - mean * mean).max(0.0))
}

/// Checks whether a frame is blurred.
///
/// # Returns
///
/// `(is_blurred, variance)`, with `is_blurred = variance < threshold`.
///
/// # Errors
///
/// Returns [`crate::SignalError::InvalidFrame`] for an empty plane.
pub fn check_blur(gray: &GrayImage, threshold: f64) -> Result<(bool, f64)> {
    let variance = laplacian_variance(gray)?;
    Ok((variance < threshold, variance))
}
