//! # Dense Pyramidal Optical Flow
//!
//! Shake and reposition detection both need a per-pixel motion field between
//! consecutive luminance frames. This module estimates one with a dense,
//! iterative Lucas-Kanade solver run coarse-to-fine over an image pyramid.
//!
//! ## Algorithm
//!
//! ```text
//!   level 2 (1/4)   ──solve──▶ flow₂
//!                                │ ×2 upsample
//!   level 1 (1/2)   ──solve──▶ flow₁
//!                                │ ×2 upsample
//!   level 0 (full)  ──solve──▶ flow₀
//! ```
//!
//! At each level, for every pixel, the window-summed structure tensor
//!
//! ```text
//! G = Σ | Ix·Ix  Ix·Iy |        b = Σ | Ix·(I₀ - I₁(x + d)) |
//!       | Ix·Iy  Iy·Iy |              | Iy·(I₀ - I₁(x + d)) |
//! ```
//!
//! gives the update `δ = G⁻¹ b`, applied `iterations` times with the second
//! frame re-sampled bilinearly at the current estimate (sub-pixel). Pixels
//! whose tensor is ill-conditioned (flat or single-edge neighbourhoods) keep
//! the estimate inherited from the coarser level.
//!
//! Window sums are computed with integral images, so each iteration is
//! linear in the pixel count regardless of window size.
//!
//! ## References
//!
//! - Lucas, B. D. & Kanade, T. (1981). "An Iterative Image Registration
//!   Technique with an Application to Stereo Vision". *IJCAI '81*, 674-679.
//! - Bouguet, J.-Y. (2000). "Pyramidal Implementation of the Lucas Kanade
//!   Feature Tracker". Intel Corporation, Microprocessor Research Labs.

use crate::error::Result;
use crate::frame::{ensure_same_dimensions, ensure_valid};
use image::GrayImage;
use serde::{Deserialize, Serialize};

/// Minimum eigenvalue of the per-pixel structure tensor, normalised by the
/// window area, below which a pixel is treated as untrackable.
const MIN_EIGEN_PER_PIXEL: f64 = 1e-2;

/// Solver parameters.
///
/// Defaults mirror the field-tested Farneback setup this replaces:
/// 3 pyramid levels at scale 0.5, a 15 px window and 3 iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowParams {
    /// Pyramid levels including the full-resolution image.
    pub levels: usize,
    /// Side of the square integration window, in pixels.
    pub window: usize,
    /// Refinement iterations per level.
    pub iterations: usize,
    /// A level is only built if both sides stay at least this long.
    pub min_level_size: usize,
}

impl FlowParams {
    /// Creates the default parameters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            levels: 3,
            window: 15,
            iterations: 3,
            min_level_size: 16,
        }
    }

    /// Sets the pyramid depth.
    #[must_use]
    pub const fn with_levels(mut self, levels: usize) -> Self {
        self.levels = levels;
        self
    }

    /// Sets the integration window side.
    #[must_use]
    pub const fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    /// Sets the per-level iteration count.
    #[must_use]
    pub const fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }
}

impl Default for FlowParams {
    fn default() -> Self {
        Self::new()
    }
}

/// A dense motion field: one `(u, v)` vector per pixel, in pixels.
///
/// `(u, v)` at `(x, y)` means the content at `(x, y)` in the previous frame
/// appears at `(x + u, y + v)` in the current one.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowField {
    width: usize,
    height: usize,
    u: Vec<f32>,
    v: Vec<f32>,
}

impl FlowField {
    fn zeros(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            u: vec![0.0; width * height],
            v: vec![0.0; width * height],
        }
    }

    /// Field width.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Field height.
    #[inline]
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Motion vector at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is outside the field.
    #[must_use]
    pub fn at(&self, x: usize, y: usize) -> (f32, f32) {
        let i = y * self.width + x;
        (self.u[i], self.v[i])
    }

    /// Iterates `(u, v)` over every pixel in row-major order.
    pub fn vectors(&self) -> impl Iterator<Item = (f32, f32)> + '_ {
        self.u.iter().copied().zip(self.v.iter().copied())
    }

    /// Mean per-pixel motion magnitude.
    #[must_use]
    pub fn mean_magnitude(&self) -> f64 {
        if self.u.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .vectors()
            .map(|(u, v)| f64::from(u).hypot(f64::from(v)))
            .sum();
        total / self.u.len() as f64
    }

    /// Upsamples a coarser field to `width x height`, scaling vectors by 2.
    fn upsample(&self, width: usize, height: usize) -> Self {
        let coarse_u = Plane::from_parts(self.width, self.height, self.u.clone());
        let coarse_v = Plane::from_parts(self.width, self.height, self.v.clone());
        let mut out = Self::zeros(width, height);
        for y in 0..height {
            let cy = (y as f32 + 0.5) * 0.5 - 0.5;
            for x in 0..width {
                let cx = (x as f32 + 0.5) * 0.5 - 0.5;
                let i = y * width + x;
                out.u[i] = 2.0 * coarse_u.sample(cx, cy);
                out.v[i] = 2.0 * coarse_v.sample(cx, cy);
            }
        }
        out
    }
}

/// Floating-point image plane.
#[derive(Debug, Clone)]
struct Plane {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl Plane {
    fn from_parts(width: usize, height: usize, data: Vec<f32>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    fn from_luma(gray: &GrayImage) -> Self {
        Self::from_parts(
            gray.width() as usize,
            gray.height() as usize,
            gray.as_raw().iter().map(|&v| f32::from(v)).collect(),
        )
    }

    #[inline]
    fn at(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    /// Bilinear sample with clamp-to-edge borders.
    fn sample(&self, x: f32, y: f32) -> f32 {
        let max_x = (self.width - 1) as f32;
        let max_y = (self.height - 1) as f32;
        let x = x.clamp(0.0, max_x);
        let y = y.clamp(0.0, max_y);
        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let fx = x - x0 as f32;
        let fy = y - y0 as f32;
        let top = self.at(x0, y0) * (1.0 - fx) + self.at(x1, y0) * fx;
        let bottom = self.at(x0, y1) * (1.0 - fx) + self.at(x1, y1) * fx;
        top * (1.0 - fy) + bottom * fy
    }

    /// Halves both sides by 2x2 box averaging.
    fn downsample(&self) -> Self {
        let width = self.width / 2;
        let height = self.height / 2;
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let sum = self.at(2 * x, 2 * y)
                    + self.at(2 * x + 1, 2 * y)
                    + self.at(2 * x, 2 * y + 1)
                    + self.at(2 * x + 1, 2 * y + 1);
                data.push(sum * 0.25);
            }
        }
        Self::from_parts(width, height, data)
    }

    /// Central-difference gradients with clamped borders.
    fn gradients(&self) -> (Vec<f32>, Vec<f32>) {
        let (w, h) = (self.width, self.height);
        let mut gx = vec![0.0; w * h];
        let mut gy = vec![0.0; w * h];
        for y in 0..h {
            let up = y.saturating_sub(1);
            let down = (y + 1).min(h - 1);
            for x in 0..w {
                let left = x.saturating_sub(1);
                let right = (x + 1).min(w - 1);
                gx[y * w + x] = 0.5 * (self.at(right, y) - self.at(left, y));
                gy[y * w + x] = 0.5 * (self.at(x, down) - self.at(x, up));
            }
        }
        (gx, gy)
    }
}

/// Sums `values` over a `(2r+1)²` window clipped to the image.
fn box_sum(values: &[f64], width: usize, height: usize, radius: usize) -> Vec<f64> {
    let stride = width + 1;
    let mut integral = vec![0.0f64; stride * (height + 1)];
    for y in 0..height {
        let mut row = 0.0;
        for x in 0..width {
            row += values[y * width + x];
            integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row;
        }
    }

    let mut out = vec![0.0; width * height];
    for y in 0..height {
        let y0 = y.saturating_sub(radius);
        let y1 = (y + radius + 1).min(height);
        for x in 0..width {
            let x0 = x.saturating_sub(radius);
            let x1 = (x + radius + 1).min(width);
            out[y * width + x] = integral[y1 * stride + x1] - integral[y0 * stride + x1]
                - integral[y1 * stride + x0]
                + integral[y0 * stride + x0];
        }
    }
    out
}

/// Estimates dense motion from `previous` to `current`.
///
/// # Errors
///
/// Returns [`crate::SignalError::InvalidFrame`] for an empty plane and
/// [`crate::SignalError::DimensionMismatch`] when the frames differ in size.
///
/// # Example
///
/// ```rust
/// use aegis_signals::flow::{dense_flow, FlowParams};
/// use image::{GrayImage, Luma};
///
/// let frame = GrayImage::from_fn(32, 32, |x, y| Luma([((x * 7 + y * 3) % 255) as u8]));
/// let field = dense_flow(&frame, &frame, &FlowParams::default())?;
/// assert_eq!(field.mean_magnitude(), 0.0);
/// # Ok::<(), aegis_signals::SignalError>(())
/// ```
pub fn dense_flow(
    current: &GrayImage,
    previous: &GrayImage,
    params: &FlowParams,
) -> Result<FlowField> {
    ensure_valid(current)?;
    ensure_valid(previous)?;
    ensure_same_dimensions(current, previous)?;

    let mut prev_pyramid = vec![Plane::from_luma(previous)];
    let mut next_pyramid = vec![Plane::from_luma(current)];
    let min_side = params.min_level_size.max(2);
    while prev_pyramid.len() < params.levels.max(1) {
        let top = &prev_pyramid[prev_pyramid.len() - 1];
        if top.width / 2 < min_side || top.height / 2 < min_side {
            break;
        }
        let prev_down = top.downsample();
        let next_down = next_pyramid[next_pyramid.len() - 1].downsample();
        prev_pyramid.push(prev_down);
        next_pyramid.push(next_down);
    }

    let radius = params.window.max(1) / 2;
    let mut field: Option<FlowField> = None;
    for (prev, next) in prev_pyramid.iter().zip(next_pyramid.iter()).rev() {
        let initial = match field.take() {
            Some(coarse) => coarse.upsample(prev.width, prev.height),
            None => FlowField::zeros(prev.width, prev.height),
        };
        field = Some(refine_level(prev, next, initial, radius, params.iterations));
    }

    Ok(field.unwrap_or_else(|| {
        FlowField::zeros(current.width() as usize, current.height() as usize)
    }))
}

/// Runs the Lucas-Kanade iterations at one pyramid level.
fn refine_level(
    prev: &Plane,
    next: &Plane,
    mut field: FlowField,
    radius: usize,
    iterations: usize,
) -> FlowField {
    let (w, h) = (prev.width, prev.height);
    let n = w * h;
    let (gx, gy) = prev.gradients();

    let ixx: Vec<f64> = gx.iter().map(|&g| f64::from(g * g)).collect();
    let iyy: Vec<f64> = gy.iter().map(|&g| f64::from(g * g)).collect();
    let ixy: Vec<f64> = gx.iter().zip(&gy).map(|(&a, &b)| f64::from(a * b)).collect();
    let sxx = box_sum(&ixx, w, h, radius);
    let syy = box_sum(&iyy, w, h, radius);
    let sxy = box_sum(&ixy, w, h, radius);

    let area = ((2 * radius + 1) * (2 * radius + 1)) as f64;
    let max_step = (radius.max(1)) as f64;

    let mut bx = vec![0.0f64; n];
    let mut by = vec![0.0f64; n];
    for _ in 0..iterations {
        for y in 0..h {
            for x in 0..w {
                let i = y * w + x;
                let warped = next.sample(x as f32 + field.u[i], y as f32 + field.v[i]);
                let residual = f64::from(prev.at(x, y) - warped);
                bx[i] = f64::from(gx[i]) * residual;
                by[i] = f64::from(gy[i]) * residual;
            }
        }
        let sbx = box_sum(&bx, w, h, radius);
        let sby = box_sum(&by, w, h, radius);

        for i in 0..n {
            let (a, b, c) = (sxx[i], sxy[i], syy[i]);
            let trace = a + c;
            let det = a * c - b * b;
            let disc = (trace * trace - 4.0 * det).max(0.0).sqrt();
            let min_eigen = 0.5 * (trace - disc);
            if min_eigen / area < MIN_EIGEN_PER_PIXEL || det <= 0.0 {
                continue;
            }
            let du = ((c * sbx[i] - b * sby[i]) / det).clamp(-max_step, max_step);
            let dv = ((a * sby[i] - b * sbx[i]) / det).clamp(-max_step, max_step);
            field.u[i] += du as f32;
            field.v[i] += dv as f32;
        }
    }
    field
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn texture(size: u32, dx: f32, dy: f32) -> GrayImage {
        use std::f32::consts::TAU;
        GrayImage::from_fn(size, size, |x, y| {
            let fx = x as f32 - dx;
            let fy = y as f32 - dy;
            let v = 128.0
                + 50.0 * (TAU * fx / 23.0).sin()
                + 45.0 * (TAU * fy / 19.0).sin()
                + 15.0 * (TAU * (fx + fy) / 13.0).cos();
            Luma([v.round().clamp(0.0, 255.0) as u8])
        })
    }

    #[test]
    fn test_box_sum_clips_window() {
        let ones = vec![1.0; 9];
        let sums = box_sum(&ones, 3, 3, 1);
        assert_eq!(sums, vec![4.0, 6.0, 4.0, 6.0, 9.0, 6.0, 4.0, 6.0, 4.0]);
    }

    #[test]
    fn test_bilinear_sample() {
        let plane = Plane::from_parts(2, 1, vec![0.0, 10.0]);
        assert!((plane.sample(0.25, 0.0) - 2.5).abs() < 1e-6);
        assert_eq!(plane.sample(-3.0, 0.0), 0.0);
        assert_eq!(plane.sample(9.0, 0.0), 10.0);
    }

    #[test]
    fn test_identical_frames_have_no_motion() {
        let frame = texture(64, 0.0, 0.0);
        let field = dense_flow(&frame, &frame, &FlowParams::default()).unwrap();
        assert_eq!(field.mean_magnitude(), 0.0);
        assert_eq!((field.width(), field.height()), (64, 64));
    }

    #[test]
    fn test_flat_frames_have_no_motion() {
        let a = GrayImage::from_pixel(40, 40, Luma([20]));
        let b = GrayImage::from_pixel(40, 40, Luma([200]));
        let field = dense_flow(&b, &a, &FlowParams::default()).unwrap();
        assert_eq!(field.mean_magnitude(), 0.0);
    }

    #[test]
    fn test_recovers_translation_at_centre() {
        let prev = texture(96, 0.0, 0.0);
        let next = texture(96, 2.0, -1.0);
        let field = dense_flow(&next, &prev, &FlowParams::default()).unwrap();
        let (u, v) = field.at(48, 48);
        assert!((u - 2.0).abs() < 0.35, "u = {u}");
        assert!((v + 1.0).abs() < 0.35, "v = {v}");
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let a = GrayImage::new(32, 32);
        let b = GrayImage::new(32, 31);
        assert!(dense_flow(&a, &b, &FlowParams::default()).is_err());
    }

    #[test]
    fn test_tiny_frames_use_single_level() {
        let a = texture(8, 0.0, 0.0);
        let field = dense_flow(&a, &a, &FlowParams::default()).unwrap();
        assert_eq!(field.mean_magnitude(), 0.0);
    }
}
