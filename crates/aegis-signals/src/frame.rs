//! Frame samples and their luminance channel.
//!
//! A [`FrameSample`] is one decoded image plus the luminance plane every
//! metric in this crate works on. Samples are owned by the caller for one
//! processing step; the only thing a session keeps afterwards is the
//! luminance plane, as the reference for the next optical-flow pair.

use crate::error::{Result, SignalError};
use image::{DynamicImage, GrayImage, RgbImage};

/// ITU-R BT.601 luma weights, matching what camera pipelines emit for
/// 8-bit BGR/RGB sources.
const LUMA_R: f32 = 0.299;
const LUMA_G: f32 = 0.587;
const LUMA_B: f32 = 0.114;

/// One decoded frame with its derived luminance channel.
///
/// # Example
///
/// ```rust
/// use aegis_signals::FrameSample;
///
/// let frame = FrameSample::from_raw_rgb(2, 1, vec![255, 255, 255, 0, 0, 0])?;
/// assert_eq!(frame.luma().get_pixel(0, 0).0, [255]);
/// assert_eq!(frame.luma().get_pixel(1, 0).0, [0]);
/// # Ok::<(), aegis_signals::SignalError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FrameSample {
    rgb: RgbImage,
    luma: GrayImage,
}

impl FrameSample {
    /// Wraps an RGB image, computing its luminance.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::InvalidFrame`] for a zero-sized image.
    pub fn from_rgb(rgb: RgbImage) -> Result<Self> {
        ensure_non_empty(rgb.width(), rgb.height())?;
        let luma = luminance(&rgb);
        Ok(Self { rgb, luma })
    }

    /// Builds a sample from a packed RGB8 buffer.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::InvalidFrame`] when the buffer is empty or its
    /// length is not `width * height * 3`.
    pub fn from_raw_rgb(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        ensure_non_empty(width, height)?;
        ensure_len(width, height, 3, data.len())?;
        let rgb = RgbImage::from_raw(width, height, data)
            .ok_or_else(|| SignalError::invalid_frame("buffer does not fit dimensions"))?;
        Self::from_rgb(rgb)
    }

    /// Builds a sample from a packed BGR8 buffer, the channel order most
    /// capture devices deliver.
    ///
    /// # Errors
    ///
    /// Same conditions as [`FrameSample::from_raw_rgb`].
    pub fn from_raw_bgr(width: u32, height: u32, mut data: Vec<u8>) -> Result<Self> {
        ensure_non_empty(width, height)?;
        ensure_len(width, height, 3, data.len())?;
        for px in data.chunks_exact_mut(3) {
            px.swap(0, 2);
        }
        Self::from_raw_rgb(width, height, data)
    }

    /// Wraps an already-grayscale image. The colour plane replicates it.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::InvalidFrame`] for a zero-sized image.
    pub fn from_luma(luma: GrayImage) -> Result<Self> {
        ensure_non_empty(luma.width(), luma.height())?;
        let rgb = DynamicImage::ImageLuma8(luma.clone()).to_rgb8();
        Ok(Self { rgb, luma })
    }

    /// Converts any decoded image.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::InvalidFrame`] for a zero-sized image.
    pub fn from_dynamic(image: DynamicImage) -> Result<Self> {
        match image {
            DynamicImage::ImageLuma8(luma) => Self::from_luma(luma),
            other => Self::from_rgb(other.to_rgb8()),
        }
    }

    /// The colour plane.
    #[inline]
    #[must_use]
    pub fn rgb(&self) -> &RgbImage {
        &self.rgb
    }

    /// The luminance plane.
    #[inline]
    #[must_use]
    pub fn luma(&self) -> &GrayImage {
        &self.luma
    }

    /// Consumes the sample, keeping only the luminance plane.
    #[must_use]
    pub fn into_luma(self) -> GrayImage {
        self.luma
    }

    /// `(width, height)` in pixels.
    #[inline]
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.luma.dimensions()
    }
}

/// Computes the BT.601 luminance of an RGB image, rounded to 8 bits.
#[must_use]
pub fn luminance(rgb: &RgbImage) -> GrayImage {
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let lum = LUMA_R * f32::from(r) + LUMA_G * f32::from(g) + LUMA_B * f32::from(b);
        image::Luma([lum.round().clamp(0.0, 255.0) as u8])
    })
}

/// Rejects zero-sized luminance planes.
pub(crate) fn ensure_valid(gray: &GrayImage) -> Result<()> {
    ensure_non_empty(gray.width(), gray.height())?;
    ensure_len(gray.width(), gray.height(), 1, gray.as_raw().len())
}

/// Rejects a frame pair whose dimensions differ.
pub(crate) fn ensure_same_dimensions(current: &GrayImage, previous: &GrayImage) -> Result<()> {
    if current.dimensions() != previous.dimensions() {
        return Err(SignalError::DimensionMismatch {
            current_width: current.width(),
            current_height: current.height(),
            previous_width: previous.width(),
            previous_height: previous.height(),
        });
    }
    Ok(())
}

fn ensure_non_empty(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(SignalError::invalid_frame(format!(
            "empty frame ({width}x{height})"
        )));
    }
    Ok(())
}

fn ensure_len(width: u32, height: u32, channels: usize, actual: usize) -> Result<()> {
    let expected = width as usize * height as usize * channels;
    if actual != expected {
        return Err(SignalError::invalid_frame(format!(
            "buffer holds {actual} bytes, {width}x{height}x{channels} needs {expected}"
        )));
    }
    Ok(())
}

/// Border index mapping `gfedcb|abcdefgh|gfedcba` (reflect without
/// repeating the edge pixel).
#[inline]
pub(crate) fn reflect_101(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let n = n as isize;
    let mut i = i;
    while i < 0 || i >= n {
        if i < 0 {
            i = -i;
        }
        if i >= n {
            i = 2 * n - 2 - i;
        }
    }
    i as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luminance_weights() {
        let frame = FrameSample::from_raw_rgb(3, 1, vec![255, 0, 0, 0, 255, 0, 0, 0, 255]).unwrap();
        let luma = frame.luma();
        assert_eq!(luma.get_pixel(0, 0).0[0], 76);
        assert_eq!(luma.get_pixel(1, 0).0[0], 150);
        assert_eq!(luma.get_pixel(2, 0).0[0], 29);
    }

    #[test]
    fn test_bgr_is_swapped() {
        let rgb = FrameSample::from_raw_rgb(1, 1, vec![255, 0, 0]).unwrap();
        let bgr = FrameSample::from_raw_bgr(1, 1, vec![0, 0, 255]).unwrap();
        assert_eq!(rgb.luma(), bgr.luma());
        assert_eq!(bgr.rgb().get_pixel(0, 0).0, [255, 0, 0]);
    }

    #[test]
    fn test_empty_frame_rejected() {
        let err = FrameSample::from_raw_rgb(0, 4, Vec::new()).unwrap_err();
        assert!(matches!(err, SignalError::InvalidFrame { .. }));
    }

    #[test]
    fn test_short_buffer_rejected() {
        let err = FrameSample::from_raw_rgb(4, 4, vec![0; 10]).unwrap_err();
        assert!(matches!(err, SignalError::InvalidFrame { .. }));
    }

    #[test]
    fn test_from_luma_keeps_plane() {
        let gray = GrayImage::from_pixel(4, 3, image::Luma([42]));
        let frame = FrameSample::from_luma(gray.clone()).unwrap();
        assert_eq!(frame.luma(), &gray);
        assert_eq!(frame.dimensions(), (4, 3));
        assert_eq!(frame.rgb().get_pixel(3, 2).0, [42, 42, 42]);
    }

    #[test]
    fn test_reflect_101() {
        assert_eq!(reflect_101(-1, 5), 1);
        assert_eq!(reflect_101(-2, 5), 2);
        assert_eq!(reflect_101(5, 5), 3);
        assert_eq!(reflect_101(6, 5), 2);
        assert_eq!(reflect_101(2, 5), 2);
        assert_eq!(reflect_101(-1, 1), 0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = GrayImage::new(4, 4);
        let b = GrayImage::new(4, 5);
        assert!(matches!(
            ensure_same_dimensions(&a, &b),
            Err(SignalError::DimensionMismatch { .. })
        ));
    }
}
