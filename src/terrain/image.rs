//! Source image access for terrain construction
//!
//! Terrain solidity is read from the alpha channel of an RGBA8 image
//! (row-major, 4 bytes per pixel, alpha at byte offset 3). Bulk access to the
//! pixel buffer may be unavailable depending on asset streaming state, so a
//! source can also offer a slower readback path that renders the image
//! off-screen and samples it back.

use std::borrow::Cow;

use crate::constants::terrain::BYTES_PER_PIXEL;

/// Provider of RGBA8 pixels for a terrain source image
pub trait PixelSource {
    /// Image size in pixels (width, height)
    fn dimensions(&self) -> (u32, u32);

    /// Direct access to the full pixel buffer, if it is resident
    fn bulk_rgba(&self) -> Option<Cow<'_, [u8]>>;

    /// Fallback path: render off-screen and read the pixels back
    fn readback_rgba(&self) -> Option<Vec<u8>> {
        None
    }
}

/// In-memory RGBA8 image
#[derive(Debug, Clone)]
pub struct RgbaImage {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl RgbaImage {
    /// Wrap an existing buffer. Returns None if the length does not match.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != expected_len(width, height) {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    /// Image filled with a single color
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = width as usize * height as usize;
        let mut data = Vec::with_capacity(pixels * BYTES_PER_PIXEL);
        for _ in 0..pixels {
            data.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Build an image from a per-pixel alpha function `(col, row) -> alpha`
    pub fn from_alpha_fn(width: u32, height: u32, mut alpha: impl FnMut(u32, u32) -> u8) -> Self {
        let mut data = Vec::with_capacity(expected_len(width, height));
        for row in 0..height {
            for col in 0..width {
                data.extend_from_slice(&[255, 255, 255, alpha(col, row)]);
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn set_alpha(&mut self, col: u32, row: u32, alpha: u8) {
        if col >= self.width || row >= self.height {
            return;
        }
        let idx = (row as usize * self.width as usize + col as usize) * BYTES_PER_PIXEL;
        self.data[idx + 3] = alpha;
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

impl PixelSource for RgbaImage {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn bulk_rgba(&self) -> Option<Cow<'_, [u8]>> {
        Some(Cow::Borrowed(&self.data))
    }
}

/// Byte length of an RGBA8 buffer with the given dimensions
pub fn expected_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * BYTES_PER_PIXEL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_length_check() {
        assert!(RgbaImage::from_raw(2, 2, vec![0; 16]).is_some());
        assert!(RgbaImage::from_raw(2, 2, vec![0; 15]).is_none());
    }

    #[test]
    fn test_from_alpha_fn_layout() {
        let image = RgbaImage::from_alpha_fn(3, 2, |col, row| (row * 3 + col) as u8);
        let data = image.bulk_rgba().unwrap();
        // Alpha of pixel (col 2, row 1) sits at ((1 * 3) + 2) * 4 + 3
        assert_eq!(data[(3 + 2) * 4 + 3], 5);
        assert_eq!(data.len(), 24);
    }

    #[test]
    fn test_set_alpha_out_of_bounds_ignored() {
        let mut image = RgbaImage::filled(2, 2, [0, 0, 0, 255]);
        image.set_alpha(5, 5, 0);
        image.set_alpha(1, 1, 0);
        let data = image.bulk_rgba().unwrap();
        assert_eq!(data[15], 0);
        assert_eq!(data[3], 255);
    }
}
