//! Cosmetic destruction mask
//!
//! The visible map is drawn as `source * mask`; white mask pixels keep the
//! terrain, erased pixels punch a hole. The mask never feeds collision.

use crate::util::vec2::Vec2;

/// Paint used to erase terrain from the mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EraseBrush {
    pub color: [u8; 4],
}

impl Default for EraseBrush {
    fn default() -> Self {
        Self { color: [0, 0, 0, 255] }
    }
}

/// Rendering-side destruction mask
pub trait MaskPainter: Send {
    /// Mask size in pixels (width, height)
    fn dimensions(&self) -> (u32, u32);

    /// Stamp the brush as a circle at `uv` (0..1 across the mask)
    fn erase_circle(&mut self, uv: Vec2, radius_px: f32, brush: &EraseBrush);
}

/// CPU-backed mask, initialised to white (no destruction)
#[derive(Debug, Clone)]
pub struct CpuMask {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 4]>,
}

impl CpuMask {
    pub const CLEAR: [u8; 4] = [255, 255, 255, 255];

    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Self::CLEAR; width as usize * height as usize],
        }
    }

    pub fn pixel(&self, col: u32, row: u32) -> Option<[u8; 4]> {
        if col >= self.width || row >= self.height {
            return None;
        }
        self.pixels.get(row as usize * self.width as usize + col as usize).copied()
    }

    /// Pixels that no longer hold the clear color
    pub fn erased_count(&self) -> usize {
        self.pixels.iter().filter(|p| **p != Self::CLEAR).count()
    }
}

impl MaskPainter for CpuMask {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn erase_circle(&mut self, uv: Vec2, radius_px: f32, brush: &EraseBrush) {
        if self.width == 0 || self.height == 0 || !(radius_px > 0.0) {
            return;
        }
        let cx = uv.x * self.width as f32;
        let cy = uv.y * self.height as f32;

        let col_min = ((cx - radius_px).floor() as i64).max(0);
        let col_max = ((cx + radius_px).ceil() as i64).min(self.width as i64 - 1);
        let row_min = ((cy - radius_px).floor() as i64).max(0);
        let row_max = ((cy + radius_px).ceil() as i64).min(self.height as i64 - 1);
        let r_sq = radius_px * radius_px;

        for row in row_min..=row_max {
            let dy = row as f32 + 0.5 - cy;
            for col in col_min..=col_max {
                let dx = col as f32 + 0.5 - cx;
                if dx * dx + dy * dy <= r_sq {
                    let idx = row as usize * self.width as usize + col as usize;
                    self.pixels[idx] = brush.color;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_mask_is_clear() {
        let mask = CpuMask::new(8, 4);
        assert_eq!(mask.erased_count(), 0);
        assert_eq!(mask.pixel(7, 3), Some(CpuMask::CLEAR));
        assert_eq!(mask.pixel(8, 0), None);
    }

    #[test]
    fn test_erase_circle_center() {
        let mut mask = CpuMask::new(20, 20);
        mask.erase_circle(Vec2::new(0.5, 0.5), 3.0, &EraseBrush::default());
        assert_eq!(mask.pixel(10, 10), Some([0, 0, 0, 255]));
        assert_eq!(mask.pixel(0, 0), Some(CpuMask::CLEAR));
        assert!(mask.erased_count() > 20);
    }

    #[test]
    fn test_erase_near_edge_clamps() {
        let mut mask = CpuMask::new(10, 10);
        mask.erase_circle(Vec2::new(0.0, 0.0), 4.0, &EraseBrush::default());
        assert_eq!(mask.pixel(0, 0), Some([0, 0, 0, 255]));
    }
}
