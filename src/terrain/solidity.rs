//! CPU-side solidity cache
//!
//! One bit per source pixel: set = solid ground, clear = empty. Built once
//! from the source image alpha and carved in place by explosions. The grid is
//! never resized and never persisted.

use std::ops::RangeInclusive;

use bitvec::prelude::*;
use tracing::{debug, error, warn};

use crate::constants::terrain::{ALPHA_OFFSET, BYTES_PER_PIXEL, SOLID_ALPHA_THRESHOLD};
use crate::terrain::image::{expected_len, PixelSource};
use crate::terrain::mapping::WorldMapping;
use crate::util::vec2::Vec2;

/// Pixel region touched by a carve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarvedRegion {
    /// Columns covered by the circle's bounding box
    pub columns: RangeInclusive<u32>,
    /// Rows covered by the circle's bounding box
    pub rows: RangeInclusive<u32>,
    /// Pixels that flipped from solid to empty
    pub cleared: usize,
}

/// Boolean solidity grid, index = row * width + col
#[derive(Debug, Clone)]
pub struct SolidityField {
    mapping: WorldMapping,
    bits: BitVec,
}

impl SolidityField {
    /// Uninitialized field: no grid, every query answers "empty"
    pub fn empty(origin: Vec2, world_size: Vec2) -> Self {
        Self {
            mapping: WorldMapping::new(origin, world_size, 0, 0),
            bits: BitVec::new(),
        }
    }

    /// Full-size grid with every pixel empty
    pub fn cleared(mapping: WorldMapping) -> Self {
        let len = mapping.width() as usize * mapping.height() as usize;
        Self {
            mapping,
            bits: bitvec![0; len],
        }
    }

    /// Classify an RGBA8 buffer. Returns None if the length does not match the mapping.
    pub fn from_rgba(mapping: WorldMapping, rgba: &[u8]) -> Option<Self> {
        if rgba.len() != expected_len(mapping.width(), mapping.height()) {
            return None;
        }
        let bits: BitVec = rgba
            .chunks_exact(BYTES_PER_PIXEL)
            .map(|px| px[ALPHA_OFFSET] > SOLID_ALPHA_THRESHOLD)
            .collect();
        Some(Self { mapping, bits })
    }

    /// Build from a pixel source, falling back to the readback path when
    /// bulk data is unavailable. If both paths fail the grid starts all empty.
    pub fn build(source: &dyn PixelSource, origin: Vec2, world_size: Vec2) -> Self {
        let (width, height) = source.dimensions();
        let mapping = WorldMapping::new(origin, world_size, width, height);

        match source.bulk_rgba() {
            Some(bulk) => {
                if let Some(field) = Self::from_rgba(mapping, &bulk) {
                    debug!("SolidityField: built {}x{} from bulk pixel data", width, height);
                    return field;
                }
                warn!(
                    "SolidityField: bulk pixel data has {} bytes, expected {}; trying readback",
                    bulk.len(),
                    expected_len(width, height)
                );
            }
            None => {
                warn!("SolidityField: bulk pixel data unavailable, trying readback");
            }
        }

        if let Some(pixels) = source.readback_rgba() {
            if let Some(field) = Self::from_rgba(mapping, &pixels) {
                debug!("SolidityField: built {}x{} from readback", width, height);
                return field;
            }
            error!(
                "SolidityField: readback returned {} bytes, expected {}",
                pixels.len(),
                expected_len(width, height)
            );
        } else {
            error!("SolidityField: readback unavailable");
        }

        warn!("SolidityField: terrain starts empty until pixel data is available");
        Self::cleared(mapping)
    }

    pub fn mapping(&self) -> &WorldMapping {
        &self.mapping
    }

    pub fn width(&self) -> u32 {
        self.mapping.width()
    }

    pub fn height(&self) -> u32 {
        self.mapping.height()
    }

    /// True when the grid holds no pixels
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    #[inline]
    fn index(&self, col: u32, row: u32) -> usize {
        row as usize * self.mapping.width() as usize + col as usize
    }

    /// Solidity of a pixel; out-of-range pixels are empty
    #[inline]
    pub fn get(&self, col: u32, row: u32) -> bool {
        if col >= self.width() || row >= self.height() {
            return false;
        }
        self.bits[self.index(col, row)]
    }

    pub fn set(&mut self, col: u32, row: u32, solid: bool) {
        if col >= self.width() || row >= self.height() {
            return;
        }
        let idx = self.index(col, row);
        self.bits.set(idx, solid);
    }

    /// Number of solid pixels
    pub fn solid_count(&self) -> usize {
        self.bits.count_ones()
    }

    /// First solid row in a column, scanning top to bottom
    pub fn column_top(&self, col: u32) -> Option<u32> {
        if col >= self.width() {
            return None;
        }
        (0..self.height()).find(|&row| self.bits[self.index(col, row)])
    }

    /// Whether a world position lies in solid terrain (clamped to the map)
    pub fn is_solid(&self, world: Vec2) -> bool {
        if self.is_empty() {
            return false;
        }
        match self.mapping.world_to_pixel(world) {
            Some((col, row)) => self.bits[self.index(col, row)],
            None => false,
        }
    }

    /// Clear every pixel whose square comes within `radius` world units of
    /// `center`. Only the circle's bounding box is visited.
    ///
    /// Returns None when the circle misses the grid entirely.
    pub fn carve(&mut self, center: Vec2, radius: f32) -> Option<CarvedRegion> {
        if self.is_empty() || !(radius > 0.0) || !radius.is_finite() || !center.is_finite() {
            return None;
        }

        let ppu_x = self.mapping.pixels_per_unit_x();
        let ppu_y = self.mapping.pixels_per_unit_y();
        let c = self.mapping.world_to_pixel_f(center);
        let rx = radius * ppu_x;
        let ry = radius * ppu_y;

        let max_col = self.width() as i64 - 1;
        let max_row = self.height() as i64 - 1;
        let col_min = ((c.x - rx).floor() as i64).max(0);
        let col_max = ((c.x + rx).ceil() as i64).min(max_col);
        let row_min = ((c.y - ry).floor() as i64).max(0);
        let row_max = ((c.y + ry).ceil() as i64).min(max_row);
        if col_min > col_max || row_min > row_max {
            return None;
        }

        let radius_sq = radius * radius;
        let mut cleared = 0;
        for row in row_min..=row_max {
            // Nearest point of the pixel square to the center, converted back to world units
            let ny = c.y.clamp(row as f32, row as f32 + 1.0);
            let dy = (ny - c.y) / ppu_y;
            let dy_sq = dy * dy;
            if dy_sq > radius_sq {
                continue;
            }
            for col in col_min..=col_max {
                let nx = c.x.clamp(col as f32, col as f32 + 1.0);
                let dx = (nx - c.x) / ppu_x;
                if dx * dx + dy_sq <= radius_sq {
                    let idx = self.index(col as u32, row as u32);
                    if self.bits[idx] {
                        self.bits.set(idx, false);
                        cleared += 1;
                    }
                }
            }
        }

        Some(CarvedRegion {
            columns: col_min as u32..=col_max as u32,
            rows: row_min as u32..=row_max as u32,
            cleared,
        })
    }
}
