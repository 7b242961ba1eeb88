use crate::util::vec2::Vec2;

/// Affine mapping between world space and the terrain pixel grid
///
/// The map rectangle is centered on `origin` and spans `world_size`.
/// Column 0 is the left edge; row 0 is the top edge (maximum world height).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldMapping {
    origin: Vec2,
    world_size: Vec2,
    width: u32,
    height: u32,
}

impl WorldMapping {
    pub fn new(origin: Vec2, world_size: Vec2, width: u32, height: u32) -> Self {
        Self {
            origin,
            world_size,
            width,
            height,
        }
    }

    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    pub fn world_size(&self) -> Vec2 {
        self.world_size
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// True when there is no grid to map onto
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// World position to UV without clamping (u right, v down)
    pub fn world_to_uv_unclamped(&self, world: Vec2) -> Vec2 {
        let left = self.origin.x - self.world_size.x * 0.5;
        let bottom = self.origin.y - self.world_size.y * 0.5;
        Vec2::new(
            (world.x - left) / self.world_size.x,
            1.0 - (world.y - bottom) / self.world_size.y,
        )
    }

    /// World position to UV, clamped to [0, 1]
    pub fn world_to_uv(&self, world: Vec2) -> Vec2 {
        self.world_to_uv_unclamped(world).clamp(Vec2::ZERO, Vec2::ONE)
    }

    /// World position to continuous pixel coordinates (unclamped)
    pub fn world_to_pixel_f(&self, world: Vec2) -> Vec2 {
        let uv = self.world_to_uv_unclamped(world);
        Vec2::new(uv.x * self.width as f32, uv.y * self.height as f32)
    }

    /// World position to the (col, row) of the containing pixel, clamped to the grid
    pub fn world_to_pixel(&self, world: Vec2) -> Option<(u32, u32)> {
        if self.is_empty() {
            return None;
        }
        let uv = self.world_to_uv(world);
        let col = ((uv.x * self.width as f32) as i64).clamp(0, self.width as i64 - 1);
        let row = ((uv.y * self.height as f32) as i64).clamp(0, self.height as i64 - 1);
        Some((col as u32, row as u32))
    }

    /// Pixels per world unit along x
    pub fn pixels_per_unit_x(&self) -> f32 {
        self.width as f32 / self.world_size.x
    }

    /// Pixels per world unit along y
    pub fn pixels_per_unit_y(&self) -> f32 {
        self.height as f32 / self.world_size.y
    }

    /// World x of a (possibly fractional) column edge
    pub fn column_to_world_x(&self, col: f32) -> f32 {
        let left = self.origin.x - self.world_size.x * 0.5;
        left + col * self.world_size.x / self.width as f32
    }

    /// World y of a (possibly fractional) row edge
    pub fn row_to_world_y(&self, row: f32) -> f32 {
        let top = self.origin.y + self.world_size.y * 0.5;
        top - row * self.world_size.y / self.height as f32
    }

    /// World position of a pixel's center
    pub fn pixel_center_world(&self, col: u32, row: u32) -> Vec2 {
        Vec2::new(
            self.column_to_world_x(col as f32 + 0.5),
            self.row_to_world_y(row as f32 + 0.5),
        )
    }

    /// World y of the bottom edge of the map
    pub fn bottom_world_y(&self) -> f32 {
        self.origin.y - self.world_size.y * 0.5
    }
}
