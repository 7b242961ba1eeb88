//! Explosion entry point for the destructible map
//!
//! Owns the solidity grid, the mesher and the current collision mesh. An
//! explosion paints the cosmetic mask, carves the grid, rebuilds collision
//! and swaps the finished mesh in. Everything runs synchronously on the
//! caller's thread.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::TerrainConfig;
use crate::metrics::Metrics;
use crate::terrain::image::PixelSource;
use crate::terrain::mask::{CpuMask, EraseBrush, MaskPainter};
use crate::terrain::mesh::{CollisionMesh, CollisionSink};
use crate::terrain::mesher::SurfaceMesher;
use crate::terrain::solidity::SolidityField;
use crate::util::vec2::Vec2;

/// Result of one `apply_explosion` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplosionOutcome {
    /// Grid carved and collision rebuilt
    Applied { cleared: usize },
    /// Circle did not touch the grid; collision untouched
    Missed,
    /// Mask or erase brush missing; nothing changed
    Skipped,
}

pub struct DestructibleTerrain {
    field: SolidityField,
    mesher: SurfaceMesher,
    mesh: CollisionMesh,
    mask: Option<Box<dyn MaskPainter>>,
    brush: Option<EraseBrush>,
    sink: Option<Box<dyn CollisionSink>>,
    zone_rebuild: bool,
    explosions: u64,
    mesh_generation: u64,
    metrics: Option<Arc<Metrics>>,
}

impl DestructibleTerrain {
    /// Build the solidity cache and the initial collision mesh
    ///
    /// With no source image the terrain is empty: nothing is solid and no
    /// collision is generated.
    pub fn new(source: Option<&dyn PixelSource>, origin: Vec2, config: &TerrainConfig) -> Self {
        let field = match source {
            Some(source) => SolidityField::build(source, origin, config.world_size),
            None => {
                warn!("DestructibleTerrain: no source image, terrain is empty");
                SolidityField::empty(origin, config.world_size)
            }
        };

        let mut mesher = SurfaceMesher::new(
            config.collision_stride,
            config.collision_thickness,
            config.floor_margin,
        );
        let mesh = mesher.rebuild(&field);

        info!(
            "DestructibleTerrain: {}x{} grid, {} solid, {} collision triangles",
            field.width(),
            field.height(),
            field.solid_count(),
            mesh.triangle_count()
        );

        Self {
            field,
            mesher,
            mesh,
            mask: None,
            brush: None,
            sink: None,
            zone_rebuild: config.zone_rebuild,
            explosions: 0,
            mesh_generation: 1,
            metrics: None,
        }
    }

    pub fn with_mask(mut self, mask: Box<dyn MaskPainter>) -> Self {
        self.mask = Some(mask);
        self
    }

    /// Attach a CPU mask sized to the grid
    pub fn with_default_mask(self) -> Self {
        let mask = CpuMask::new(self.field.width(), self.field.height());
        self.with_mask(Box::new(mask))
    }

    pub fn with_brush(mut self, brush: EraseBrush) -> Self {
        self.brush = Some(brush);
        self
    }

    /// Attach a physics sink; it immediately receives the current mesh
    pub fn with_sink(mut self, mut sink: Box<dyn CollisionSink>) -> Self {
        sink.replace_geometry(&self.mesh);
        self.sink = Some(sink);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Destroy terrain in a circle around `world`
    pub fn apply_explosion(&mut self, world: Vec2, radius: f32) -> ExplosionOutcome {
        let (mask, brush) = match (self.mask.as_mut(), self.brush.as_ref()) {
            (Some(mask), Some(brush)) => (mask, brush),
            _ => {
                warn!("DestructibleTerrain: destruction mask or erase brush not set, ignoring explosion");
                return ExplosionOutcome::Skipped;
            }
        };

        let mapping = *self.field.mapping();
        // Off-map centers stay off-map; the painter clips per pixel
        let uv = mapping.world_to_uv_unclamped(world);
        let (mask_width, _) = mask.dimensions();
        let radius_px = radius / mapping.world_size().x * mask_width as f32;
        mask.erase_circle(uv, radius_px, brush);

        let started = Instant::now();
        let region = match self.field.carve(world, radius) {
            Some(region) => region,
            None => {
                debug!(
                    "DestructibleTerrain: explosion at ({:.1}, {:.1}) r={} missed the grid",
                    world.x, world.y, radius
                );
                return ExplosionOutcome::Missed;
            }
        };

        let mesh = if self.zone_rebuild {
            self.mesher.rebuild_zone(&self.field, region.columns.clone())
        } else {
            self.mesher.rebuild(&self.field)
        };
        self.mesh = mesh;
        self.mesh_generation += 1;
        self.explosions += 1;

        if let Some(sink) = self.sink.as_mut() {
            sink.replace_geometry(&self.mesh);
        }

        let elapsed = started.elapsed();
        if let Some(metrics) = &self.metrics {
            metrics.record_rebuild(elapsed, self.mesh.triangle_count());
        }
        debug!(
            "DestructibleTerrain: explosion at ({:.1}, {:.1}) r={} cleared {} px, rebuild took {:?}",
            world.x, world.y, radius, region.cleared, elapsed
        );

        ExplosionOutcome::Applied {
            cleared: region.cleared,
        }
    }

    pub fn is_solid(&self, world: Vec2) -> bool {
        self.field.is_solid(world)
    }

    /// World height of the terrain surface under `world_x`
    pub fn surface_height_at(&self, world_x: f32) -> Option<f32> {
        SurfaceMesher::surface_height_at(&self.field, world_x)
    }

    pub fn field(&self) -> &SolidityField {
        &self.field
    }

    pub fn mesh(&self) -> &CollisionMesh {
        &self.mesh
    }

    pub fn explosion_count(&self) -> u64 {
        self.explosions
    }

    /// Bumped every time a rebuilt mesh is swapped in
    pub fn mesh_generation(&self) -> u64 {
        self.mesh_generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::image::RgbaImage;
    use parking_lot::Mutex;

    /// Records every mesh pushed to physics
    struct RecordingSink(Arc<Mutex<Vec<usize>>>);

    impl CollisionSink for RecordingSink {
        fn replace_geometry(&mut self, mesh: &CollisionMesh) {
            self.0.lock().push(mesh.triangle_count());
        }
    }

    /// Records where the controller asked the mask to paint
    struct RecordingMask(Arc<Mutex<Vec<(Vec2, f32)>>>);

    impl MaskPainter for RecordingMask {
        fn dimensions(&self) -> (u32, u32) {
            (100, 50)
        }

        fn erase_circle(&mut self, uv: Vec2, radius_px: f32, _brush: &EraseBrush) {
            self.0.lock().push((uv, radius_px));
        }
    }

    fn config(zone_rebuild: bool) -> TerrainConfig {
        TerrainConfig {
            world_size: Vec2::new(1000.0, 500.0),
            collision_stride: 2,
            collision_thickness: 100.0,
            floor_margin: 50.0,
            zone_rebuild,
        }
    }

    /// 100x50, rows 0..40 solid
    fn terrain(zone_rebuild: bool) -> DestructibleTerrain {
        let image = RgbaImage::from_alpha_fn(100, 50, |_, row| if row < 40 { 255 } else { 0 });
        DestructibleTerrain::new(Some(&image), Vec2::ZERO, &config(zone_rebuild))
            .with_default_mask()
            .with_brush(EraseBrush::default())
    }

    #[test]
    fn test_is_solid_matches_alpha() {
        let terrain = terrain(false);
        assert!(terrain.is_solid(Vec2::new(0.0, 200.0)));
        assert!(!terrain.is_solid(Vec2::new(0.0, -220.0)));
    }

    #[test]
    fn test_explosion_clears_radius() {
        let mut terrain = terrain(false);
        let center = Vec2::new(100.0, 100.0);
        let radius = 60.0;
        let outcome = terrain.apply_explosion(center, radius);
        assert!(matches!(outcome, ExplosionOutcome::Applied { cleared } if cleared > 0));

        for dy in -6..=6 {
            for dx in -6..=6 {
                let q = center + Vec2::new(dx as f32 * 10.0, dy as f32 * 10.0);
                if q.distance_to(center) <= radius {
                    assert!(!terrain.is_solid(q), "({}, {}) still solid", q.x, q.y);
                }
            }
        }
        // Beyond radius plus one pixel the ground survives
        assert!(terrain.is_solid(center + Vec2::new(radius + 15.0, 0.0)));
        assert_eq!(terrain.explosion_count(), 1);
        assert_eq!(terrain.mesh_generation(), 2);
    }

    #[test]
    fn test_explosion_without_brush_is_ignored() {
        let image = RgbaImage::filled(20, 10, [255, 255, 255, 255]);
        let mut terrain = DestructibleTerrain::new(Some(&image), Vec2::ZERO, &config(false))
            .with_default_mask();
        let before = terrain.field().solid_count();
        assert_eq!(terrain.apply_explosion(Vec2::ZERO, 100.0), ExplosionOutcome::Skipped);
        assert_eq!(terrain.field().solid_count(), before);
        assert_eq!(terrain.mesh_generation(), 1);
    }

    #[test]
    fn test_explosion_without_mask_is_ignored() {
        let image = RgbaImage::filled(20, 10, [255, 255, 255, 255]);
        let mut terrain = DestructibleTerrain::new(Some(&image), Vec2::ZERO, &config(false))
            .with_brush(EraseBrush::default());
        assert_eq!(terrain.apply_explosion(Vec2::ZERO, 100.0), ExplosionOutcome::Skipped);
        assert_eq!(terrain.explosion_count(), 0);
    }

    #[test]
    fn test_sink_receives_each_swap() {
        let pushed = Arc::new(Mutex::new(Vec::new()));
        let mut terrain = terrain(false).with_sink(Box::new(RecordingSink(pushed.clone())));
        terrain.apply_explosion(Vec2::new(0.0, 150.0), 80.0);
        terrain.apply_explosion(Vec2::new(-200.0, 150.0), 40.0);

        let pushed = pushed.lock();
        assert_eq!(pushed.len(), 3);
        assert!(pushed.iter().all(|&t| t == terrain.mesh().triangle_count()));
    }

    #[test]
    fn test_zone_and_full_rebuild_agree() {
        let mut zoned = terrain(true);
        let mut full = terrain(false);
        for (x, r) in [(-300.0, 70.0), (120.0, 45.0), (480.0, 90.0)] {
            zoned.apply_explosion(Vec2::new(x, 200.0), r);
            full.apply_explosion(Vec2::new(x, 200.0), r);
        }
        assert_eq!(zoned.mesh(), full.mesh());
    }

    #[test]
    fn test_missed_explosion_keeps_mesh() {
        let mut terrain = terrain(false);
        let outcome = terrain.apply_explosion(Vec2::new(5000.0, 5000.0), 10.0);
        assert_eq!(outcome, ExplosionOutcome::Missed);
        assert_eq!(terrain.mesh_generation(), 1);
    }

    #[test]
    fn test_no_source_is_empty() {
        let terrain = DestructibleTerrain::new(None, Vec2::ZERO, &config(false));
        assert!(!terrain.is_solid(Vec2::ZERO));
        assert!(terrain.mesh().is_empty());
        assert!(terrain.surface_height_at(0.0).is_none());
    }

    #[test]
    fn test_off_edge_explosion_paints_where_it_carves() {
        let image = RgbaImage::from_alpha_fn(100, 50, |_, row| if row < 40 { 255 } else { 0 });
        let painted = Arc::new(Mutex::new(Vec::new()));
        let mut terrain = DestructibleTerrain::new(Some(&image), Vec2::ZERO, &config(false))
            .with_mask(Box::new(RecordingMask(painted.clone())))
            .with_brush(EraseBrush::default());

        // Left edge is x = -500; center sits 40 units past it, radius reaches 20 units in
        let outcome = terrain.apply_explosion(Vec2::new(-540.0, 150.0), 60.0);
        assert!(matches!(outcome, ExplosionOutcome::Applied { .. }));

        let painted = painted.lock();
        assert_eq!(painted.len(), 1);
        let (uv, radius_px) = painted[0];
        assert!((uv.x - (-0.04)).abs() < 1e-4, "uv.x = {}", uv.x);
        assert!((radius_px - 6.0).abs() < 1e-4);
        // Column 3 is beyond the carved sliver and stays solid
        assert!(terrain.is_solid(Vec2::new(-465.0, 150.0)));
    }

    #[test]
    fn test_metrics_recorded() {
        let metrics = Arc::new(Metrics::new());
        let mut terrain = terrain(false).with_metrics(metrics.clone());
        terrain.apply_explosion(Vec2::new(0.0, 150.0), 50.0);
        assert_eq!(metrics.explosions.load(std::sync::atomic::Ordering::Relaxed), 1);
    }
}
