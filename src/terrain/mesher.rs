//! Surface heightmap extraction and collision mesh generation
//!
//! The surface of each sampled column is the first solid row from the top.
//! Samples are taken every `stride` columns plus a forced final sample at
//! the right map edge, then extruded into a closed volume: a top face that
//! follows the terrain, a flat floor below the map, and front/back faces
//! separated by a fixed thickness so a capsule collider cannot slip through
//! the thin axis.

use std::ops::RangeInclusive;

use rayon::prelude::*;

use crate::terrain::mapping::WorldMapping;
use crate::terrain::mesh::CollisionMesh;
use crate::terrain::solidity::SolidityField;
use crate::util::vec2::Vec2;
use crate::util::vec3::Vec3;

/// Vertices emitted per height sample (front top/bottom, back top/bottom)
const VERTS_PER_SAMPLE: u32 = 4;

/// One point of the simplified surface contour
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeightSample {
    /// Pixel column the surface was read from
    pub column: u32,
    /// World x of the sample
    pub x: f32,
    /// First solid row, or the grid height when the column is clear
    pub surface_row: u32,
    /// World height of the surface
    pub height: f32,
}

/// Builds collision geometry from the solidity grid
#[derive(Debug, Clone)]
pub struct SurfaceMesher {
    stride: u32,
    thickness: f32,
    floor_margin: f32,
    samples: Vec<HeightSample>,
}

impl SurfaceMesher {
    pub fn new(stride: u32, thickness: f32, floor_margin: f32) -> Self {
        if stride == 0 {
            tracing::warn!("SurfaceMesher: stride 0 is invalid, using 1");
        }
        Self {
            stride: stride.max(1),
            thickness,
            floor_margin,
            samples: Vec::new(),
        }
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn thickness(&self) -> f32 {
        self.thickness
    }

    /// Cached samples from the last rebuild
    pub fn samples(&self) -> &[HeightSample] {
        &self.samples
    }

    /// First solid row of a column; the grid height when nothing is solid
    pub fn surface_row(field: &SolidityField, column: u32) -> u32 {
        field.column_top(column).unwrap_or(field.height())
    }

    /// World height of the surface under `world_x`
    pub fn surface_height_at(field: &SolidityField, world_x: f32) -> Option<f32> {
        let mapping = field.mapping();
        let (col, _) = mapping.world_to_pixel(Vec2::new(world_x, mapping.origin().y))?;
        let row = Self::surface_row(field, col);
        Some(mapping.row_to_world_y(row as f32))
    }

    /// Column positions to sample: every `stride`th column plus the last
    ///
    /// Returns (column, edge) pairs where `edge` is the column edge the
    /// sample sits on. The final sample sits on the right map edge.
    fn sample_positions(&self, width: u32) -> Vec<(u32, u32)> {
        if width == 0 {
            return Vec::new();
        }
        let mut positions: Vec<(u32, u32)> = (0..width)
            .step_by(self.stride as usize)
            .map(|col| (col, col))
            .collect();
        positions.push((width - 1, width));
        positions
    }

    fn make_sample(mapping: &WorldMapping, column: u32, edge: u32, surface_row: u32) -> HeightSample {
        HeightSample {
            column,
            x: mapping.column_to_world_x(edge as f32),
            surface_row,
            height: mapping.row_to_world_y(surface_row as f32),
        }
    }

    /// Full rebuild: resample every contour column and regenerate the mesh
    pub fn rebuild(&mut self, field: &SolidityField) -> CollisionMesh {
        let mapping = *field.mapping();
        let positions = self.sample_positions(field.width());

        self.samples = positions
            .par_iter()
            .map(|&(column, edge)| {
                Self::make_sample(&mapping, column, edge, Self::surface_row(field, column))
            })
            .collect();

        self.emit(&mapping)
    }

    /// Zone rebuild: resample only contour columns inside `columns`, reuse
    /// the cached samples elsewhere, then regenerate the mesh
    ///
    /// Falls back to a full rebuild when the cache does not match the grid.
    pub fn rebuild_zone(&mut self, field: &SolidityField, columns: RangeInclusive<u32>) -> CollisionMesh {
        let mapping = *field.mapping();
        let expected = self.sample_positions(field.width()).len();
        if self.samples.len() != expected {
            return self.rebuild(field);
        }

        let mut resampled = 0;
        for sample in self.samples.iter_mut().filter(|s| columns.contains(&s.column)) {
            let row = Self::surface_row(field, sample.column);
            sample.surface_row = row;
            sample.height = mapping.row_to_world_y(row as f32);
            resampled += 1;
        }
        tracing::trace!("SurfaceMesher: zone rebuild resampled {} columns", resampled);

        self.emit(&mapping)
    }

    /// Extrude the cached samples into a closed volume
    fn emit(&self, mapping: &WorldMapping) -> CollisionMesh {
        let n = self.samples.len();
        if n < 2 {
            return CollisionMesh::default();
        }

        let half = self.thickness * 0.5;
        let floor = mapping.bottom_world_y() - self.floor_margin;

        let mut vertices = Vec::with_capacity(n * VERTS_PER_SAMPLE as usize);
        for s in &self.samples {
            vertices.push(Vec3::new(s.x, -half, s.height)); // front top
            vertices.push(Vec3::new(s.x, -half, floor)); // front bottom
            vertices.push(Vec3::new(s.x, half, s.height)); // back top
            vertices.push(Vec3::new(s.x, half, floor)); // back bottom
        }

        let mut triangles = Vec::with_capacity((n - 1) * 8 + 4);
        for i in 0..(n as u32 - 1) {
            let a = i * VERTS_PER_SAMPLE;
            let b = a + VERTS_PER_SAMPLE;
            // front
            triangles.push([a + 1, b + 1, b]);
            triangles.push([a + 1, b, a]);
            // back
            triangles.push([a + 3, b + 2, b + 3]);
            triangles.push([a + 3, a + 2, b + 2]);
            // top (terrain surface)
            triangles.push([a, b, b + 2]);
            triangles.push([a, b + 2, a + 2]);
            // bottom (floor)
            triangles.push([a + 1, b + 3, b + 1]);
            triangles.push([a + 1, a + 3, b + 3]);
        }

        // end caps
        let last = (n as u32 - 1) * VERTS_PER_SAMPLE;
        triangles.push([1, 0, 2]);
        triangles.push([1, 2, 3]);
        triangles.push([last + 1, last + 2, last]);
        triangles.push([last + 1, last + 3, last + 2]);

        CollisionMesh {
            vertices,
            triangles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::image::RgbaImage;

    const WORLD: Vec2 = Vec2 { x: 1000.0, y: 500.0 };

    /// 100x50, rows 0..40 solid, rows 40..50 transparent
    fn strip_field() -> SolidityField {
        let image = RgbaImage::from_alpha_fn(100, 50, |_, row| if row < 40 { 255 } else { 0 });
        SolidityField::build(&image, Vec2::ZERO, WORLD)
    }

    /// Hill: column c is solid from row (c % 25) downward
    fn hill_field() -> SolidityField {
        let image = RgbaImage::from_alpha_fn(100, 50, |col, row| if row >= col % 25 { 255 } else { 0 });
        SolidityField::build(&image, Vec2::ZERO, WORLD)
    }

    fn clear_column(field: &mut SolidityField, col: u32) {
        for row in 0..field.height() {
            field.set(col, row, false);
        }
    }

    #[test]
    fn test_surface_row_top_solid() {
        let field = strip_field();
        for col in 0..100 {
            assert_eq!(SurfaceMesher::surface_row(&field, col), 0);
        }
    }

    #[test]
    fn test_surface_row_sentinel_after_clearing() {
        let mut field = strip_field();
        clear_column(&mut field, 42);
        assert_eq!(SurfaceMesher::surface_row(&field, 42), 50);
    }

    #[test]
    fn test_sample_positions_force_last() {
        let mesher = SurfaceMesher::new(4, 100.0, 50.0);
        let positions = mesher.sample_positions(10);
        assert_eq!(positions, vec![(0, 0), (4, 4), (8, 8), (9, 10)]);
        assert!(mesher.sample_positions(0).is_empty());
    }

    #[test]
    fn test_zero_stride_clamped() {
        let mesher = SurfaceMesher::new(0, 100.0, 50.0);
        assert_eq!(mesher.stride(), 1);
    }

    #[test]
    fn test_rebuild_triangle_count() {
        let field = strip_field();
        let mut mesher = SurfaceMesher::new(4, 100.0, 50.0);
        let mesh = mesher.rebuild(&field);
        let n = mesher.samples().len();
        assert_eq!(n, 26);
        assert_eq!(mesh.vertex_count(), n * 4);
        assert_eq!(mesh.triangle_count(), (n - 1) * 8 + 4);
    }

    #[test]
    fn test_mesh_spans_map_without_gaps() {
        let field = hill_field();
        let mut mesher = SurfaceMesher::new(3, 100.0, 50.0);
        mesher.rebuild(&field);
        let samples = mesher.samples();
        assert!((samples[0].x + 500.0).abs() < 1e-3);
        assert!((samples[samples.len() - 1].x - 500.0).abs() < 1e-3);
        for pair in samples.windows(2) {
            assert!(pair[0].x < pair[1].x);
        }
    }

    #[test]
    fn test_floor_below_lowest_surface() {
        let mut field = strip_field();
        clear_column(&mut field, 0);
        let mut mesher = SurfaceMesher::new(1, 100.0, 50.0);
        let mesh = mesher.rebuild(&field);
        let lowest = mesher.samples().iter().map(|s| s.height).fold(f32::MAX, f32::min);
        assert!(mesh.min_z().unwrap() < lowest);
    }

    #[test]
    fn test_no_degenerate_triangles_with_cleared_columns() {
        let mut field = strip_field();
        for col in 0..100 {
            clear_column(&mut field, col);
        }
        let mut mesher = SurfaceMesher::new(4, 100.0, 50.0);
        let mesh = mesher.rebuild(&field);
        assert!(mesher.samples().iter().all(|s| s.surface_row == 50));
        for &tri in &mesh.triangles {
            assert!(mesh.triangle_area(tri) > 1e-3, "degenerate triangle {:?}", tri);
        }
    }

    #[test]
    fn test_zone_rebuild_matches_full() {
        let mut field = hill_field();
        let mut zoned = SurfaceMesher::new(2, 80.0, 40.0);
        zoned.rebuild(&field);

        let region = field.carve(Vec2::new(-100.0, 150.0), 70.0).unwrap();
        let zoned_mesh = zoned.rebuild_zone(&field, region.columns.clone());

        let mut full = SurfaceMesher::new(2, 80.0, 40.0);
        let full_mesh = full.rebuild(&field);

        assert_eq!(zoned.samples(), full.samples());
        assert_eq!(zoned_mesh, full_mesh);
    }

    #[test]
    fn test_zone_rebuild_without_cache_falls_back() {
        let field = strip_field();
        let mut mesher = SurfaceMesher::new(4, 100.0, 50.0);
        let mesh = mesher.rebuild_zone(&field, 0..=3);
        assert_eq!(mesher.samples().len(), 26);
        assert!(!mesh.is_empty());
    }

    #[test]
    fn test_surface_height_at() {
        let field = strip_field();
        let height = SurfaceMesher::surface_height_at(&field, 0.0).unwrap();
        assert!((height - 250.0).abs() < 1e-3);

        let empty = SolidityField::empty(Vec2::ZERO, WORLD);
        assert!(SurfaceMesher::surface_height_at(&empty, 0.0).is_none());
    }

    #[test]
    fn test_empty_field_gives_empty_mesh() {
        let field = SolidityField::empty(Vec2::ZERO, WORLD);
        let mut mesher = SurfaceMesher::new(4, 100.0, 50.0);
        assert!(mesher.rebuild(&field).is_empty());
    }
}
