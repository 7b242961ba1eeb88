//! Collision mesh types and the geometry sink seam

use crate::util::vec3::Vec3;

/// Triangle as three indices into the vertex list
pub type Triangle = [u32; 3];

/// Closed collision volume generated from the terrain surface
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CollisionMesh {
    /// Vertex positions in world coordinates
    pub vertices: Vec<Vec3>,
    /// Triangle indices into `vertices`
    pub triangles: Vec<Triangle>,
}

impl CollisionMesh {
    /// Returns true if this mesh has no geometry.
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Area of one triangle
    pub fn triangle_area(&self, tri: Triangle) -> f32 {
        let a = self.vertices[tri[0] as usize];
        let b = self.vertices[tri[1] as usize];
        let c = self.vertices[tri[2] as usize];
        (b - a).cross(c - a).length() * 0.5
    }

    /// Lowest vertex height
    pub fn min_z(&self) -> Option<f32> {
        self.vertices.iter().map(|v| v.z).reduce(f32::min)
    }
}

/// Physics-side consumer of generated collision geometry
///
/// Receives each rebuilt mesh in full; it never sees a partially built one.
pub trait CollisionSink: Send {
    fn replace_geometry(&mut self, mesh: &CollisionMesh);
}
