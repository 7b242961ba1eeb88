//! Destructible terrain
//!
//! A 2D alpha image becomes a solidity grid and an extruded collision
//! volume. Explosions carve the grid and rebuild the volume.

pub mod controller;
pub mod image;
pub mod mapping;
pub mod mask;
pub mod mesh;
pub mod mesher;
pub mod solidity;

pub use controller::{DestructibleTerrain, ExplosionOutcome};
pub use image::{PixelSource, RgbaImage};
pub use mask::{CpuMask, EraseBrush, MaskPainter};
pub use mesh::{CollisionMesh, CollisionSink};
pub use mesher::SurfaceMesher;
pub use solidity::SolidityField;
