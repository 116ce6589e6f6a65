//! Geometry: implicit shapes, triangle topology and segment queries.

pub mod aabb;
pub mod intersection;
pub mod mesh_surface;
pub mod shape;
pub mod triangle_mesh;

pub use aabb::Aabb;
pub use mesh_surface::{MeshBuilder, TriangleMeshSurface};
pub use shape::{Shape, ShapeMember};
pub use triangle_mesh::TriangleMesh;
