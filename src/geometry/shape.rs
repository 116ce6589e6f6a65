//! Rigid implicit shapes.
//!
//! Every query dispatches through a single `match` on [`Shape`].

use std::sync::Arc;

use glam::Vec3;

use super::{aabb::Aabb, mesh_surface::TriangleMeshSurface, triangle_mesh::TriangleMesh};
use crate::{
    core::types::Transform,
    error::{KernelError, Result},
};

/// Enumeration of supported geometries.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Sphere {
        center: Vec3,
        radius: f32,
    },
    /// Axis-aligned box in the shape's own frame.
    Box {
        min: Vec3,
        max: Vec3,
    },
    /// Half-space below the plane; unbounded.
    Plane {
        point: Vec3,
        normal: Vec3,
    },
    TriangleMesh(TriangleMeshSurface),
    /// Rigidly placed sub-shapes; the surface is their union.
    Union(Vec<ShapeMember>),
}

/// A shared shape placed inside a [`Shape::Union`].
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeMember {
    pub transform: Transform,
    pub shape: Arc<Shape>,
}

impl ShapeMember {
    pub fn new(transform: Transform, shape: Arc<Shape>) -> Self {
        Self { transform, shape }
    }
}

impl Shape {
    pub fn sphere(center: Vec3, radius: f32) -> Self {
        Shape::Sphere { center, radius }
    }

    pub fn cuboid(min: Vec3, max: Vec3) -> Self {
        Shape::Box {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn cuboid_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        let half_extents = half_extents.abs();
        Shape::Box {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    pub fn plane(point: Vec3, normal: Vec3) -> Self {
        Shape::Plane {
            point,
            normal: normal.normalize_or_zero(),
        }
    }

    /// Builds a mesh surface, taking ownership of the triangle list.
    pub fn triangle_mesh(points: Vec<Vec3>, triangles: Vec<[usize; 3]>) -> Result<Self> {
        let mesh = TriangleMesh::new(triangles)?;
        Ok(Shape::TriangleMesh(TriangleMeshSurface::new(points, mesh)?))
    }

    pub fn union(members: Vec<ShapeMember>) -> Self {
        Shape::Union(members)
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Shape::Sphere { .. } => "sphere",
            Shape::Box { .. } => "box",
            Shape::Plane { .. } => "plane",
            Shape::TriangleMesh(_) => "triangle mesh",
            Shape::Union(_) => "union",
        }
    }

    pub fn has_bounding_box(&self) -> bool {
        match self {
            Shape::Sphere { .. } | Shape::Box { .. } => true,
            Shape::Plane { .. } => false,
            Shape::TriangleMesh(surface) => !surface.bounds().is_empty(),
            Shape::Union(members) => {
                !members.is_empty() && members.iter().all(|m| m.shape.has_bounding_box())
            }
        }
    }

    pub fn is_convex(&self) -> bool {
        matches!(
            self,
            Shape::Sphere { .. } | Shape::Box { .. } | Shape::Plane { .. }
        )
    }

    /// Signed distance to the surface (negative inside) and the outward normal.
    pub fn signed_distance_and_normal(&self, point: Vec3) -> (f32, Vec3) {
        match self {
            Shape::Sphere { center, radius } => {
                let offset = point - *center;
                (offset.length() - radius, offset.normalize_or_zero())
            }
            Shape::Box { min, max } => box_phi(*min, *max, point),
            Shape::Plane { point: origin, normal } => ((point - *origin).dot(*normal), *normal),
            Shape::TriangleMesh(surface) => surface.signed_distance_and_normal(point),
            Shape::Union(members) => {
                let mut best = (f32::INFINITY, Vec3::ZERO);
                for member in members {
                    let local = member.transform.inverse_transform_point(point);
                    let (phi, normal) = member.shape.signed_distance_and_normal(local);
                    if phi < best.0 {
                        best = (phi, member.transform.transform_vector(normal));
                    }
                }
                best
            }
        }
    }

    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.signed_distance_and_normal(point).0
    }

    pub fn bounding_box(&self) -> Result<Aabb> {
        if !self.has_bounding_box() {
            return Err(KernelError::Unbounded {
                shape: self.kind_name(),
            });
        }
        Ok(match self {
            Shape::Sphere { center, radius } => Aabb::new(
                *center - Vec3::splat(radius.abs()),
                *center + Vec3::splat(radius.abs()),
            ),
            Shape::Box { min, max } => Aabb::new(*min, *max),
            Shape::TriangleMesh(surface) => surface.bounds(),
            Shape::Union(members) => {
                let mut bounds = Aabb::empty();
                for member in members {
                    bounds.merge(&member.shape.bounding_box()?.transformed(&member.transform));
                }
                bounds
            }
            Shape::Plane { .. } => unreachable!("planes report no bounding box"),
        })
    }

    /// Farthest point of the thickened shape along `direction`.
    ///
    /// Spheres and boxes answer in closed form. Other bounded shapes march a ray from
    /// outside their bounds toward the bounds center, and return that center when the
    /// march misses.
    pub fn support_point(&self, direction: Vec3, thickness: f32) -> Result<Vec3> {
        let dir = direction.normalize_or_zero();
        match self {
            Shape::Sphere { center, radius } => Ok(*center + dir * (radius + thickness)),
            Shape::Box { min, max } => {
                let corner = Vec3::new(
                    if direction.x < 0.0 { min.x } else { max.x },
                    if direction.y < 0.0 { min.y } else { max.y },
                    if direction.z < 0.0 { min.z } else { max.z },
                );
                Ok(corner + dir * thickness)
            }
            _ => {
                let bounds = self.bounding_box()?;
                let center = bounds.center();
                if dir == Vec3::ZERO {
                    return Ok(center);
                }
                let reach = 2.0 * bounds.radius() + thickness.abs() + 1.0;
                let start = center + dir * reach;
                Ok(self
                    .closest_intersection(start, center, thickness)
                    .unwrap_or(center))
            }
        }
    }

    pub fn into_shared(self) -> Arc<Shape> {
        Arc::new(self)
    }
}

fn box_phi(min: Vec3, max: Vec3, point: Vec3) -> (f32, Vec3) {
    let below = min - point;
    let above = point - max;
    let outside = below.max(above);

    if outside.max_element() > 0.0 {
        let offset = point - point.clamp(min, max);
        let distance = offset.length();
        return (distance, offset / distance);
    }

    let mut axis = 0;
    for i in 1..3 {
        if outside[i] > outside[axis] {
            axis = i;
        }
    }
    let mut normal = Vec3::ZERO;
    normal[axis] = if above[axis] >= below[axis] { 1.0 } else { -1.0 };
    (outside[axis], normal)
}
