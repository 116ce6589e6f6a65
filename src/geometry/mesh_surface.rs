//! Triangle-mesh surfaces answering signed-distance queries.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use glam::Vec3;

use super::{aabb::Aabb, shape::Shape, triangle_mesh::TriangleMesh};
use crate::error::{KernelError, Result};

/// Points plus triangle topology, with cached normals and bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct TriangleMeshSurface {
    points: Vec<Vec3>,
    mesh: TriangleMesh,
    face_normals: Vec<Vec3>,
    point_normals: Vec<Vec3>,
    bounds: Aabb,
}

/// Which part of a triangle the closest point landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Feature {
    Face,
    Edge(usize, usize),
    Vertex(usize),
}

impl TriangleMeshSurface {
    pub fn new(points: Vec<Vec3>, mesh: TriangleMesh) -> Result<Self> {
        for (triangle, element) in mesh.elements().iter().enumerate() {
            for &point in element {
                if point >= points.len() {
                    return Err(KernelError::PointOutOfRange {
                        triangle,
                        point,
                        len: points.len(),
                    });
                }
            }
        }

        let face_normals = mesh.face_normals(&points);
        let point_normals = mesh.point_normals_from_faces(points.len(), &face_normals);
        let bounds = Aabb::from_points(mesh.surface_indices().iter().map(|&i| &points[i]));

        Ok(Self {
            points,
            mesh,
            face_normals,
            point_normals,
            bounds,
        })
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    pub fn mesh(&self) -> &TriangleMesh {
        &self.mesh
    }

    pub fn face_normals(&self) -> &[Vec3] {
        &self.face_normals
    }

    pub fn point_normals(&self) -> &[Vec3] {
        &self.point_normals
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Signed distance from `point` to the surface and the outward normal there.
    ///
    /// The sign comes from the pseudo-normal of the closest feature, which is reliable
    /// for closed meshes wound counter-clockwise when seen from outside.
    pub fn signed_distance_and_normal(&self, point: Vec3) -> (f32, Vec3) {
        let mut best: Option<(f32, Vec3, usize, Feature)> = None;

        for (triangle, &[a, b, c]) in self.mesh.elements().iter().enumerate() {
            let (closest, feature) =
                closest_point_on_triangle(point, self.points[a], self.points[b], self.points[c]);
            let distance_sq = (point - closest).length_squared();
            if best.map_or(true, |(current, ..)| distance_sq < current) {
                let feature = match feature {
                    Feature::Face => Feature::Face,
                    Feature::Edge(i, j) => Feature::Edge([a, b, c][i], [a, b, c][j]),
                    Feature::Vertex(i) => Feature::Vertex([a, b, c][i]),
                };
                best = Some((distance_sq, closest, triangle, feature));
            }
        }

        let Some((distance_sq, closest, triangle, feature)) = best else {
            return (f32::INFINITY, Vec3::ZERO);
        };

        let pseudo_normal = match feature {
            Feature::Face => self.face_normals[triangle],
            Feature::Edge(i, j) => self
                .mesh
                .edge_triangles(i, j)
                .iter()
                .map(|&t| self.face_normals[t])
                .sum::<Vec3>()
                .normalize_or_zero(),
            Feature::Vertex(i) => self.point_normals[i],
        };

        let offset = point - closest;
        let distance = distance_sq.sqrt();
        let sign = if offset.dot(pseudo_normal) < 0.0 { -1.0 } else { 1.0 };
        let normal = if distance > f32::EPSILON {
            offset / distance * sign
        } else {
            pseudo_normal
        };
        (distance * sign, normal)
    }

    pub fn into_shape(self) -> Arc<Shape> {
        Arc::new(Shape::TriangleMesh(self))
    }
}

/// Closest point on triangle `abc` to `p` (Ericson, Real-Time Collision Detection 5.1.5).
///
/// Edge and vertex features use local indices 0..3.
fn closest_point_on_triangle(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> (Vec3, Feature) {
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;
    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return (a, Feature::Vertex(0));
    }

    let bp = p - b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        return (b, Feature::Vertex(1));
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return (a + ab * v, Feature::Edge(0, 1));
    }

    let cp = p - c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return (c, Feature::Vertex(2));
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return (a + ac * w, Feature::Edge(0, 2));
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return (b + (c - b) * w, Feature::Edge(1, 2));
    }

    let denom = 1.0 / (va + vb + vc);
    let v = vb * denom;
    let w = vc * denom;
    (a + ab * v + ac * w, Feature::Face)
}

/// Cooks raw point and index buffers into a [`TriangleMeshSurface`].
#[derive(Debug, Clone)]
pub struct MeshBuilder {
    points: Vec<Vec3>,
    triangles: Vec<[usize; 3]>,
    offset: Vec3,
}

impl MeshBuilder {
    pub fn new(points: Vec<Vec3>, triangles: Vec<[usize; 3]>) -> Self {
        Self {
            points,
            triangles,
            offset: Vec3::ZERO,
        }
    }

    /// Merges points sharing an `epsilon` grid cell and removes what the merge breaks.
    ///
    /// Triangles left with a repeated point or with the points of an earlier triangle
    /// are dropped, then points no triangle references. Buffers with out-of-range
    /// indices are left untouched so that [`build`](Self::build) reports them.
    pub fn weld_vertices(mut self, epsilon: f32) -> Self {
        let len = self.points.len();
        if epsilon <= 0.0 || self.triangles.iter().flatten().any(|&i| i >= len) {
            return self;
        }

        let mut representative: BTreeMap<[i32; 3], usize> = BTreeMap::new();
        let remap: Vec<usize> = self
            .points
            .iter()
            .enumerate()
            .map(|(index, point)| {
                let cell = (*point / epsilon).round().as_ivec3().to_array();
                *representative.entry(cell).or_insert(index)
            })
            .collect();

        let mut seen = BTreeSet::new();
        let before = self.triangles.len();
        self.triangles = self
            .triangles
            .iter()
            .map(|triangle| triangle.map(|i| remap[i]))
            .filter(|&[a, b, c]| a != b && b != c && a != c)
            .filter(|triangle| {
                let mut key = *triangle;
                key.sort_unstable();
                seen.insert(key)
            })
            .collect();

        let mut used = vec![false; len];
        for &index in self.triangles.iter().flatten() {
            used[index] = true;
        }
        let mut compacted = vec![0; len];
        let mut points = Vec::with_capacity(representative.len());
        for (index, point) in self.points.iter().enumerate() {
            if used[index] {
                compacted[index] = points.len();
                points.push(*point);
            }
        }
        for triangle in &mut self.triangles {
            *triangle = triangle.map(|i| compacted[i]);
        }

        log::debug!(
            "welded {len} points into {}, dropped {} of {before} triangles",
            points.len(),
            before - self.triangles.len()
        );
        self.points = points;
        self
    }

    /// Moves the referenced points so their bounds are centered on the origin.
    ///
    /// The removed translation accumulates in [`offset`](Self::offset).
    pub fn recenter(mut self) -> Self {
        let len = self.points.len();
        let bounds = Aabb::from_points(
            self.triangles
                .iter()
                .flatten()
                .filter(|&&i| i < len)
                .map(|&i| &self.points[i]),
        );
        if bounds.is_empty() {
            return self;
        }
        let center = bounds.center();
        for point in &mut self.points {
            *point -= center;
        }
        self.offset += center;
        self
    }

    /// Translation removed by [`recenter`](Self::recenter). A particle placed here shows
    /// the mesh where it was authored.
    pub fn offset(&self) -> Vec3 {
        self.offset
    }

    pub fn build(self) -> Result<TriangleMeshSurface> {
        let mesh = TriangleMesh::new(self.triangles)?;
        TriangleMeshSurface::new(self.points, mesh)
    }

    pub fn build_shape(self) -> Result<Arc<Shape>> {
        self.build().map(TriangleMeshSurface::into_shape)
    }
}
