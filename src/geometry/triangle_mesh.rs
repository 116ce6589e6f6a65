//! Triangle connectivity derived from an index list.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeInclusive;

use glam::Vec3;

use crate::error::{KernelError, Result};

/// Triangle topology with point adjacency.
///
/// Both maps are ordered so every derived query is deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct TriangleMesh {
    elements: Vec<[usize; 3]>,
    point_to_triangles: BTreeMap<usize, BTreeSet<usize>>,
    point_to_neighbors: BTreeMap<usize, BTreeSet<usize>>,
}

impl TriangleMesh {
    /// Builds the adjacency for `elements`.
    ///
    /// Degenerate triangles, triangles repeating the vertex set of an earlier one and
    /// edges shared by more than two triangles are rejected.
    pub fn new(elements: Vec<[usize; 3]>) -> Result<Self> {
        let mut point_to_triangles: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
        let mut point_to_neighbors: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
        let mut edge_use: BTreeMap<(usize, usize), usize> = BTreeMap::new();
        let mut first_with_vertices: BTreeMap<[usize; 3], usize> = BTreeMap::new();

        for (triangle, element) in elements.iter().enumerate() {
            let [a, b, c] = *element;
            if a == b || a == c {
                return Err(KernelError::DegenerateTriangle {
                    triangle,
                    vertex: a,
                });
            }
            if b == c {
                return Err(KernelError::DegenerateTriangle {
                    triangle,
                    vertex: b,
                });
            }

            // Two triangles on one edge must not share the opposite vertex too.
            let mut key = *element;
            key.sort_unstable();
            if let Some(&duplicate_of) = first_with_vertices.get(&key) {
                return Err(KernelError::DuplicateTriangle {
                    triangle,
                    duplicate_of,
                });
            }
            first_with_vertices.insert(key, triangle);

            for &point in element {
                point_to_triangles.entry(point).or_default().insert(triangle);
            }

            for (i, j) in [(a, b), (b, c), (c, a)] {
                point_to_neighbors.entry(i).or_default().insert(j);
                point_to_neighbors.entry(j).or_default().insert(i);

                let key = (i.min(j), i.max(j));
                let count = edge_use.entry(key).or_insert(0);
                *count += 1;
                if *count > 2 {
                    return Err(KernelError::NonManifoldEdge {
                        a: key.0,
                        b: key.1,
                        count: *count,
                    });
                }
            }
        }

        Ok(Self {
            elements,
            point_to_triangles,
            point_to_neighbors,
        })
    }

    pub fn elements(&self) -> &[[usize; 3]] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Triangles touching `point`, ascending.
    pub fn incident_triangles(&self, point: usize) -> impl Iterator<Item = usize> + '_ {
        self.point_to_triangles
            .get(&point)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Points sharing an edge with `point`, ascending.
    pub fn neighbors(&self, point: usize) -> impl Iterator<Item = usize> + '_ {
        self.point_to_neighbors
            .get(&point)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Every point referenced by at least one triangle, ascending.
    pub fn surface_indices(&self) -> Vec<usize> {
        self.point_to_triangles.keys().copied().collect()
    }

    /// Smallest and largest referenced point index.
    pub fn vertex_range(&self) -> Option<RangeInclusive<usize>> {
        let first = *self.point_to_triangles.keys().next()?;
        let last = *self.point_to_triangles.keys().next_back()?;
        Some(first..=last)
    }

    /// Triangles containing both endpoints of the edge `(a, b)`.
    pub fn edge_triangles(&self, a: usize, b: usize) -> Vec<usize> {
        match (self.point_to_triangles.get(&a), self.point_to_triangles.get(&b)) {
            (Some(lhs), Some(rhs)) => lhs.intersection(rhs).copied().collect(),
            _ => Vec::new(),
        }
    }

    /// Unique undirected edges `(a, b)` with `a < b`, ascending.
    pub fn edges(&self) -> Vec<(usize, usize)> {
        self.point_to_neighbors
            .iter()
            .flat_map(|(&a, neighbors)| {
                neighbors
                    .range(a + 1..)
                    .map(move |&b| (a, b))
            })
            .collect()
    }

    /// Edges touched by a single triangle.
    pub fn boundary_edges(&self) -> Vec<(usize, usize)> {
        self.edges()
            .into_iter()
            .filter(|&(a, b)| self.edge_triangles(a, b).len() == 1)
            .collect()
    }

    /// One `(a, b, o1, o2)` entry per interior edge.
    ///
    /// `a < b` is the shared edge and `o1 < o2` are the vertices opposite to it in
    /// the two incident triangles. Boundary edges are skipped.
    pub fn unique_adjacent_elements(&self) -> Vec<[usize; 4]> {
        let mut unique = BTreeSet::new();
        for (&a, neighbors) in &self.point_to_neighbors {
            for &b in neighbors {
                let shared = self.edge_triangles(a, b);
                if shared.len() != 2 {
                    continue;
                }
                let first = self.opposite_vertex(shared[0], a, b);
                let second = self.opposite_vertex(shared[1], a, b);
                unique.insert([a.min(b), a.max(b), first.min(second), first.max(second)]);
            }
        }
        unique.into_iter().collect()
    }

    fn opposite_vertex(&self, triangle: usize, a: usize, b: usize) -> usize {
        let element = self.elements[triangle];
        element
            .iter()
            .copied()
            .find(|&p| p != a && p != b)
            .unwrap_or(element[0])
    }

    /// Unit normal per triangle, `(p1 - p0) x (p2 - p0)`.
    ///
    /// # Panics
    /// Panics if a triangle references a point outside `points`.
    pub fn face_normals(&self, points: &[Vec3]) -> Vec<Vec3> {
        self.elements
            .iter()
            .map(|&[a, b, c]| {
                let p0 = points[a];
                (points[b] - p0).cross(points[c] - p0).normalize_or_zero()
            })
            .collect()
    }

    /// Normalized sum of incident face normals, indexed like `points`.
    ///
    /// Points no triangle references get a zero normal.
    ///
    /// # Panics
    /// Panics if a triangle references a point outside `points`.
    pub fn point_normals(&self, points: &[Vec3]) -> Vec<Vec3> {
        let face_normals = self.face_normals(points);
        self.point_normals_from_faces(points.len(), &face_normals)
    }

    pub(crate) fn point_normals_from_faces(&self, len: usize, face_normals: &[Vec3]) -> Vec<Vec3> {
        let mut normals = vec![Vec3::ZERO; len];
        for (&point, triangles) in &self.point_to_triangles {
            let sum: Vec3 = triangles.iter().map(|&t| face_normals[t]).sum();
            normals[point] = sum.normalize_or_zero();
        }
        normals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbors_are_registered_both_ways() {
        let mesh = TriangleMesh::new(vec![[0, 1, 2]]).unwrap();
        assert_eq!(mesh.neighbors(0).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(mesh.neighbors(2).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(mesh.incident_triangles(1).collect::<Vec<_>>(), vec![0]);
        assert_eq!(mesh.neighbors(7).count(), 0);
    }

    #[test]
    fn single_triangle_has_only_boundary_edges() {
        let mesh = TriangleMesh::new(vec![[4, 5, 6]]).unwrap();
        assert_eq!(mesh.edges(), vec![(4, 5), (4, 6), (5, 6)]);
        assert_eq!(mesh.boundary_edges().len(), 3);
        assert!(mesh.unique_adjacent_elements().is_empty());
        assert_eq!(mesh.vertex_range(), Some(4..=6));
    }
}
