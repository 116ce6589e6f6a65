//! Error types for the evolution kernel.
//!
//! Precondition violations at API boundaries surface as [`KernelError`].
//! Numerical edge cases in geometric queries are never errors; they resolve to a miss.

use thiserror::Error;

/// Main error type of the crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelError {
    /// The query needs a bounding box the shape does not have.
    #[error("{shape} shape has no bounding box")]
    Unbounded { shape: &'static str },
    /// A triangle repeats one of its vertex indices.
    #[error("triangle {triangle} is degenerate: vertex {vertex} is repeated")]
    DegenerateTriangle { triangle: usize, vertex: usize },
    /// A triangle uses the same three points as an earlier one.
    #[error("triangle {triangle} repeats the vertices of triangle {duplicate_of}")]
    DuplicateTriangle { triangle: usize, duplicate_of: usize },
    /// An edge is shared by more than two triangles.
    #[error("edge ({a}, {b}) is shared by {count} triangles")]
    NonManifoldEdge { a: usize, b: usize, count: usize },
    /// A triangle references a point the surface does not hold.
    #[error("triangle {triangle} references point {point} but only {len} points exist")]
    PointOutOfRange {
        triangle: usize,
        point: usize,
        len: usize,
    },
    #[error("particle index {index} is out of range (store holds {len})")]
    ParticleOutOfRange { index: usize, len: usize },
    #[error("a cluster needs at least one child")]
    EmptyCluster,
    #[error("particle {child} is listed twice")]
    DuplicateChild { child: usize },
    #[error("particle {child} already belongs to cluster {parent}")]
    ChildAlreadyClustered { child: usize, parent: usize },
    #[error("particle {child} is disabled and cannot join a cluster")]
    DisabledChild { child: usize },
    #[error("particle {index} is not a cluster parent")]
    NotACluster { index: usize },
    #[error("particle {child} is not a child of cluster {parent}")]
    NotAChild { child: usize, parent: usize },
}

/// Convenient Result alias for kernel operations.
pub type Result<T> = std::result::Result<T, KernelError>;
