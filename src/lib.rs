//! Particle Evolution – rigid shapes and a fixed-step particle evolution loop.
//!
//! The crate pairs implicit shape queries (signed distance, support points and
//! closest segment intersection) with an evolution loop that advances a flat
//! particle store through pluggable rules, solves islands independently and
//! manages clusters that fracture under strain.

pub mod config;
pub mod core;
pub mod dynamics;
pub mod error;
pub mod evolution;
pub mod geometry;
pub mod utils;

pub use glam::{Mat3, Quat, Vec3};

pub use config::{EvolutionConfig, RayMarchSettings};
pub use core::{
    particles::{Particle, ParticleFlags, ParticleStore},
    types::{InertiaTensorExt, MassProperties, Transform, Velocity},
};
pub use dynamics::{
    clustering::{ClusterInfo, ClusterManager},
    constraints::{DistanceConstraint, DistanceConstraints},
    forces::{DragForce, ForceGenerator, GravityForce, SpringForce},
    integrator::Integrator,
    island::{Island, IslandManager},
    rules::{ConstraintRule, ForceRule, IntegrationRule, KinematicRule},
};
pub use error::{KernelError, Result};
pub use evolution::{
    debug::{DebugController, DebugStepper},
    Evolution,
};
pub use geometry::{Aabb, MeshBuilder, Shape, ShapeMember, TriangleMesh, TriangleMeshSurface};
pub use utils::profiling::StepProfile;
