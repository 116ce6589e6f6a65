//! Simulation dynamics: rules, integration, forces, constraints, islands and clusters.

pub mod clustering;
pub mod constraints;
pub mod forces;
pub mod integrator;
pub mod island;
pub mod rules;

pub use clustering::{ClusterInfo, ClusterManager};
pub use constraints::{DistanceConstraint, DistanceConstraints};
pub use forces::{DragForce, ForceGenerator, GravityForce, SpringForce};
pub use integrator::Integrator;
pub use island::{Island, IslandManager};
pub use rules::{ConstraintRule, ForceRule, IntegrationRule, KinematicRule};
