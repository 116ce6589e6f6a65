//! Position-based distance constraints.

use serde::{Deserialize, Serialize};

use crate::core::ParticleStore;
use crate::dynamics::{island::Island, rules::ConstraintRule};

/// Keeps two particles `rest_length` apart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceConstraint {
    pub a: usize,
    pub b: usize,
    pub rest_length: f32,
}

/// A set of distance constraints projected on predicted positions.
///
/// Kinematic and static endpoints are treated as immovable.
#[derive(Debug, Clone, Default)]
pub struct DistanceConstraints {
    constraints: Vec<DistanceConstraint>,
    stiffness: f32,
}

impl DistanceConstraints {
    pub fn new(stiffness: f32) -> Self {
        Self {
            constraints: Vec::new(),
            stiffness: stiffness.clamp(0.0, 1.0),
        }
    }

    pub fn add(&mut self, a: usize, b: usize, rest_length: f32) {
        self.constraints.push(DistanceConstraint { a, b, rest_length });
    }

    /// Adds a constraint that preserves the current distance between `a` and `b`.
    pub fn add_from_current(&mut self, particles: &ParticleStore, a: usize, b: usize) {
        let rest_length = (particles.positions[a] - particles.positions[b]).length();
        self.add(a, b, rest_length);
    }

    pub fn constraints(&self) -> &[DistanceConstraint] {
        &self.constraints
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    fn weight(particles: &ParticleStore, index: usize) -> f32 {
        if particles.flags[index].kinematic {
            0.0
        } else {
            particles.inverse_masses[index]
        }
    }
}

impl ConstraintRule for DistanceConstraints {
    fn apply(&mut self, particles: &mut ParticleStore, _dt: f32, island: &Island) {
        for constraint in &self.constraints {
            let DistanceConstraint { a, b, rest_length } = *constraint;
            if !island.contains(a) || !island.contains(b) {
                continue;
            }

            let wa = Self::weight(particles, a);
            let wb = Self::weight(particles, b);
            let total = wa + wb;
            if total <= 0.0 {
                continue;
            }

            let delta = particles.predicted_positions[b] - particles.predicted_positions[a];
            let length = delta.length();
            if length < 1e-6 {
                continue;
            }

            let correction = delta * ((length - rest_length) / length * self.stiffness / total);
            particles.predicted_positions[a] += correction * wa;
            particles.predicted_positions[b] -= correction * wb;
        }
    }

    fn connections(&self, _particles: &ParticleStore, edges: &mut Vec<(usize, usize)>) {
        edges.extend(self.constraints.iter().map(|c| (c.a, c.b)));
    }
}
