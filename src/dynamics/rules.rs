//! Pluggable per-step behaviors of the evolution loop.
//!
//! Rules receive the whole [`ParticleStore`] and the index (or indices) they act on,
//! so they can read neighbors while mutating one particle.

use crate::core::ParticleStore;
use crate::dynamics::island::Island;
use crate::utils::math::angular_velocity_to_quat;

/// Accumulates forces on one active particle.
pub type ForceRule = Box<dyn FnMut(&mut ParticleStore, f32, usize) + Send>;

/// Produces predicted positions and rotations for the active set.
pub type IntegrationRule = Box<dyn FnMut(&mut ParticleStore, &[usize], f32) + Send>;

/// Drives one active kinematic particle; arguments are `(particles, dt, time, index)`.
pub type KinematicRule = Box<dyn FnMut(&mut ParticleStore, f32, f32, usize) + Send>;

/// Projects predicted state of an island onto a constraint manifold.
pub trait ConstraintRule: Send {
    fn apply(&mut self, particles: &mut ParticleStore, dt: f32, island: &Island);

    /// Particle pairs this rule couples. Coupled particles always share an island.
    fn connections(&self, _particles: &ParticleStore, _edges: &mut Vec<(usize, usize)>) {}
}

impl<F> ConstraintRule for F
where
    F: FnMut(&mut ParticleStore, f32, &Island) + Send,
{
    fn apply(&mut self, particles: &mut ParticleStore, dt: f32, island: &Island) {
        self(particles, dt, island)
    }
}

/// Moves a kinematic particle along its own velocities.
pub fn default_kinematic_rule() -> KinematicRule {
    Box::new(|particles: &mut ParticleStore, dt: f32, _time: f32, index: usize| {
        particles.predicted_positions[index] =
            particles.positions[index] + particles.linear_velocities[index] * dt;
        let delta = angular_velocity_to_quat(particles.angular_velocities[index], dt);
        particles.predicted_rotations[index] = (delta * particles.rotations[index]).normalize();
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Particle;
    use glam::Vec3;

    #[test]
    fn closures_are_constraint_rules() {
        let mut calls = 0;
        {
            let mut rule = |_: &mut ParticleStore, _: f32, island: &Island| {
                calls += island.particles.len();
            };
            let mut store = ParticleStore::new();
            store.add_particles(2);
            let island = Island {
                particles: vec![0, 1],
            };
            ConstraintRule::apply(&mut rule, &mut store, 0.1, &island);
        }
        assert_eq!(calls, 2);
    }

    #[test]
    fn kinematic_rule_follows_velocity() {
        let mut store = ParticleStore::new();
        let index = store.add_particle(Particle::new().kinematic().with_velocity(Vec3::X));
        let mut rule = default_kinematic_rule();
        rule(&mut store, 0.5, 0.0, index);
        assert_eq!(store.predicted_positions[index], Vec3::new(0.5, 0.0, 0.0));
    }
}
