use glam::Vec3;

use crate::config::DEFAULT_GRAVITY;
use crate::core::ParticleStore;

/// Trait describing an external force generator applied to particles.
pub trait ForceGenerator: Send + Sync {
    fn apply(&self, particles: &mut ParticleStore, index: usize, dt: f32);
}

fn is_driven(particles: &ParticleStore, index: usize) -> bool {
    particles.is_static(index) || particles.flags[index].kinematic
}

/// Constant gravity force scaled by particle mass.
pub struct GravityForce {
    pub gravity: Vec3,
}

impl GravityForce {
    pub fn new(gravity: Vec3) -> Self {
        Self { gravity }
    }
}

impl Default for GravityForce {
    fn default() -> Self {
        Self::new(Vec3::from_array(DEFAULT_GRAVITY))
    }
}

impl ForceGenerator for GravityForce {
    fn apply(&self, particles: &mut ParticleStore, index: usize, _dt: f32) {
        if is_driven(particles, index) {
            return;
        }
        let force = self.gravity * particles.masses[index];
        particles.apply_force(index, force);
    }
}

/// Quadratic drag resisting the direction of motion.
pub struct DragForce {
    pub drag_coefficient: f32,
}

impl ForceGenerator for DragForce {
    fn apply(&self, particles: &mut ParticleStore, index: usize, _dt: f32) {
        if is_driven(particles, index) {
            return;
        }

        let velocity = particles.linear_velocities[index];
        let speed = velocity.length();
        if speed < 1e-6 {
            return;
        }

        let drag = -velocity / speed * speed * speed * self.drag_coefficient;
        particles.apply_force(index, drag);
    }
}

/// Hookean spring pulling a particle toward a fixed anchor.
pub struct SpringForce {
    pub anchor: Vec3,
    pub rest_length: f32,
    pub spring_constant: f32,
    pub damping: f32,
}

impl ForceGenerator for SpringForce {
    fn apply(&self, particles: &mut ParticleStore, index: usize, _dt: f32) {
        if is_driven(particles, index) {
            return;
        }
        let displacement = particles.positions[index] - self.anchor;
        let distance = displacement.length();
        if distance < 1e-6 {
            return;
        }

        let extension = distance - self.rest_length;
        let spring_force = -self.spring_constant * extension * (displacement / distance);
        let damping_force = -self.damping * particles.linear_velocities[index];

        particles.apply_force(index, spring_force + damping_force);
    }
}
