use glam::{Quat, Vec3};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::config::{DEFAULT_ANGULAR_DAMPING, DEFAULT_LINEAR_DAMPING};
use crate::core::ParticleStore;
use crate::utils::math::angular_velocity_to_quat;

/// Below this many active particles the parallel path is not worth the fork.
#[cfg(feature = "parallel")]
const PARALLEL_THRESHOLD: usize = 256;

/// Semi-implicit Euler producing predicted positions and rotations.
///
/// Static and kinematic particles are left at `p = x`, `q = r`; the kinematic rule
/// moves the latter afterwards.
#[derive(Debug, Clone)]
pub struct Integrator {
    pub linear_damping: f32,
    pub angular_damping: f32,
    parallel: bool,
}

#[derive(Debug, Clone, Copy)]
struct Prediction {
    linear: Vec3,
    angular: Vec3,
    position: Vec3,
    rotation: Quat,
}

impl Default for Integrator {
    fn default() -> Self {
        Self::new(DEFAULT_LINEAR_DAMPING, DEFAULT_ANGULAR_DAMPING)
    }
}

impl Integrator {
    pub fn new(linear_damping: f32, angular_damping: f32) -> Self {
        Self {
            linear_damping,
            angular_damping,
            parallel: cfg!(feature = "parallel"),
        }
    }

    /// Has no effect unless the crate is built with the `parallel` feature.
    pub fn set_parallel(&mut self, enabled: bool) {
        self.parallel = enabled;
    }

    pub fn parallel(&self) -> bool {
        self.parallel
    }

    fn predict(&self, particles: &ParticleStore, index: usize, dt: f32) -> Prediction {
        let position = particles.positions[index];
        let rotation = particles.rotations[index];
        let mut linear = particles.linear_velocities[index];
        let mut angular = particles.angular_velocities[index];

        if particles.is_static(index) || particles.flags[index].kinematic {
            return Prediction {
                linear,
                angular,
                position,
                rotation,
            };
        }

        linear += particles.forces[index] * particles.inverse_masses[index] * dt;
        angular += particles.world_inverse_inertia(index) * particles.torques[index] * dt;

        linear *= (1.0 - self.linear_damping * dt).max(0.0);
        angular *= (1.0 - self.angular_damping * dt).max(0.0);

        Prediction {
            linear,
            angular,
            position: position + linear * dt,
            rotation: (angular_velocity_to_quat(angular, dt) * rotation).normalize(),
        }
    }

    fn write_back(particles: &mut ParticleStore, index: usize, prediction: Prediction) {
        particles.linear_velocities[index] = prediction.linear;
        particles.angular_velocities[index] = prediction.angular;
        particles.predicted_positions[index] = prediction.position;
        particles.predicted_rotations[index] = prediction.rotation;
        particles.clear_accumulators(index);
    }

    pub fn integrate(&self, particles: &mut ParticleStore, active: &[usize], dt: f32) {
        if self.integrate_parallel(particles, active, dt) {
            return;
        }
        for &index in active {
            let prediction = self.predict(particles, index, dt);
            Self::write_back(particles, index, prediction);
        }
    }

    /// Predicts on the rayon pool, then writes results back in index order.
    #[cfg(feature = "parallel")]
    fn integrate_parallel(&self, particles: &mut ParticleStore, active: &[usize], dt: f32) -> bool {
        if !self.parallel || active.len() < PARALLEL_THRESHOLD {
            return false;
        }
        let store: &ParticleStore = particles;
        let predictions: Vec<Prediction> = active
            .par_iter()
            .map(|&index| self.predict(store, index, dt))
            .collect();
        for (&index, prediction) in active.iter().zip(predictions) {
            Self::write_back(particles, index, prediction);
        }
        true
    }

    #[cfg(not(feature = "parallel"))]
    fn integrate_parallel(&self, _: &mut ParticleStore, _: &[usize], _: f32) -> bool {
        false
    }
}
