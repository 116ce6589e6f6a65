use std::ops::Range;
use std::sync::Arc;

use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::core::types::{InertiaTensorExt, MassProperties, Transform, Velocity};
use crate::geometry::Shape;
use crate::utils::math::rotate_inertia;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticleFlags {
    pub sleeping: bool,
    pub disabled: bool,
    pub kinematic: bool,
}

impl ParticleFlags {
    /// Simulated this step: neither asleep nor disabled.
    pub fn is_active(&self) -> bool {
        !self.sleeping && !self.disabled
    }
}

/// Description of a particle before it is inserted into a [`ParticleStore`].
#[derive(Debug, Clone)]
pub struct Particle {
    pub transform: Transform,
    pub velocity: Velocity,
    pub mass_properties: MassProperties,
    pub shape: Option<Arc<Shape>>,
    pub flags: ParticleFlags,
}

impl Default for Particle {
    fn default() -> Self {
        Self::new()
    }
}

impl Particle {
    pub fn new() -> Self {
        Self {
            transform: Transform::default(),
            velocity: Velocity::default(),
            mass_properties: MassProperties::default(),
            shape: None,
            flags: ParticleFlags::default(),
        }
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.transform.position = position;
        self
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.transform.rotation = rotation;
        self
    }

    pub fn with_velocity(mut self, linear: Vec3) -> Self {
        self.velocity.linear = linear;
        self
    }

    pub fn with_angular_velocity(mut self, angular: Vec3) -> Self {
        self.velocity.angular = angular;
        self
    }

    pub fn with_mass_properties(mut self, mass_properties: MassProperties) -> Self {
        self.mass_properties = mass_properties;
        self
    }

    /// Sets the mass and scales the inertia tensor with it.
    pub fn with_mass(mut self, mass: f32) -> Self {
        let current = self.mass_properties.mass;
        self.mass_properties.inertia = if current.abs() > f32::EPSILON {
            self.mass_properties.inertia * (mass / current)
        } else {
            Mat3::IDENTITY * mass
        };
        self.mass_properties.mass = mass;
        self
    }

    pub fn with_shape(mut self, shape: Arc<Shape>) -> Self {
        self.shape = Some(shape);
        self
    }

    /// Sets the shape along with the mass properties of a uniform solid filling it.
    ///
    /// Spheres and boxes get their exact inertia about the particle origin. Other shapes
    /// fall back to `mass` times identity.
    pub fn with_solid_shape(mut self, shape: Arc<Shape>, mass: f32) -> Self {
        let inertia = match &*shape {
            Shape::Sphere { center, radius } => {
                Mat3::for_solid_sphere(*radius, mass) + Mat3::for_point_mass(*center, mass)
            }
            Shape::Box { min, max } => {
                Mat3::for_solid_box((*max - *min) * 0.5, mass)
                    + Mat3::for_point_mass((*min + *max) * 0.5, mass)
            }
            _ => Mat3::IDENTITY * mass,
        };
        self.mass_properties = MassProperties { mass, inertia };
        self.shape = Some(shape);
        self
    }

    /// Driven by the kinematic rule instead of forces.
    pub fn kinematic(mut self) -> Self {
        self.flags.kinematic = true;
        self
    }

    /// Infinite mass: never moved by forces or constraints.
    pub fn static_body(mut self) -> Self {
        self.mass_properties = MassProperties::infinite();
        self
    }

    pub fn sleeping(mut self) -> Self {
        self.flags.sleeping = true;
        self
    }
}

/// Structure-of-arrays storage for every particle of a simulation.
///
/// Particles are addressed by their index and never removed; disabling a particle
/// takes it out of the simulation. Rules read and write the public vectors directly.
#[derive(Debug, Clone, Default)]
pub struct ParticleStore {
    pub positions: Vec<Vec3>,
    pub rotations: Vec<Quat>,
    /// Position-based dynamics scratch state, committed at the end of a step.
    pub predicted_positions: Vec<Vec3>,
    pub predicted_rotations: Vec<Quat>,
    pub linear_velocities: Vec<Vec3>,
    pub angular_velocities: Vec<Vec3>,
    pub forces: Vec<Vec3>,
    pub torques: Vec<Vec3>,

    pub masses: Vec<f32>,
    pub inverse_masses: Vec<f32>,
    /// Local-frame inertia tensors.
    pub inertias: Vec<Mat3>,
    pub inverse_inertias: Vec<Mat3>,

    pub shapes: Vec<Option<Arc<Shape>>>,
    pub flags: Vec<ParticleFlags>,
    pub cluster_parents: Vec<Option<usize>>,
    pub strains: Vec<f32>,
}

impl ParticleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            positions: Vec::with_capacity(capacity),
            rotations: Vec::with_capacity(capacity),
            predicted_positions: Vec::with_capacity(capacity),
            predicted_rotations: Vec::with_capacity(capacity),
            linear_velocities: Vec::with_capacity(capacity),
            angular_velocities: Vec::with_capacity(capacity),
            forces: Vec::with_capacity(capacity),
            torques: Vec::with_capacity(capacity),
            masses: Vec::with_capacity(capacity),
            inverse_masses: Vec::with_capacity(capacity),
            inertias: Vec::with_capacity(capacity),
            inverse_inertias: Vec::with_capacity(capacity),
            shapes: Vec::with_capacity(capacity),
            flags: Vec::with_capacity(capacity),
            cluster_parents: Vec::with_capacity(capacity),
            strains: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Appends a particle and returns its index.
    pub fn add_particle(&mut self, particle: Particle) -> usize {
        let index = self.len();
        let Particle {
            transform,
            velocity,
            mass_properties,
            shape,
            flags,
        } = particle;

        self.positions.push(transform.position);
        self.rotations.push(transform.rotation);
        self.predicted_positions.push(transform.position);
        self.predicted_rotations.push(transform.rotation);
        self.linear_velocities.push(velocity.linear);
        self.angular_velocities.push(velocity.angular);
        self.forces.push(Vec3::ZERO);
        self.torques.push(Vec3::ZERO);
        self.masses.push(mass_properties.mass);
        self.inverse_masses.push(mass_properties.inverse_mass());
        self.inertias.push(mass_properties.inertia);
        self.inverse_inertias.push(mass_properties.inverse_inertia());
        self.shapes.push(shape);
        self.flags.push(flags);
        self.cluster_parents.push(None);
        self.strains.push(0.0);
        index
    }

    /// Appends `count` default particles.
    pub fn add_particles(&mut self, count: usize) -> Range<usize> {
        let start = self.len();
        for _ in 0..count {
            self.add_particle(Particle::new());
        }
        start..self.len()
    }

    pub fn position(&self, index: usize) -> Vec3 {
        self.positions[index]
    }

    pub fn rotation(&self, index: usize) -> Quat {
        self.rotations[index]
    }

    pub fn transform(&self, index: usize) -> Transform {
        Transform::from_position_rotation(self.positions[index], self.rotations[index])
    }

    pub fn velocity(&self, index: usize) -> Velocity {
        Velocity {
            linear: self.linear_velocities[index],
            angular: self.angular_velocities[index],
        }
    }

    pub fn mass(&self, index: usize) -> f32 {
        self.masses[index]
    }

    pub fn inverse_mass(&self, index: usize) -> f32 {
        self.inverse_masses[index]
    }

    pub fn mass_properties(&self, index: usize) -> MassProperties {
        MassProperties {
            mass: self.masses[index],
            inertia: self.inertias[index],
        }
    }

    /// Replaces mass and inertia, refreshing the cached inverses.
    pub fn set_mass_properties(&mut self, index: usize, mass_properties: MassProperties) {
        self.masses[index] = mass_properties.mass;
        self.inverse_masses[index] = mass_properties.inverse_mass();
        self.inertias[index] = mass_properties.inertia;
        self.inverse_inertias[index] = mass_properties.inverse_inertia();
    }

    pub fn is_static(&self, index: usize) -> bool {
        self.inverse_masses[index] == 0.0
    }

    pub fn flags(&self, index: usize) -> ParticleFlags {
        self.flags[index]
    }

    pub fn shape(&self, index: usize) -> Option<&Arc<Shape>> {
        self.shapes[index].as_ref()
    }

    pub fn is_active(&self, index: usize) -> bool {
        self.flags[index].is_active()
    }

    pub fn cluster_parent(&self, index: usize) -> Option<usize> {
        self.cluster_parents[index]
    }

    /// Teleports a particle, keeping its predicted state in sync.
    pub fn set_position(&mut self, index: usize, position: Vec3) {
        self.positions[index] = position;
        self.predicted_positions[index] = position;
    }

    pub fn set_velocity(&mut self, index: usize, velocity: Velocity) {
        self.linear_velocities[index] = velocity.linear;
        self.angular_velocities[index] = velocity.angular;
    }

    pub fn apply_force(&mut self, index: usize, force: Vec3) {
        self.forces[index] += force;
    }

    pub fn apply_torque(&mut self, index: usize, torque: Vec3) {
        self.torques[index] += torque;
    }

    /// Instant change of momentum through the world-space point `at`.
    pub fn apply_impulse(&mut self, index: usize, impulse: Vec3, at: Vec3) {
        if self.is_static(index) {
            return;
        }
        self.linear_velocities[index] += impulse * self.inverse_masses[index];
        let arm = at - self.positions[index];
        let angular = self.world_inverse_inertia(index) * arm.cross(impulse);
        self.angular_velocities[index] += angular;
    }

    pub fn world_inverse_inertia(&self, index: usize) -> Mat3 {
        rotate_inertia(self.rotations[index], self.inverse_inertias[index])
    }

    pub fn clear_accumulators(&mut self, index: usize) {
        self.forces[index] = Vec3::ZERO;
        self.torques[index] = Vec3::ZERO;
    }

    /// Panics unless every attribute vector has one entry per particle.
    pub fn assert_consistent(&self) {
        let len = self.len();
        let lengths = [
            ("rotations", self.rotations.len()),
            ("predicted_positions", self.predicted_positions.len()),
            ("predicted_rotations", self.predicted_rotations.len()),
            ("linear_velocities", self.linear_velocities.len()),
            ("angular_velocities", self.angular_velocities.len()),
            ("forces", self.forces.len()),
            ("torques", self.torques.len()),
            ("masses", self.masses.len()),
            ("inverse_masses", self.inverse_masses.len()),
            ("inertias", self.inertias.len()),
            ("inverse_inertias", self.inverse_inertias.len()),
            ("shapes", self.shapes.len()),
            ("flags", self.flags.len()),
            ("cluster_parents", self.cluster_parents.len()),
            ("strains", self.strains.len()),
        ];
        for (name, value) in lengths {
            assert_eq!(
                value, len,
                "particle store column `{name}` has {value} entries, expected {len}"
            );
        }
    }
}
