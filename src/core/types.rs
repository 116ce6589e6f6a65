use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Rigid frame: position and orientation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Applies another transform on top of this one, returning the composition.
    pub fn combine(&self, other: &Transform) -> Transform {
        Transform {
            position: self.position + self.rotation * other.position,
            rotation: (self.rotation * other.rotation).normalize(),
        }
    }

    pub fn inverse(&self) -> Transform {
        let rotation = self.rotation.inverse();
        Transform {
            position: rotation * -self.position,
            rotation,
        }
    }

    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.position + self.rotation * point
    }

    pub fn inverse_transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation.inverse() * (point - self.position)
    }

    pub fn transform_vector(&self, vector: Vec3) -> Vec3 {
        self.rotation * vector
    }
}

/// Linear and angular velocity of a particle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub linear: Vec3,
    pub angular: Vec3,
}

/// Mass and local inertia tensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MassProperties {
    pub mass: f32,
    pub inertia: Mat3,
}

impl Default for MassProperties {
    fn default() -> Self {
        Self {
            mass: 1.0,
            inertia: Mat3::IDENTITY,
        }
    }
}

impl MassProperties {
    /// Static bodies carry zero mass and never move under forces.
    pub fn infinite() -> Self {
        Self {
            mass: 0.0,
            inertia: Mat3::ZERO,
        }
    }

    pub fn inverse_mass(&self) -> f32 {
        if self.mass.abs() < f32::EPSILON {
            0.0
        } else {
            1.0 / self.mass
        }
    }

    pub fn inverse_inertia(&self) -> Mat3 {
        if self.inertia.determinant().abs() < f32::EPSILON {
            Mat3::ZERO
        } else {
            self.inertia.inverse()
        }
    }
}

/// Helper methods for inertia calculations.
pub trait InertiaTensorExt {
    fn for_solid_box(half_extents: Vec3, mass: f32) -> Mat3;
    fn for_solid_sphere(radius: f32, mass: f32) -> Mat3;
    /// Inertia of a point mass at `offset` about the origin (parallel-axis term).
    fn for_point_mass(offset: Vec3, mass: f32) -> Mat3;
}

impl InertiaTensorExt for Mat3 {
    fn for_solid_box(half_extents: Vec3, mass: f32) -> Mat3 {
        let lx = half_extents.x * 2.0;
        let ly = half_extents.y * 2.0;
        let lz = half_extents.z * 2.0;
        let factor = mass / 12.0;
        Mat3::from_diagonal(Vec3::new(
            factor * (ly * ly + lz * lz),
            factor * (lx * lx + lz * lz),
            factor * (lx * lx + ly * ly),
        ))
    }

    fn for_solid_sphere(radius: f32, mass: f32) -> Mat3 {
        let value = 0.4 * mass * radius * radius;
        Mat3::from_diagonal(Vec3::splat(value))
    }

    fn for_point_mass(offset: Vec3, mass: f32) -> Mat3 {
        let outer = Mat3::from_cols(offset * offset.x, offset * offset.y, offset * offset.z);
        (Mat3::from_diagonal(Vec3::splat(offset.length_squared())) - outer) * mass
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn inverse_transform_round_trips_points() {
        let transform = Transform::from_position_rotation(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_rotation_y(0.7),
        );
        let point = Vec3::new(-0.5, 4.0, 2.0);
        let back = transform.inverse_transform_point(transform.transform_point(point));
        assert_relative_eq!(back.x, point.x, epsilon = 1e-5);
        assert_relative_eq!(back.y, point.y, epsilon = 1e-5);
        assert_relative_eq!(back.z, point.z, epsilon = 1e-5);

        let via_inverse = transform.inverse().transform_point(transform.transform_point(point));
        assert!((via_inverse - point).length() < 1e-5);
    }

    #[test]
    fn point_mass_inertia_matches_parallel_axis() {
        let inertia = Mat3::for_point_mass(Vec3::new(2.0, 0.0, 0.0), 3.0);
        assert_relative_eq!(inertia.x_axis.x, 0.0);
        assert_relative_eq!(inertia.y_axis.y, 12.0);
        assert_relative_eq!(inertia.z_axis.z, 12.0);
    }

    #[test]
    fn zero_mass_has_zero_inverse() {
        let props = MassProperties::infinite();
        assert_eq!(props.inverse_mass(), 0.0);
        assert_eq!(props.inverse_inertia(), Mat3::ZERO);
    }
}
