//! Additional math helpers layered on top of `glam`.

use glam::{Mat3, Quat, Vec3};

/// Converts angular velocity vector (radians/sec) into a quaternion delta.
pub fn angular_velocity_to_quat(angular: Vec3, dt: f32) -> Quat {
    let angle = angular.length() * dt;
    if angle.abs() < 1e-6 {
        return Quat::IDENTITY;
    }
    let axis = angular.normalize();
    Quat::from_axis_angle(axis, angle)
}

/// Recovers the angular velocity that rotates `from` into `to` over `dt`.
pub fn quat_delta_to_angular_velocity(from: Quat, to: Quat, dt: f32) -> Vec3 {
    if dt <= 0.0 {
        return Vec3::ZERO;
    }
    let mut delta = to * from.inverse();
    // Take the short way round.
    if delta.w < 0.0 {
        delta = -delta;
    }
    let (axis, angle) = delta.to_axis_angle();
    if angle.abs() < 1e-6 {
        return Vec3::ZERO;
    }
    axis * (angle / dt)
}

/// Rotates a local inertia tensor into world space.
pub fn rotate_inertia(rotation: Quat, inertia: Mat3) -> Mat3 {
    let basis = Mat3::from_quat(rotation);
    basis * inertia * basis.transpose()
}
