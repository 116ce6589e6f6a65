//! Closest intersection between a line segment and a thickened shape.
//!
//! Spheres, boxes and planes are solved in closed form. Meshes and unions fall back
//! to marching along the segment using the signed distance field.

use glam::Vec3;

use super::shape::Shape;
use crate::config::RayMarchSettings;

impl Shape {
    /// First point of the segment `start -> end` on the surface inflated by `thickness`.
    pub fn closest_intersection(&self, start: Vec3, end: Vec3, thickness: f32) -> Option<Vec3> {
        self.closest_intersection_with(start, end, thickness, &RayMarchSettings::default())
    }

    pub fn closest_intersection_with(
        &self,
        start: Vec3,
        end: Vec3,
        thickness: f32,
        settings: &RayMarchSettings,
    ) -> Option<Vec3> {
        let segment = end - start;
        if segment.length() < settings.surface_epsilon {
            return self.snap_if_in_band(start, thickness, settings.surface_epsilon);
        }

        match self {
            Shape::Sphere { center, radius } => {
                sphere_intersection(*center, radius + thickness, start, end)
            }
            Shape::Box { min, max } => box_intersection(
                *min - Vec3::splat(thickness),
                *max + Vec3::splat(thickness),
                start,
                end,
            ),
            Shape::Plane { point, normal } => {
                plane_intersection(*point, *normal, thickness, start, end)
            }
            Shape::TriangleMesh(_) | Shape::Union(_) => {
                self.march_intersection(start, end, thickness, settings)
            }
        }
    }

    /// Sphere-traces the segment through the signed distance field.
    ///
    /// Works for every shape; the closed-form variants only use it as a reference.
    pub fn march_intersection(
        &self,
        start: Vec3,
        end: Vec3,
        thickness: f32,
        settings: &RayMarchSettings,
    ) -> Option<Vec3> {
        let epsilon = settings.surface_epsilon;

        let (start_phi, start_normal) = self.signed_distance_and_normal(start);
        if (start_phi - thickness).abs() <= epsilon {
            return Some(start + start_normal * (thickness - start_phi));
        }

        let mut target = end;
        if (target - start).length() < epsilon {
            return None;
        }

        let mut end_hit = None;
        let (end_phi, end_normal) = self.signed_distance_and_normal(end);
        if (end_phi - thickness).abs() <= epsilon {
            let snapped_end = end + end_normal * (thickness - end_phi);
            let alignment = (end - start).normalize().dot(end_normal);
            if alignment.abs() < epsilon {
                return Some(snapped_end);
            }
            // Move the end out of the band so the march cannot stop on it early.
            target = end + end_normal * (2.0 * epsilon * alignment.signum());
            end_hit = Some(snapped_end);
        }

        let length = (target - start).length();
        let direction = (target - start) / length;

        let mut closest = start;
        let (mut phi, mut normal) = (start_phi, start_normal);
        let mut traveled = 0.0;

        loop {
            if phi <= thickness + epsilon {
                return Some(closest + normal * (thickness - phi));
            }

            let step = ((phi - thickness) * settings.step_multiplier).max(settings.min_step);
            if !step.is_finite() {
                break;
            }
            traveled += step;
            if traveled > length {
                break;
            }
            closest += direction * step;

            let (next_phi, next_normal) = self.signed_distance_and_normal(closest);
            // Also rejects NaN distances.
            if !(next_phi < phi) {
                break;
            }
            phi = next_phi;
            normal = next_normal;
        }

        end_hit
    }

    fn snap_if_in_band(&self, point: Vec3, thickness: f32, epsilon: f32) -> Option<Vec3> {
        let (phi, normal) = self.signed_distance_and_normal(point);
        ((phi - thickness).abs() <= epsilon).then(|| point + normal * (thickness - phi))
    }
}

fn sphere_intersection(center: Vec3, radius: f32, start: Vec3, end: Vec3) -> Option<Vec3> {
    let segment = end - start;
    let length = segment.length();
    let direction = segment / length;

    let to_center = center - start;
    let projection = to_center.dot(direction);
    let discriminant = radius * radius - (to_center.length_squared() - projection * projection);
    if discriminant < 0.0 {
        return None;
    }

    let root = discriminant.sqrt();
    [projection - root, projection + root]
        .into_iter()
        .find(|t| (0.0..=length).contains(t))
        .map(|t| start + direction * t)
}

fn box_intersection(min: Vec3, max: Vec3, start: Vec3, end: Vec3) -> Option<Vec3> {
    let segment = end - start;
    let length = segment.length();
    let direction = segment / length;

    let mut t_enter = f32::NEG_INFINITY;
    let mut t_exit = f32::INFINITY;
    for axis in 0..3 {
        if direction[axis].abs() < 1e-8 {
            if start[axis] < min[axis] || start[axis] > max[axis] {
                return None;
            }
            continue;
        }
        let inv = 1.0 / direction[axis];
        let mut t0 = (min[axis] - start[axis]) * inv;
        let mut t1 = (max[axis] - start[axis]) * inv;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_enter = t_enter.max(t0);
        t_exit = t_exit.min(t1);
        if t_enter > t_exit {
            return None;
        }
    }

    [t_enter, t_exit]
        .into_iter()
        .find(|t| (0.0..=length).contains(t))
        .map(|t| start + direction * t)
}

fn plane_intersection(
    point: Vec3,
    normal: Vec3,
    thickness: f32,
    start: Vec3,
    end: Vec3,
) -> Option<Vec3> {
    let d0 = (start - point).dot(normal) - thickness;
    let d1 = (end - point).dot(normal) - thickness;
    if d0 == 0.0 {
        return Some(start);
    }
    if d0 * d1 > 0.0 {
        return None;
    }
    let t = d0 / (d0 - d1);
    Some(start + (end - start) * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sphere_entry_point_is_preferred() {
        let sphere = Shape::sphere(Vec3::ZERO, 1.0);
        let hit = sphere
            .closest_intersection(Vec3::new(-3.0, 0.0, 0.0), Vec3::new(3.0, 0.0, 0.0), 0.0)
            .unwrap();
        assert_relative_eq!(hit.x, -1.0, epsilon = 1e-6);
    }

    #[test]
    fn sphere_exit_point_when_starting_inside() {
        let sphere = Shape::sphere(Vec3::ZERO, 1.0);
        let hit = sphere
            .closest_intersection(Vec3::ZERO, Vec3::new(0.0, 5.0, 0.0), 0.0)
            .unwrap();
        assert_relative_eq!(hit.y, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn box_slab_hits_thickened_face() {
        let shape = Shape::cuboid(Vec3::splat(-1.0), Vec3::splat(1.0));
        let hit = shape
            .closest_intersection(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -5.0), 0.5)
            .unwrap();
        assert_relative_eq!(hit.z, 1.5, epsilon = 1e-5);

        assert!(shape
            .closest_intersection(Vec3::new(5.0, 5.0, 0.0), Vec3::new(5.0, -5.0, 0.0), 0.0)
            .is_none());
    }

    #[test]
    fn plane_crossing_is_interpolated() {
        let plane = Shape::plane(Vec3::ZERO, Vec3::Y);
        let hit = plane
            .closest_intersection(Vec3::new(1.0, 3.0, 0.0), Vec3::new(1.0, -1.0, 0.0), 0.0)
            .unwrap();
        assert_relative_eq!(hit.y, 0.0, epsilon = 1e-6);
        assert!(plane
            .closest_intersection(Vec3::new(0.0, 3.0, 0.0), Vec3::new(0.0, 1.0, 0.0), 0.0)
            .is_none());
    }

    #[test]
    fn march_agrees_with_closed_form() {
        let sphere = Shape::sphere(Vec3::new(0.5, 0.0, 0.0), 1.0);
        let settings = RayMarchSettings::default();
        let start = Vec3::new(-4.0, 0.2, 0.0);
        let end = Vec3::new(4.0, 0.2, 0.0);
        let exact = sphere.closest_intersection(start, end, 0.0).unwrap();
        let marched = sphere.march_intersection(start, end, 0.0, &settings).unwrap();
        assert!((exact - marched).length() < 1e-2);
    }

    #[test]
    fn zero_length_segment_misses_unless_on_surface() {
        let sphere = Shape::sphere(Vec3::ZERO, 1.0);
        let p = Vec3::new(0.0, 2.0, 0.0);
        assert!(sphere.closest_intersection(p, p, 0.0).is_none());
        let on = Vec3::new(0.0, 1.0, 0.0);
        assert!(sphere.closest_intersection(on, on, 0.0).is_some());
    }
}
