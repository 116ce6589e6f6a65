use approx::assert_relative_eq;
use particle_evolution::{
    KernelError, RayMarchSettings, Shape, ShapeMember, Transform, Vec3,
};

const CUBE_TRIANGLES: [[usize; 3]; 12] = [
    [0, 4, 6],
    [0, 6, 2],
    [1, 3, 7],
    [1, 7, 5],
    [0, 1, 5],
    [0, 5, 4],
    [2, 6, 7],
    [2, 7, 3],
    [0, 2, 3],
    [0, 3, 1],
    [4, 5, 7],
    [4, 7, 6],
];

/// Unit cube centered at the origin, wound counter-clockwise seen from outside.
fn cube_mesh() -> Shape {
    let points = (0..8)
        .map(|i| {
            Vec3::new(
                if i & 1 == 0 { -0.5 } else { 0.5 },
                if i & 2 == 0 { -0.5 } else { 0.5 },
                if i & 4 == 0 { -0.5 } else { 0.5 },
            )
        })
        .collect();
    Shape::triangle_mesh(points, CUBE_TRIANGLES.to_vec()).expect("cube mesh is valid")
}

#[test]
fn sphere_distance_and_normal_are_self_consistent() {
    let spheres = [
        (Vec3::ZERO, 1.0),
        (Vec3::new(3.0, -2.0, 0.5), 0.25),
        (Vec3::new(-10.0, 4.0, 7.0), 5.0),
    ];
    for (center, radius) in spheres {
        let shape = Shape::sphere(center, radius);
        for i in 0..27 {
            let offset = Vec3::new(
                (i % 3) as f32 - 1.0,
                ((i / 3) % 3) as f32 - 1.0,
                (i / 9) as f32 - 1.0,
            ) * 1.7
                + Vec3::new(0.13, 0.07, -0.05);
            let p = center + offset;
            let (distance, normal) = shape.signed_distance_and_normal(p);

            let surface = p - normal * distance;
            assert!(
                ((surface - center).length() - radius).abs() < 1e-4,
                "surface point off by {} for {:?}",
                (surface - center).length() - radius,
                p
            );
            assert!((p - normal * (distance + radius) - center).length() < 1e-4);
        }
    }
}

#[test]
fn sphere_segment_through_center_hits_near_side() {
    let sphere = Shape::sphere(Vec3::ZERO, 1.0);
    let hit = sphere
        .closest_intersection(Vec3::new(-5.0, 0.0, 0.0), Vec3::new(5.0, 0.0, 0.0), 0.0)
        .expect("segment crosses the sphere");
    assert_relative_eq!(hit.x, -1.0, epsilon = 1e-5);
    assert_relative_eq!(hit.y, 0.0);
    assert_relative_eq!(hit.z, 0.0);
}

#[test]
fn sphere_segment_moving_away_misses() {
    let sphere = Shape::sphere(Vec3::ZERO, 1.0);
    let hit = sphere.closest_intersection(Vec3::new(2.0, 0.0, 0.0), Vec3::new(5.0, 0.0, 0.0), 0.0);
    assert!(hit.is_none());
}

#[test]
fn sphere_earliest_root_wins() {
    let sphere = Shape::sphere(Vec3::new(0.0, 0.0, 2.0), 1.0);
    let hit = sphere
        .closest_intersection(Vec3::ZERO, Vec3::new(0.0, 0.0, 10.0), 0.0)
        .unwrap();
    assert_relative_eq!(hit.z, 1.0, epsilon = 1e-5);

    let reversed = sphere
        .closest_intersection(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, 0.0)
        .unwrap();
    assert_relative_eq!(reversed.z, 3.0, epsilon = 1e-5);
}

#[test]
fn sphere_thickness_inflates_radius() {
    let sphere = Shape::sphere(Vec3::ZERO, 1.0);
    let start = Vec3::new(-5.0, 1.2, 0.0);
    let end = Vec3::new(5.0, 1.2, 0.0);
    assert!(sphere.closest_intersection(start, end, 0.0).is_none());
    assert!(sphere.closest_intersection(start, end, 0.1).is_none());

    let hit = sphere.closest_intersection(start, end, 0.5).unwrap();
    assert!((hit.length() - 1.5).abs() < 1e-4);
}

#[test]
fn mesh_segment_marches_onto_face() {
    let cube = cube_mesh();
    let hit = cube
        .closest_intersection(Vec3::new(-5.0, 0.1, 0.2), Vec3::new(5.0, 0.1, 0.2), 0.0)
        .expect("segment crosses the cube");
    assert!((hit.x + 0.5).abs() < 1e-3, "hit at {hit:?}");
    assert!((hit.y - 0.1).abs() < 1e-2);
    assert!((hit.z - 0.2).abs() < 1e-2);

    assert!(cube
        .closest_intersection(Vec3::new(-5.0, 2.0, 0.0), Vec3::new(5.0, 2.0, 0.0), 0.0)
        .is_none());
}

#[test]
fn mesh_signed_distance_is_negative_inside() {
    let cube = cube_mesh();
    let (inside, normal) = cube.signed_distance_and_normal(Vec3::new(0.0, 0.0, 0.3));
    assert_relative_eq!(inside, -0.2, epsilon = 1e-5);
    assert!((normal - Vec3::Z).length() < 1e-5);

    let outside = cube.signed_distance(Vec3::new(1.5, 0.0, 0.0));
    assert_relative_eq!(outside, 1.0, epsilon = 1e-5);

    let corner = cube.signed_distance(Vec3::splat(1.5));
    assert_relative_eq!(corner, 3.0_f32.sqrt(), epsilon = 1e-4);
}

#[test]
fn march_returns_end_when_it_lies_on_the_surface() {
    let cube = cube_mesh();
    let end = Vec3::new(-0.5, 0.1, 0.2);
    let head_on = cube
        .closest_intersection(Vec3::new(-5.0, 0.1, 0.2), end, 0.0)
        .unwrap();
    assert!((head_on - end).length() < 1e-3);

    let grazing = cube
        .closest_intersection(Vec3::new(-0.5, 0.1, 3.0), end, 0.0)
        .unwrap();
    assert!((grazing - end).length() < 1e-3);
}

#[test]
fn march_starting_on_surface_returns_start() {
    let cube = cube_mesh();
    let start = Vec3::new(0.5, 0.0, 0.0);
    let hit = cube
        .closest_intersection(start, Vec3::new(5.0, 0.0, 0.0), 0.0)
        .unwrap();
    assert!((hit - start).length() < 1e-4);
}

#[test]
fn union_marches_to_nearest_member() {
    let ball = Shape::sphere(Vec3::ZERO, 1.0).into_shared();
    let union = Shape::union(vec![
        ShapeMember::new(Transform::from_position(Vec3::new(-2.0, 0.0, 0.0)), ball.clone()),
        ShapeMember::new(Transform::from_position(Vec3::new(2.0, 0.0, 0.0)), ball),
    ]);

    let hit = union
        .closest_intersection(Vec3::new(-6.0, 0.0, 0.0), Vec3::new(6.0, 0.0, 0.0), 0.0)
        .unwrap();
    assert!((hit.x + 3.0).abs() < 1e-3);

    let from_right = union
        .closest_intersection(Vec3::new(6.0, 0.0, 0.0), Vec3::new(-6.0, 0.0, 0.0), 0.0)
        .unwrap();
    assert!((from_right.x - 3.0).abs() < 1e-3);

    // Passes between the two members.
    assert!(union
        .closest_intersection(Vec3::new(0.0, -5.0, 0.0), Vec3::new(0.0, 5.0, 0.0), 0.0)
        .is_none());
}

#[test]
fn scaled_march_settings_handle_tiny_shapes() {
    let tiny = Shape::union(vec![ShapeMember::new(
        Transform::default(),
        Shape::sphere(Vec3::ZERO, 1e-3).into_shared(),
    )]);
    let settings = RayMarchSettings::default().scaled(1e-3);
    let hit = tiny
        .closest_intersection_with(
            Vec3::new(-5e-3, 0.0, 0.0),
            Vec3::new(5e-3, 0.0, 0.0),
            0.0,
            &settings,
        )
        .unwrap();
    assert!((hit.x + 1e-3).abs() < 1e-5);
}

#[test]
fn support_points() {
    let sphere = Shape::sphere(Vec3::new(1.0, 0.0, 0.0), 2.0);
    let support = sphere.support_point(Vec3::new(0.0, 3.0, 0.0), 0.5).unwrap();
    assert!((support - Vec3::new(1.0, 2.5, 0.0)).length() < 1e-6);

    let cube = cube_mesh();
    let support = cube.support_point(Vec3::X, 0.0).unwrap();
    assert!((support - Vec3::new(0.5, 0.0, 0.0)).length() < 1e-3);

    let thick = cube.support_point(Vec3::Y, 0.25).unwrap();
    assert!((thick.y - 0.75).abs() < 1e-3);
}

#[test]
fn unbounded_shapes_fail_fast() {
    let plane = Shape::plane(Vec3::ZERO, Vec3::Y).into_shared();
    assert_eq!(
        plane.support_point(Vec3::X, 0.0),
        Err(KernelError::Unbounded { shape: "plane" })
    );

    let union = Shape::union(vec![
        ShapeMember::new(Transform::default(), plane),
        ShapeMember::new(
            Transform::default(),
            Shape::sphere(Vec3::ZERO, 1.0).into_shared(),
        ),
    ]);
    assert!(!union.has_bounding_box());
    assert_eq!(
        union.bounding_box(),
        Err(KernelError::Unbounded { shape: "union" })
    );
    // Segment queries still work on unbounded shapes.
    let hit = union
        .closest_intersection(Vec3::new(5.0, 3.0, 0.0), Vec3::new(5.0, -3.0, 0.0), 0.0)
        .unwrap();
    assert!(hit.y.abs() < 1e-2);
}

#[test]
fn capability_flags() {
    assert!(Shape::sphere(Vec3::ZERO, 1.0).is_convex());
    assert!(Shape::cuboid(Vec3::ZERO, Vec3::ONE).has_bounding_box());
    let cube = cube_mesh();
    assert!(cube.has_bounding_box());
    assert!(!cube.is_convex());
    let bounds = cube.bounding_box().unwrap();
    assert_eq!(bounds.min, Vec3::splat(-0.5));
    assert_eq!(bounds.max, Vec3::splat(0.5));
}
