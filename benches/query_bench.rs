use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use particle_evolution::*;
use std::hint::black_box;

fn generate_grid(resolution: usize) -> (Vec<Vec3>, Vec<[usize; 3]>) {
    let mut points = Vec::new();
    let mut triangles = Vec::new();
    for y in 0..=resolution {
        for x in 0..=resolution {
            points.push(Vec3::new(x as f32, 0.0, y as f32));
        }
    }
    let width = resolution + 1;
    for y in 0..resolution {
        for x in 0..resolution {
            let i = y * width + x;
            triangles.push([i, i + width, i + 1]);
            triangles.push([i + 1, i + width, i + width + 1]);
        }
    }
    (points, triangles)
}

fn cube() -> Shape {
    let points = (0..8)
        .map(|i| {
            Vec3::new(
                if i & 1 == 0 { -0.5 } else { 0.5 },
                if i & 2 == 0 { -0.5 } else { 0.5 },
                if i & 4 == 0 { -0.5 } else { 0.5 },
            )
        })
        .collect();
    let triangles = vec![
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
    Shape::triangle_mesh(points, triangles).unwrap()
}

fn bench_adjacency(c: &mut Criterion) {
    let mut group = c.benchmark_group("mesh_adjacency");
    for &res in &[16usize, 32, 64] {
        let (_, triangles) = generate_grid(res);
        group.bench_with_input(BenchmarkId::new("unique_adjacent", res), &res, |b, _| {
            b.iter(|| {
                let mesh = TriangleMesh::new(triangles.clone()).unwrap();
                black_box(mesh.unique_adjacent_elements())
            })
        });
        group.bench_with_input(BenchmarkId::new("build_surface", res), &res, |b, _| {
            let (points, triangles) = generate_grid(res);
            b.iter(|| {
                let surface = MeshBuilder::new(points.clone(), triangles.clone())
                    .recenter()
                    .build();
                black_box(surface)
            })
        });
    }
    group.finish();
}

fn bench_segment_queries(c: &mut Criterion) {
    let ball = Shape::sphere(Vec3::ZERO, 1.0).into_shared();
    let shapes = [
        ("sphere", Shape::sphere(Vec3::ZERO, 1.0)),
        ("box", Shape::cuboid_half_extents(Vec3::ZERO, Vec3::splat(0.5))),
        ("mesh", cube()),
        (
            "union",
            Shape::union(vec![
                ShapeMember::new(Transform::from_position(Vec3::new(-2.0, 0.0, 0.0)), ball.clone()),
                ShapeMember::new(Transform::from_position(Vec3::new(2.0, 0.0, 0.0)), ball),
            ]),
        ),
    ];

    let mut group = c.benchmark_group("closest_intersection");
    for (name, shape) in &shapes {
        group.bench_function(*name, |b| {
            b.iter(|| {
                shape.closest_intersection(
                    black_box(Vec3::new(-6.0, 0.1, 0.2)),
                    black_box(Vec3::new(6.0, 0.1, 0.2)),
                    0.0,
                )
            })
        });
    }
    group.finish();

    let mut group = c.benchmark_group("signed_distance");
    for (name, shape) in &shapes {
        group.bench_function(*name, |b| {
            b.iter(|| shape.signed_distance_and_normal(black_box(Vec3::new(0.3, 1.7, -0.4))))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_adjacency, bench_segment_queries);
criterion_main!(benches);
