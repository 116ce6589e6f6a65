use std::sync::{Arc, Mutex};

use approx::assert_relative_eq;
use particle_evolution::{
    DistanceConstraints, DragForce, Evolution, EvolutionConfig, GravityForce, Integrator, Island,
    Particle, ParticleStore, Shape, Vec3,
};

const DT: f32 = 0.1;

fn store_with(particles: impl IntoIterator<Item = Particle>) -> ParticleStore {
    let mut store = ParticleStore::new();
    for particle in particles {
        store.add_particle(particle);
    }
    store
}

#[test]
fn gravity_accelerates_free_particle() {
    let store = store_with([Particle::new().with_mass(2.0)]);
    let mut evolution = Evolution::new(store, 4);
    evolution.add_force_generator(GravityForce::default());

    evolution.advance_one_time_step(DT);

    let particles = evolution.particles();
    assert_relative_eq!(particles.velocity(0).linear.y, -0.981, epsilon = 1e-5);
    assert_relative_eq!(particles.position(0).y, -0.0981, epsilon = 1e-5);
    assert_relative_eq!(evolution.time(), DT);
}

#[test]
fn phases_run_in_fixed_order() {
    let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let store = store_with([Particle::new(), Particle::new().kinematic()]);
    let mut evolution = Evolution::new(store, 2);

    let force_log = log.clone();
    evolution.add_force_rule(move |_, _, _| force_log.lock().unwrap().push("force"));

    let integrate_log = log.clone();
    let integrator = Integrator::default();
    evolution.set_particle_integration_rule(move |particles, active, dt| {
        integrate_log.lock().unwrap().push("integrate");
        integrator.integrate(particles, active, dt);
    });

    let kinematic_log = log.clone();
    evolution.set_kinematic_update_rule(move |_, _, _, _| {
        kinematic_log.lock().unwrap().push("kinematic")
    });

    let constraint_log = log.clone();
    evolution.add_constraint_rule(move |_: &mut ParticleStore, _: f32, _: &Island| {
        constraint_log.lock().unwrap().push("constraint")
    });

    evolution.advance_one_time_step(DT);

    // Two singleton islands, two iterations each.
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "force",
            "force",
            "integrate",
            "kinematic",
            "constraint",
            "constraint",
            "constraint",
            "constraint"
        ]
    );
}

#[test]
fn kinematic_rule_overrides_dynamics() {
    let store = store_with([Particle::new().kinematic().with_velocity(Vec3::X)]);
    let mut evolution = Evolution::new(store, 1);
    evolution.add_force_generator(GravityForce::default());

    evolution.advance_one_time_step(DT);
    let position = evolution.particles().position(0);
    assert_relative_eq!(position.x, DT, epsilon = 1e-6);
    assert_relative_eq!(position.y, 0.0);

    evolution.set_kinematic_update_rule(|particles, dt, time, index| {
        particles.predicted_positions[index] = Vec3::new(0.0, time + dt, 0.0);
    });
    evolution.advance_one_time_step(DT);
    evolution.advance_one_time_step(DT);

    let particles = evolution.particles();
    assert_relative_eq!(particles.position(0).y, 3.0 * DT, epsilon = 1e-5);
    assert_relative_eq!(particles.velocity(0).linear.y, 1.0, epsilon = 1e-4);
}

#[test]
fn islands_partition_the_active_set() {
    let mut particles: Vec<Particle> = (0..6).map(|_| Particle::new()).collect();
    particles[5] = Particle::new().sleeping();
    let mut evolution = Evolution::new(store_with(particles), 1);

    let mut constraints = DistanceConstraints::new(1.0);
    constraints.add(0, 1, 1.0);
    constraints.add(2, 1, 1.0);
    constraints.add(4, 5, 1.0);
    evolution.add_constraint_rule(constraints);

    evolution.advance_one_time_step(DT);

    let islands: Vec<Vec<usize>> = evolution
        .islands()
        .iter()
        .map(|island| island.particles.clone())
        .collect();
    assert_eq!(islands, vec![vec![0, 1, 2], vec![3], vec![4]]);

    let mut members: Vec<usize> = islands.into_iter().flatten().collect();
    members.sort_unstable();
    assert_eq!(members, evolution.active_indices());
}

#[test]
fn disabled_and_sleeping_particles_are_untouched() {
    let mut disabled = Particle::new().with_velocity(Vec3::X);
    disabled.flags.disabled = true;
    let store = store_with([disabled, Particle::new().sleeping().with_velocity(Vec3::Y)]);
    let mut evolution = Evolution::new(store, 1);
    evolution.add_force_generator(GravityForce::default());

    for _ in 0..5 {
        evolution.advance_one_time_step(DT);
    }
    assert_eq!(evolution.particles().position(0), Vec3::ZERO);
    assert_eq!(evolution.particles().position(1), Vec3::ZERO);
    assert!(evolution.active_indices().is_empty());
}

#[test]
fn pendulum_keeps_its_length() {
    let store = store_with([
        Particle::new().static_body(),
        Particle::new().with_position(Vec3::new(1.0, 0.0, 0.0)),
    ]);
    let mut evolution = Evolution::new(store, 4);
    evolution.add_force_generator(GravityForce::default());

    let mut rod = DistanceConstraints::new(1.0);
    rod.add_from_current(evolution.particles(), 0, 1);
    evolution.add_constraint_rule(rod);

    for _ in 0..30 {
        evolution.advance_one_time_step(1.0 / 60.0);
    }

    let particles = evolution.particles();
    let length = (particles.position(1) - particles.position(0)).length();
    assert_relative_eq!(length, 1.0, epsilon = 1e-4);
    assert!(particles.position(1).y < -0.1, "bob should swing down");
    assert_eq!(particles.position(0), Vec3::ZERO);
}

#[test]
fn quiet_islands_fall_asleep() {
    let config = EvolutionConfig::default().with_sleeping(true);
    let mut evolution = Evolution::with_config(store_with([Particle::new()]), config);

    evolution.advance_one_time_step(DT);
    assert!(evolution.particles().flags(0).sleeping);

    evolution.advance_one_time_step(DT);
    assert!(evolution.active_indices().is_empty());
}

#[test]
fn accumulator_runs_whole_steps() {
    let config = EvolutionConfig::default().with_time_step(1.0 / 60.0);
    let mut evolution = Evolution::with_config(store_with([Particle::new()]), config);

    assert_eq!(evolution.advance(0.05), 3);
    assert_eq!(evolution.advance(0.01), 0);
    assert_eq!(evolution.advance(0.01), 1);
    assert_relative_eq!(evolution.time(), 4.0 / 60.0, epsilon = 1e-5);
}

#[test]
fn strain_is_readable_and_writable() {
    let mut evolution = Evolution::new(store_with([Particle::new()]), 1);
    *evolution.strain_mut(0) += 0.25;
    evolution.set_strain(0, evolution.strain(0) * 2.0);
    assert_relative_eq!(evolution.strain(0), 0.5);
}

fn build_scene() -> Evolution {
    let ball = Shape::sphere(Vec3::ZERO, 0.25).into_shared();
    let mut store = ParticleStore::with_capacity(320);
    for i in 0..300 {
        let angle = i as f32 * 0.37;
        store.add_particle(
            Particle::new()
                .with_position(Vec3::new(angle.cos() * 4.0, i as f32 * 0.01, angle.sin() * 4.0))
                .with_velocity(Vec3::new(angle.sin(), 0.5, -angle.cos()))
                .with_angular_velocity(Vec3::new(0.0, angle, 0.1))
                .with_mass(1.0 + (i % 7) as f32)
                .with_shape(ball.clone()),
        );
    }

    let mut evolution = Evolution::new(store, 3);
    evolution.add_force_generator(GravityForce::default());
    evolution.add_force_generator(DragForce {
        drag_coefficient: 0.05,
    });

    let mut chain = DistanceConstraints::new(0.8);
    for i in (0..120).step_by(2) {
        chain.add_from_current(evolution.particles(), i, i + 1);
        chain.add_from_current(evolution.particles(), i + 1, (i + 17) % 300);
    }
    evolution.add_constraint_rule(chain);

    let parent = evolution.create_cluster_particle(&[200, 201, 202, 203]).unwrap();
    evolution.set_strain(parent, 0.5);
    evolution
}

#[test]
fn identical_runs_are_bit_identical() {
    let mut first = build_scene();
    let mut second = build_scene();
    for step in 0..40 {
        if step == 20 {
            let parent = first.particles().len() - 1;
            first.set_strain(parent, 5.0);
            second.set_strain(parent, 5.0);
        }
        first.advance_one_time_step(1.0 / 60.0);
        second.advance_one_time_step(1.0 / 60.0);
    }

    let (a, b) = (first.particles(), second.particles());
    assert_eq!(a.positions, b.positions);
    assert_eq!(a.rotations, b.rotations);
    assert_eq!(a.linear_velocities, b.linear_velocities);
    assert_eq!(a.angular_velocities, b.angular_velocities);
    assert_eq!(a.flags, b.flags);
    assert_eq!(first.islands(), second.islands());
    assert!(first.active_indices().contains(&200), "cluster should have broken");
}

#[test]
fn step_profile_reports_counts() {
    let mut evolution = build_scene();
    evolution.advance_one_time_step(1.0 / 60.0);
    let profile = evolution.last_profile();
    assert_eq!(profile.particle_count, 301);
    assert_eq!(profile.active_count, 297);
    assert!(profile.island_count > 0);
    assert_eq!(profile.clusters_broken, 0);
}

#[test]
fn evolution_can_move_between_threads() {
    fn assert_send<T: Send>() {}
    assert_send::<Evolution>();
}
