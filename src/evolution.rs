//! Fixed-timestep evolution of a particle store.

pub mod debug;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use crate::{
    config::EvolutionConfig,
    core::ParticleStore,
    dynamics::{
        clustering::ClusterManager,
        forces::ForceGenerator,
        integrator::Integrator,
        island::{Island, IslandManager},
        rules::{default_kinematic_rule, ConstraintRule, ForceRule, IntegrationRule, KinematicRule},
    },
    error::Result,
    utils::{
        logging::{warn_if_step_budget_exceeded, ScopedTimer},
        math::quat_delta_to_angular_velocity,
        profiling::{PhaseTimer, StepProfile},
    },
};

use debug::{DebugController, DebugStepper};

/// Advances a [`ParticleStore`] through force, integration, kinematic and constraint
/// rules, one fixed step at a time.
pub struct Evolution {
    particles: ParticleStore,
    config: EvolutionConfig,
    force_rules: Vec<ForceRule>,
    integration_rule: IntegrationRule,
    kinematic_rule: KinematicRule,
    constraint_rules: Vec<Box<dyn ConstraintRule>>,
    islands: IslandManager,
    clusters: ClusterManager,
    active: Vec<usize>,
    edges: Vec<(usize, usize)>,
    time: f32,
    accumulator: f32,
    stepper: Arc<DebugStepper>,
    profile: StepProfile,
}

impl Evolution {
    pub fn new(particles: ParticleStore, num_iterations: u32) -> Self {
        Self::with_config(
            particles,
            EvolutionConfig::default().with_iterations(num_iterations),
        )
    }

    pub fn with_config(particles: ParticleStore, config: EvolutionConfig) -> Self {
        let integrator = Integrator::new(config.linear_damping, config.angular_damping);
        let mut evolution = Self {
            particles,
            config,
            force_rules: Vec::new(),
            integration_rule: Box::new(
                move |particles: &mut ParticleStore, active: &[usize], dt: f32| {
                    integrator.integrate(particles, active, dt)
                },
            ),
            kinematic_rule: default_kinematic_rule(),
            constraint_rules: Vec::new(),
            islands: IslandManager::new(),
            clusters: ClusterManager::with_connectivity_thickness(
                config.cluster_connectivity_thickness,
            ),
            active: Vec::new(),
            edges: Vec::new(),
            time: 0.0,
            accumulator: 0.0,
            stepper: Arc::new(DebugStepper::new()),
            profile: StepProfile::default(),
        };
        evolution.refresh_active();
        evolution
    }

    /// Runs one step of length `dt`.
    ///
    /// Phases run in a fixed order: debug gate, active set, forces, integration,
    /// kinematic targets, islands, constraint projection with velocity update, cluster
    /// fracture and finally the clock.
    pub fn advance_one_time_step(&mut self, dt: f32) {
        let stepper = Arc::clone(&self.stepper);
        let _permit = stepper.acquire();

        let _step_timer = ScopedTimer::new("evolution::step");
        let step_start = Instant::now();
        let mut profile = StepProfile::default();

        if cfg!(debug_assertions) {
            self.particles.assert_consistent();
        }

        self.refresh_active();

        {
            let _timer = PhaseTimer::new("evolution::forces", &mut profile.forces_time);
            for rule in self.force_rules.iter_mut() {
                for &index in &self.active {
                    rule(&mut self.particles, dt, index);
                }
            }
        }

        {
            let _timer = PhaseTimer::new("evolution::integrate", &mut profile.integration_time);
            (self.integration_rule)(&mut self.particles, &self.active, dt);
        }

        {
            let _timer = PhaseTimer::new("evolution::kinematics", &mut profile.kinematics_time);
            for &index in &self.active {
                if self.particles.flags[index].kinematic {
                    (self.kinematic_rule)(&mut self.particles, dt, self.time, index);
                }
            }
        }

        {
            let _timer = PhaseTimer::new("evolution::islands", &mut profile.islands_time);
            self.edges.clear();
            for rule in &self.constraint_rules {
                rule.connections(&self.particles, &mut self.edges);
            }
            self.islands
                .build_islands(self.particles.len(), &self.active, &self.edges);
        }

        {
            let _timer = PhaseTimer::new("evolution::constraints", &mut profile.constraints_time);
            for island in self.islands.islands() {
                for _ in 0..self.config.num_iterations {
                    for rule in self.constraint_rules.iter_mut() {
                        rule.apply(&mut self.particles, dt, island);
                    }
                }
                commit_island(&mut self.particles, island, dt);
            }
            if self.config.sleeping_enabled {
                let slept = self
                    .islands
                    .update_sleeping(&mut self.particles, self.config.sleep_threshold);
                if slept > 0 {
                    log::trace!("{slept} islands fell asleep");
                }
            }
        }

        {
            let _timer = PhaseTimer::new("evolution::clustering", &mut profile.clustering_time);
            let parents_before = self.clusters.cluster_count();
            let released = self.clusters.break_strained_clusters(&mut self.particles);
            profile.clusters_broken = parents_before - self.clusters.cluster_count();
            if !released.is_empty() {
                self.refresh_active();
            }
        }

        self.time += dt;

        profile.total_step_time = step_start.elapsed();
        profile.particle_count = self.particles.len();
        profile.active_count = self.active.len();
        profile.island_count = self.islands.islands().len();
        profile.report();
        if let Some(budget) = self.config.step_budget_ms {
            warn_if_step_budget_exceeded(profile.total_step_time, budget);
        }
        self.profile = profile;
    }

    /// Banks `elapsed` seconds and runs as many fixed steps as fit. Returns the step count.
    pub fn advance(&mut self, elapsed: f32) -> usize {
        let step = self.config.time_step;
        if step <= 0.0 {
            return 0;
        }
        self.accumulator += elapsed.max(0.0);

        // Tolerate rounding so that e.g. three 1/60 s steps fit into 0.05 s.
        let slop = step * 1e-4;
        let mut steps = 0;
        while self.accumulator + slop >= step {
            self.advance_one_time_step(step);
            self.accumulator = (self.accumulator - step).max(0.0);
            steps += 1;
        }
        steps
    }

    fn refresh_active(&mut self) {
        self.active.clear();
        self.active.extend(
            self.particles
                .flags
                .iter()
                .enumerate()
                .filter(|(_, flags)| flags.is_active())
                .map(|(index, _)| index),
        );
    }

    pub fn set_kinematic_update_rule<F>(&mut self, rule: F)
    where
        F: FnMut(&mut ParticleStore, f32, f32, usize) + Send + 'static,
    {
        self.kinematic_rule = Box::new(rule);
    }

    pub fn set_particle_integration_rule<F>(&mut self, rule: F)
    where
        F: FnMut(&mut ParticleStore, &[usize], f32) + Send + 'static,
    {
        self.integration_rule = Box::new(rule);
    }

    pub fn add_constraint_rule<R: ConstraintRule + 'static>(&mut self, rule: R) {
        self.constraint_rules.push(Box::new(rule));
    }

    pub fn add_force_rule<F>(&mut self, rule: F)
    where
        F: FnMut(&mut ParticleStore, f32, usize) + Send + 'static,
    {
        self.force_rules.push(Box::new(rule));
    }

    pub fn add_force_generator<G: ForceGenerator + 'static>(&mut self, generator: G) {
        self.add_force_rule(move |particles, dt, index| generator.apply(particles, index, dt));
    }

    /// Clusters `children` using the configured break strain.
    pub fn create_cluster_particle(&mut self, children: &[usize]) -> Result<usize> {
        self.create_cluster_particle_with_strain(children, self.config.cluster_break_strain)
    }

    pub fn create_cluster_particle_with_strain(
        &mut self,
        children: &[usize],
        break_strain: f32,
    ) -> Result<usize> {
        let parent =
            self.clusters
                .create_cluster_particle(&mut self.particles, children, break_strain)?;
        self.refresh_active();
        Ok(parent)
    }

    pub fn release_cluster_particle(&mut self, parent: usize) -> Result<Vec<usize>> {
        let children = self
            .clusters
            .release_cluster_particle(&mut self.particles, parent)?;
        self.refresh_active();
        Ok(children)
    }

    /// Splits `parent` where children are strained past their own threshold.
    ///
    /// See [`ClusterManager::break_children`] for the resulting pieces.
    pub fn break_cluster_children(
        &mut self,
        parent: usize,
        strain_map: &BTreeMap<usize, f32>,
    ) -> Result<Vec<usize>> {
        let pieces = self
            .clusters
            .break_children(&mut self.particles, parent, strain_map)?;
        if !pieces.is_empty() {
            self.refresh_active();
        }
        Ok(pieces)
    }

    pub fn set_child_break_strain(
        &mut self,
        parent: usize,
        child: usize,
        break_strain: f32,
    ) -> Result<()> {
        self.clusters.set_child_break_strain(parent, child, break_strain)
    }

    /// Children of `parent`, or an empty slice when it is not a live cluster.
    pub fn cluster_children(&self, parent: usize) -> &[usize] {
        self.clusters.children(parent).unwrap_or(&[])
    }

    pub fn clusters(&self) -> &ClusterManager {
        &self.clusters
    }

    pub fn strain(&self, index: usize) -> f32 {
        self.particles.strains[index]
    }

    pub fn strain_mut(&mut self, index: usize) -> &mut f32 {
        &mut self.particles.strains[index]
    }

    pub fn set_strain(&mut self, index: usize, strain: f32) {
        self.particles.strains[index] = strain;
    }

    pub fn particles(&self) -> &ParticleStore {
        &self.particles
    }

    /// Direct store access. Flag changes take effect at the next step.
    pub fn particles_mut(&mut self) -> &mut ParticleStore {
        &mut self.particles
    }

    /// Indices simulated by the last step, ascending.
    pub fn active_indices(&self) -> &[usize] {
        &self.active
    }

    pub fn islands(&self) -> &[Island] {
        self.islands.islands()
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    pub fn last_profile(&self) -> &StepProfile {
        &self.profile
    }

    /// Turns on single-stepping and returns a controller for it.
    pub fn enable_debug_mode(&self) -> DebugController {
        let controller = self.debug_controller();
        controller.enable_debug_mode();
        controller
    }

    pub fn debug_controller(&self) -> DebugController {
        DebugController::new(Arc::clone(&self.stepper))
    }
}

impl Drop for Evolution {
    fn drop(&mut self) {
        self.stepper.detach();
    }
}

/// Moves an island's projected state into its committed state and derives velocities.
fn commit_island(particles: &mut ParticleStore, island: &Island, dt: f32) {
    if dt <= 0.0 {
        return;
    }
    let inv_dt = 1.0 / dt;
    for &index in &island.particles {
        let predicted_position = particles.predicted_positions[index];
        let predicted_rotation = particles.predicted_rotations[index];

        particles.linear_velocities[index] =
            (predicted_position - particles.positions[index]) * inv_dt;
        particles.angular_velocities[index] =
            quat_delta_to_angular_velocity(particles.rotations[index], predicted_rotation, dt);
        particles.positions[index] = predicted_position;
        particles.rotations[index] = predicted_rotation;
    }
}
