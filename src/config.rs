//! Global configuration constants and tunables for the evolution kernel.

use serde::{Deserialize, Serialize};

/// Default gravity vector applied by [`crate::dynamics::GravityForce::default`] (Y-up).
pub const DEFAULT_GRAVITY: [f32; 3] = [0.0, -9.81, 0.0];

/// Default fixed timestep (in seconds) used by [`crate::Evolution::advance`].
pub const DEFAULT_TIME_STEP: f32 = 1.0 / 60.0;

/// Number of constraint passes performed per island per step.
pub const DEFAULT_SOLVER_ITERATIONS: u32 = 4;

/// Default damping applied to linear velocity by the built-in integrator.
pub const DEFAULT_LINEAR_DAMPING: f32 = 0.0;

/// Default damping applied to angular velocity by the built-in integrator.
pub const DEFAULT_ANGULAR_DAMPING: f32 = 0.0;

/// Squared-speed threshold under which a whole island may be put to sleep.
pub const DEFAULT_SLEEP_THRESHOLD: f32 = 0.01;

/// Strain a cluster tolerates before it is fractured.
pub const DEFAULT_CLUSTER_BREAK_STRAIN: f32 = 1.0;

/// Margin added around child bounds when deciding which children of a cluster touch.
pub const DEFAULT_CLUSTER_CONNECTIVITY_THICKNESS: f32 = 1.0;

/// Band around a surface inside which a point counts as touching it.
pub const SURFACE_EPSILON: f32 = 1e-4;

/// Damping factor applied to each ray-march step.
pub const MARCH_STEP_MULTIPLIER: f32 = 0.5;

/// Smallest forward step a ray march takes.
pub const MARCH_MIN_STEP: f32 = 1e-2;

/// Tunables of the evolution loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    /// Constraint passes per island per step.
    pub num_iterations: u32,
    /// Step length used by the fixed-step accumulator.
    pub time_step: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    /// Put quiet islands to sleep at the end of each step.
    pub sleeping_enabled: bool,
    pub sleep_threshold: f32,
    /// Threshold given to clusters created without an explicit one.
    pub cluster_break_strain: f32,
    /// Bounds margin used to connect neighboring children of a new cluster.
    pub cluster_connectivity_thickness: f32,
    /// Logs a warning when a step takes longer than this many milliseconds.
    pub step_budget_ms: Option<f32>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            num_iterations: DEFAULT_SOLVER_ITERATIONS,
            time_step: DEFAULT_TIME_STEP,
            linear_damping: DEFAULT_LINEAR_DAMPING,
            angular_damping: DEFAULT_ANGULAR_DAMPING,
            sleeping_enabled: false,
            sleep_threshold: DEFAULT_SLEEP_THRESHOLD,
            cluster_break_strain: DEFAULT_CLUSTER_BREAK_STRAIN,
            cluster_connectivity_thickness: DEFAULT_CLUSTER_CONNECTIVITY_THICKNESS,
            step_budget_ms: None,
        }
    }
}

impl EvolutionConfig {
    pub fn with_iterations(mut self, num_iterations: u32) -> Self {
        self.num_iterations = num_iterations;
        self
    }

    pub fn with_time_step(mut self, time_step: f32) -> Self {
        self.time_step = time_step;
        self
    }

    pub fn with_sleeping(mut self, enabled: bool) -> Self {
        self.sleeping_enabled = enabled;
        self
    }
}

/// Constants driving the generic ray march.
///
/// The defaults are absolute distances tuned for shapes around unit scale.
/// Shapes many orders of magnitude larger or smaller should use
/// [`RayMarchSettings::scaled`] with their characteristic extent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RayMarchSettings {
    pub surface_epsilon: f32,
    pub step_multiplier: f32,
    pub min_step: f32,
}

impl Default for RayMarchSettings {
    fn default() -> Self {
        Self {
            surface_epsilon: SURFACE_EPSILON,
            step_multiplier: MARCH_STEP_MULTIPLIER,
            min_step: MARCH_MIN_STEP,
        }
    }
}

impl RayMarchSettings {
    /// Scales the distance tolerances by `scale`; the step multiplier is unitless and kept.
    pub fn scaled(self, scale: f32) -> Self {
        let scale = scale.abs().max(f32::MIN_POSITIVE);
        Self {
            surface_epsilon: self.surface_epsilon * scale,
            step_multiplier: self.step_multiplier,
            min_step: self.min_step * scale,
        }
    }
}
