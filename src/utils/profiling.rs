use std::time::{Duration, Instant};

use super::logging::ScopedTimer;

/// Timing and size data of the last evolution step.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct StepProfile {
    pub forces_time: Duration,
    pub integration_time: Duration,
    pub kinematics_time: Duration,
    pub islands_time: Duration,
    pub constraints_time: Duration,
    pub clustering_time: Duration,
    pub total_step_time: Duration,

    pub particle_count: usize,
    pub active_count: usize,
    pub island_count: usize,
    pub clusters_broken: usize,
}

impl StepProfile {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn report(&self) {
        if !log::log_enabled!(log::Level::Debug) {
            return;
        }
        let total_us = self.total_step_time.as_micros() as f32;
        if total_us < 1.0 {
            return;
        }

        log::debug!(
            "step: {:.3} ms, particles {}, active {}, islands {}, clusters broken {}",
            self.total_step_time.as_secs_f32() * 1000.0,
            self.particle_count,
            self.active_count,
            self.island_count,
            self.clusters_broken
        );
        for (label, time) in [
            ("forces", self.forces_time),
            ("integration", self.integration_time),
            ("kinematics", self.kinematics_time),
            ("islands", self.islands_time),
            ("constraints", self.constraints_time),
            ("clustering", self.clustering_time),
        ] {
            log::debug!(
                "  {label:<12} {:.3} ms ({:.1}%)",
                time.as_secs_f32() * 1000.0,
                time.as_micros() as f32 / total_us * 100.0
            );
        }
    }
}

/// Adds the time until drop to `output`, tracing the phase on the way.
pub struct PhaseTimer<'a> {
    _trace: ScopedTimer<'static>,
    start: Instant,
    output: &'a mut Duration,
}

impl<'a> PhaseTimer<'a> {
    pub fn new(label: &'static str, output: &'a mut Duration) -> Self {
        Self {
            _trace: ScopedTimer::new(label),
            start: Instant::now(),
            output,
        }
    }
}

impl<'a> Drop for PhaseTimer<'a> {
    fn drop(&mut self) {
        *self.output += self.start.elapsed();
    }
}
