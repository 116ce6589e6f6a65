//! Cooperative single-stepping between a controller thread and the simulation thread.
//!
//! While debug mode is enabled every call to
//! [`Evolution::advance_one_time_step`](crate::Evolution::advance_one_time_step) waits
//! at its first phase until a controller grants it one step with
//! [`DebugController::progress_substep`]. The controller then blocks until that step
//! has finished, debug mode is turned off, or the evolution is dropped.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct Gate {
    enabled: bool,
    granted: u64,
    started: u64,
    finished: u64,
    /// Set once the owning evolution is gone; no step will ever run again.
    detached: bool,
}

/// Gate shared by one evolution and its controllers.
#[derive(Debug, Default)]
pub struct DebugStepper {
    gate: Mutex<Gate>,
    changed: Condvar,
}

impl DebugStepper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called at the start of a step. Blocks while debug mode withholds the next step.
    pub fn acquire(&self) -> StepPermit<'_> {
        let mut gate = self.gate.lock();
        while gate.enabled && gate.started >= gate.granted {
            self.changed.wait(&mut gate);
        }
        let gated = gate.enabled;
        if gated {
            gate.started += 1;
        }
        StepPermit {
            stepper: self,
            gated,
        }
    }

    /// Marks the owner as gone and wakes every waiting controller.
    pub(crate) fn detach(&self) {
        let mut gate = self.gate.lock();
        gate.detached = true;
        self.changed.notify_all();
    }
}

/// Held for the duration of one step body; reports the step finished on drop.
#[must_use = "the step is reported finished when the permit is dropped"]
pub struct StepPermit<'a> {
    stepper: &'a DebugStepper,
    gated: bool,
}

impl StepPermit<'_> {
    /// Whether this step was released by a controller.
    pub fn is_gated(&self) -> bool {
        self.gated
    }
}

impl Drop for StepPermit<'_> {
    fn drop(&mut self) {
        if !self.gated {
            return;
        }
        let mut gate = self.stepper.gate.lock();
        gate.finished += 1;
        self.stepper.changed.notify_all();
    }
}

/// Handle driving an evolution's stepper from another thread.
#[derive(Debug, Clone)]
pub struct DebugController {
    stepper: Arc<DebugStepper>,
}

impl DebugController {
    pub(crate) fn new(stepper: Arc<DebugStepper>) -> Self {
        Self { stepper }
    }

    /// Holds every following step until it is granted. Outstanding grants are dropped.
    pub fn enable_debug_mode(&self) {
        let mut gate = self.stepper.gate.lock();
        gate.enabled = true;
        gate.granted = gate.started;
        log::debug!("debug stepping enabled");
    }

    /// Lets the simulation run freely again, releasing a blocked step.
    pub fn disable_debug_mode(&self) {
        let mut gate = self.stepper.gate.lock();
        gate.enabled = false;
        self.stepper.changed.notify_all();
        log::debug!("debug stepping disabled");
    }

    pub fn is_debug_mode_enabled(&self) -> bool {
        self.stepper.gate.lock().enabled
    }

    /// Grants one step and waits until it has run. Does nothing outside debug mode.
    ///
    /// Returns early when debug mode is disabled or the evolution is dropped. A
    /// simulation thread that is alive but no longer stepping keeps this call
    /// blocked; use [`progress_substep_timeout`](Self::progress_substep_timeout) when
    /// that can happen.
    pub fn progress_substep(&self) {
        let mut gate = self.stepper.gate.lock();
        if !gate.enabled || gate.detached {
            return;
        }
        gate.granted += 1;
        let target = gate.granted;
        self.stepper.changed.notify_all();
        while gate.enabled && !gate.detached && gate.finished < target {
            self.stepper.changed.wait(&mut gate);
        }
    }

    /// Like [`progress_substep`](Self::progress_substep) but gives up after `timeout`.
    ///
    /// Returns whether the granted step finished in time. A step that has not started
    /// yet keeps its grant and runs whenever the simulation thread arrives.
    pub fn progress_substep_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut gate = self.stepper.gate.lock();
        if !gate.enabled || gate.detached {
            return false;
        }
        gate.granted += 1;
        let target = gate.granted;
        self.stepper.changed.notify_all();
        while gate.enabled && !gate.detached && gate.finished < target {
            if self
                .stepper
                .changed
                .wait_until(&mut gate, deadline)
                .timed_out()
            {
                break;
            }
        }
        gate.finished >= target
    }

    /// Whether the evolution this controller drives has been dropped.
    pub fn is_detached(&self) -> bool {
        self.stepper.gate.lock().detached
    }

    /// Gated steps finished since the stepper was created.
    pub fn steps_completed(&self) -> u64 {
        self.stepper.gate.lock().finished
    }
}
