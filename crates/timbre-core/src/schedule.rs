//! Learning-rate schedule.

use crate::error::{Error, Result};

/// Linear decay from `start` to `stop` over `decay_steps`, then constant.
///
/// Pure function of the step: querying it for logging has no effect on the
/// optimizer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LearningRateSchedule {
    start: f64,
    stop: f64,
    decay_steps: u64,
}

impl LearningRateSchedule {
    pub fn new(start: f64, stop: f64, decay_steps: u64) -> Self {
        Self {
            start,
            stop,
            decay_steps,
        }
    }

    /// Learning rate for a global optimizer step.
    ///
    /// A zero horizon means the floor rate applies from step 0.
    pub fn rate(&self, step: u64) -> f64 {
        if step >= self.decay_steps {
            return self.stop;
        }
        let t = step as f64 / self.decay_steps as f64;
        (self.start - t * (self.start - self.stop)).max(self.stop)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.stop.is_finite() && self.stop > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "stop learning rate must be positive, got {}",
                self.stop
            )));
        }
        if !(self.start.is_finite() && self.start >= self.stop) {
            return Err(Error::InvalidConfig(format!(
                "start learning rate {} must not be below stop rate {}",
                self.start, self.stop
            )));
        }
        Ok(())
    }
}
