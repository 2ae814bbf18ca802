//! Training-run bookkeeping owned by the training controller.

/// Incremental mean of the losses seen since the last logging boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningMean {
    mean: f64,
    count: u64,
}

impl RunningMean {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        self.mean += (value - self.mean) / self.count as f64;
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Step counter, interval loss and best loss of one run.
///
/// The step counter never resets. The best loss only decreases, and only at
/// logging boundaries, where it is compared with the interval mean.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingState {
    pub step: u64,
    pub epoch: usize,
    pub interval_loss: RunningMean,
    pub best_loss: f64,
}

impl Default for TrainingState {
    fn default() -> Self {
        Self {
            step: 0,
            epoch: 0,
            interval_loss: RunningMean::default(),
            best_loss: f64::INFINITY,
        }
    }
}

impl TrainingState {
    /// Record one optimizer step's loss.
    pub fn record_step(&mut self, loss: f64) {
        self.interval_loss.push(loss);
        self.step += 1;
    }

    /// Close the logging interval.
    ///
    /// Returns the interval mean when it improved on the best loss, which is
    /// then updated. The interval accumulator is reset either way.
    pub fn close_interval(&mut self) -> Option<f64> {
        let mean = self.interval_loss.mean();
        self.interval_loss.reset();

        match mean {
            Some(mean) if mean < self.best_loss => {
                self.best_loss = mean;
                Some(mean)
            }
            _ => None,
        }
    }
}
