//! Scalar metric stream.
//!
//! The trainer reports per-step loss keyed by step, and learning rate plus
//! reverb parameters keyed by epoch. Dashboards plug in through [`ScalarLog`].

/// Sink for named scalar series.
pub trait ScalarLog {
    /// Record `value` for series `name` at `index` (step or epoch).
    fn scalar(&mut self, name: &str, value: f64, index: u64);
}

/// Emits every scalar as a `tracing` event under `timbre::scalars`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingScalars;

impl ScalarLog for TracingScalars {
    fn scalar(&mut self, name: &str, value: f64, index: u64) {
        tracing::debug!(target: "timbre::scalars", name, value, index);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScalarEntry {
    pub name: String,
    pub value: f64,
    pub index: u64,
}

/// Keeps every scalar in memory.
#[derive(Debug, Default, Clone)]
pub struct ScalarRecord {
    entries: Vec<ScalarEntry>,
}

impl ScalarRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[ScalarEntry] {
        &self.entries
    }

    /// `(index, value)` pairs of one series, in recording order.
    pub fn series(&self, name: &str) -> Vec<(u64, f64)> {
        self.entries
            .iter()
            .filter(|e| e.name == name)
            .map(|e| (e.index, e.value))
            .collect()
    }
}

impl ScalarLog for ScalarRecord {
    fn scalar(&mut self, name: &str, value: f64, index: u64) {
        self.entries.push(ScalarEntry {
            name: name.to_string(),
            value,
            index,
        });
    }
}
