//! Run modes handled by the single entry point.

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::str::FromStr;

/// What a run does with its model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Optimize a fresh model and keep the best checkpoint
    Train,
    /// Render one batch from this run's own best checkpoint
    Test,
    /// Render one batch from another run's checkpoint and statistics
    Transfer {
        /// Run directory whose checkpoint and config are reused
        source_run: PathBuf,
    },
}

impl RunMode {
    /// Train mode shuffles batches; the render modes iterate in order.
    pub fn shuffles(&self) -> bool {
        matches!(self, RunMode::Train)
    }
}

impl FromStr for RunMode {
    type Err = Error;

    /// Parses `train`, `test` or `transfer:<source run dir>`.
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some(("transfer", source)) if !source.is_empty() => Ok(RunMode::Transfer {
                source_run: PathBuf::from(source),
            }),
            None if s == "train" => Ok(RunMode::Train),
            None if s == "test" => Ok(RunMode::Test),
            _ => Err(Error::InvalidConfig(format!("unknown run mode '{}'", s))),
        }
    }
}
