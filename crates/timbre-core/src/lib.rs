//! # Timbre Core
//!
//! Framework-free plumbing for training a harmonic-plus-noise synthesizer:
//!
//! - **Configuration**: [`RunConfig`] with model, training and data sections (TOML)
//! - **Spectral scales**: [`Scale`] window/overlap pairs for multiscale analysis
//! - **Schedule**: [`LearningRateSchedule`], a pure function of the step
//! - **Loudness**: [`LoudnessStats`] computed once per corpus
//! - **Dataset**: [`ControlDataset`] collaborator trait and [`Batches`]
//! - **Run state**: [`TrainingState`] and [`RunMode`]

mod error;
pub use error::{Error, Result};

pub mod config;
pub mod dataset;
pub mod loudness;
pub mod mode;
pub mod scale;
pub mod schedule;
pub mod state;

pub use config::{ConditioningMode, DataConfig, ModelConfig, RunConfig, TrainConfig};
pub use dataset::{Batches, ControlBatch, ControlDataset, ControlExample, MemoryDataset};
pub use loudness::LoudnessStats;
pub use mode::RunMode;
pub use scale::Scale;
pub use schedule::LearningRateSchedule;
pub use state::{RunningMean, TrainingState};
