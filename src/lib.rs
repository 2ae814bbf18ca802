//! # Timbre - Differentiable Harmonic-plus-Noise Synthesis
//!
//! Trains a synthesizer that rebuilds audio from per-frame pitch and
//! loudness, and renders audio from trained checkpoints.
//!
//! ## Architecture
//!
//! Timbre is an umbrella crate that coordinates:
//! - **timbre-core** - Configuration, schedule, loudness statistics, dataset batching, run state
//! - **timbre-analysis** - CPU spectral analysis and constant DFT bases
//! - **timbre-burn** - Synthesis model, multiscale spectral loss, checkpoints (Burn)
//!
//! This crate adds the training controller, the evaluation/transfer runners,
//! audio and config artifacts, and the scalar log stream.
//!
//! ## Quick Start
//!
//! ```ignore
//! use timbre::prelude::*;
//!
//! let config = RunConfig::load(Path::new("config.toml"))?;
//! let pool = BackendPool::new();
//! let mode: RunMode = "train".parse()?;
//!
//! let outcome = run_on(&pool, pool.preferred_placement(), &mode, &config, &dataset, &mut TracingScalars)?;
//! ```

mod error;
pub use error::{Error, Result};

pub mod artifacts;
pub mod runner;
pub mod scalars;
pub mod trainer;

/// Re-export of timbre-core for direct access
pub use timbre_core as core;

pub use timbre_analysis as analysis;
pub use timbre_burn as synth;

pub use runner::{evaluate, transfer, RenderReport};
pub use scalars::{ScalarEntry, ScalarLog, ScalarRecord, TracingScalars};
pub use trainer::{train, TrainingSummary};

pub use timbre_burn::{BackendPool, ComputeContext, CpuBackend, DevicePlacement, GpuBackend};
pub use timbre_core::{
    ConditioningMode, ControlDataset, ControlExample, LoudnessStats, MemoryDataset, ModelConfig,
    RunConfig, RunMode, Scale, TrainConfig,
};

use burn::tensor::backend::AutodiffBackend;

/// Result of one [`run`].
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Trained(TrainingSummary),
    Rendered(RenderReport),
}

/// Single entry point: dispatch `mode` on an explicit compute context.
///
/// Training uses the autodiff backend; test and transfer render on its
/// inner backend, so no gradients are tracked.
pub fn run<B, D, L>(
    mode: &RunMode,
    config: &RunConfig,
    dataset: &D,
    ctx: &ComputeContext<B>,
    scalars: &mut L,
) -> Result<RunOutcome>
where
    B: AutodiffBackend,
    D: ControlDataset + ?Sized,
    L: ScalarLog + ?Sized,
{
    match mode {
        RunMode::Train => train(config, dataset, ctx, scalars).map(RunOutcome::Trained),
        RunMode::Test => evaluate(config, dataset, &ctx.inner()).map(RunOutcome::Rendered),
        RunMode::Transfer { source_run } => {
            transfer(config, source_run, dataset, &ctx.inner()).map(RunOutcome::Rendered)
        }
    }
}

/// [`run`] on the device chosen by `placement`, seeded from the config.
pub fn run_on<D, L>(
    pool: &BackendPool,
    placement: DevicePlacement,
    mode: &RunMode,
    config: &RunConfig,
    dataset: &D,
    scalars: &mut L,
) -> Result<RunOutcome>
where
    D: ControlDataset + ?Sized,
    L: ScalarLog + ?Sized,
{
    let seed = config.train.seed;
    match placement {
        DevicePlacement::Cpu => run(mode, config, dataset, &pool.cpu_context(seed), scalars),
        DevicePlacement::Gpu => {
            let ctx = pool
                .gpu_context(seed)
                .ok_or_else(|| timbre_burn::Error::Device("no GPU adapter available".into()))?;
            run(mode, config, dataset, &ctx, scalars)
        }
    }
}

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        run, run_on, BackendPool, ComputeContext, ConditioningMode, ControlDataset,
        ControlExample, DevicePlacement, Error, LoudnessStats, MemoryDataset, ModelConfig,
        Result, RunConfig, RunMode, RunOutcome, Scale, ScalarLog, ScalarRecord, TracingScalars,
        TrainConfig,
    };
    pub use std::path::Path;
}
