//! Best-model checkpoint persistence.
//!
//! One named MessagePack record per run directory, overwritten on every
//! improvement. Records are backend-agnostic: a model trained on
//! `Autodiff<Wgpu>` loads into `NdArray` for evaluation.

use crate::error::{Error, Result};
use crate::model::SynthesisModel;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use std::path::{Path, PathBuf};

const CHECKPOINT_STEM: &str = "state";
const CHECKPOINT_EXTENSION: &str = "mpk";

type Recorder = NamedMpkFileRecorder<FullPrecisionSettings>;

/// Location of the best checkpoint inside `run_dir`.
pub fn checkpoint_path(run_dir: &Path) -> PathBuf {
    run_dir.join(format!("{CHECKPOINT_STEM}.{CHECKPOINT_EXTENSION}"))
}

pub fn checkpoint_exists(run_dir: &Path) -> bool {
    checkpoint_path(run_dir).is_file()
}

/// Write `model` as the run's best checkpoint.
pub fn save_checkpoint<B: Backend>(model: &SynthesisModel<B>, run_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(run_dir).map_err(timbre_core::Error::from)?;
    model
        .clone()
        .save_file(run_dir.join(CHECKPOINT_STEM), &Recorder::new())
        .map_err(|e| Error::Checkpoint(e.to_string()))?;

    let path = checkpoint_path(run_dir);
    tracing::info!("Saved checkpoint to {}", path.display());
    Ok(path)
}

/// Restore the run's best checkpoint into `model`.
///
/// `model` must be built from the same [`timbre_core::ModelConfig`] that
/// produced the checkpoint.
pub fn load_checkpoint<B: Backend>(
    model: SynthesisModel<B>,
    run_dir: &Path,
    device: &B::Device,
) -> Result<SynthesisModel<B>> {
    let path = checkpoint_path(run_dir);
    if !path.is_file() {
        return Err(Error::CheckpointNotFound(path));
    }

    let model = model
        .load_file(run_dir.join(CHECKPOINT_STEM), &Recorder::new(), device)
        .map_err(|e| Error::Checkpoint(e.to_string()))?;
    tracing::info!("Loaded checkpoint from {}", path.display());
    Ok(model)
}
