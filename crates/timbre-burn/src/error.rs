//! Error types for the Burn synthesis backend.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] timbre_core::Error),

    #[error("No checkpoint at {0}")]
    CheckpointNotFound(PathBuf),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Tensor data error: {0}")]
    TensorData(String),

    #[error("Device error: {0}")]
    Device(String),
}
