//! Centralized error type for the timbre umbrella crate.
//!
//! Wraps all subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] timbre_core::Error),

    #[error(transparent)]
    Burn(#[from] timbre_burn::Error),

    /// The loss stopped being finite; the run is aborted.
    #[error("Non-finite loss {loss} at step {step}")]
    NumericInstability { step: u64, loss: f64 },

    #[error("Audio file error: {0}")]
    Audio(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<hound::Error> for Error {
    fn from(e: hound::Error) -> Self {
        Error::Audio(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
