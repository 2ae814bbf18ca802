//! # Timbre Analysis
//!
//! Spectral analysis for the timbre synthesizer:
//! - **STFT magnitudes**: single- and multi-scale, centered, Hann-windowed
//! - **Safe log**: `ln(x + ε)` for near-silent frames
//! - **Spectral distance**: the multiscale linear + log magnitude distance on host buffers
//! - **Bases**: constant DFT, filter-response and inverse-DFT matrices used by
//!   the differentiable model
//!
//! All functions operate on raw `&[f32]` sample buffers - no framework dependencies.
//!
//! ## Example
//!
//! ```rust
//! use timbre_analysis::{multiscale_magnitudes, spectral_distance};
//! use timbre_core::Scale;
//!
//! let samples: Vec<f32> = vec![0.0; 16000];
//! let scales = Scale::uniform(&[1024, 256], 0.75).unwrap();
//!
//! let spectrograms = multiscale_magnitudes(&samples, &scales).unwrap();
//! assert_eq!(spectrograms.len(), 2);
//! assert_eq!(spectral_distance(&samples, &samples, &scales).unwrap(), 0.0);
//! ```

pub mod basis;
pub mod stft;
pub mod window;

pub use basis::{
    rfft_blocks, FilterResponseBasis, InverseRealDft, NoiseLayout, RealDft, StftBasis,
};
pub use stft::{
    multiscale_magnitudes, safe_log, spectral_distance, stft_magnitude, Spectrogram, LOG_EPSILON,
};
pub use window::hann;
