//! Burn implementation of the timbre synthesizer.
//!
//! Provides the differentiable [`SynthesisModel`] (control encoder, harmonic
//! oscillator bank, filtered noise, learned reverb), the
//! [`MultiscaleSpectralLoss`] and checkpoint I/O, on top of
//! [Burn](https://burn.dev) with NdArray (CPU) and wgpu (GPU) backends.
//!
//! ```rust,ignore
//! let ctx = ComputeContext::cpu(seed);
//! let model = SynthesisModel::new(&config.model, &ctx)?;
//! let kernels = SynthesisKernels::new(&config.model, ctx.device());
//! let loss = MultiscaleSpectralLoss::new(&config.train.scales, ctx.device())?;
//! ```

mod error;
pub use error::{Error, Result};

pub mod backend;
pub mod checkpoint;
pub mod convert;
pub mod loss;
pub mod model;
pub mod spectral;

pub use backend::{
    BackendPool, ComputeContext, CpuBackend, CpuDevice, DevicePlacement, GpuBackend, NoiseSource,
};
pub use checkpoint::{checkpoint_exists, checkpoint_path, load_checkpoint, save_checkpoint};
pub use loss::MultiscaleSpectralLoss;
pub use model::{Synthesis, SynthesisKernels, SynthesisModel};
pub use spectral::MultiscaleStft;
