//! Multiscale spectral reconstruction loss.
//!
//! For every scale: `mean|S_x − S_y| + mean|log S_x − log S_y|`, summed over
//! scales. The linear term follows loud and transient content, the log term
//! quiet and sustained content; both are always present.

use crate::error::Result;
use crate::spectral::{safe_log, MultiscaleStft};
use burn::prelude::*;
use timbre_core::{Error as CoreError, Scale};

#[derive(Debug, Clone)]
pub struct MultiscaleSpectralLoss<B: Backend> {
    stft: MultiscaleStft<B>,
}

impl<B: Backend> MultiscaleSpectralLoss<B> {
    pub fn new(scales: &[Scale], device: &B::Device) -> Result<Self> {
        Ok(Self {
            stft: MultiscaleStft::new(scales, device)?,
        })
    }

    /// Scalar loss (shape `[1]`) between two `[batch, time]` waveforms.
    pub fn forward(&self, original: Tensor<B, 2>, reconstructed: Tensor<B, 2>) -> Result<Tensor<B, 1>> {
        if original.dims() != reconstructed.dims() {
            return Err(CoreError::InvalidScaleConfiguration(format!(
                "waveform shapes differ: {:?} vs {:?}",
                original.dims(),
                reconstructed.dims()
            ))
            .into());
        }

        let device = original.device();
        let lhs = self.stft.forward(original)?;
        let rhs = self.stft.forward(reconstructed)?;

        let mut total = Tensor::<B, 1>::zeros([1], &device);
        for (s_x, s_y) in lhs.into_iter().zip(rhs) {
            let linear = (s_x.clone() - s_y.clone()).abs().mean();
            let log = (safe_log(s_x) - safe_log(s_y)).abs().mean();
            total = total + linear + log;
        }
        Ok(total)
    }
}
