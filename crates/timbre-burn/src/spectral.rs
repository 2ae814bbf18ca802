//! Differentiable multiscale magnitude spectrogram.
//!
//! The windowed DFT of every frame is a strided 1-D convolution of the padded
//! signal with the cosine and sine rows of [`StftBasis`], so gradients flow
//! through the ordinary convolution backward pass.

use crate::convert::tensor_from_vec;
use crate::error::Result;
use burn::prelude::*;
use burn::tensor::module::conv1d;
use burn::tensor::ops::ConvOptions;
use timbre_analysis::{StftBasis, LOG_EPSILON};
use timbre_core::Scale;

/// Added to the squared magnitude so the square root stays differentiable.
const POWER_FLOOR: f32 = 1e-12;

/// `ln(x + ε)` elementwise.
pub fn safe_log<B: Backend, const D: usize>(x: Tensor<B, D>) -> Tensor<B, D> {
    x.add_scalar(LOG_EPSILON).log()
}

/// Convolution kernel computing the spectrum of one scale.
#[derive(Debug, Clone)]
pub struct StftKernel<B: Backend> {
    scale: Scale,
    /// `[2 × bins, 1, window]`: real rows then imaginary rows
    weight: Tensor<B, 3>,
}

impl<B: Backend> StftKernel<B> {
    pub fn new(scale: Scale, device: &B::Device) -> Result<Self> {
        scale.validate()?;
        let basis = StftBasis::new(scale);
        let mut rows = basis.re;
        rows.extend_from_slice(&basis.im);
        let weight = tensor_from_vec(rows, [2 * basis.bins, 1, basis.window], device);
        Ok(Self { scale, weight })
    }

    /// Magnitudes of a `[batch, time]` signal as `[batch, bins, frames]`.
    pub fn magnitude(&self, signal: Tensor<B, 2>) -> Result<Tensor<B, 3>> {
        let [batch, time] = signal.dims();
        self.scale.check_signal(time)?;

        let device = signal.device();
        let pad = self.scale.pad();
        let bins = self.scale.bins();
        // Trailing padding no frame covers is dropped before the convolution
        let used = (self.scale.frames(time) - 1) * self.scale.hop() + self.scale.window;
        let padded = Tensor::cat(
            vec![
                Tensor::zeros([batch, pad], &device),
                signal,
                Tensor::zeros([batch, pad], &device),
            ],
            1,
        )
        .narrow(1, 0, used);

        let spectrum = conv1d(
            padded.reshape([batch, 1, used]),
            self.weight.clone(),
            None,
            ConvOptions::new([self.scale.hop()], [0], [1], 1),
        );

        let re = spectrum.clone().narrow(1, 0, bins);
        let im = spectrum.narrow(1, bins, bins);
        Ok((re.clone() * re + im.clone() * im)
            .add_scalar(POWER_FLOOR)
            .sqrt())
    }
}

/// One kernel per configured scale.
#[derive(Debug, Clone)]
pub struct MultiscaleStft<B: Backend> {
    kernels: Vec<StftKernel<B>>,
}

impl<B: Backend> MultiscaleStft<B> {
    pub fn new(scales: &[Scale], device: &B::Device) -> Result<Self> {
        if scales.is_empty() {
            return Err(timbre_core::Error::InvalidScaleConfiguration(
                "at least one spectral scale is required".into(),
            )
            .into());
        }
        let kernels = scales
            .iter()
            .map(|&scale| StftKernel::new(scale, device))
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!("Built {} STFT kernels", kernels.len());
        Ok(Self { kernels })
    }

    /// Spectrograms of `signal`, one per scale, recomputed on every call.
    pub fn forward(&self, signal: Tensor<B, 2>) -> Result<Vec<Tensor<B, 3>>> {
        self.kernels
            .iter()
            .map(|kernel| kernel.magnitude(signal.clone()))
            .collect()
    }
}
