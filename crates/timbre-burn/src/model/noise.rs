//! Time-varying filtered noise.
//!
//! Each frame filters `hop` samples of white noise with a linear-phase FIR
//! predicted from the encoding. The product is taken in the frequency domain
//! at `fft_size` points, brought back with an inverse DFT and overlap-added
//! into the following frames, so filter tails carry over frame boundaries.

use super::{exp_sigmoid, overlap_add, SynthesisKernels};
use crate::backend::NoiseSource;
use crate::convert::tensor_from_vec;
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use timbre_analysis::rfft_blocks;

/// Bias that keeps the initial noise level low relative to the harmonics.
const INITIAL_BIAS: f64 = -5.0;

#[derive(Module, Debug)]
pub struct NoiseHead<B: Backend> {
    proj: Linear<B>,
}

impl<B: Backend> NoiseHead<B> {
    pub fn new(hidden: usize, bands: usize, device: &B::Device) -> Self {
        Self {
            proj: LinearConfig::new(hidden, bands).init(device),
        }
    }

    /// Band magnitudes per frame, `[batch, frames, bands]`.
    pub fn bands(&self, encoding: Tensor<B, 3>) -> Tensor<B, 3> {
        exp_sigmoid(self.proj.forward(encoding).add_scalar(INITIAL_BIAS))
    }

    /// Filtered noise, `[batch, frames × hop]`.
    pub fn forward(
        &self,
        kernels: &SynthesisKernels<B>,
        encoding: Tensor<B, 3>,
        source: &mut NoiseSource,
    ) -> Tensor<B, 2> {
        let [batch, frames, _] = encoding.dims();
        let layout = kernels.noise_layout;
        let hop = layout.hop;
        let blocks = batch * frames;
        let bins = layout.spectrum_bins();
        let device = encoding.device();

        let bands = self.bands(encoding).reshape([blocks, layout.bands]);
        let filter_re = bands.clone().matmul(kernels.filter_re.clone());
        let filter_im = bands.matmul(kernels.filter_im.clone());

        let white = source.uniform(blocks * hop);
        let (noise_re, noise_im) = rfft_blocks(&white, hop, layout.fft_size);
        let noise_re = tensor_from_vec::<B, 2>(noise_re, [blocks, bins], &device);
        let noise_im = tensor_from_vec::<B, 2>(noise_im, [blocks, bins], &device);

        let out_re = filter_re.clone() * noise_re.clone() - filter_im.clone() * noise_im.clone();
        let out_im = filter_re * noise_im + filter_im * noise_re;
        let filtered = out_re.matmul(kernels.inverse_re.clone())
            + out_im.matmul(kernels.inverse_im.clone());

        overlap_add(filtered.reshape([batch, frames, layout.chunks, hop]))
    }
}
