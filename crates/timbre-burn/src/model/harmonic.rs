//! Additive harmonic oscillator bank.

use super::{exp_sigmoid, upsample, SynthesisKernels};
use crate::convert::tensor_from_vec;
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use core::f64::consts::TAU;

/// Frame-rate oscillator controls.
#[derive(Debug, Clone)]
pub struct HarmonicFrames<B: Backend> {
    /// Overall amplitude, `[batch, frames, 1]`
    pub total: Tensor<B, 3>,
    /// Per-harmonic amplitudes, `[batch, frames, harmonics]`; zero above Nyquist
    pub amplitudes: Tensor<B, 3>,
}

/// Predicts an amplitude envelope plus a distribution over harmonics and
/// renders them as a sum of sinusoids at integer multiples of the pitch.
#[derive(Module, Debug)]
pub struct HarmonicHead<B: Backend> {
    proj: Linear<B>,
}

impl<B: Backend> HarmonicHead<B> {
    pub fn new(hidden: usize, harmonics: usize, device: &B::Device) -> Self {
        Self {
            proj: LinearConfig::new(hidden, harmonics + 1).init(device),
        }
    }

    pub fn frames(
        &self,
        kernels: &SynthesisKernels<B>,
        encoding: Tensor<B, 3>,
        pitch: Tensor<B, 2>,
    ) -> HarmonicFrames<B> {
        let [batch, frames, _] = encoding.dims();
        let harmonics = kernels.config.harmonics;
        let shape = [batch, frames, harmonics];

        let params = exp_sigmoid(self.proj.forward(encoding));
        let total = params.clone().narrow(2, 0, 1);
        let distribution = params.narrow(2, 1, harmonics);

        let frequencies = pitch.reshape([batch, frames, 1]).expand(shape)
            * kernels.harmonic_index.clone().expand(shape);
        let audible = frequencies.lower_elem(kernels.config.nyquist()).float();

        let distribution = distribution * audible;
        let norm = distribution.clone().sum_dim(2).clamp_min(1e-7);
        let amplitudes = distribution / norm.expand(shape) * total.clone().expand(shape);

        HarmonicFrames { total, amplitudes }
    }

    /// Audio-rate harmonic signal, `[batch, frames × hop]`.
    ///
    /// The Nyquist mask is applied again per sample, so a harmonic that
    /// crosses Nyquist while the pitch glides inside a frame falls silent
    /// at the crossing instead of at the next frame.
    pub fn render(
        &self,
        kernels: &SynthesisKernels<B>,
        amplitudes: Tensor<B, 3>,
        pitch: &[f32],
    ) -> Tensor<B, 2> {
        let [batch, frames, harmonics] = amplitudes.dims();
        let hop = kernels.config.hop_size;
        let samples = frames * hop;
        let device = amplitudes.device();
        let shape = [batch, samples, harmonics];

        let frequency = interpolate_pitch(pitch, batch, frames, hop);
        let phase = accumulate_phase(&frequency, samples, kernels.config.sample_rate);
        let index = kernels.harmonic_index.clone().expand(shape);

        let audible = (tensor_from_vec::<B, 3>(frequency, [batch, samples, 1], &device)
            .expand(shape)
            * index.clone())
        .lower_elem(kernels.config.nyquist())
        .float();
        let phase = tensor_from_vec::<B, 3>(phase, [batch, samples, 1], &device).expand(shape) * index;

        let amplitudes = upsample(amplitudes, &kernels.upsample_ramp) * audible;
        (phase.sin() * amplitudes)
            .sum_dim(2)
            .reshape([batch, samples])
    }
}

/// Per-sample pitch of row-major `[batch, frames]` controls, interpolated
/// linearly from each frame to the next and held over the last frame.
pub fn interpolate_pitch(pitch: &[f32], batch: usize, frames: usize, hop: usize) -> Vec<f32> {
    let mut frequency = Vec::with_capacity(batch * frames * hop);
    for row in pitch.chunks_exact(frames).take(batch) {
        for (f, &current) in row.iter().enumerate() {
            let next = row.get(f + 1).copied().unwrap_or(current);
            for j in 0..hop {
                let t = j as f32 / hop as f32;
                frequency.push(current + (next - current) * t);
            }
        }
    }
    frequency
}

/// Running phase of the fundamental for rows of `samples` per-sample
/// frequencies.
///
/// Integrated in f64 and wrapped to `[0, 2π)`. Integer harmonics of a
/// wrapped phase are still exact, so the oscillators never reset at frame
/// boundaries.
pub fn accumulate_phase(frequency: &[f32], samples: usize, sample_rate: u32) -> Vec<f32> {
    let step = TAU / sample_rate as f64;
    let mut phase = Vec::with_capacity(frequency.len());

    for row in frequency.chunks_exact(samples.max(1)) {
        let mut accumulated = 0.0f64;
        for &freq in row {
            accumulated = (accumulated + step * freq as f64).rem_euclid(TAU);
            phase.push(accumulated as f32);
        }
    }
    phase
}
