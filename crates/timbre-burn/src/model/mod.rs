//! Harmonic-plus-noise synthesis model.
//!
//! ```text
//! pitch, loudness ─► ControlEncoder ─┬─► HarmonicHead ─► harmonic ─┐
//!                                    └─► NoiseHead    ─► noise    ─┴─► Reverb ─► signal
//! ```
//!
//! The three sub-engines are shared by both conditioning modes; only the
//! encoder differs. Constant operators (harmonic indices, DFT bases, reverb
//! time axis) live in [`SynthesisKernels`], outside the learnable record.

mod encoder;
mod harmonic;
mod noise;
mod reverb;

pub use encoder::{ControlEncoder, Mlp};
pub use harmonic::{accumulate_phase, interpolate_pitch, HarmonicFrames, HarmonicHead};
pub use noise::NoiseHead;
pub use reverb::{BlockConvolution, Reverb};

use crate::backend::{ComputeContext, NoiseSource};
use crate::convert::{tensor_from_vec, tensor_to_vec};
use crate::error::Result;
use burn::prelude::*;
use burn::tensor::activation::sigmoid;
use timbre_analysis::{FilterResponseBasis, InverseRealDft, NoiseLayout};
use timbre_core::{Error as CoreError, ModelConfig};

/// Random stream reserved for parameter initialization.
const INIT_STREAM: u64 = 0;
/// Partition size of the reverb convolution.
const REVERB_BLOCK: usize = 128;

/// `2 · sigmoid(x)^ln(10) + 1e-7`: positive, bounded and log-scaled.
pub(crate) fn exp_sigmoid<B: Backend, const D: usize>(x: Tensor<B, D>) -> Tensor<B, D> {
    sigmoid(x)
        .powf_scalar(core::f32::consts::LN_10)
        .mul_scalar(2.0)
        .add_scalar(1e-7)
}

/// Linear interpolation of `[batch, frames, channels]` to
/// `[batch, frames × hop, channels]`, holding the last frame.
pub(crate) fn upsample<B: Backend>(frames: Tensor<B, 3>, ramp: &Tensor<B, 4>) -> Tensor<B, 3> {
    let [batch, count, channels] = frames.dims();
    let hop = ramp.dims()[2];
    let shape = [batch, count, hop, channels];

    let next = if count > 1 {
        Tensor::cat(
            vec![
                frames.clone().narrow(1, 1, count - 1),
                frames.clone().narrow(1, count - 1, 1),
            ],
            1,
        )
    } else {
        frames.clone()
    };

    let start = frames.reshape([batch, count, 1, channels]).expand(shape);
    let next = next.reshape([batch, count, 1, channels]).expand(shape);
    let interpolated = start.clone() + (next - start) * ramp.clone().expand(shape);
    interpolated.reshape([batch, count * hop, channels])
}

/// Sum chunk `c` of every frame into frame `f + c`; the tail past the last
/// frame is dropped.
pub(crate) fn overlap_add<B: Backend>(chunks: Tensor<B, 4>) -> Tensor<B, 2> {
    let [batch, frames, count, hop] = chunks.dims();
    let device = chunks.device();

    let mut output = chunks.clone().narrow(2, 0, 1).reshape([batch, frames, hop]);
    for c in 1..count.min(frames) {
        let piece = chunks
            .clone()
            .narrow(2, c, 1)
            .reshape([batch, frames, hop])
            .narrow(1, 0, frames - c);
        let shifted = Tensor::cat(vec![Tensor::zeros([batch, c, hop], &device), piece], 1);
        output = output + shifted;
    }
    output.reshape([batch, frames * hop])
}

/// Fixed tensors the forward pass needs, built once per device.
#[derive(Debug, Clone)]
pub struct SynthesisKernels<B: Backend> {
    pub config: ModelConfig,
    /// `[1, 1, harmonics]`, values `1..=harmonics`
    pub harmonic_index: Tensor<B, 3>,
    /// `[1, 1, hop, 1]`, values `j / hop`
    pub upsample_ramp: Tensor<B, 4>,
    pub noise_layout: NoiseLayout,
    /// `[bands, bins]`
    pub filter_re: Tensor<B, 2>,
    pub filter_im: Tensor<B, 2>,
    /// `[bins, fft_size]`
    pub inverse_re: Tensor<B, 2>,
    pub inverse_im: Tensor<B, 2>,
    /// `[reverb_length]`, seconds per tap
    pub reverb_time: Tensor<B, 1>,
    pub reverb_convolution: BlockConvolution<B>,
}

impl<B: Backend> SynthesisKernels<B> {
    pub fn new(config: &ModelConfig, device: &B::Device) -> Self {
        let harmonics = config.harmonics;
        let hop = config.hop_size;
        let reverb_length = config.reverb_length();

        let index = (1..=harmonics).map(|k| k as f32).collect();
        let ramp = (0..hop).map(|j| j as f32 / hop as f32).collect();
        let time = (0..reverb_length)
            .map(|m| m as f32 / config.sample_rate as f32)
            .collect();

        let noise_layout = NoiseLayout::new(hop, config.noise_bands);
        let filter = FilterResponseBasis::new(noise_layout);
        let inverse = InverseRealDft::new(noise_layout.fft_size);
        tracing::debug!(
            "Noise filter: {} taps, {}-point spectrum, {} chunks",
            noise_layout.impulse_len,
            noise_layout.fft_size,
            noise_layout.chunks
        );
        let reverb_convolution = BlockConvolution::new(REVERB_BLOCK.min(reverb_length), device);
        tracing::debug!(
            "Reverb: {} taps in blocks of {}",
            reverb_length,
            reverb_convolution.block()
        );

        Self {
            config: config.clone(),
            harmonic_index: tensor_from_vec(index, [1, 1, harmonics], device),
            upsample_ramp: tensor_from_vec(ramp, [1, 1, hop, 1], device),
            noise_layout,
            filter_re: tensor_from_vec(filter.re, [filter.bands, filter.bins], device),
            filter_im: tensor_from_vec(filter.im, [filter.bands, filter.bins], device),
            inverse_re: tensor_from_vec(inverse.re, [inverse.bins, inverse.size], device),
            inverse_im: tensor_from_vec(inverse.im, [inverse.bins, inverse.size], device),
            reverb_time: tensor_from_vec(time, [reverb_length], device),
            reverb_convolution,
        }
    }
}

/// Output of one forward pass; every tensor is `[batch, frames × hop]`.
#[derive(Debug, Clone)]
pub struct Synthesis<B: Backend> {
    /// Reverberated sum of both components
    pub signal: Tensor<B, 2>,
    /// Dry harmonic component
    pub harmonic: Tensor<B, 2>,
    /// Dry noise component
    pub noise: Tensor<B, 2>,
}

#[derive(Module, Debug)]
pub struct SynthesisModel<B: Backend> {
    encoder: ControlEncoder<B>,
    harmonic: HarmonicHead<B>,
    noise: NoiseHead<B>,
    reverb: Reverb<B>,
}

impl<B: Backend> SynthesisModel<B> {
    /// Build a freshly initialized model.
    ///
    /// Returns `InvalidModelConfiguration` when the architecture is unusable.
    pub fn new(config: &ModelConfig, ctx: &ComputeContext<B>) -> Result<Self> {
        config.validate()?;
        let device = ctx.device();
        let mut rng = ctx.rng(INIT_STREAM);

        Ok(Self {
            encoder: ControlEncoder::new(config.hidden_size, config.conditioning, device),
            harmonic: HarmonicHead::new(config.hidden_size, config.harmonics, device),
            noise: NoiseHead::new(config.hidden_size, config.noise_bands, device),
            reverb: Reverb::new(config.reverb_length(), &mut rng, device),
        })
    }

    /// Synthesize audio from `[batch, frames]` pitch (Hz) and normalized loudness.
    pub fn forward(
        &self,
        kernels: &SynthesisKernels<B>,
        pitch: Tensor<B, 2>,
        loudness: Tensor<B, 2>,
        source: &mut NoiseSource,
    ) -> Result<Synthesis<B>> {
        let [batch, frames] = pitch.dims();
        if loudness.dims() != [batch, frames] {
            return Err(CoreError::Dataset(format!(
                "pitch {:?} and loudness {:?} are not frame-aligned",
                pitch.dims(),
                loudness.dims()
            ))
            .into());
        }
        let expected = kernels.config.frames();
        if frames != expected {
            return Err(CoreError::Dataset(format!(
                "expected {} frames per example, got {}",
                expected, frames
            ))
            .into());
        }

        let host_pitch = tensor_to_vec(pitch.clone())?;
        let encoding = self.encoder.forward(pitch.clone(), loudness);

        let controls = self.harmonic.frames(kernels, encoding.clone(), pitch);
        let harmonic = self.harmonic.render(kernels, controls.amplitudes, &host_pitch);
        let noise = self.noise.forward(kernels, encoding, source);

        let dry = harmonic.clone() + noise.clone();
        let signal = self.reverb.forward(
            dry,
            kernels.reverb_time.clone(),
            &kernels.reverb_convolution,
        );

        Ok(Synthesis {
            signal,
            harmonic,
            noise,
        })
    }

    /// Current `(decay, wet)` reverb parameters.
    pub fn reverb_parameters(&self) -> (f32, f32) {
        self.reverb.parameters()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuBackend;
    use burn::backend::ndarray::NdArrayDevice;
    use burn::backend::NdArray;
    use timbre_core::ConditioningMode;

    type TestBackend = NdArray<f32>;

    fn config(conditioning: ConditioningMode) -> ModelConfig {
        ModelConfig {
            sample_rate: 8000,
            hop_size: 20,
            chunk_length: 200,
            hidden_size: 8,
            harmonics: 8,
            noise_bands: 9,
            reverb_length: Some(32),
            conditioning,
        }
    }

    fn inputs(device: &NdArrayDevice) -> (Tensor<TestBackend, 2>, Tensor<TestBackend, 2>) {
        (
            Tensor::full([2, 10], 220.0, device),
            Tensor::zeros([2, 10], device),
        )
    }

    #[test]
    fn test_upsample_interpolates_between_frames() {
        let device = NdArrayDevice::default();
        let frames = Tensor::<TestBackend, 3>::from_floats([[[0.0], [4.0]]], &device);
        let ramp = Tensor::<TestBackend, 4>::from_floats([[[[0.0], [0.25], [0.5], [0.75]]]], &device);

        let out = tensor_to_vec(upsample(frames, &ramp)).unwrap();
        assert_eq!(out, vec![0.0, 1.0, 2.0, 3.0, 4.0, 4.0, 4.0, 4.0]);
    }

    #[test]
    fn test_invalid_configuration_rejected() {
        let ctx = ComputeContext::<TestBackend>::new(NdArrayDevice::default(), 0);
        let mut bad = config(ConditioningMode::Sequential);
        bad.chunk_length = 210;
        assert!(matches!(
            SynthesisModel::new(&bad, &ctx),
            Err(crate::Error::Core(CoreError::InvalidModelConfiguration(_)))
        ));

        bad = config(ConditioningMode::Sequential);
        bad.harmonics = 0;
        assert!(SynthesisModel::new(&bad, &ctx).is_err());
    }

    #[test]
    fn test_outputs_share_length() {
        let device = NdArrayDevice::default();
        for mode in [ConditioningMode::Sequential, ConditioningMode::Independent] {
            let config = config(mode);
            let ctx = ComputeContext::<TestBackend>::new(device, 1);
            let model = SynthesisModel::new(&config, &ctx).unwrap();
            let kernels = SynthesisKernels::new(&config, &device);
            let (pitch, loudness) = inputs(&device);

            let out = model
                .forward(&kernels, pitch, loudness, &mut ctx.noise_source(1))
                .unwrap();
            assert_eq!(out.signal.dims(), [2, 200]);
            assert_eq!(out.harmonic.dims(), [2, 200]);
            assert_eq!(out.noise.dims(), [2, 200]);
        }
    }

    #[test]
    fn test_forward_is_deterministic_for_fixed_seed() {
        let device = NdArrayDevice::default();
        let config = config(ConditioningMode::Sequential);
        let ctx = ComputeContext::<TestBackend>::new(device, 9);
        let model = SynthesisModel::new(&config, &ctx).unwrap();
        let kernels = SynthesisKernels::new(&config, &device);
        let (pitch, loudness) = inputs(&device);

        let a = model
            .forward(&kernels, pitch.clone(), loudness.clone(), &mut NoiseSource::new(4))
            .unwrap();
        let b = model
            .forward(&kernels, pitch, loudness, &mut NoiseSource::new(4))
            .unwrap();
        a.signal.into_data().assert_eq(&b.signal.into_data(), true);
    }

    #[test]
    fn test_misaligned_controls_rejected() {
        let device = NdArrayDevice::default();
        let config = config(ConditioningMode::Independent);
        let ctx = ComputeContext::<TestBackend>::new(device, 0);
        let model = SynthesisModel::new(&config, &ctx).unwrap();
        let kernels = SynthesisKernels::new(&config, &device);

        let pitch = Tensor::<TestBackend, 2>::full([1, 10], 220.0, &device);
        let loudness = Tensor::<TestBackend, 2>::zeros([1, 9], &device);
        assert!(model
            .forward(&kernels, pitch, loudness, &mut NoiseSource::new(0))
            .is_err());
    }

    #[test]
    fn test_gradients_reach_reverb_parameters() {
        use burn::optim::GradientsParams;

        let ctx = ComputeContext::<CpuBackend>::cpu(2);
        let config = config(ConditioningMode::Sequential);
        let model = SynthesisModel::new(&config, &ctx).unwrap();
        let kernels = SynthesisKernels::new(&config, ctx.device());
        let pitch = Tensor::full([1, 10], 220.0, ctx.device());
        let loudness = Tensor::zeros([1, 10], ctx.device());

        let out = model
            .forward(&kernels, pitch, loudness, &mut ctx.noise_source(1))
            .unwrap();
        let grads = out.signal.powf_scalar(2.0).sum().backward();
        let grads = GradientsParams::from_grads(grads, &model);
        assert!(!grads.is_empty());
    }
}
