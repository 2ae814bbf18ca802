//! Learned reverberation tail.

use super::overlap_add;
use crate::convert::{scalar, tensor_from_vec};
use burn::module::Param;
use burn::prelude::*;
use burn::tensor::activation::{sigmoid, softplus};
use burn::tensor::module::conv1d;
use burn::tensor::ops::ConvOptions;
use rand::rngs::StdRng;
use rand::Rng;
use timbre_analysis::{InverseRealDft, RealDft};

/// Envelope time constant multiplier applied to `softplus(-decay)`.
const DECAY_SCALE: f64 = 500.0;
const INITIAL_DECAY: f32 = 5.0;

/// Noise impulse response under a learned exponential decay.
///
/// The first tap is fixed at 1, so the output is the dry signal plus the
/// decaying tail scaled by `sigmoid(wet)`.
#[derive(Module, Debug)]
pub struct Reverb<B: Backend> {
    noise: Param<Tensor<B, 1>>,
    decay: Param<Tensor<B, 1>>,
    wet: Param<Tensor<B, 1>>,
}

impl<B: Backend> Reverb<B> {
    pub fn new(length: usize, rng: &mut StdRng, device: &B::Device) -> Self {
        let noise: Vec<f32> = (0..length).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
        Self {
            noise: Param::from_tensor(tensor_from_vec(noise, [length], device)),
            decay: Param::from_tensor(Tensor::from_floats([INITIAL_DECAY], device)),
            wet: Param::from_tensor(Tensor::zeros([1], device)),
        }
    }

    pub fn length(&self) -> usize {
        self.noise.val().dims()[0]
    }

    /// Raw `(decay, wet)` parameter values.
    pub fn parameters(&self) -> (f32, f32) {
        (scalar(self.decay.val()), scalar(self.wet.val()))
    }

    /// Impulse response over `time` (seconds per tap), `[length]`.
    pub fn impulse(&self, time: Tensor<B, 1>) -> Tensor<B, 1> {
        let length = self.length();
        let rate = softplus(self.decay.val().neg(), 1.0).expand([length]);
        let envelope = (time * rate).mul_scalar(-DECAY_SCALE).exp();
        let tail = self.noise.val() * envelope * sigmoid(self.wet.val()).expand([length]);

        let device = tail.device();
        let head = Tensor::ones([1], &device);
        if length == 1 {
            return head;
        }
        Tensor::cat(vec![head, tail.narrow(0, 1, length - 1)], 0)
    }

    /// Causal convolution of `[batch, time]` audio with the impulse response,
    /// truncated to the input length.
    pub fn forward(
        &self,
        signal: Tensor<B, 2>,
        time: Tensor<B, 1>,
        convolution: &BlockConvolution<B>,
    ) -> Tensor<B, 2> {
        convolution.apply(signal, self.impulse(time))
    }
}

/// Uniformly partitioned frequency-domain convolution.
///
/// Signal and impulse response are cut into `block`-sample pieces whose
/// spectra at `2 × block` points multiply without wrap-around. Output block
/// `i` is the sum of `X[i - k] · H[k]` over impulse blocks `k`: a per-bin
/// convolution along the block axis, computed as one grouped `conv1d` and
/// overlap-added back to audio.
///
/// Work per output sample is about `block + length / block` multiply-adds,
/// against `length` for a direct convolution, which matters for impulse
/// responses of a second or more.
#[derive(Debug, Clone)]
pub struct BlockConvolution<B: Backend> {
    block: usize,
    bins: usize,
    /// `[block, bins]`
    forward_re: Tensor<B, 2>,
    forward_im: Tensor<B, 2>,
    /// `[bins, 2 × block]`
    inverse_re: Tensor<B, 2>,
    inverse_im: Tensor<B, 2>,
}

impl<B: Backend> BlockConvolution<B> {
    pub fn new(block: usize, device: &B::Device) -> Self {
        let block = block.max(1);
        let dft = RealDft::new(block, 2 * block);
        let inverse = InverseRealDft::new(2 * block);
        Self {
            block,
            bins: dft.bins,
            forward_re: tensor_from_vec(dft.re, [block, dft.bins], device),
            forward_im: tensor_from_vec(dft.im, [block, dft.bins], device),
            inverse_re: tensor_from_vec(inverse.re, [inverse.bins, inverse.size], device),
            inverse_im: tensor_from_vec(inverse.im, [inverse.bins, inverse.size], device),
        }
    }

    pub fn block(&self) -> usize {
        self.block
    }

    /// Block spectra of `[rows, len]`, zero-padded to whole blocks:
    /// `[rows, blocks, bins]` real and imaginary parts.
    fn spectra(&self, x: Tensor<B, 2>) -> (Tensor<B, 3>, Tensor<B, 3>) {
        let [rows, len] = x.dims();
        let blocks = len.div_ceil(self.block);
        let padded = blocks * self.block;
        let x = if padded > len {
            let device = x.device();
            Tensor::cat(vec![x, Tensor::zeros([rows, padded - len], &device)], 1)
        } else {
            x
        };

        let x = x.reshape([rows * blocks, self.block]);
        let re = x.clone().matmul(self.forward_re.clone());
        let im = x.matmul(self.forward_im.clone());
        (
            re.reshape([rows, blocks, self.bins]),
            im.reshape([rows, blocks, self.bins]),
        )
    }

    /// Causal convolution of `[batch, samples]` audio with `[length]` taps,
    /// truncated to `samples`.
    pub fn apply(&self, signal: Tensor<B, 2>, impulse: Tensor<B, 1>) -> Tensor<B, 2> {
        let [batch, samples] = signal.dims();
        let [length] = impulse.dims();
        let bins = self.bins;

        let (x_re, x_im) = self.spectra(signal);
        let blocks = x_re.dims()[1];
        let (h_re, h_im) = self.spectra(impulse.reshape([1, length]));
        let taps = h_re.dims()[1];

        // One group per bin: (re, im) in, (re, im) out
        let input = Tensor::stack::<4>(vec![x_re.swap_dims(1, 2), x_im.swap_dims(1, 2)], 2)
            .reshape([batch, 2 * bins, blocks]);

        // Flipped along the block axis since conv1d correlates
        let h_re = h_re.reshape([taps, bins]).swap_dims(0, 1).flip([1]);
        let h_im = h_im.reshape([taps, bins]).swap_dims(0, 1).flip([1]);
        let real_row = Tensor::stack::<3>(vec![h_re.clone(), h_im.clone().neg()], 1);
        let imag_row = Tensor::stack::<3>(vec![h_im, h_re], 1);
        let weight =
            Tensor::stack::<4>(vec![real_row, imag_row], 1).reshape([2 * bins, 2, taps]);

        let product = conv1d(
            input,
            weight,
            None,
            ConvOptions::new([1], [taps - 1], [1], bins),
        )
        .narrow(2, 0, blocks)
        .reshape([batch, bins, 2, blocks]);

        let y_re = product
            .clone()
            .narrow(2, 0, 1)
            .reshape([batch, bins, blocks])
            .swap_dims(1, 2)
            .reshape([batch * blocks, bins]);
        let y_im = product
            .narrow(2, 1, 1)
            .reshape([batch, bins, blocks])
            .swap_dims(1, 2)
            .reshape([batch * blocks, bins]);

        let audio = y_re.matmul(self.inverse_re.clone()) + y_im.matmul(self.inverse_im.clone());
        overlap_add(audio.reshape([batch, blocks, 2, self.block])).narrow(1, 0, samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::tensor_to_vec;
    use approx::assert_relative_eq;
    use burn::backend::ndarray::NdArrayDevice;
    use burn::backend::NdArray;
    use rand::SeedableRng;

    type TestBackend = NdArray<f32>;

    fn time(length: usize, sample_rate: f32, device: &NdArrayDevice) -> Tensor<TestBackend, 1> {
        let taps = (0..length).map(|m| m as f32 / sample_rate).collect();
        tensor_from_vec(taps, [length], device)
    }

    #[test]
    fn test_impulse_starts_with_unit_tap_and_decays() {
        let device = NdArrayDevice::default();
        let reverb = Reverb::<TestBackend>::new(64, &mut StdRng::seed_from_u64(1), &device);
        // A slow tap rate stretches the response over several seconds
        let impulse = tensor_to_vec(reverb.impulse(time(64, 10.0, &device))).unwrap();

        assert_eq!(impulse[0], 1.0);
        let early: f32 = impulse[1..8].iter().map(|v| v.abs()).sum();
        let late: f32 = impulse[56..].iter().map(|v| v.abs()).sum();
        assert!(late < early);
    }

    #[test]
    fn test_unit_impulse_reproduces_response() {
        let device = NdArrayDevice::default();
        let reverb = Reverb::<TestBackend>::new(16, &mut StdRng::seed_from_u64(2), &device);
        let convolution = BlockConvolution::<TestBackend>::new(8, &device);
        let taps = time(16, 8000.0, &device);
        let impulse = tensor_to_vec(reverb.impulse(taps.clone())).unwrap();

        let mut click = vec![0.0f32; 40];
        click[0] = 1.0;
        let signal = tensor_from_vec::<TestBackend, 2>(click, [1, 40], &device);
        let out = tensor_to_vec(reverb.forward(signal, taps, &convolution)).unwrap();

        assert_eq!(out.len(), 40);
        for (m, &value) in impulse.iter().enumerate() {
            assert_relative_eq!(out[m], value, epsilon = 1e-5);
        }
        assert!(out[16..].iter().all(|v| v.abs() < 1e-5));
    }

    #[test]
    fn test_block_convolution_matches_direct_convolution() {
        let device = NdArrayDevice::default();
        let mut rng = StdRng::seed_from_u64(4);
        // Neither length is a whole number of blocks
        let (batch, samples, length) = (2, 50, 23);
        let signal: Vec<f32> = (0..batch * samples).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let impulse: Vec<f32> = (0..length).map(|_| rng.gen_range(-1.0..1.0)).collect();

        let convolution = BlockConvolution::<TestBackend>::new(8, &device);
        let out = tensor_to_vec(convolution.apply(
            tensor_from_vec(signal.clone(), [batch, samples], &device),
            tensor_from_vec(impulse.clone(), [length], &device),
        ))
        .unwrap();

        assert_eq!(out.len(), batch * samples);
        for (row, x) in signal.chunks_exact(samples).enumerate() {
            for n in 0..samples {
                let expected: f32 = (0..length.min(n + 1)).map(|m| impulse[m] * x[n - m]).sum();
                assert_relative_eq!(out[row * samples + n], expected, epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn test_initial_parameters() {
        let device = NdArrayDevice::default();
        let reverb = Reverb::<TestBackend>::new(8, &mut StdRng::seed_from_u64(3), &device);
        assert_eq!(reverb.parameters(), (5.0, 0.0));
        assert_eq!(reverb.length(), 8);
    }
}
