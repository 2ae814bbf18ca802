//! Frame-level control encoder.

use burn::nn::gru::{Gru, GruConfig};
use burn::nn::{LayerNorm, LayerNormConfig, Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::leaky_relu;
use timbre_core::ConditioningMode;

const MLP_LAYERS: usize = 3;
const LEAKY_SLOPE: f64 = 0.01;

/// Stack of `Linear -> LayerNorm -> LeakyReLU` blocks.
#[derive(Module, Debug)]
pub struct Mlp<B: Backend> {
    linears: Vec<Linear<B>>,
    norms: Vec<LayerNorm<B>>,
}

impl<B: Backend> Mlp<B> {
    pub fn new(input: usize, hidden: usize, device: &B::Device) -> Self {
        let mut linears = Vec::with_capacity(MLP_LAYERS);
        let mut norms = Vec::with_capacity(MLP_LAYERS);
        for layer in 0..MLP_LAYERS {
            let width = if layer == 0 { input } else { hidden };
            linears.push(LinearConfig::new(width, hidden).init(device));
            norms.push(LayerNormConfig::new(hidden).init(device));
        }
        Self { linears, norms }
    }

    pub fn forward<const D: usize>(&self, input: Tensor<B, D>) -> Tensor<B, D> {
        self.linears
            .iter()
            .zip(self.norms.iter())
            .fold(input, |x, (linear, norm)| {
                leaky_relu(norm.forward(linear.forward(x)), LEAKY_SLOPE)
            })
    }
}

/// Maps per-frame pitch and loudness to a `[batch, frames, hidden]` encoding.
///
/// With [`ConditioningMode::Sequential`] a GRU runs over the frame axis, so
/// every frame sees the ones before it. Independent conditioning skips the
/// recurrence and feeds both branches straight to the output stack.
#[derive(Module, Debug)]
pub struct ControlEncoder<B: Backend> {
    pitch: Mlp<B>,
    loudness: Mlp<B>,
    gru: Option<Gru<B>>,
    output: Mlp<B>,
}

impl<B: Backend> ControlEncoder<B> {
    pub fn new(hidden: usize, mode: ConditioningMode, device: &B::Device) -> Self {
        let (gru, output_input) = match mode {
            ConditioningMode::Sequential => (
                Some(GruConfig::new(2 * hidden, hidden, true).init(device)),
                hidden + 2,
            ),
            ConditioningMode::Independent => (None, 2 * hidden + 2),
        };

        Self {
            pitch: Mlp::new(1, hidden, device),
            loudness: Mlp::new(1, hidden, device),
            gru,
            output: Mlp::new(output_input, hidden, device),
        }
    }

    pub fn mode(&self) -> ConditioningMode {
        if self.gru.is_some() {
            ConditioningMode::Sequential
        } else {
            ConditioningMode::Independent
        }
    }

    pub fn forward(&self, pitch: Tensor<B, 2>, loudness: Tensor<B, 2>) -> Tensor<B, 3> {
        let [batch, frames] = pitch.dims();
        let pitch = pitch.reshape([batch, frames, 1]);
        let loudness = loudness.reshape([batch, frames, 1]);

        let pitch_features = self.pitch.forward(pitch.clone());
        let loudness_features = self.loudness.forward(loudness.clone());

        let features = match &self.gru {
            Some(gru) => {
                let sequence = gru.forward(Tensor::cat(vec![pitch_features, loudness_features], 2), None);
                Tensor::cat(vec![sequence, pitch, loudness], 2)
            }
            None => Tensor::cat(vec![pitch_features, loudness_features, pitch, loudness], 2),
        };

        self.output.forward(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArrayDevice;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_encoding_shape_for_both_modes() {
        let device = NdArrayDevice::default();
        for mode in [ConditioningMode::Sequential, ConditioningMode::Independent] {
            let encoder = ControlEncoder::<TestBackend>::new(8, mode, &device);
            assert_eq!(encoder.mode(), mode);

            let pitch = Tensor::<TestBackend, 2>::full([2, 5], 220.0, &device);
            let loudness = Tensor::<TestBackend, 2>::zeros([2, 5], &device);
            assert_eq!(encoder.forward(pitch, loudness).dims(), [2, 5, 8]);
        }
    }

    #[test]
    fn test_independent_frames_do_not_interact() {
        let device = NdArrayDevice::default();
        let encoder = ControlEncoder::<TestBackend>::new(8, ConditioningMode::Independent, &device);

        let loudness = Tensor::<TestBackend, 2>::zeros([1, 3], &device);
        let a = Tensor::<TestBackend, 2>::from_floats([[100.0, 200.0, 300.0]], &device);
        let b = Tensor::<TestBackend, 2>::from_floats([[100.0, 200.0, 900.0]], &device);

        let first_a = encoder.forward(a, loudness.clone()).narrow(1, 0, 2);
        let first_b = encoder.forward(b, loudness).narrow(1, 0, 2);
        first_a.into_data().assert_eq(&first_b.into_data(), true);
    }
}
