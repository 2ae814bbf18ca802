//! Magnitude short-time Fourier transform at one or more scales.
//!
//! ## Conventions
//!
//! - Periodic Hann window of the scale's window size
//! - Frames centered on hop positions (`window / 2` zeros on each side)
//! - One-sided spectrum, scaled by `1 / sqrt(window)`
//!
//! The differentiable implementation in `timbre-burn` follows the same
//! conventions, so the two agree up to float rounding.

use crate::window::hann;
use rustfft::{num_complex::Complex, FftPlanner};
use timbre_core::{Result, Scale};

/// Floor added before taking the logarithm of a magnitude.
pub const LOG_EPSILON: f32 = 1e-7;

/// `ln(x + ε)`, finite for silent input.
pub fn safe_log(x: f32) -> f32 {
    (x + LOG_EPSILON).ln()
}

/// Magnitude spectrogram stored frame-major (`[frames, bins]`).
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    pub frames: usize,
    pub bins: usize,
    pub data: Vec<f32>,
}

impl Spectrogram {
    pub fn frame(&self, index: usize) -> &[f32] {
        &self.data[index * self.bins..(index + 1) * self.bins]
    }

    pub fn get(&self, frame: usize, bin: usize) -> f32 {
        self.data[frame * self.bins + bin]
    }
}

/// Compute the magnitude spectrogram of `signal` at one scale.
pub fn stft_magnitude(signal: &[f32], scale: Scale) -> Result<Spectrogram> {
    let mut planner = FftPlanner::new();
    stft_with_planner(&mut planner, signal, scale)
}

/// Compute one spectrogram per scale, in the order given.
pub fn multiscale_magnitudes(signal: &[f32], scales: &[Scale]) -> Result<Vec<Spectrogram>> {
    let mut planner = FftPlanner::new();
    scales
        .iter()
        .map(|&scale| stft_with_planner(&mut planner, signal, scale))
        .collect()
}

fn stft_with_planner(
    planner: &mut FftPlanner<f32>,
    signal: &[f32],
    scale: Scale,
) -> Result<Spectrogram> {
    scale.check_signal(signal.len())?;

    let window = hann(scale.window);
    let fft = planner.plan_fft_forward(scale.window);
    let pad = scale.pad();
    let hop = scale.hop();
    let frames = scale.frames(signal.len());
    let bins = scale.bins();
    let norm = 1.0 / (scale.window as f32).sqrt();

    let mut buffer = vec![Complex::new(0.0f32, 0.0); scale.window];
    let mut data = Vec::with_capacity(frames * bins);

    for frame in 0..frames {
        let start = frame * hop;
        for (i, slot) in buffer.iter_mut().enumerate() {
            // Position in the unpadded signal
            let sample = (start + i)
                .checked_sub(pad)
                .and_then(|idx| signal.get(idx))
                .copied()
                .unwrap_or(0.0);
            *slot = Complex::new(sample * window[i], 0.0);
        }
        fft.process(&mut buffer);
        data.extend(buffer[..bins].iter().map(|c| c.norm() * norm));
    }

    Ok(Spectrogram { frames, bins, data })
}

/// Multiscale spectral distance: per scale, mean absolute difference of
/// magnitudes plus mean absolute difference of safe-log magnitudes.
pub fn spectral_distance(reference: &[f32], candidate: &[f32], scales: &[Scale]) -> Result<f64> {
    if reference.len() != candidate.len() {
        return Err(timbre_core::Error::InvalidScaleConfiguration(format!(
            "signals differ in length ({} vs {})",
            reference.len(),
            candidate.len()
        )));
    }

    let lhs = multiscale_magnitudes(reference, scales)?;
    let rhs = multiscale_magnitudes(candidate, scales)?;

    let mut total = 0.0f64;
    for (a, b) in lhs.iter().zip(rhs.iter()) {
        let n = a.data.len() as f64;
        let (lin, log) = a
            .data
            .iter()
            .zip(b.data.iter())
            .fold((0.0f64, 0.0f64), |(lin, log), (&x, &y)| {
                (
                    lin + (x - y).abs() as f64,
                    log + (safe_log(x) - safe_log(y)).abs() as f64,
                )
            });
        total += lin / n + log / n;
    }
    Ok(total)
}
