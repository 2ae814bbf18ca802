//! Window functions.

use core::f64::consts::PI;

/// Periodic Hann window (the DFT-even variant used for spectral analysis).
pub fn hann(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let angle = 2.0 * PI * i as f64 / size as f64;
            (0.5 * (1.0 - angle.cos())) as f32
        })
        .collect()
}
