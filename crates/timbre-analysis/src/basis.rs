//! Fixed linear operators consumed by the differentiable synthesis code.
//!
//! Tensor frameworks without an FFT op can still express every transform
//! the synthesizer needs as a matrix product (or strided convolution) with
//! a constant basis. The bases are built here once, on the CPU, from plain
//! `&[f32]` buffers. All matrices are row-major.

use crate::window::hann;
use core::f64::consts::PI;
use rustfft::{num_complex::Complex, FftPlanner};
use timbre_core::Scale;

/// Windowed DFT basis of one analysis scale, `[bins, window]` per part.
///
/// Correlating a frame with row `k` of `re`/`im` yields the real/imaginary
/// part of bin `k`, already Hann-windowed and scaled by `1 / sqrt(window)`.
#[derive(Debug, Clone)]
pub struct StftBasis {
    pub bins: usize,
    pub window: usize,
    pub re: Vec<f32>,
    pub im: Vec<f32>,
}

impl StftBasis {
    pub fn new(scale: Scale) -> Self {
        let n = scale.window;
        let bins = scale.bins();
        let window = hann(n);
        let norm = 1.0 / (n as f64).sqrt();

        let mut re = Vec::with_capacity(bins * n);
        let mut im = Vec::with_capacity(bins * n);
        for k in 0..bins {
            for (m, &w) in window.iter().enumerate() {
                // Reduce before scaling so large windows keep precision
                let angle = 2.0 * PI * ((k * m) % n) as f64 / n as f64;
                re.push((w as f64 * angle.cos() * norm) as f32);
                im.push((-(w as f64) * angle.sin() * norm) as f32);
            }
        }

        Self {
            bins,
            window: n,
            re,
            im,
        }
    }
}

/// Layout of the block-wise filtered noise.
///
/// Each control frame filters `hop` noise samples with an impulse response
/// of `impulse_len` taps. The linear convolution spans `hop + impulse_len - 1`
/// samples, split into `chunks` hop-sized pieces that are overlap-added into
/// the following frames. `fft_size = chunks × hop` so the spectral product
/// never wraps around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoiseLayout {
    pub hop: usize,
    pub bands: usize,
    pub impulse_len: usize,
    pub chunks: usize,
    pub fft_size: usize,
}

impl NoiseLayout {
    pub fn new(hop: usize, bands: usize) -> Self {
        let impulse_len = 2 * (bands.max(2) - 1);
        let span = hop + impulse_len - 1;
        let chunks = span.div_ceil(hop.max(1));
        Self {
            hop,
            bands,
            impulse_len,
            chunks,
            fft_size: chunks * hop,
        }
    }

    /// One-sided spectrum length at `fft_size`.
    pub fn spectrum_bins(&self) -> usize {
        self.fft_size / 2 + 1
    }
}

/// Maps band amplitudes to the spectrum of the filter's impulse response.
///
/// A band vector is read as a zero-phase magnitude response. Its inverse real
/// DFT is rotated to the middle of `impulse_len` taps and Hann-windowed, giving
/// a linear-phase FIR whose `fft_size`-point spectrum is a linear function of
/// the amplitudes. The returned matrices are `[bands, fft_size / 2 + 1]`.
#[derive(Debug, Clone)]
pub struct FilterResponseBasis {
    pub bands: usize,
    pub bins: usize,
    pub re: Vec<f32>,
    pub im: Vec<f32>,
}

impl FilterResponseBasis {
    pub fn new(layout: NoiseLayout) -> Self {
        let taps = layout.impulse_len;
        let n = layout.fft_size;
        let bins = layout.spectrum_bins();
        let window = hann(taps);
        let fft = FftPlanner::<f64>::new().plan_fft_forward(n);

        let mut re = Vec::with_capacity(layout.bands * bins);
        let mut im = Vec::with_capacity(layout.bands * bins);
        let mut buffer = vec![Complex::new(0.0f64, 0.0); n];

        for band in 0..layout.bands {
            let weight = if band == 0 || band == layout.bands - 1 {
                1.0
            } else {
                2.0
            };
            buffer.fill(Complex::new(0.0, 0.0));
            for (m, &w) in window.iter().enumerate() {
                let lag = (m + taps / 2) % taps;
                let angle = 2.0 * PI * ((band * lag) % taps) as f64 / taps as f64;
                buffer[m] = Complex::new(w as f64 * weight * angle.cos() / taps as f64, 0.0);
            }
            fft.process(&mut buffer);
            re.extend(buffer[..bins].iter().map(|c| c.re as f32));
            im.extend(buffer[..bins].iter().map(|c| c.im as f32));
        }

        Self {
            bands: layout.bands,
            bins,
            re,
            im,
        }
    }
}

/// Inverse real DFT as two `[n / 2 + 1, n]` matrices.
///
/// `signal = spectrum_re · re + spectrum_im · im`. Imaginary parts of the DC
/// and Nyquist bins are ignored, as an inverse real FFT does.
#[derive(Debug, Clone)]
pub struct InverseRealDft {
    pub size: usize,
    pub bins: usize,
    pub re: Vec<f32>,
    pub im: Vec<f32>,
}

impl InverseRealDft {
    pub fn new(size: usize) -> Self {
        let bins = size / 2 + 1;
        let mut re = Vec::with_capacity(bins * size);
        let mut im = Vec::with_capacity(bins * size);

        for j in 0..bins {
            let self_conjugate = j == 0 || (size % 2 == 0 && j == size / 2);
            let weight = if self_conjugate { 1.0 } else { 2.0 } / size as f64;
            for t in 0..size {
                let angle = 2.0 * PI * ((j * t) % size) as f64 / size as f64;
                re.push((weight * angle.cos()) as f32);
                im.push(if self_conjugate {
                    0.0
                } else {
                    (-weight * angle.sin()) as f32
                });
            }
        }

        Self { size, bins, re, im }
    }
}

/// Forward real DFT of a zero-padded block as two `[input_len, size / 2 + 1]`
/// matrices.
///
/// `spectrum_re = block · re`, `spectrum_im = block · im` for a block of
/// `input_len` samples padded with zeros to `size`.
#[derive(Debug, Clone)]
pub struct RealDft {
    pub input_len: usize,
    pub size: usize,
    pub bins: usize,
    pub re: Vec<f32>,
    pub im: Vec<f32>,
}

impl RealDft {
    pub fn new(input_len: usize, size: usize) -> Self {
        let bins = size / 2 + 1;
        let mut re = Vec::with_capacity(input_len * bins);
        let mut im = Vec::with_capacity(input_len * bins);

        for t in 0..input_len {
            for j in 0..bins {
                let angle = 2.0 * PI * ((j * t) % size) as f64 / size as f64;
                re.push(angle.cos() as f32);
                im.push(-angle.sin() as f32);
            }
        }

        Self {
            input_len,
            size,
            bins,
            re,
            im,
        }
    }
}

/// One-sided spectra of consecutive blocks, each zero-padded to `fft_size`.
///
/// Returns `(re, im)`, each `[blocks.len() / block_len, fft_size / 2 + 1]`.
pub fn rfft_blocks(blocks: &[f32], block_len: usize, fft_size: usize) -> (Vec<f32>, Vec<f32>) {
    let bins = fft_size / 2 + 1;
    let count = blocks.len() / block_len.max(1);
    let fft = FftPlanner::<f32>::new().plan_fft_forward(fft_size);

    let mut re = Vec::with_capacity(count * bins);
    let mut im = Vec::with_capacity(count * bins);
    let mut buffer = vec![Complex::new(0.0f32, 0.0); fft_size];

    for block in blocks.chunks_exact(block_len) {
        buffer.fill(Complex::new(0.0, 0.0));
        for (slot, &x) in buffer.iter_mut().zip(block.iter()) {
            *slot = Complex::new(x, 0.0);
        }
        fft.process(&mut buffer);
        re.extend(buffer[..bins].iter().map(|c| c.re));
        im.extend(buffer[..bins].iter().map(|c| c.im));
    }

    (re, im)
}
