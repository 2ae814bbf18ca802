//! Spectral analysis scale (window size + overlap).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// One time-frequency resolution of the multiscale analysis.
///
/// The hop is derived as `window × (1 − overlap)`, truncated to whole samples.
/// Frames are centered on hop positions with `window / 2` samples of zero
/// padding on each side, so a window longer than the signal still yields
/// at least one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scale {
    /// Window (and FFT) size in samples
    pub window: usize,
    /// Fraction of the window shared by consecutive frames, in `[0, 1)`
    pub overlap: f32,
}

impl Scale {
    pub fn new(window: usize, overlap: f32) -> Result<Self> {
        let scale = Self { window, overlap };
        scale.validate()?;
        Ok(scale)
    }

    /// Same overlap for every window size, the usual multiscale setup.
    pub fn uniform(windows: &[usize], overlap: f32) -> Result<Vec<Self>> {
        windows.iter().map(|&w| Self::new(w, overlap)).collect()
    }

    pub fn hop(&self) -> usize {
        (self.window as f64 * (1.0 - self.overlap as f64)) as usize
    }

    /// Number of frequency bins of the one-sided spectrum.
    pub fn bins(&self) -> usize {
        self.window / 2 + 1
    }

    /// Zero padding applied on each side of the signal.
    pub fn pad(&self) -> usize {
        self.window / 2
    }

    /// Number of centered frames produced for a signal of `len` samples.
    pub fn frames(&self, len: usize) -> usize {
        (len + 2 * self.pad()).saturating_sub(self.window) / self.hop() + 1
    }

    pub fn validate(&self) -> Result<()> {
        if self.window < 2 {
            return Err(Error::InvalidScaleConfiguration(format!(
                "window must be at least 2 samples, got {}",
                self.window
            )));
        }
        if !(0.0..1.0).contains(&self.overlap) {
            return Err(Error::InvalidScaleConfiguration(format!(
                "overlap must be in [0, 1), got {}",
                self.overlap
            )));
        }
        if self.hop() == 0 {
            return Err(Error::InvalidScaleConfiguration(format!(
                "window {} with overlap {} rounds to a zero hop",
                self.window, self.overlap
            )));
        }
        Ok(())
    }

    /// Check that this scale can analyse a signal of `len` samples.
    pub fn check_signal(&self, len: usize) -> Result<()> {
        self.validate()?;
        if len == 0 {
            return Err(Error::InvalidScaleConfiguration(
                "cannot analyse an empty signal".into(),
            ));
        }
        Ok(())
    }
}
