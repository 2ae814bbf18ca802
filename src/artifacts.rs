//! Files a run leaves behind: mono WAV renders and the persisted config.

use crate::error::{Error, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::{Path, PathBuf};
use timbre_core::RunConfig;

/// Name of the configuration persisted next to the checkpoint.
pub const RUN_CONFIG_FILE: &str = "config.toml";

pub const TEST_REF: &str = "test_ref.wav";
pub const TEST_SYNTH: &str = "test_synth.wav";
pub const TEST_SYNTH_HARMONIC: &str = "test_synth_harmonic.wav";
pub const TEST_SYNTH_NOISE: &str = "test_synth_noise.wav";

/// Training probe for `epoch`, e.g. `eval_000010.wav`.
pub fn eval_clip_name(epoch: usize) -> String {
    format!("eval_{epoch:06}.wav")
}

pub fn run_config_path(run_dir: &Path) -> PathBuf {
    run_dir.join(RUN_CONFIG_FILE)
}

/// Persist `config` (including loudness statistics) into `run_dir`.
pub fn save_run_config(run_dir: &Path, config: &RunConfig) -> Result<PathBuf> {
    let path = run_config_path(run_dir);
    config.save(&path)?;
    tracing::info!("Wrote run configuration to {}", path.display());
    Ok(path)
}

/// Read the configuration a previous run persisted.
pub fn load_run_config(run_dir: &Path) -> Result<RunConfig> {
    Ok(RunConfig::load(&run_config_path(run_dir))?)
}

/// Write mono 32-bit float samples.
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    tracing::debug!("Wrote {} samples to {}", samples.len(), path.display());
    Ok(())
}

/// Interleave row-major `[batch, samples]` buffers per example:
/// `original[0], reconstruction[0], original[1], ...`.
pub fn eval_clip(original: &[f32], reconstruction: &[f32], samples: usize) -> Result<Vec<f32>> {
    if original.len() != reconstruction.len() || samples == 0 || original.len() % samples != 0 {
        return Err(Error::Audio(format!(
            "cannot pair {} original with {} reconstructed samples in rows of {}",
            original.len(),
            reconstruction.len(),
            samples
        )));
    }

    let mut clip = Vec::with_capacity(original.len() * 2);
    for (a, b) in original
        .chunks_exact(samples)
        .zip(reconstruction.chunks_exact(samples))
    {
        clip.extend_from_slice(a);
        clip.extend_from_slice(b);
    }
    Ok(clip)
}
