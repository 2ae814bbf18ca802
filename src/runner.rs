//! Evaluation and transfer runners.
//!
//! Both restore a checkpoint into a freshly built model on a backend without
//! gradient tracking, synthesize exactly one batch and render the reference,
//! the full synthesis and the dry harmonic and noise components.

use crate::artifacts::{
    load_run_config, write_wav, TEST_REF, TEST_SYNTH, TEST_SYNTH_HARMONIC, TEST_SYNTH_NOISE,
};
use crate::error::Result;
use crate::trainer::batch_tensors;
use burn::prelude::*;
use std::path::{Path, PathBuf};
use timbre_analysis::spectral_distance;
use timbre_burn::convert::tensor_to_vec;
use timbre_burn::{
    checkpoint_exists, checkpoint_path, load_checkpoint, ComputeContext, Error as BurnError,
    SynthesisKernels, SynthesisModel,
};
use timbre_core::{Batches, ControlDataset, Error as CoreError, RunConfig, Scale};

/// Random stream feeding the noise generator while rendering.
const RENDER_NOISE_STREAM: u64 = 3;

/// Files and score of one rendered batch.
#[derive(Debug, Clone)]
pub struct RenderReport {
    pub output_dir: PathBuf,
    pub reference: PathBuf,
    pub synthesis: PathBuf,
    pub harmonic: PathBuf,
    pub noise: PathBuf,
    /// Multiscale spectral distance between reference and synthesis
    pub spectral_distance: f64,
    /// Largest absolute sample of the full synthesis
    pub synthesis_peak: f32,
}

/// Render one batch of `dataset` through this run's own best checkpoint.
pub fn evaluate<B, D>(config: &RunConfig, dataset: &D, ctx: &ComputeContext<B>) -> Result<RenderReport>
where
    B: Backend,
    D: ControlDataset + ?Sized,
{
    let run_dir = config.train.run_dir();
    render(config, &run_dir, &run_dir, dataset, ctx)
}

/// Render one batch of `dataset` through the checkpoint of `source_run`.
///
/// Architecture and loudness statistics come from the source run, so the
/// conditioning matches what the model was trained on; the renders land in
/// this run's directory.
pub fn transfer<B, D>(
    config: &RunConfig,
    source_run: &Path,
    dataset: &D,
    ctx: &ComputeContext<B>,
) -> Result<RenderReport>
where
    B: Backend,
    D: ControlDataset + ?Sized,
{
    render(config, source_run, &config.train.run_dir(), dataset, ctx)
}

/// Mean of the per-example spectral distances of two row-major batches, so
/// no analysis window spans two examples.
fn batch_distance(
    reference: &[f32],
    candidate: &[f32],
    samples: usize,
    scales: &[Scale],
) -> Result<f64> {
    let samples = samples.max(1);
    let rows = reference.len() / samples;
    let mut total = 0.0;
    for (x, y) in reference
        .chunks_exact(samples)
        .zip(candidate.chunks_exact(samples))
    {
        total += spectral_distance(x, y, scales)?;
    }
    Ok(total / rows.max(1) as f64)
}

fn render<B, D>(
    config: &RunConfig,
    source_run: &Path,
    output_dir: &Path,
    dataset: &D,
    ctx: &ComputeContext<B>,
) -> Result<RenderReport>
where
    B: Backend,
    D: ControlDataset + ?Sized,
{
    if !checkpoint_exists(source_run) {
        return Err(BurnError::CheckpointNotFound(checkpoint_path(source_run)).into());
    }

    let trained = load_run_config(source_run)?;
    let stats = trained.loudness_stats().ok_or_else(|| {
        CoreError::InvalidConfig(format!(
            "run {} has no loudness statistics",
            source_run.display()
        ))
    })?;
    let model_config = &trained.model;

    let model = SynthesisModel::new(model_config, ctx)?;
    let model = load_checkpoint(model, source_run, ctx.device())?;
    let kernels = SynthesisKernels::new(model_config, ctx.device());

    let frames = model_config.frames();
    let batch_size = config.train.batch_size;
    let batch = Batches::new(dataset, batch_size, frames, model_config.hop_size, None)
        .next()
        .ok_or_else(|| {
            CoreError::Dataset(format!(
                "{} examples do not fill one batch of {}",
                dataset.len(),
                batch_size
            ))
        })??;

    let (audio, pitch, loudness) = batch_tensors::<B>(&batch, &stats, ctx.device());
    let mut noise = ctx.noise_source(RENDER_NOISE_STREAM);
    let synthesis = model.forward(&kernels, pitch, loudness, &mut noise)?;

    let reference = tensor_to_vec(audio)?;
    let signal = tensor_to_vec(synthesis.signal)?;
    let harmonic = tensor_to_vec(synthesis.harmonic)?;
    let noise = tensor_to_vec(synthesis.noise)?;

    let sample_rate = model_config.sample_rate;
    let report = RenderReport {
        output_dir: output_dir.to_path_buf(),
        reference: output_dir.join(TEST_REF),
        synthesis: output_dir.join(TEST_SYNTH),
        harmonic: output_dir.join(TEST_SYNTH_HARMONIC),
        noise: output_dir.join(TEST_SYNTH_NOISE),
        spectral_distance: batch_distance(
            &reference,
            &signal,
            batch.samples,
            &config.train.scales,
        )?,
        synthesis_peak: signal.iter().fold(0.0f32, |peak, s| peak.max(s.abs())),
    };

    write_wav(&report.reference, &reference, sample_rate)?;
    write_wav(&report.synthesis, &signal, sample_rate)?;
    write_wav(&report.harmonic, &harmonic, sample_rate)?;
    write_wav(&report.noise, &noise, sample_rate)?;

    tracing::info!(
        "Rendered {} examples from {} into {} (spectral distance {:.4})",
        batch.batch_size,
        source_run.display(),
        output_dir.display(),
        report.spectral_distance
    );
    Ok(report)
}
