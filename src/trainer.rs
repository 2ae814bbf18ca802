//! Training controller.
//!
//! Epochs over batches, one optimizer step per batch. Every `eval_interval`
//! epochs the controller logs the learning rate and reverb parameters,
//! compares the interval's mean loss with the best so far, saves the
//! checkpoint on improvement and writes an audio probe of the last batch.

use crate::artifacts::{eval_clip, eval_clip_name, save_run_config, write_wav};
use crate::error::{Error, Result};
use crate::scalars::ScalarLog;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use std::path::PathBuf;
use timbre_burn::convert::{scalar, tensor_from_vec, tensor_to_vec};
use timbre_burn::{
    save_checkpoint, ComputeContext, MultiscaleSpectralLoss, SynthesisKernels, SynthesisModel,
};
use timbre_core::{
    Batches, ControlBatch, ControlDataset, Error as CoreError, LoudnessStats, RunConfig,
    TrainingState,
};

/// Random stream shuffling the batch order.
const SHUFFLE_STREAM: u64 = 1;
/// Random stream feeding the noise generator during training.
const TRAIN_NOISE_STREAM: u64 = 2;

/// What a finished training run produced.
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub run_dir: PathBuf,
    pub steps: u64,
    pub epochs: usize,
    /// Best interval mean loss, infinite if no interval ever closed
    pub best_loss: f64,
    /// Number of times the best checkpoint was (over)written
    pub checkpoints_written: usize,
    pub loudness: LoudnessStats,
}

/// Tensors for one batch: audio `[b, samples]`, pitch and normalized
/// loudness `[b, frames]`.
pub(crate) fn batch_tensors<B: Backend>(
    batch: &ControlBatch,
    stats: &LoudnessStats,
    device: &B::Device,
) -> (Tensor<B, 2>, Tensor<B, 2>, Tensor<B, 2>) {
    let rows = batch.batch_size;
    (
        tensor_from_vec(batch.audio.clone(), [rows, batch.samples], device),
        tensor_from_vec(batch.pitch.clone(), [rows, batch.frames], device),
        tensor_from_vec(batch.normalized_loudness(stats), [rows, batch.frames], device),
    )
}

/// Train a fresh model on `dataset` and keep its best checkpoint in the
/// run directory.
pub fn train<B, D, L>(
    config: &RunConfig,
    dataset: &D,
    ctx: &ComputeContext<B>,
    scalars: &mut L,
) -> Result<TrainingSummary>
where
    B: AutodiffBackend,
    D: ControlDataset + ?Sized,
    L: ScalarLog + ?Sized,
{
    config.validate()?;
    let model_config = &config.model;
    let train_config = &config.train;
    let run_dir = train_config.run_dir();
    let frames = model_config.frames();
    let hop = model_config.hop_size;
    let batch_size = train_config.batch_size;

    let batches_per_epoch = Batches::<D>::count_for(dataset.len(), batch_size);
    if batches_per_epoch == 0 {
        return Err(CoreError::Dataset(format!(
            "{} examples do not fill one batch of {}",
            dataset.len(),
            batch_size
        ))
        .into());
    }
    if dataset.len() % batch_size != 0 {
        tracing::warn!(
            "Dropping {} examples per epoch that do not fill a batch",
            dataset.len() % batch_size
        );
    }
    let epochs = train_config.steps.div_ceil(batches_per_epoch as u64) as usize;

    let stats = LoudnessStats::compute(dataset)?;
    save_run_config(&run_dir, &config.clone().with_loudness_stats(stats))?;

    let mut model = SynthesisModel::new(model_config, ctx)?;
    let kernels = SynthesisKernels::new(model_config, ctx.device());
    let loss_fn = MultiscaleSpectralLoss::new(&train_config.scales, ctx.device())?;
    let mut optimizer = AdamConfig::new().init::<B, SynthesisModel<B>>();
    let schedule = train_config.schedule();

    let mut state = TrainingState::default();
    let mut order = ctx.rng(SHUFFLE_STREAM);
    let mut noise = ctx.noise_source(TRAIN_NOISE_STREAM);
    let mut checkpoints_written = 0;

    tracing::info!(
        "Training {} for {} epochs of {} batches ({} steps requested)",
        run_dir.display(),
        epochs,
        batches_per_epoch,
        train_config.steps
    );

    for epoch in 0..epochs {
        state.epoch = epoch;
        let mut probe = None;

        for batch in Batches::new(dataset, batch_size, frames, hop, Some(&mut order)) {
            let batch = batch?;
            let (audio, pitch, loudness) = batch_tensors::<B>(&batch, &stats, ctx.device());

            let synthesis = model.forward(&kernels, pitch, loudness, &mut noise)?;
            let loss = loss_fn.forward(audio.clone(), synthesis.signal.clone())?;
            let value = scalar(loss.clone()) as f64;
            if !value.is_finite() {
                return Err(Error::NumericInstability {
                    step: state.step,
                    loss: value,
                });
            }

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optimizer.step(schedule.rate(state.step), model, grads);

            scalars.scalar("loss", value, state.step);
            state.record_step(value);
            probe = Some((audio, synthesis.signal.detach(), batch.samples));
        }

        if epoch % train_config.eval_interval != 0 {
            continue;
        }

        let (decay, wet) = model.reverb_parameters();
        let index = epoch as u64;
        scalars.scalar("lr", schedule.rate(state.step), index);
        scalars.scalar("reverb_decay", decay as f64, index);
        scalars.scalar("reverb_wet", wet as f64, index);

        if let Some(mean) = state.close_interval() {
            tracing::info!("Epoch {}: interval loss improved to {:.6}", epoch, mean);
            save_checkpoint(&model, &run_dir)?;
            checkpoints_written += 1;
        }

        if let Some((audio, signal, samples)) = probe {
            let clip = eval_clip(&tensor_to_vec(audio)?, &tensor_to_vec(signal)?, samples)?;
            write_wav(
                &run_dir.join(eval_clip_name(epoch)),
                &clip,
                model_config.sample_rate,
            )?;
        }
    }

    tracing::info!(
        "Finished {} steps; best interval loss {:.6}",
        state.step,
        state.best_loss
    );

    Ok(TrainingSummary {
        run_dir,
        steps: state.step,
        epochs,
        best_loss: state.best_loss,
        checkpoints_written,
        loudness: stats,
    })
}
