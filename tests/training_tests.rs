//! End-to-end training controller tests.
//!
//! Run with:
//! ```bash
//! cargo test -p timbre --test training_tests
//! ```

#[path = "helpers/mod.rs"]
mod helpers;

use helpers::{read_wav, silent_dataset, test_config, tone_dataset, TEST_CHUNK, TEST_SAMPLE_RATE};
use timbre::artifacts::{eval_clip_name, load_run_config};
use timbre::prelude::*;
use timbre::synth::checkpoint_exists;
use timbre::train;

// =============================================================================
// Tone Corpus
// =============================================================================

/// Four one-second 220 Hz examples, batch 2, two epochs.
#[test]
fn test_tone_training_keeps_loss_finite_and_checkpoints() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), "tone", 4);
    let dataset = tone_dataset(4, 220.0, 0.5, -20.0);
    let ctx = ComputeContext::cpu(config.train.seed);
    let mut scalars = ScalarRecord::new();

    let summary = train(&config, &dataset, &ctx, &mut scalars).expect("Training failed");

    assert_eq!(summary.epochs, 2);
    assert_eq!(summary.steps, 4);

    let losses = scalars.series("loss");
    assert_eq!(losses.len(), 4);
    for (step, (index, loss)) in losses.iter().enumerate() {
        assert_eq!(*index, step as u64);
        assert!(loss.is_finite() && *loss > 0.0, "step {} loss = {}", step, loss);
    }

    assert!(summary.checkpoints_written >= 1);
    assert!(summary.best_loss.is_finite());
    assert!(checkpoint_exists(&summary.run_dir));

    // One probe per epoch: each example's original followed by its reconstruction
    for epoch in 0..2 {
        let (clip, sample_rate) = read_wav(&summary.run_dir.join(eval_clip_name(epoch)));
        assert_eq!(sample_rate, TEST_SAMPLE_RATE);
        assert_eq!(clip.len(), 2 * 2 * TEST_CHUNK);
        assert!(clip.iter().all(|s| s.is_finite()));
    }
}

#[test]
fn test_interval_scalars_logged_per_epoch() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), "scalars", 4);
    let dataset = tone_dataset(4, 220.0, 0.5, -20.0);
    let mut scalars = ScalarRecord::new();

    train(&config, &dataset, &ComputeContext::cpu(1), &mut scalars).expect("Training failed");

    let lr = scalars.series("lr");
    assert_eq!(lr.iter().map(|(epoch, _)| *epoch).collect::<Vec<_>>(), vec![0, 1]);
    assert!(lr[1].1 <= lr[0].1);
    assert_eq!(scalars.series("reverb_decay").len(), 2);
    assert_eq!(scalars.series("reverb_wet").len(), 2);
}

#[test]
fn test_loudness_statistics_persisted_with_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), "stats", 2);
    let dataset = tone_dataset(2, 330.0, 0.25, -30.0);

    let summary = train(&config, &dataset, &ComputeContext::cpu(0), &mut TracingScalars)
        .expect("Training failed");

    let persisted = load_run_config(&summary.run_dir).expect("Missing run config");
    let stats = persisted.loudness_stats().expect("Missing loudness statistics");
    assert_eq!(stats, summary.loudness);
    assert!((stats.mean + 30.0).abs() < 1e-6);
    assert!(stats.std < 1e-6);
    assert_eq!(persisted.model, config.model);
}

#[test]
fn test_independent_conditioning_trains() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path(), "independent", 2);
    config.model.conditioning = ConditioningMode::Independent;
    let dataset = tone_dataset(2, 220.0, 0.5, -20.0);
    let mut scalars = ScalarRecord::new();

    let summary = train(&config, &dataset, &ComputeContext::cpu(3), &mut scalars)
        .expect("Training failed");
    assert_eq!(summary.steps, 2);
    assert!(scalars.series("loss").iter().all(|(_, l)| l.is_finite()));
}

/// One optimizer step at 16 kHz with the shipped scale list and reverb
/// length, whose hops do not divide a one-second example.
#[test]
fn test_default_scales_train_one_second_examples() {
    let dir = tempfile::tempdir().unwrap();
    let sample_rate = 16000u32;
    let hop = 160;
    let samples = sample_rate as usize;

    let mut config = test_config(dir.path(), "default_scales", 1);
    config.model = ModelConfig {
        sample_rate,
        hop_size: hop,
        chunk_length: samples,
        reverb_length: None,
        ..config.model
    };
    config.train.batch_size = 1;
    config.train.scales = TrainConfig::default().scales;
    assert!(config.train.scales.iter().any(|s| samples % s.hop() != 0));

    let audio: Vec<f32> = (0..samples)
        .map(|i| (2.0 * std::f32::consts::PI * 220.0 * i as f32 / sample_rate as f32).sin() * 0.5)
        .collect();
    let dataset = MemoryDataset::new(vec![ControlExample {
        audio,
        pitch: vec![220.0; samples / hop],
        loudness: vec![-20.0; samples / hop],
    }]);
    let mut scalars = ScalarRecord::new();

    let summary = train(&config, &dataset, &ComputeContext::cpu(0), &mut scalars)
        .expect("Training failed");

    assert_eq!(summary.steps, 1);
    let losses = scalars.series("loss");
    assert_eq!(losses.len(), 1);
    assert!(losses[0].1.is_finite() && losses[0].1 > 0.0);
    assert!(checkpoint_exists(&summary.run_dir));
}

// =============================================================================
// Failure Modes
// =============================================================================

#[test]
fn test_non_finite_loss_aborts_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), "nan", 2);
    let mut dataset = silent_dataset(1);
    let mut corrupt = dataset.example(0).expect("example exists");
    corrupt.audio[100] = f32::NAN;
    dataset.push(corrupt);

    // A single batch per epoch, so the very first step sees the corrupt example
    let err = train(&config, &dataset, &ComputeContext::cpu(0), &mut TracingScalars).unwrap_err();
    match err {
        Error::NumericInstability { step, loss } => {
            assert_eq!(step, 0);
            assert!(!loss.is_finite());
        }
        other => panic!("expected NumericInstability, got {other:?}"),
    }
    assert!(!checkpoint_exists(&config.train.run_dir()));
}

#[test]
fn test_dataset_smaller_than_batch_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), "tiny", 2);
    let dataset = tone_dataset(1, 220.0, 0.5, -20.0);

    let err = train(&config, &dataset, &ComputeContext::cpu(0), &mut TracingScalars).unwrap_err();
    assert!(matches!(
        err,
        Error::Core(timbre::core::Error::Dataset(_))
    ));
}

#[test]
fn test_invalid_model_configuration_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path(), "bad", 2);
    config.model.hop_size = 77;
    let dataset = tone_dataset(2, 220.0, 0.5, -20.0);

    let err = train(&config, &dataset, &ComputeContext::cpu(0), &mut TracingScalars).unwrap_err();
    assert!(matches!(
        err,
        Error::Core(timbre::core::Error::InvalidModelConfiguration(_))
    ));
}
