//! Test helpers and fixtures for timbre integration tests.
//!
//! Small models at 8 kHz with one-second examples keep every end-to-end run
//! on the CPU backend down to a few optimizer steps.

pub mod tolerances;

use std::path::Path;
use timbre::prelude::*;

pub const TEST_SAMPLE_RATE: u32 = 8000;
pub const TEST_HOP: usize = 80;
/// One second per example
pub const TEST_CHUNK: usize = 8000;
pub const TEST_FRAMES: usize = TEST_CHUNK / TEST_HOP;

/// Run configuration writing into `output_dir/name`: batch 2, evaluation
/// every epoch, `steps` optimizer steps.
pub fn test_config(output_dir: &Path, name: &str, steps: u64) -> RunConfig {
    RunConfig {
        model: ModelConfig {
            sample_rate: TEST_SAMPLE_RATE,
            hop_size: TEST_HOP,
            chunk_length: TEST_CHUNK,
            hidden_size: 32,
            harmonics: 16,
            noise_bands: 17,
            reverb_length: Some(80),
            conditioning: ConditioningMode::Sequential,
        },
        train: TrainConfig {
            steps,
            batch_size: 2,
            start_lr: 1e-3,
            stop_lr: 1e-4,
            decay_over: steps.max(1),
            eval_interval: 1,
            seed: 7,
            output_dir: output_dir.to_path_buf(),
            name: name.to_string(),
            scales: Scale::uniform(&[512, 256, 128, 64], 0.75).expect("valid scales"),
        },
        data: None,
    }
}

/// Constant-pitch sine examples with constant loudness.
pub fn tone_dataset(count: usize, freq: f32, amplitude: f32, loudness: f32) -> MemoryDataset {
    let audio: Vec<f32> = (0..TEST_CHUNK)
        .map(|i| {
            let t = i as f32 / TEST_SAMPLE_RATE as f32;
            (2.0 * std::f32::consts::PI * freq * t).sin() * amplitude
        })
        .collect();

    MemoryDataset::new(
        (0..count)
            .map(|_| ControlExample {
                audio: audio.clone(),
                pitch: vec![freq; TEST_FRAMES],
                loudness: vec![loudness; TEST_FRAMES],
            })
            .collect(),
    )
}

/// Silent examples: zero audio, zero pitch, a floor loudness.
pub fn silent_dataset(count: usize) -> MemoryDataset {
    MemoryDataset::new(
        (0..count)
            .map(|_| ControlExample {
                audio: vec![0.0; TEST_CHUNK],
                pitch: vec![0.0; TEST_FRAMES],
                loudness: vec![-100.0; TEST_FRAMES],
            })
            .collect(),
    )
}

/// Mono float samples and sample rate of a rendered WAV file.
pub fn read_wav(path: &Path) -> (Vec<f32>, u32) {
    let reader = hound::WavReader::open(path)
        .unwrap_or_else(|e| panic!("Failed to open WAV '{}': {}", path.display(), e));
    let spec = reader.spec();
    assert_eq!(spec.channels, 1, "renders are mono");
    assert_eq!(spec.sample_format, hound::SampleFormat::Float);

    let samples = reader
        .into_samples::<f32>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .expect("Failed to read float samples");
    (samples, spec.sample_rate)
}

/// Peak absolute value.
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |p, s| p.max(s.abs()))
}
