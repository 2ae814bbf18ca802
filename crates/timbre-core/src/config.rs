//! Run configuration loaded from and persisted as TOML.
//!
//! ```toml
//! [model]
//! sample_rate = 16000
//! hop_size = 160
//! chunk_length = 64000
//! hidden_size = 512
//! harmonics = 100
//! noise_bands = 65
//! conditioning = "sequential"
//!
//! [train]
//! steps = 500000
//! batch_size = 16
//! start_lr = 0.001
//! stop_lr = 0.0001
//! decay_over = 400000
//! eval_interval = 10
//! name = "long_training"
//!
//! [[train.scales]]
//! window = 2048
//! overlap = 0.75
//! ```

use crate::error::{Error, Result};
use crate::loudness::LoudnessStats;
use crate::scale::Scale;
use crate::schedule::LearningRateSchedule;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Whether the control encoder carries hidden state across frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditioningMode {
    /// Recurrent encoder over the frame sequence
    #[default]
    Sequential,
    /// Every frame encoded on its own
    Independent,
}

/// Architecture of the synthesis model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub sample_rate: u32,
    /// Audio samples per control frame
    pub hop_size: usize,
    /// Samples per training example; must be a multiple of `hop_size`
    pub chunk_length: usize,
    pub hidden_size: usize,
    pub harmonics: usize,
    /// Magnitude bins of the noise filter
    pub noise_bands: usize,
    /// Reverb impulse length in samples (defaults to one second)
    #[serde(default)]
    pub reverb_length: Option<usize>,
    #[serde(default)]
    pub conditioning: ConditioningMode,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            hop_size: 160,
            chunk_length: 64000,
            hidden_size: 512,
            harmonics: 100,
            noise_bands: 65,
            reverb_length: None,
            conditioning: ConditioningMode::Sequential,
        }
    }
}

impl ModelConfig {
    /// Control frames per example.
    pub fn frames(&self) -> usize {
        self.chunk_length / self.hop_size.max(1)
    }

    pub fn reverb_length(&self) -> usize {
        self.reverb_length.unwrap_or(self.sample_rate as usize)
    }

    pub fn nyquist(&self) -> f32 {
        self.sample_rate as f32 / 2.0
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::InvalidModelConfiguration(msg));

        if self.sample_rate == 0 {
            return invalid("sample rate must be positive".into());
        }
        if self.hop_size == 0 {
            return invalid("hop size must be positive".into());
        }
        if self.harmonics == 0 {
            return invalid("harmonic count must be positive".into());
        }
        if self.hidden_size == 0 {
            return invalid("hidden size must be positive".into());
        }
        if self.noise_bands < 2 {
            return invalid(format!(
                "noise filter needs at least 2 bands, got {}",
                self.noise_bands
            ));
        }
        if self.chunk_length == 0 || self.chunk_length % self.hop_size != 0 {
            return invalid(format!(
                "hop size {} does not evenly divide chunk length {}",
                self.hop_size, self.chunk_length
            ));
        }
        if self.reverb_length() == 0 {
            return invalid("reverb length must be positive".into());
        }
        Ok(())
    }
}

/// Optimization and bookkeeping parameters of a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Total optimizer step budget
    pub steps: u64,
    pub batch_size: usize,
    pub start_lr: f64,
    pub stop_lr: f64,
    /// Steps over which the learning rate decays from start to stop
    pub decay_over: u64,
    /// Epochs between checkpoint/evaluation boundaries
    pub eval_interval: usize,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    pub name: String,
    #[serde(default = "default_scales")]
    pub scales: Vec<Scale>,
}

fn default_scales() -> Vec<Scale> {
    [4096, 2048, 1024, 512, 256, 128]
        .into_iter()
        .map(|window| Scale {
            window,
            overlap: 0.75,
        })
        .collect()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("runs")
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            steps: 500_000,
            batch_size: 16,
            start_lr: 1e-3,
            stop_lr: 1e-4,
            decay_over: 400_000,
            eval_interval: 10,
            seed: 0,
            output_dir: default_output_dir(),
            name: "long_training".into(),
            scales: default_scales(),
        }
    }
}

impl TrainConfig {
    pub fn schedule(&self) -> LearningRateSchedule {
        LearningRateSchedule::new(self.start_lr, self.stop_lr, self.decay_over)
    }

    /// Directory holding this run's checkpoint, config and audio probes.
    pub fn run_dir(&self) -> PathBuf {
        self.output_dir.join(&self.name)
    }

    pub fn validate(&self) -> Result<()> {
        if self.scales.is_empty() {
            return Err(Error::InvalidScaleConfiguration(
                "at least one spectral scale is required".into(),
            ));
        }
        for scale in &self.scales {
            scale.validate()?;
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch size must be positive".into()));
        }
        if self.eval_interval == 0 {
            return Err(Error::InvalidConfig(
                "evaluation interval must be at least one epoch".into(),
            ));
        }
        if self.name.is_empty() {
            return Err(Error::InvalidConfig("run name must not be empty".into()));
        }
        self.schedule().validate()
    }
}

/// Loudness statistics persisted with the run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    pub mean_loudness: f64,
    pub std_loudness: f64,
}

impl From<LoudnessStats> for DataConfig {
    fn from(stats: LoudnessStats) -> Self {
        Self {
            mean_loudness: stats.mean,
            std_loudness: stats.std,
        }
    }
}

impl From<DataConfig> for LoudnessStats {
    fn from(data: DataConfig) -> Self {
        LoudnessStats {
            mean: data.mean_loudness,
            std: data.std_loudness,
        }
    }
}

/// Complete configuration of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub train: TrainConfig,
    #[serde(default)]
    pub data: Option<DataConfig>,
}

impl RunConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.model.validate()?;
        self.train.validate()
    }

    /// Normalization statistics recorded by training, if any.
    pub fn loudness_stats(&self) -> Option<LoudnessStats> {
        self.data.map(LoudnessStats::from)
    }

    pub fn with_loudness_stats(mut self, stats: LoudnessStats) -> Self {
        self.data = Some(stats.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RunConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.model.frames(), 400);
        assert_eq!(config.model.reverb_length(), 16000);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config = RunConfig::from_toml_str(
            r#"
            [model]
            sample_rate = 8000
            hop_size = 80
            chunk_length = 8000
            hidden_size = 32
            harmonics = 16
            noise_bands = 17
            conditioning = "independent"

            [train]
            steps = 10
            batch_size = 2
            start_lr = 0.001
            stop_lr = 0.0001
            decay_over = 5
            eval_interval = 1
            name = "debug"

            [[train.scales]]
            window = 256
            overlap = 0.75
            "#,
        )
        .unwrap();

        assert_eq!(config.model.conditioning, ConditioningMode::Independent);
        assert_eq!(config.train.scales.len(), 1);
        assert_eq!(config.train.run_dir(), PathBuf::from("runs/debug"));
        assert!(config.data.is_none());
    }

    #[test]
    fn test_hop_must_divide_chunk() {
        let model = ModelConfig {
            hop_size: 150,
            ..Default::default()
        };
        assert!(matches!(
            model.validate(),
            Err(Error::InvalidModelConfiguration(_))
        ));
    }

    #[test]
    fn test_rejects_zero_architecture_params() {
        for model in [
            ModelConfig {
                harmonics: 0,
                ..Default::default()
            },
            ModelConfig {
                sample_rate: 0,
                ..Default::default()
            },
            ModelConfig {
                hop_size: 0,
                ..Default::default()
            },
        ] {
            assert!(matches!(
                model.validate(),
                Err(Error::InvalidModelConfiguration(_))
            ));
        }
    }

    #[test]
    fn test_save_and_load_keeps_stats() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run").join("config.toml");

        let config = RunConfig::default().with_loudness_stats(LoudnessStats {
            mean: -42.5,
            std: 7.25,
        });
        config.save(&path).unwrap();

        let loaded = RunConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.loudness_stats().unwrap().mean, -42.5);
    }
}
