//! Global loudness normalization statistics.

use crate::dataset::ControlDataset;
use crate::error::{Error, Result};

/// Floor applied to the standard deviation when normalizing.
pub const MIN_STD: f64 = 1e-5;

/// Mean and population standard deviation of loudness over a whole corpus.
///
/// Computed once before training and then immutable for the run, including
/// for evaluation and transfer, which read it back from the persisted config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoudnessStats {
    pub mean: f64,
    pub std: f64,
}

impl LoudnessStats {
    /// One pass over every frame of every example (Welford accumulation).
    pub fn compute<D: ControlDataset + ?Sized>(dataset: &D) -> Result<Self> {
        let mut count = 0u64;
        let mut mean = 0.0f64;
        let mut m2 = 0.0f64;

        for index in 0..dataset.len() {
            let example = dataset.example(index)?;
            for &value in &example.loudness {
                count += 1;
                let value = value as f64;
                let delta = value - mean;
                mean += delta / count as f64;
                m2 += delta * (value - mean);
            }
        }

        if count == 0 {
            return Err(Error::Dataset(
                "cannot compute loudness statistics of an empty dataset".into(),
            ));
        }

        let stats = Self {
            mean,
            std: (m2 / count as f64).sqrt(),
        };
        tracing::debug!(
            "Loudness statistics over {} frames: mean={:.4} std={:.4}",
            count,
            stats.mean,
            stats.std
        );
        Ok(stats)
    }

    pub fn normalize(&self, loudness: f32) -> f32 {
        ((loudness as f64 - self.mean) / self.std.max(MIN_STD)) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{ControlExample, MemoryDataset};
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn dataset_from(loudness: &[Vec<f32>]) -> MemoryDataset {
        MemoryDataset::new(
            loudness
                .iter()
                .map(|l| ControlExample {
                    audio: vec![0.0; l.len()],
                    pitch: vec![0.0; l.len()],
                    loudness: l.clone(),
                })
                .collect(),
        )
    }

    #[test]
    fn test_population_statistics() {
        let dataset = dataset_from(&[vec![1.0, 2.0], vec![3.0, 4.0]]);
        let stats = LoudnessStats::compute(&dataset).unwrap();

        assert_relative_eq!(stats.mean, 2.5);
        assert_relative_eq!(stats.std, 1.25f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(stats.normalize(2.5), 0.0);
    }

    #[test]
    fn test_constant_loudness_stays_finite() {
        let dataset = dataset_from(&[vec![-30.0; 8], vec![-30.0; 8]]);
        let stats = LoudnessStats::compute(&dataset).unwrap();

        assert_eq!(stats.std, 0.0);
        assert_eq!(stats.normalize(-30.0), 0.0);
        assert!(stats.normalize(-20.0).is_finite());
    }

    #[test]
    fn test_empty_dataset() {
        let dataset = MemoryDataset::default();
        assert!(matches!(
            LoudnessStats::compute(&dataset),
            Err(Error::Dataset(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_normalized_corpus_is_standardized(
            values in proptest::collection::vec(-80.0f32..0.0, 2..64)
        ) {
            let dataset = dataset_from(&[values.clone()]);
            let stats = LoudnessStats::compute(&dataset).unwrap();
            prop_assume!(stats.std > 1e-3);

            let normalized: Vec<f64> = values.iter().map(|&v| stats.normalize(v) as f64).collect();
            let n = normalized.len() as f64;
            let mean = normalized.iter().sum::<f64>() / n;
            let var = normalized.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

            prop_assert!(mean.abs() < 1e-3);
            prop_assert!((var - 1.0).abs() < 1e-3);
        }
    }
}
