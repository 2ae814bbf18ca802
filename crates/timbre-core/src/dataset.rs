//! Dataset collaborator interface and batching.
//!
//! The corpus pipeline (feature extraction from raw recordings) lives outside
//! this workspace. It only has to expose a finite, re-iterable collection of
//! [`ControlExample`]s of equal length.

use crate::error::{Error, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// One training example: audio chunk plus frame-aligned controls.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlExample {
    /// Mono samples, `frames × hop_size` long
    pub audio: Vec<f32>,
    /// Fundamental frequency per frame (Hz)
    pub pitch: Vec<f32>,
    /// Loudness per frame (dB-like)
    pub loudness: Vec<f32>,
}

impl ControlExample {
    pub fn frames(&self) -> usize {
        self.pitch.len()
    }

    /// Check frame alignment against the analysis hop.
    pub fn validate(&self, hop_size: usize) -> Result<()> {
        if self.pitch.len() != self.loudness.len() {
            return Err(Error::Dataset(format!(
                "pitch has {} frames but loudness has {}",
                self.pitch.len(),
                self.loudness.len()
            )));
        }
        if self.audio.len() != self.pitch.len() * hop_size {
            return Err(Error::Dataset(format!(
                "{} samples do not match {} frames at hop {}",
                self.audio.len(),
                self.pitch.len(),
                hop_size
            )));
        }
        Ok(())
    }
}

/// Finite, indexable source of training examples.
pub trait ControlDataset {
    fn len(&self) -> usize;

    fn example(&self, index: usize) -> Result<ControlExample>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Dataset held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryDataset {
    examples: Vec<ControlExample>,
}

impl MemoryDataset {
    pub fn new(examples: Vec<ControlExample>) -> Self {
        Self { examples }
    }

    pub fn push(&mut self, example: ControlExample) {
        self.examples.push(example);
    }
}

impl ControlDataset for MemoryDataset {
    fn len(&self) -> usize {
        self.examples.len()
    }

    fn example(&self, index: usize) -> Result<ControlExample> {
        self.examples
            .get(index)
            .cloned()
            .ok_or_else(|| Error::Dataset(format!("index {} out of range", index)))
    }
}

/// A batch of examples laid out row-major (`[batch, time]`).
#[derive(Debug, Clone, PartialEq)]
pub struct ControlBatch {
    pub batch_size: usize,
    pub frames: usize,
    pub samples: usize,
    pub audio: Vec<f32>,
    pub pitch: Vec<f32>,
    pub loudness: Vec<f32>,
}

impl ControlBatch {
    /// Stack examples that all share `frames` control frames at `hop_size`.
    pub fn stack(examples: &[ControlExample], frames: usize, hop_size: usize) -> Result<Self> {
        if examples.is_empty() {
            return Err(Error::Dataset("cannot build an empty batch".into()));
        }
        let samples = frames * hop_size;
        let mut audio = Vec::with_capacity(examples.len() * samples);
        let mut pitch = Vec::with_capacity(examples.len() * frames);
        let mut loudness = Vec::with_capacity(examples.len() * frames);

        for example in examples {
            example.validate(hop_size)?;
            if example.frames() != frames {
                return Err(Error::Dataset(format!(
                    "expected {} frames per example, got {}",
                    frames,
                    example.frames()
                )));
            }
            audio.extend_from_slice(&example.audio);
            pitch.extend_from_slice(&example.pitch);
            loudness.extend_from_slice(&example.loudness);
        }

        Ok(Self {
            batch_size: examples.len(),
            frames,
            samples,
            audio,
            pitch,
            loudness,
        })
    }

    /// Loudness standardized with the run's statistics.
    pub fn normalized_loudness(&self, stats: &crate::LoudnessStats) -> Vec<f32> {
        self.loudness.iter().map(|&l| stats.normalize(l)).collect()
    }
}

/// Iterator over fixed-size batches, dropping the incomplete tail.
pub struct Batches<'a, D: ControlDataset + ?Sized> {
    dataset: &'a D,
    order: Vec<usize>,
    cursor: usize,
    batch_size: usize,
    frames: usize,
    hop_size: usize,
}

impl<'a, D: ControlDataset + ?Sized> Batches<'a, D> {
    /// Batches in dataset order, or shuffled when an RNG is given.
    pub fn new(
        dataset: &'a D,
        batch_size: usize,
        frames: usize,
        hop_size: usize,
        shuffle: Option<&mut StdRng>,
    ) -> Self {
        let mut order: Vec<usize> = (0..dataset.len()).collect();
        if let Some(rng) = shuffle {
            order.shuffle(rng);
        }
        Self {
            dataset,
            order,
            cursor: 0,
            batch_size: batch_size.max(1),
            frames,
            hop_size,
        }
    }

    /// Number of complete batches per pass.
    pub fn count_for(len: usize, batch_size: usize) -> usize {
        len / batch_size.max(1)
    }
}

impl<D: ControlDataset + ?Sized> Iterator for Batches<'_, D> {
    type Item = Result<ControlBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        let end = self.cursor + self.batch_size;
        if end > self.order.len() {
            return None;
        }
        let indices = &self.order[self.cursor..end];
        self.cursor = end;

        let examples: Result<Vec<_>> = indices.iter().map(|&i| self.dataset.example(i)).collect();
        Some(examples.and_then(|ex| ControlBatch::stack(&ex, self.frames, self.hop_size)))
    }
}
