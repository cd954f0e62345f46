use ndarray::Array2;
use serde::Serialize;

/// Mono sample buffer at a fixed sampling rate.
#[derive(Clone, Debug, PartialEq)]
pub struct Waveform {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    /// Build `len` samples by evaluating `f` at each sample time in seconds.
    #[cfg(test)]
    pub fn from_fn(len: usize, sample_rate: u32, f: impl Fn(f32) -> f32) -> Self {
        let samples = (0..len).map(|i| f(i as f32 / sample_rate as f32)).collect();
        Self { samples, sample_rate }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Number of centred analysis frames for a given hop.
    #[cfg(test)]
    pub fn frame_count(&self, hop_length: usize) -> usize {
        frame_count(self.samples.len(), hop_length)
    }
}

pub fn frame_count(len: usize, hop_length: usize) -> usize {
    len.div_ceil(hop_length)
}

/// What the row axis of a [`FeatureMatrix`] measures.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BinScale {
    /// Mel bands spanning `fmin..fmax` Hz.
    Mel { fmin: f32, fmax: f32 },
    /// The 12 pitch classes, C first.
    Chroma,
    /// Cepstral coefficient index (possibly stacked with deltas).
    Cepstral,
}

/// A `[bin, frame]` matrix plus the axis metadata a renderer needs.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureMatrix {
    pub data: Array2<f32>,
    pub sample_rate: u32,
    pub hop_length: usize,
    pub scale: BinScale,
}

impl FeatureMatrix {
    pub fn n_bins(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_frames(&self) -> usize {
        self.data.ncols()
    }

    /// Start time of a frame in seconds.
    pub fn frame_time(&self, frame: usize) -> f32 {
        (frame * self.hop_length) as f32 / self.sample_rate as f32
    }

    pub fn max(&self) -> f32 {
        self.data.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    pub fn min(&self) -> f32 {
        self.data.iter().copied().fold(f32::INFINITY, f32::min)
    }

    /// Mean over time of every row.
    pub fn row_means(&self) -> Vec<f32> {
        let frames = self.n_frames().max(1) as f32;
        self.data
            .rows()
            .into_iter()
            .map(|row| row.sum() / frames)
            .collect()
    }
}
