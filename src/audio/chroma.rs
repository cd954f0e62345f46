//! Pitch-class energy from a constant-Q-like filter bank.
//!
//! A long-window STFT is projected onto log-spaced triangular filters,
//! `bins_per_octave` per octave starting at C1, and the filter outputs are
//! folded across octaves into 12 pitch classes.

use ndarray::Array2;
use serde::Deserialize;

use super::error::{AnalysisError, Result};
use super::features::{BinScale, FeatureMatrix, Waveform};
use super::stft;

pub const PITCH_CLASSES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Frequency of C1 in Hz.
pub const C1_HZ: f32 = 32.703_197;

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChromaConfig {
    pub n_fft: usize,
    /// Always the shared `[audio]` hop; not read from the `[chroma]` section.
    #[serde(skip)]
    pub hop_length: usize,
    pub bins_per_octave: usize,
    /// Upper bound; octaves reaching past Nyquist are dropped.
    pub n_octaves: usize,
    pub fmin: f32,
}

impl Default for ChromaConfig {
    fn default() -> Self {
        Self {
            n_fft: 16384,
            hop_length: 1024,
            bins_per_octave: 36,
            n_octaves: 7,
            fmin: C1_HZ,
        }
    }
}

impl ChromaConfig {
    pub fn validate(&self, sample_rate: u32) -> Result<()> {
        if self.bins_per_octave == 0 || self.bins_per_octave % 12 != 0 {
            return Err(AnalysisError::invalid(format!(
                "bins_per_octave must be a positive multiple of 12, got {}",
                self.bins_per_octave
            )));
        }
        if self.n_octaves == 0 {
            return Err(AnalysisError::invalid("n_octaves must be positive"));
        }
        if !(self.fmin > 0.0) {
            return Err(AnalysisError::invalid(format!("fmin must be positive, got {}", self.fmin)));
        }
        if self.octaves_below_nyquist(sample_rate) == 0 {
            return Err(AnalysisError::invalid(format!(
                "no chroma octave starting at {:.1} Hz fits below Nyquist ({} Hz)",
                self.fmin,
                sample_rate as f32 / 2.0
            )));
        }
        Ok(())
    }

    /// Whole octaves, at most `n_octaves`, whose top bin stays below Nyquist.
    pub fn octaves_below_nyquist(&self, sample_rate: u32) -> usize {
        let nyquist = sample_rate as f32 / 2.0;
        (0..=self.n_octaves)
            .rev()
            .find(|&n| n == 0 || self.center_hz(n * self.bins_per_octave - 1) < nyquist)
            .unwrap_or(0)
    }

    fn n_cq_bins(&self) -> usize {
        self.n_octaves * self.bins_per_octave
    }

    fn center_hz(&self, k: usize) -> f32 {
        self.fmin * 2f32.powf(k as f32 / self.bins_per_octave as f32)
    }
}

pub fn pitch_class_name(class: usize) -> &'static str {
    PITCH_CLASSES[class % 12]
}

/// Pitch class (C = 0) nearest to a frequency.
pub fn pitch_class_of(hz: f32) -> usize {
    let midi = 69.0 + 12.0 * (hz / 440.0).log2();
    (midi.round() as i64).rem_euclid(12) as usize
}

/// One triangular band over a contiguous run of FFT bins.
#[derive(Clone, Debug)]
struct CqFilter {
    start: usize,
    weights: Vec<f32>,
}

impl CqFilter {
    fn apply(&self, magnitude: &[f32]) -> f32 {
        self.weights
            .iter()
            .zip(&magnitude[self.start..])
            .map(|(w, m)| w * m)
            .sum()
    }
}

fn cq_filters(config: &ChromaConfig, sample_rate: u32) -> Vec<CqFilter> {
    let bins = stft::num_bins(config.n_fft);
    let bin_hz = sample_rate as f32 / config.n_fft as f32;
    let ratio = 2f32.powf(1.0 / config.bins_per_octave as f32) - 1.0;

    (0..config.n_cq_bins())
        .map(|k| {
            let center = config.center_hz(k);
            let half = (center * ratio).max(bin_hz);
            let lo = (((center - half) / bin_hz).ceil().max(0.0)) as usize;
            let hi = (((center + half) / bin_hz).floor() as usize).min(bins - 1);

            let mut weights: Vec<f32> = (lo..=hi)
                .map(|bin| (1.0 - (bin as f32 * bin_hz - center).abs() / half).max(0.0))
                .collect();
            let total: f32 = weights.iter().sum();
            if total > 0.0 {
                weights.iter_mut().for_each(|w| *w /= total);
            }
            CqFilter { start: lo, weights }
        })
        .collect()
}

/// Normalised 12-bin chromagram indexed `[pitch_class, frame]`.
pub fn chromagram(waveform: &Waveform, config: &ChromaConfig) -> Result<FeatureMatrix> {
    let sample_rate = waveform.sample_rate();
    config.validate(sample_rate)?;
    AnalysisError::require_len(waveform.len(), config.n_fft)?;

    let n_octaves = config.octaves_below_nyquist(sample_rate);
    if n_octaves < config.n_octaves {
        log::debug!(
            "Chroma limited to {} of {} octaves at {}Hz",
            n_octaves,
            config.n_octaves,
            sample_rate
        );
    }
    let config = &ChromaConfig {
        n_octaves,
        ..config.clone()
    };

    let magnitude =
        stft::magnitude_spectrogram(waveform.samples(), config.n_fft, config.hop_length)?;
    let filters = cq_filters(config, sample_rate);

    let per_class = config.bins_per_octave / 12;
    let offset = pitch_class_of(config.fmin);
    let class_of = |k: usize| ((k + per_class / 2) / per_class + offset) % 12;

    let frames = magnitude.ncols();
    let mut chroma = Array2::<f32>::zeros((12, frames));
    for (t, column) in magnitude.columns().into_iter().enumerate() {
        let column = column.to_vec();
        for (k, filter) in filters.iter().enumerate() {
            chroma[[class_of(k), t]] += filter.apply(&column);
        }
    }

    for mut column in chroma.columns_mut() {
        let peak = column.iter().copied().fold(0.0f32, f32::max);
        if peak > f32::MIN_POSITIVE {
            column.mapv_inplace(|v| v / peak);
        }
    }

    log::debug!(
        "chromagram: {} frames, {} CQ bins ({} per octave)",
        frames,
        filters.len(),
        config.bins_per_octave
    );

    Ok(FeatureMatrix {
        data: chroma,
        sample_rate,
        hop_length: config.hop_length,
        scale: BinScale::Chroma,
    })
}
