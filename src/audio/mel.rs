//! Mel-scaled power spectrograms and decibel conversion.

use ndarray::Array2;
use serde::Deserialize;

use super::error::{AnalysisError, Result};
use super::features::{BinScale, FeatureMatrix, Waveform};
use super::stft;

/// Power floor applied before taking logarithms.
const AMIN: f32 = 1e-10;

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpectrumConfig {
    pub n_fft: usize,
    /// Taken from `[audio] hop_length` when loaded from a config file.
    #[serde(skip)]
    pub hop_length: usize,
    pub n_mels: usize,
    pub fmin: f32,
    /// Upper edge of the filter bank; Nyquist when unset.
    pub fmax: Option<f32>,
    /// Dynamic range kept below the peak by [`to_log_power`].
    pub top_db: f32,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            n_fft: 2048,
            hop_length: 1024,
            n_mels: 128,
            fmin: 0.0,
            fmax: None,
            top_db: 80.0,
        }
    }
}

impl SpectrumConfig {
    pub fn validate(&self, sample_rate: u32) -> Result<()> {
        if self.n_mels == 0 {
            return Err(AnalysisError::invalid("n_mels must be positive"));
        }
        if self.top_db <= 0.0 {
            return Err(AnalysisError::invalid(format!(
                "top_db must be positive, got {}",
                self.top_db
            )));
        }
        let fmax = self.fmax_for(sample_rate);
        if !(self.fmin >= 0.0 && self.fmin < fmax) {
            return Err(AnalysisError::invalid(format!(
                "mel range {}..{} Hz is empty",
                self.fmin, fmax
            )));
        }
        Ok(())
    }

    fn fmax_for(&self, sample_rate: u32) -> f32 {
        self.fmax.unwrap_or(sample_rate as f32 / 2.0)
    }
}

// Slaney mel scale: linear below 1 kHz, logarithmic above.
const F_SP: f32 = 200.0 / 3.0;
const MIN_LOG_HZ: f32 = 1000.0;
const MIN_LOG_MEL: f32 = MIN_LOG_HZ / F_SP;

fn log_step() -> f32 {
    6.4f32.ln() / 27.0
}

pub fn hz_to_mel(hz: f32) -> f32 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

pub fn mel_to_hz(mel: f32) -> f32 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        mel * F_SP
    }
}

/// Triangular, area-normalised mel filters indexed `[band, fft_bin]`.
pub fn mel_filter_bank(
    sample_rate: u32,
    n_fft: usize,
    n_mels: usize,
    fmin: f32,
    fmax: f32,
) -> Array2<f32> {
    let bins = stft::num_bins(n_fft);
    let bin_hz = sample_rate as f32 / n_fft as f32;

    let mel_low = hz_to_mel(fmin);
    let mel_high = hz_to_mel(fmax);
    let edges: Vec<f32> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_low + (mel_high - mel_low) * i as f32 / (n_mels + 1) as f32))
        .collect();

    let mut weights = Array2::<f32>::zeros((n_mels, bins));
    for m in 0..n_mels {
        let (lo, center, hi) = (edges[m], edges[m + 1], edges[m + 2]);
        let enorm = 2.0 / (hi - lo);
        for k in 0..bins {
            let freq = k as f32 * bin_hz;
            let rising = (freq - lo) / (center - lo);
            let falling = (hi - freq) / (hi - center);
            let w = rising.min(falling).max(0.0);
            if w > 0.0 {
                weights[[m, k]] = w * enorm;
            }
        }
    }
    weights
}

/// Mel power spectrogram indexed `[band, frame]`.
pub fn mel_spectrogram(waveform: &Waveform, config: &SpectrumConfig) -> Result<FeatureMatrix> {
    let sample_rate = waveform.sample_rate();
    config.validate(sample_rate)?;
    AnalysisError::require_len(waveform.len(), config.n_fft)?;

    let power = stft::power_spectrogram(waveform.samples(), config.n_fft, config.hop_length)?;
    let fmax = config.fmax_for(sample_rate);
    let basis = mel_filter_bank(sample_rate, config.n_fft, config.n_mels, config.fmin, fmax);
    let mel = basis.dot(&power);

    log::debug!(
        "mel spectrogram: {} bands x {} frames (n_fft={}, hop={})",
        mel.nrows(),
        mel.ncols(),
        config.n_fft,
        config.hop_length
    );

    Ok(FeatureMatrix {
        data: mel,
        sample_rate,
        hop_length: config.hop_length,
        scale: BinScale::Mel { fmin: config.fmin, fmax },
    })
}

/// Convert power to decibels relative to the array's own maximum.
///
/// The output peaks at exactly 0 dB and is clipped at `-top_db`.
pub fn power_to_db(power: &Array2<f32>, top_db: f32) -> Array2<f32> {
    let reference = power.iter().copied().fold(0.0f32, f32::max).max(AMIN);
    let ref_db = 10.0 * reference.log10();
    power.mapv(|v| (10.0 * v.max(AMIN).log10() - ref_db).max(-top_db))
}

pub fn to_log_power(power: &FeatureMatrix, top_db: f32) -> FeatureMatrix {
    FeatureMatrix {
        data: power_to_db(&power.data, top_db),
        ..power.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::synth;
    use ndarray::array;

    #[test]
    fn mel_scale_round_trips() {
        for hz in [0.0, 440.0, 1000.0, 8000.0] {
            assert!((mel_to_hz(hz_to_mel(hz)) - hz).abs() < 0.05, "{hz}");
        }
        assert!((hz_to_mel(1000.0) - 15.0).abs() < 1e-4);
    }

    #[test]
    fn filter_bank_is_non_negative_and_covers_every_band() {
        let bank = mel_filter_bank(44100, 2048, 128, 0.0, 22050.0);
        assert_eq!(bank.dim(), (128, 1025));
        assert!(bank.iter().all(|&w| w >= 0.0));
        for row in bank.rows() {
            assert!(row.sum() > 0.0);
        }
    }

    #[test]
    fn frame_count_matches_hop() {
        let wave = synth::tone(440.0, 1.0, 44100);
        let config = SpectrumConfig::default();
        let mel = mel_spectrogram(&wave, &config).unwrap();
        assert_eq!(mel.n_bins(), 128);
        assert_eq!(mel.n_frames(), wave.frame_count(config.hop_length));
    }

    #[test]
    fn repeated_runs_are_bit_identical() {
        let wave = synth::tone(220.0, 0.5, 44100);
        let config = SpectrumConfig::default();
        let first = mel_spectrogram(&wave, &config).unwrap();
        let second = mel_spectrogram(&wave, &config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn log_power_peaks_at_zero() {
        let power = array![[1e-3, 4.0], [0.5, 0.0]];
        let db = power_to_db(&power, 80.0);
        let max = db.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        assert_eq!(max, 0.0);
        assert_eq!(db[[1, 1]], -80.0);
        assert!((db[[1, 0]] - 10.0 * (0.5f32 / 4.0).log10()).abs() < 1e-4);
    }

    #[test]
    fn log_power_of_real_spectrogram_peaks_at_zero() {
        let wave = synth::tone(1000.0, 0.5, 22050);
        let mel = mel_spectrogram(&wave, &SpectrumConfig::default()).unwrap();
        let db = to_log_power(&mel, 80.0);
        assert_eq!(db.max(), 0.0);
        assert!(db.min() >= -80.0);
        assert_eq!(db.n_frames(), mel.n_frames());
    }

    #[test]
    fn short_signal_is_rejected() {
        let wave = Waveform::new(vec![0.0; 100], 44100);
        assert!(matches!(
            mel_spectrogram(&wave, &SpectrumConfig::default()),
            Err(AnalysisError::InsufficientSignal { .. })
        ));
    }

    #[test]
    fn zero_bands_is_invalid() {
        let wave = synth::tone(440.0, 0.5, 44100);
        let config = SpectrumConfig {
            n_mels: 0,
            ..Default::default()
        };
        assert!(matches!(
            mel_spectrogram(&wave, &config),
            Err(AnalysisError::InvalidParameter(_))
        ));
    }
}
