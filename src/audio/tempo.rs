//! Global tempo estimation from an onset-strength envelope.
//!
//! The envelope is spectral flux over a log-power mel spectrogram. Its
//! autocorrelation is scored under a log-normal prior centred on
//! `start_bpm`, which breaks the usual half/double-tempo ties in favour of
//! musically common tempi.

use serde::Deserialize;

use super::error::{AnalysisError, Result};
use super::features::Waveform;
use super::mel::{self, SpectrumConfig};

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct TempoConfig {
    pub n_fft: usize,
    pub hop_length: usize,
    pub n_mels: usize,
    pub min_bpm: f32,
    pub max_bpm: f32,
    /// Centre of the tempo prior.
    pub start_bpm: f32,
    /// Width of the tempo prior in octaves.
    pub std_bpm: f32,
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            n_fft: 2048,
            hop_length: 512,
            n_mels: 128,
            min_bpm: 30.0,
            max_bpm: 300.0,
            start_bpm: 120.0,
            std_bpm: 1.0,
        }
    }
}

impl TempoConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.min_bpm > 0.0 && self.max_bpm > self.min_bpm) {
            return Err(AnalysisError::invalid(format!(
                "tempo range {}..{} BPM is empty",
                self.min_bpm, self.max_bpm
            )));
        }
        if !(self.start_bpm > 0.0 && self.std_bpm > 0.0) {
            return Err(AnalysisError::invalid("tempo prior must have positive centre and width"));
        }
        Ok(())
    }

    fn spectrum(&self) -> SpectrumConfig {
        SpectrumConfig {
            n_fft: self.n_fft,
            hop_length: self.hop_length,
            n_mels: self.n_mels,
            ..Default::default()
        }
    }

    fn prior(&self, bpm: f32) -> f32 {
        let octaves = (bpm.log2() - self.start_bpm.log2()) / self.std_bpm;
        -0.5 * octaves * octaves
    }
}

/// Per-frame spectral flux: mean positive dB increase across mel bands.
pub fn onset_strength(waveform: &Waveform, config: &TempoConfig) -> Result<Vec<f32>> {
    let spectrum = config.spectrum();
    let mel = mel::mel_spectrogram(waveform, &spectrum)?;
    let db = mel::power_to_db(&mel.data, spectrum.top_db);

    let (bands, frames) = db.dim();
    let mut envelope = vec![0.0f32; frames];
    for t in 1..frames {
        let rise: f32 = (0..bands)
            .map(|b| (db[[b, t]] - db[[b, t - 1]]).max(0.0))
            .sum();
        envelope[t] = rise / bands as f32;
    }
    Ok(envelope)
}

/// Estimated tempo in beats per minute; 0 when the signal has no pulse.
pub fn estimate_tempo(waveform: &Waveform, config: &TempoConfig) -> Result<f32> {
    config.validate()?;
    AnalysisError::require_len(waveform.len(), config.n_fft)?;

    let envelope = onset_strength(waveform, config)?;
    let frame_rate = waveform.sample_rate() as f32 / config.hop_length as f32;
    let bpm = tempo_from_envelope(&envelope, frame_rate, config);

    log::debug!(
        "tempo: {:.2} BPM from {} onset frames at {:.1} fps",
        bpm,
        envelope.len(),
        frame_rate
    );
    Ok(bpm)
}

fn tempo_from_envelope(envelope: &[f32], frame_rate: f32, config: &TempoConfig) -> f32 {
    let n = envelope.len();
    if n < 3 {
        return 0.0;
    }

    let min_lag = ((60.0 * frame_rate / config.max_bpm).floor() as usize).max(1);
    let max_lag = ((60.0 * frame_rate / config.min_bpm).ceil() as usize).min(n - 2);
    if max_lag <= min_lag {
        return 0.0;
    }

    // One extra lag on each side for the parabolic refinement
    let ac: Vec<f32> = (0..=max_lag + 1)
        .map(|lag| {
            envelope[..n - lag]
                .iter()
                .zip(&envelope[lag..])
                .map(|(a, b)| a * b)
                .sum()
        })
        .collect();

    if ac[0] <= f32::MIN_POSITIVE {
        return 0.0;
    }

    let lag_to_bpm = |lag: f32| 60.0 * frame_rate / lag;

    let best = (min_lag..=max_lag)
        .filter(|&lag| ac[lag] > 0.0)
        .map(|lag| {
            let strength = (1.0 + 1e6 * ac[lag] / ac[0]).ln();
            (lag, strength + config.prior(lag_to_bpm(lag as f32)))
        })
        .max_by(|a, b| a.1.total_cmp(&b.1));

    let Some((lag, _)) = best else {
        return 0.0;
    };

    let (y0, y1, y2) = (ac[lag - 1], ac[lag], ac[lag + 1]);
    let curvature = y0 - 2.0 * y1 + y2;
    let shift = if curvature < 0.0 {
        (0.5 * (y0 - y2) / curvature).clamp(-0.5, 0.5)
    } else {
        0.0
    };

    lag_to_bpm(lag as f32 + shift)
}
