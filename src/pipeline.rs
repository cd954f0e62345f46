//! Runs the requested analyses over one waveform.
//!
//! Harmonic/percussive separation runs at most once and feeds the split mel
//! spectrogram, the chromagram (harmonic part) and the second tempo estimate
//! (percussive part). Chroma and texture are independent and run in parallel.

use serde::Serialize;

use crate::audio::chroma::{self, ChromaConfig};
use crate::audio::error::Result;
use crate::audio::features::{FeatureMatrix, Waveform};
use crate::audio::hpss::{self, HpssConfig};
use crate::audio::mel::{self, SpectrumConfig};
use crate::audio::tempo::{self, TempoConfig};
use crate::audio::texture::{self, Texture, TextureConfig};
use crate::config::Config;

/// Which analyses to run.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Request {
    pub full_mel: bool,
    pub split_mel: bool,
    pub chroma: bool,
    pub texture: bool,
    pub tempo: bool,
}

impl Request {
    #[cfg(test)]
    pub fn all() -> Self {
        Self {
            full_mel: true,
            split_mel: true,
            chroma: true,
            texture: true,
            tempo: true,
        }
    }

    fn needs_separation(&self) -> bool {
        self.split_mel || self.chroma || self.tempo
    }

    fn needs_full_mel(&self) -> bool {
        self.full_mel || self.texture
    }
}

/// Resolved per-analyzer parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub sample_rate: u32,
    pub spectrum: SpectrumConfig,
    pub hpss: HpssConfig,
    pub tempo: TempoConfig,
    pub chroma: ChromaConfig,
    pub texture: TextureConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Settings::from_config(Config::default())
    }
}

impl Settings {
    /// The `[audio]` hop is applied to every frame-aligned analyzer.
    pub fn from_config(config: Config) -> Self {
        let hop_length = config.audio.hop_length;
        Settings {
            sample_rate: config.audio.sample_rate,
            spectrum: SpectrumConfig {
                hop_length,
                ..config.spectrum
            },
            hpss: config.hpss,
            tempo: config.tempo,
            chroma: ChromaConfig {
                hop_length,
                ..config.chroma
            },
            texture: config.texture,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TempoReport {
    pub full_bpm: f32,
    pub percussive_bpm: f32,
    /// Mean of the two estimates, rounded to a whole BPM.
    pub average_bpm: f32,
}

#[derive(Clone, Debug)]
pub struct SplitMel {
    pub harmonic: FeatureMatrix,
    pub percussive: FeatureMatrix,
}

#[derive(Clone, Debug, Default)]
pub struct Analysis {
    pub tempo: Option<TempoReport>,
    /// Log-power (dB) mel spectrogram of the whole signal.
    pub full_mel: Option<FeatureMatrix>,
    /// Log-power (dB) mel spectrograms of each component.
    pub split_mel: Option<SplitMel>,
    pub chroma: Option<FeatureMatrix>,
    pub texture: Option<Texture>,
}

/// Tempo of the full signal and of its percussive part, plus their rounded mean.
pub fn dual_tempo(
    waveform: &Waveform,
    percussive: &Waveform,
    config: &TempoConfig,
) -> Result<TempoReport> {
    let full_bpm = tempo::estimate_tempo(waveform, config)?;
    let percussive_bpm = tempo::estimate_tempo(percussive, config)?;
    Ok(TempoReport {
        full_bpm,
        percussive_bpm,
        average_bpm: ((full_bpm + percussive_bpm) / 2.0).round(),
    })
}

fn log_mel(waveform: &Waveform, config: &SpectrumConfig) -> Result<FeatureMatrix> {
    let power = mel::mel_spectrogram(waveform, config)?;
    Ok(mel::to_log_power(&power, config.top_db))
}

/// Run every requested analysis; `on_stage` is told which stage starts next.
pub fn analyze(
    waveform: &Waveform,
    request: &Request,
    settings: &Settings,
    mut on_stage: impl FnMut(&str),
) -> Result<Analysis> {
    let mut analysis = Analysis::default();

    let separated = if request.needs_separation() {
        on_stage("Separating harmonic and percussive sources");
        Some(hpss::separate(waveform, &settings.hpss)?)
    } else {
        None
    };

    if let (true, Some((_, percussive))) = (request.tempo, &separated) {
        on_stage("Estimating tempo");
        analysis.tempo = Some(dual_tempo(waveform, percussive, &settings.tempo)?);
    }

    if let (true, Some((harmonic, percussive))) = (request.split_mel, &separated) {
        on_stage("Computing per-source mel spectrograms");
        let (harmonic, percussive) = rayon::join(
            || log_mel(harmonic, &settings.spectrum),
            || log_mel(percussive, &settings.spectrum),
        );
        analysis.split_mel = Some(SplitMel {
            harmonic: harmonic?,
            percussive: percussive?,
        });
    }

    let full_mel = if request.needs_full_mel() {
        on_stage("Computing mel spectrogram");
        Some(log_mel(waveform, &settings.spectrum)?)
    } else {
        None
    };

    let chroma_source = separated.as_ref().map(|(harmonic, _)| harmonic).unwrap_or(waveform);
    if request.chroma || request.texture {
        on_stage("Extracting chroma and texture");
    }
    let (chroma, texture) = rayon::join(
        || {
            request
                .chroma
                .then(|| chroma::chromagram(chroma_source, &settings.chroma))
                .transpose()
        },
        || match (&full_mel, request.texture) {
            (Some(log_power), true) => {
                texture::mfcc_texture(log_power, &settings.texture).map(Some)
            }
            _ => Ok(None),
        },
    );
    analysis.chroma = chroma?;
    analysis.texture = texture?;

    if request.full_mel {
        analysis.full_mel = full_mel;
    }

    Ok(analysis)
}
