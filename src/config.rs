use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::audio::chroma::ChromaConfig;
use crate::audio::decode::DEFAULT_SAMPLE_RATE;
use crate::audio::hpss::HpssConfig;
use crate::audio::mel::SpectrumConfig;
use crate::audio::tempo::TempoConfig;
use crate::audio::texture::TextureConfig;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub spectrum: SpectrumConfig,
    #[serde(default)]
    pub hpss: HpssConfig,
    #[serde(default)]
    pub tempo: TempoConfig,
    #[serde(default)]
    pub chroma: ChromaConfig,
    #[serde(default)]
    pub texture: TextureConfig,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Hop shared by the mel spectrogram, texture and chromagram.
    #[serde(default = "default_hop_length")]
    pub hop_length: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            hop_length: default_hop_length(),
        }
    }
}

fn default_sample_rate() -> u32 { DEFAULT_SAMPLE_RATE }
fn default_hop_length() -> usize { 1024 }

pub fn parse_config(content: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(content)
}

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match parse_config(&content) {
        Ok(config) => Some(config),
        Err(err) => {
            log::debug!("Invalid config {}: {}", path.display(), err);
            None
        }
    }
}

/// `timbrescope.toml` in the working directory, then the per-user config files.
pub fn find_config_path() -> Option<PathBuf> {
    let local = PathBuf::from("timbrescope.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("timbrescope").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("timbrescope").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.audio.sample_rate, 44100);
        assert_eq!(config.audio.hop_length, 1024);
        assert_eq!(config.spectrum, SpectrumConfig::default());
        assert_eq!(config.chroma.bins_per_octave, 36);
        assert_eq!(config.texture.num_coeff, 13);
    }

    #[test]
    fn sections_override_fields() {
        let config = parse_config(
            r#"
            [audio]
            sample_rate = 22050

            [spectrum]
            n_mels = 64
            fmax = 8000.0

            [tempo]
            start_bpm = 100.0

            [hpss]
            margin = 2.0
            "#,
        )
        .unwrap();
        assert_eq!(config.audio.sample_rate, 22050);
        assert_eq!(config.audio.hop_length, 1024);
        assert_eq!(config.spectrum.n_mels, 64);
        assert_eq!(config.spectrum.fmax, Some(8000.0));
        assert_eq!(config.spectrum.n_fft, 2048);
        assert_eq!(config.tempo.start_bpm, 100.0);
        assert_eq!(config.hpss.margin, 2.0);
        assert_eq!(config.hpss.harmonic_kernel, 31);
    }

    #[test]
    fn malformed_file_is_rejected() {
        assert!(parse_config("[audio]\nsample_rate = \"fast\"").is_err());
    }

    #[test]
    fn unreadable_path_loads_nothing() {
        assert!(load_config(Path::new("/no/such/timbrescope.toml")).is_none());
    }

    #[test]
    fn section_hops_come_from_audio() {
        let config = parse_config(
            r#"
            [audio]
            hop_length = 512

            [spectrum]
            hop_length = 256

            [chroma]
            hop_length = 256
            "#,
        )
        .unwrap();
        assert_eq!(config.audio.hop_length, 512);
        assert_eq!(config.spectrum.hop_length, 1024);
        assert_eq!(config.chroma.hop_length, 1024);

        let settings = crate::pipeline::Settings::from_config(config);
        assert_eq!(settings.spectrum.hop_length, 512);
        assert_eq!(settings.chroma.hop_length, 512);
    }
}
