//! Harmonic-percussive source separation by median filtering.
//!
//! Sustained partials form horizontal ridges in a magnitude spectrogram and
//! transients form vertical ones. A median along time keeps the former, a
//! median along frequency keeps the latter, and the two filtered magnitudes
//! become soft masks over the complex spectrogram.

use ndarray::{Array2, Zip};
use rayon::prelude::*;
use serde::Deserialize;

use super::error::{AnalysisError, Result};
use super::features::Waveform;
use super::stft;

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct HpssConfig {
    pub n_fft: usize,
    pub hop_length: usize,
    /// Median length in frames for the harmonic (time-axis) filter.
    pub harmonic_kernel: usize,
    /// Median length in bins for the percussive (frequency-axis) filter.
    pub percussive_kernel: usize,
    /// Exponent of the soft masks.
    pub power: f32,
    /// Values above 1 leave a residual that belongs to neither component.
    pub margin: f32,
}

impl Default for HpssConfig {
    fn default() -> Self {
        Self {
            n_fft: 2048,
            hop_length: 512,
            harmonic_kernel: 31,
            percussive_kernel: 31,
            power: 2.0,
            margin: 1.0,
        }
    }
}

impl HpssConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, kernel) in [
            ("harmonic_kernel", self.harmonic_kernel),
            ("percussive_kernel", self.percussive_kernel),
        ] {
            if kernel == 0 || kernel % 2 == 0 {
                return Err(AnalysisError::invalid(format!(
                    "{name} must be odd and positive, got {kernel}"
                )));
            }
        }
        if !(self.power > 0.0) {
            return Err(AnalysisError::invalid(format!(
                "mask power must be positive, got {}",
                self.power
            )));
        }
        if !(self.margin >= 1.0) {
            return Err(AnalysisError::invalid(format!(
                "margin must be at least 1, got {}",
                self.margin
            )));
        }
        Ok(())
    }
}

/// Split a waveform into `(harmonic, percussive)` components of equal length.
pub fn separate(waveform: &Waveform, config: &HpssConfig) -> Result<(Waveform, Waveform)> {
    config.validate()?;
    AnalysisError::require_len(waveform.len(), config.n_fft)?;

    let spectrum = stft::stft(waveform.samples(), config.n_fft, config.hop_length)?;
    let magnitude = spectrum.mapv(|c| c.norm());

    let (harmonic_mag, percussive_mag) = rayon::join(
        || median_along_time(&magnitude, config.harmonic_kernel),
        || median_along_frequency(&magnitude, config.percussive_kernel),
    );

    let harmonic_mask = soft_mask(&harmonic_mag, &percussive_mag, config.margin, config.power);
    let percussive_mask = soft_mask(&percussive_mag, &harmonic_mag, config.margin, config.power);

    let harmonic_spec = &spectrum * &harmonic_mask.mapv(|m| stft::Complex32::new(m, 0.0));
    let percussive_spec = &spectrum * &percussive_mask.mapv(|m| stft::Complex32::new(m, 0.0));

    let len = waveform.len();
    let harmonic = stft::istft(&harmonic_spec, config.n_fft, config.hop_length, len)?;
    let percussive = stft::istft(&percussive_spec, config.n_fft, config.hop_length, len)?;

    log::debug!(
        "hpss: {} bins x {} frames, kernels ({}, {})",
        magnitude.nrows(),
        magnitude.ncols(),
        config.harmonic_kernel,
        config.percussive_kernel
    );

    let sr = waveform.sample_rate();
    Ok((Waveform::new(harmonic, sr), Waveform::new(percussive, sr)))
}

/// Wiener-style mask `x^p / (x^p + (margin * other)^p)`.
///
/// Cells where both inputs vanish get 0.5 so complementary masks still sum to 1.
fn soft_mask(x: &Array2<f32>, other: &Array2<f32>, margin: f32, power: f32) -> Array2<f32> {
    let mut mask = Array2::<f32>::zeros(x.raw_dim());
    Zip::from(&mut mask)
        .and(x)
        .and(other)
        .for_each(|m, &a, &b| {
            let b = b * margin;
            let z = a.max(b);
            *m = if z < f32::MIN_POSITIVE {
                0.5
            } else {
                let a = (a / z).powf(power);
                let b = (b / z).powf(power);
                a / (a + b)
            };
        });
    mask
}

fn median_along_time(magnitude: &Array2<f32>, kernel: usize) -> Array2<f32> {
    let rows: Vec<Vec<f32>> = magnitude.rows().into_iter().map(|r| r.to_vec()).collect();
    let filtered: Vec<Vec<f32>> = rows.par_iter().map(|row| median_filter(row, kernel)).collect();
    Array2::from_shape_fn(magnitude.raw_dim(), |(bin, frame)| filtered[bin][frame])
}

fn median_along_frequency(magnitude: &Array2<f32>, kernel: usize) -> Array2<f32> {
    let columns: Vec<Vec<f32>> = magnitude.columns().into_iter().map(|c| c.to_vec()).collect();
    let filtered: Vec<Vec<f32>> = columns
        .par_iter()
        .map(|column| median_filter(column, kernel))
        .collect();
    Array2::from_shape_fn(magnitude.raw_dim(), |(bin, frame)| filtered[frame][bin])
}

/// Sliding median with half-sample symmetric (reflect) edges.
fn median_filter(input: &[f32], kernel: usize) -> Vec<f32> {
    let n = input.len();
    let half = (kernel / 2) as isize;
    let mut window = Vec::with_capacity(kernel);
    (0..n as isize)
        .map(|i| {
            window.clear();
            window.extend((i - half..=i + half).map(|j| input[reflect(j, n)]));
            let mid = window.len() / 2;
            *window.select_nth_unstable_by(mid, f32::total_cmp).1
        })
        .collect()
}

fn reflect(mut idx: isize, n: usize) -> usize {
    let n = n as isize;
    loop {
        if idx < 0 {
            idx = -idx - 1;
        } else if idx >= n {
            idx = 2 * n - idx - 1;
        } else {
            return idx as usize;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::synth;

    fn energy(samples: &[f32]) -> f32 {
        samples.iter().map(|s| s * s).sum()
    }

    #[test]
    fn median_filter_removes_spikes() {
        let input = [1.0, 1.0, 9.0, 1.0, 1.0];
        assert_eq!(median_filter(&input, 3), vec![1.0; 5]);
        assert_eq!(median_filter(&input, 1), input.to_vec());
    }

    #[test]
    fn reflect_mirrors_edges() {
        assert_eq!(reflect(-1, 4), 0);
        assert_eq!(reflect(-2, 4), 1);
        assert_eq!(reflect(4, 4), 3);
        assert_eq!(reflect(5, 4), 2);
        assert_eq!(reflect(7, 1), 0);
    }

    #[test]
    fn preserves_length() {
        let wave = synth::mix(
            &synth::tone(330.0, 1.01, 22050),
            &synth::click_track(120.0, 1.01, 22050),
        );
        let (h, p) = separate(&wave, &HpssConfig::default()).unwrap();
        assert_eq!(h.len(), wave.len());
        assert_eq!(p.len(), wave.len());
        assert_eq!(h.sample_rate(), wave.sample_rate());
    }

    #[test]
    fn silence_separates_into_silence() {
        let wave = synth::silence(0.5, 44100);
        let (h, p) = separate(&wave, &HpssConfig::default()).unwrap();
        assert!(h.samples().iter().all(|&s| s == 0.0));
        assert!(p.samples().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn components_sum_to_input() {
        let wave = synth::mix(
            &synth::tone(220.0, 1.0, 22050),
            &synth::click_track(120.0, 1.0, 22050),
        );
        let (h, p) = separate(&wave, &HpssConfig::default()).unwrap();
        let max_err = wave
            .samples()
            .iter()
            .zip(h.samples().iter().zip(p.samples()))
            .map(|(x, (a, b))| (x - a - b).abs())
            .fold(0.0f32, f32::max);
        assert!(max_err < 1e-3, "max residual {max_err}");
    }

    #[test]
    fn tone_is_harmonic_and_clicks_are_percussive() {
        let tone = synth::tone(440.0, 1.0, 22050);
        let (h, p) = separate(&tone, &HpssConfig::default()).unwrap();
        assert!(energy(h.samples()) > 5.0 * energy(p.samples()));

        let clicks = synth::click_track(120.0, 1.0, 22050);
        let (h, p) = separate(&clicks, &HpssConfig::default()).unwrap();
        assert!(energy(p.samples()) > energy(h.samples()));
    }

    #[test]
    fn even_kernel_is_invalid() {
        let config = HpssConfig {
            harmonic_kernel: 30,
            ..Default::default()
        };
        let wave = synth::tone(440.0, 0.5, 22050);
        assert!(matches!(
            separate(&wave, &config),
            Err(AnalysisError::InvalidParameter(_))
        ));
    }

    #[test]
    fn short_signal_is_rejected() {
        let wave = Waveform::new(vec![0.1; 1000], 22050);
        assert!(matches!(
            separate(&wave, &HpssConfig::default()),
            Err(AnalysisError::InsufficientSignal { needed: 2048, got: 1000 })
        ));
    }

    #[test]
    fn margin_below_one_is_invalid() {
        let config = HpssConfig {
            margin: 0.5,
            ..Default::default()
        };
        let wave = synth::tone(440.0, 0.5, 22050);
        assert!(matches!(
            separate(&wave, &config),
            Err(AnalysisError::InvalidParameter(_))
        ));
    }

    #[test]
    fn mask_power_must_be_positive() {
        let wave = synth::tone(440.0, 0.5, 22050);
        for power in [0.0, -1.0, f32::NAN] {
            let config = HpssConfig {
                power,
                ..Default::default()
            };
            assert!(
                matches!(separate(&wave, &config), Err(AnalysisError::InvalidParameter(_))),
                "power={power}"
            );
        }
    }
}
