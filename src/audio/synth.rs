//! Synthetic test signals.

use std::f32::consts::PI;

use super::features::Waveform;

pub fn tone(freq: f32, seconds: f32, sample_rate: u32) -> Waveform {
    let len = (seconds * sample_rate as f32) as usize;
    Waveform::from_fn(len, sample_rate, |t| 0.5 * (2.0 * PI * freq * t).sin())
}

/// Decaying 1 kHz blips, one per beat, starting at t = 0.
pub fn click_track(bpm: f32, seconds: f32, sample_rate: u32) -> Waveform {
    let len = (seconds * sample_rate as f32) as usize;
    let period = 60.0 / bpm;
    let click_len = 0.02;
    Waveform::from_fn(len, sample_rate, |t| {
        let offset = t % period;
        if offset < click_len {
            (2.0 * PI * 1000.0 * offset).sin() * (-offset / 0.003).exp()
        } else {
            0.0
        }
    })
}

pub fn mix(a: &Waveform, b: &Waveform) -> Waveform {
    let samples = a
        .samples()
        .iter()
        .zip(b.samples())
        .map(|(x, y)| x + y)
        .collect();
    Waveform::new(samples, a.sample_rate())
}

pub fn silence(seconds: f32, sample_rate: u32) -> Waveform {
    Waveform::new(vec![0.0; (seconds * sample_rate as f32) as usize], sample_rate)
}
