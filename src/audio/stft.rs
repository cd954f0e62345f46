//! Short-time Fourier transform primitives shared by every analyzer.
//!
//! Frames are centred: frame `t` is centred on sample `t * hop`, with the
//! signal zero-padded by `n_fft / 2` on both sides. A signal of `len` samples
//! therefore yields `ceil(len / hop)` frames, which keeps every derived matrix
//! on the same time axis.

use std::f32::consts::PI;

use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};

use super::error::{AnalysisError, Result};
use super::features::frame_count;

pub type Complex32 = Complex<f32>;

/// Periodic Hann window.
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / size as f32).cos()))
        .collect()
}

pub fn num_bins(n_fft: usize) -> usize {
    n_fft / 2 + 1
}

fn check_params(n_fft: usize, hop_length: usize) -> Result<()> {
    if n_fft < 2 {
        return Err(AnalysisError::invalid(format!("n_fft must be at least 2, got {n_fft}")));
    }
    if hop_length == 0 {
        return Err(AnalysisError::invalid("hop_length must be positive"));
    }
    Ok(())
}

/// Complex spectrogram indexed `[bin, frame]`.
pub fn stft(samples: &[f32], n_fft: usize, hop_length: usize) -> Result<Array2<Complex32>> {
    check_params(n_fft, hop_length)?;

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n_fft);
    let window = hann_window(n_fft);
    let bins = num_bins(n_fft);
    let frames = frame_count(samples.len(), hop_length);
    let half = (n_fft / 2) as isize;

    let columns: Vec<Vec<Complex32>> = (0..frames)
        .into_par_iter()
        .map(|t| {
            let start = (t * hop_length) as isize - half;
            let mut buffer: Vec<Complex32> = window
                .iter()
                .enumerate()
                .map(|(i, &w)| {
                    let idx = start + i as isize;
                    let s = if idx >= 0 && (idx as usize) < samples.len() {
                        samples[idx as usize]
                    } else {
                        0.0
                    };
                    Complex::new(s * w, 0.0)
                })
                .collect();
            fft.process(&mut buffer);
            buffer.truncate(bins);
            buffer
        })
        .collect();

    let mut spectrum = Array2::from_elem((bins, frames), Complex::new(0.0, 0.0));
    for (t, column) in columns.iter().enumerate() {
        spectrum.column_mut(t).assign(&ArrayView1::from(&column[..]));
    }
    Ok(spectrum)
}

/// Power spectrogram `|X|^2` indexed `[bin, frame]`.
pub fn power_spectrogram(samples: &[f32], n_fft: usize, hop_length: usize) -> Result<Array2<f32>> {
    Ok(stft(samples, n_fft, hop_length)?.mapv(|c| c.norm_sqr()))
}

/// Magnitude spectrogram `|X|` indexed `[bin, frame]`.
pub fn magnitude_spectrogram(
    samples: &[f32],
    n_fft: usize,
    hop_length: usize,
) -> Result<Array2<f32>> {
    Ok(stft(samples, n_fft, hop_length)?.mapv(|c| c.norm()))
}

/// Inverse of [`stft`] by windowed overlap-add, producing exactly `length` samples.
pub fn istft(
    spectrum: &Array2<Complex32>,
    n_fft: usize,
    hop_length: usize,
    length: usize,
) -> Result<Vec<f32>> {
    check_params(n_fft, hop_length)?;
    let bins = num_bins(n_fft);
    if spectrum.nrows() != bins {
        return Err(AnalysisError::invalid(format!(
            "spectrum has {} bins, expected {} for n_fft {}",
            spectrum.nrows(),
            bins,
            n_fft
        )));
    }

    let mut planner = FftPlanner::<f32>::new();
    let ifft = planner.plan_fft_inverse(n_fft);
    let window = hann_window(n_fft);
    let half = (n_fft / 2) as isize;
    let scale = 1.0 / n_fft as f32;

    let mut output = vec![0.0f32; length];
    let mut window_sum = vec![0.0f32; length];
    let mut buffer = vec![Complex::new(0.0, 0.0); n_fft];

    for (t, column) in spectrum.columns().into_iter().enumerate() {
        for (i, &c) in column.iter().enumerate() {
            buffer[i] = c;
        }
        // Rebuild the conjugate-symmetric negative frequencies
        for i in 1..n_fft - bins + 1 {
            buffer[n_fft - i] = column[i].conj();
        }
        ifft.process(&mut buffer);

        let start = (t * hop_length) as isize - half;
        for (i, &w) in window.iter().enumerate() {
            let idx = start + i as isize;
            if idx < 0 || idx as usize >= length {
                continue;
            }
            let idx = idx as usize;
            output[idx] += buffer[i].re * scale * w;
            window_sum[idx] += w * w;
        }
    }

    for (sample, &ws) in output.iter_mut().zip(window_sum.iter()) {
        if ws > 1e-8 {
            *sample /= ws;
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hann_window_shape() {
        let window = hann_window(4);
        assert_eq!(window.len(), 4);
        assert!(window[0] < 0.01);
        assert!(window[2] > 0.99);
    }

    #[test]
    fn stft_shape_follows_hop() {
        let samples = vec![0.5f32; 5000];
        let spec = stft(&samples, 512, 128).unwrap();
        assert_eq!(spec.nrows(), 257);
        assert_eq!(spec.ncols(), 5000usize.div_ceil(128));
    }

    #[test]
    fn sine_peaks_at_its_bin() {
        let sr = 8000.0;
        let n_fft = 1024;
        // 1000 Hz lands exactly on bin 128
        let samples: Vec<f32> = (0..8000)
            .map(|i| (2.0 * PI * 1000.0 * i as f32 / sr).sin())
            .collect();
        let power = power_spectrogram(&samples, n_fft, 256).unwrap();
        let mid = power.column(power.ncols() / 2);
        let peak = mid
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 128);
    }

    #[test]
    fn istft_reconstructs_signal() {
        let samples: Vec<f32> = (0..6000)
            .map(|i| (i as f32 * 0.01).sin() * 0.5 + (i as f32 * 0.173).cos() * 0.25)
            .collect();
        let spec = stft(&samples, 1024, 256).unwrap();
        let rebuilt = istft(&spec, 1024, 256, samples.len()).unwrap();
        assert_eq!(rebuilt.len(), samples.len());
        let max_err = samples
            .iter()
            .zip(rebuilt.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f32, f32::max);
        assert!(max_err < 1e-3, "max reconstruction error {max_err}");
    }

    #[test]
    fn rejects_zero_hop() {
        assert!(matches!(
            stft(&[0.0; 16], 8, 0),
            Err(AnalysisError::InvalidParameter(_))
        ));
    }
}
