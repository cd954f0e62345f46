//! Cepstral "sound texture": MFCCs plus their first and second time derivatives.

use std::f32::consts::PI;

use ndarray::{concatenate, Array2, Axis};
use serde::Deserialize;

use super::error::{AnalysisError, Result};
use super::features::{BinScale, FeatureMatrix};

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct TextureConfig {
    pub num_coeff: usize,
    /// Frames spanned by the delta regression window; odd.
    pub delta_width: usize,
}

impl Default for TextureConfig {
    fn default() -> Self {
        Self {
            num_coeff: 13,
            delta_width: 9,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Texture {
    pub mfcc: FeatureMatrix,
    pub delta: FeatureMatrix,
    pub delta2: FeatureMatrix,
    /// `mfcc`, `delta` and `delta2` stacked along the coefficient axis.
    pub stacked: FeatureMatrix,
}

/// Orthonormal DCT-II basis, `[coefficient, band]`.
fn dct_basis(num_coeff: usize, n_bands: usize) -> Array2<f32> {
    let n = n_bands as f32;
    Array2::from_shape_fn((num_coeff, n_bands), |(k, b)| {
        let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
        scale * (PI * k as f32 * (2 * b + 1) as f32 / (2.0 * n)).cos()
    })
}

/// Lowest `num_coeff` cepstral coefficients of a log-power matrix.
pub fn mfcc(log_power: &Array2<f32>, num_coeff: usize) -> Result<Array2<f32>> {
    let n_bands = log_power.nrows();
    if num_coeff == 0 || num_coeff > n_bands {
        return Err(AnalysisError::invalid(format!(
            "num_coeff must be in 1..={n_bands}, got {num_coeff}"
        )));
    }
    Ok(dct_basis(num_coeff, n_bands).dot(log_power))
}

/// Regression-based time derivative; frames outside the matrix read as zero.
pub fn delta(features: &Array2<f32>, width: usize) -> Result<Array2<f32>> {
    if width < 3 || width % 2 == 0 {
        return Err(AnalysisError::invalid(format!(
            "delta width must be odd and at least 3, got {width}"
        )));
    }
    let reach = (width / 2) as isize;
    let denom: f32 = 2.0 * (1..=reach).map(|n| (n * n) as f32).sum::<f32>();
    let frames = features.ncols() as isize;

    let at = |row: usize, t: isize| -> f32 {
        if t < 0 || t >= frames {
            0.0
        } else {
            features[[row, t as usize]]
        }
    };

    Ok(Array2::from_shape_fn(features.raw_dim(), |(row, t)| {
        let t = t as isize;
        (1..=reach)
            .map(|n| n as f32 * (at(row, t + n) - at(row, t - n)))
            .sum::<f32>()
            / denom
    }))
}

pub fn mfcc_texture(log_power: &FeatureMatrix, config: &TextureConfig) -> Result<Texture> {
    let coefficients = mfcc(&log_power.data, config.num_coeff)?;
    let first = delta(&coefficients, config.delta_width)?;
    let second = delta(&first, config.delta_width)?;
    let stacked = concatenate(Axis(0), &[coefficients.view(), first.view(), second.view()])
        .map_err(|e| AnalysisError::invalid(format!("cannot stack texture rows: {e}")))?;

    log::debug!(
        "texture: {} coefficients x {} frames",
        config.num_coeff,
        coefficients.ncols()
    );

    let wrap = |data: Array2<f32>| FeatureMatrix {
        data,
        sample_rate: log_power.sample_rate,
        hop_length: log_power.hop_length,
        scale: BinScale::Cepstral,
    };

    Ok(Texture {
        mfcc: wrap(coefficients),
        delta: wrap(first),
        delta2: wrap(second),
        stacked: wrap(stacked),
    })
}
