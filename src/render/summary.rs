//! Printed scalar results and the JSON summary.

use serde::Serialize;

use crate::audio::chroma::pitch_class_name;
use crate::audio::features::{BinScale, FeatureMatrix};
use crate::pipeline::{Analysis, TempoReport};

pub fn tempo_lines(report: &TempoReport) -> Vec<String> {
    vec![
        format!("Estimated tempo: {:.2} beats per minute.", report.full_bpm),
        format!(
            "Estimated tempo (using percussive signal): {:.2} beats per minute.",
            report.percussive_bpm
        ),
        format!("Average tempo: {:.0} beats per minute.", report.average_bpm),
    ]
}

#[derive(Debug, Serialize)]
pub struct MatrixSummary {
    pub bins: usize,
    pub frames: usize,
    pub sample_rate: u32,
    pub hop_length: usize,
    pub scale: BinScale,
    pub min: f32,
    pub max: f32,
}

impl From<&FeatureMatrix> for MatrixSummary {
    fn from(m: &FeatureMatrix) -> Self {
        let empty = m.data.is_empty();
        MatrixSummary {
            bins: m.n_bins(),
            frames: m.n_frames(),
            sample_rate: m.sample_rate,
            hop_length: m.hop_length,
            scale: m.scale,
            min: if empty { 0.0 } else { m.min() },
            max: if empty { 0.0 } else { m.max() },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChromaSummary {
    #[serde(flatten)]
    pub matrix: MatrixSummary,
    /// Mean energy per pitch class, C first.
    pub class_means: Vec<(String, f32)>,
    pub dominant_class: String,
}

#[derive(Debug, Serialize)]
pub struct TextureSummary {
    #[serde(flatten)]
    pub matrix: MatrixSummary,
    pub num_coeff: usize,
    pub mfcc_means: Vec<f32>,
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub filename: String,
    pub sample_rate: u32,
    pub duration_seconds: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tempo: Option<TempoReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_mel: Option<MatrixSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub harmonic_mel: Option<MatrixSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percussive_mel: Option<MatrixSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chroma: Option<ChromaSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub texture: Option<TextureSummary>,
}

impl Summary {
    pub fn new(
        filename: &str,
        sample_rate: u32,
        duration_seconds: f32,
        analysis: &Analysis,
    ) -> Self {
        let chroma = analysis.chroma.as_ref().map(|c| {
            let means = c.row_means();
            let dominant = (0..means.len())
                .max_by(|&a, &b| means[a].total_cmp(&means[b]))
                .unwrap_or(0);
            ChromaSummary {
                matrix: c.into(),
                class_means: means
                    .iter()
                    .enumerate()
                    .map(|(i, &m)| (pitch_class_name(i).to_string(), m))
                    .collect(),
                dominant_class: pitch_class_name(dominant).to_string(),
            }
        });

        let texture = analysis.texture.as_ref().map(|t| TextureSummary {
            matrix: (&t.stacked).into(),
            num_coeff: t.mfcc.n_bins(),
            mfcc_means: t.mfcc.row_means(),
        });

        Summary {
            filename: filename.to_string(),
            sample_rate,
            duration_seconds,
            tempo: analysis.tempo,
            full_mel: analysis.full_mel.as_ref().map(Into::into),
            harmonic_mel: analysis.split_mel.as_ref().map(|s| (&s.harmonic).into()),
            percussive_mel: analysis.split_mel.as_ref().map(|s| (&s.percussive).into()),
            chroma,
            texture,
        }
    }
}
