//! Terminal heatmaps of `[bin, frame]` matrices.

use std::fmt::Write;

use crate::audio::chroma::pitch_class_name;
use crate::audio::features::{BinScale, FeatureMatrix};
use crate::audio::mel::{hz_to_mel, mel_to_hz};

const SHADES: &[u8] = b" .:-=+*#%@";

/// Block-average `matrix` down to at most `width` x `height` cells and shade it.
///
/// The highest bin is drawn on top. Shading spans the matrix's own min..max.
pub fn heatmap(matrix: &FeatureMatrix, title: &str, width: usize, height: usize) -> String {
    let (bins, frames) = matrix.data.dim();
    let mut out = String::new();
    if bins == 0 || frames == 0 {
        let _ = writeln!(out, "{title}: (empty)");
        return out;
    }

    let cols = width.clamp(1, frames);
    let rows = height.clamp(1, bins);
    let (lo, hi) = (matrix.min(), matrix.max());
    let span = hi - lo;

    let _ = writeln!(out, "{title}  [{lo:.2} .. {hi:.2}]");

    for r in (0..rows).rev() {
        let (b0, b1) = block(r, rows, bins);
        let label = axis_label(&matrix.scale, b0, b1, bins);
        let _ = write!(out, "{label:>9} |");
        for c in 0..cols {
            let (f0, f1) = block(c, cols, frames);
            let cell = matrix.data.slice(ndarray::s![b0..b1, f0..f1]);
            let mean = cell.sum() / cell.len() as f32;
            let level = if span > f32::EPSILON { (mean - lo) / span } else { 0.0 };
            let idx = ((level * (SHADES.len() - 1) as f32).round() as usize).min(SHADES.len() - 1);
            out.push(SHADES[idx] as char);
        }
        out.push('\n');
    }

    let duration = matrix.frame_time(frames);
    let _ = writeln!(out, "{:>9} +{}", "", "-".repeat(cols));
    let right = format!("{duration:.1}s");
    let pad = cols.saturating_sub(right.len() + 4);
    let _ = writeln!(out, "{:>9}  0.0s{}{}", "", " ".repeat(pad), right);
    out
}

/// Half-open range of items covered by block `i` of `n` over `total` items.
fn block(i: usize, n: usize, total: usize) -> (usize, usize) {
    let start = i * total / n;
    let end = ((i + 1) * total / n).max(start + 1);
    (start, end)
}

fn axis_label(scale: &BinScale, b0: usize, b1: usize, bins: usize) -> String {
    match *scale {
        BinScale::Mel { fmin, fmax } => {
            let (lo, hi) = (hz_to_mel(fmin), hz_to_mel(fmax));
            let centre = (b0 + b1) as f32 / 2.0;
            let hz = mel_to_hz(lo + (hi - lo) * (centre + 0.5) / (bins + 1) as f32);
            if hz >= 1000.0 {
                format!("{:.1}kHz", hz / 1000.0)
            } else {
                format!("{hz:.0}Hz")
            }
        }
        BinScale::Chroma => pitch_class_name(b0).to_string(),
        BinScale::Cepstral => b0.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn matrix(data: Array2<f32>, scale: BinScale) -> FeatureMatrix {
        FeatureMatrix {
            data,
            sample_rate: 100,
            hop_length: 10,
            scale,
        }
    }

    #[test]
    fn blocks_cover_everything_once() {
        let covered: Vec<(usize, usize)> = (0..4).map(|i| block(i, 4, 10)).collect();
        assert_eq!(covered.first().unwrap().0, 0);
        assert_eq!(covered.last().unwrap().1, 10);
        for pair in covered.windows(2) {
            assert_eq!(pair[0].1, pair[1].0);
        }
    }

    #[test]
    fn chroma_rows_are_labelled_top_down() {
        let data = Array2::from_shape_fn((12, 8), |(b, _)| if b == 9 { 1.0 } else { 0.0 });
        let text = heatmap(&matrix(data, BinScale::Chroma), "Chromagram", 8, 12);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("Chromagram"));
        assert!(lines[1].trim_start().starts_with("B |"));
        // A is the third row from the top and fully lit
        assert!(lines[3].trim_start().starts_with("A |"));
        assert!(lines[3].ends_with("@@@@@@@@"));
        assert!(lines[12].trim_start().starts_with("C |"));
        assert!(text.contains("0.8s"));
    }

    #[test]
    fn wide_matrices_are_downsampled() {
        let data = Array2::from_shape_fn((128, 1000), |(b, t)| (b + t) as f32);
        let text = heatmap(
            &matrix(data, BinScale::Mel { fmin: 0.0, fmax: 11025.0 }),
            "mel",
            40,
            16,
        );
        let grid: Vec<&str> = text.lines().filter(|l| l.contains('|')).collect();
        assert_eq!(grid.len(), 16);
        assert!(grid.iter().all(|l| l.split('|').nth(1).unwrap().chars().count() == 40));
    }

    #[test]
    fn empty_matrix_is_reported() {
        let text = heatmap(&matrix(Array2::zeros((0, 0)), BinScale::Cepstral), "mfcc", 10, 10);
        assert_eq!(text.trim(), "mfcc: (empty)");
    }
}
