pub mod heatmap;
pub mod plot;
pub mod summary;

use crate::pipeline::Analysis;
use heatmap::heatmap;

/// Rows used for mel and cepstral heatmaps; chroma always gets its 12.
const MATRIX_ROWS: usize = 24;

/// Where visual features end up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Display {
    /// Plot figures opened in the system viewer.
    Window,
    /// Shaded heatmaps on stdout.
    Terminal,
    Off,
}

/// Print tempo lines, then show every visual feature in pipeline order.
pub fn print_analysis(analysis: &Analysis, width: usize, display: Display) {
    if let Some(ref tempo) = analysis.tempo {
        for line in summary::tempo_lines(tempo) {
            println!("{line}");
        }
    }

    match display {
        Display::Off => {}
        Display::Window => plot::show(analysis),
        Display::Terminal => print_heatmaps(analysis, width),
    }
}

fn print_heatmaps(analysis: &Analysis, width: usize) {
    if let Some(ref mel) = analysis.full_mel {
        println!("{}", heatmap(mel, "mel power spectrogram (dB)", width, MATRIX_ROWS));
    }
    if let Some(ref split) = analysis.split_mel {
        println!(
            "{}",
            heatmap(&split.harmonic, "mel power spectrogram (Harmonic, dB)", width, MATRIX_ROWS)
        );
        println!(
            "{}",
            heatmap(&split.percussive, "mel power spectrogram (Percussive, dB)", width, MATRIX_ROWS)
        );
    }
    if let Some(ref chroma) = analysis.chroma {
        println!("{}", heatmap(chroma, "Chromagram", width, 12));
    }
    if let Some(ref texture) = analysis.texture {
        println!("{}", heatmap(&texture.mfcc, "MFCC", width, MATRIX_ROWS));
        println!("{}", heatmap(&texture.delta, "MFCC-delta", width, MATRIX_ROWS));
        println!("{}", heatmap(&texture.delta2, "MFCC-delta2", width, MATRIX_ROWS));
    }
}
