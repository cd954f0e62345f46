//! Interactive heatmap figures built with plotly.
//!
//! Each visual matrix becomes a heatmap with a colorbar. The two per-source
//! mel spectrograms share one figure as stacked subplots on a common dB scale.

use plotly::common::{ColorBar, ColorScale, ColorScalePalette, Title};
use plotly::layout::{Axis, Layout};
use plotly::{HeatMap, Plot, Trace};
use serde::Serialize;

use crate::audio::chroma::pitch_class_name;
use crate::audio::features::{BinScale, FeatureMatrix};
use crate::audio::mel::{hz_to_mel, mel_to_hz};
use crate::pipeline::Analysis;

const FIGURE_WIDTH: usize = 1200;
const PANEL_HEIGHT: usize = 400;
const PANEL_GAP: f64 = 0.08;

/// One heatmap panel of a figure.
struct Panel<'a> {
    matrix: &'a FeatureMatrix,
    title: &'a str,
    /// Colorbar title; `None` reuses the scale of the panel above.
    colorbar: Option<&'a str>,
}

impl<'a> Panel<'a> {
    fn new(matrix: &'a FeatureMatrix, title: &'a str, colorbar: &'a str) -> Self {
        Self {
            matrix,
            title,
            colorbar: Some(colorbar),
        }
    }
}

/// Every figure the analysis asks for, in pipeline order.
pub fn figures(analysis: &Analysis) -> Vec<Plot> {
    let mut plots = Vec::new();
    if let Some(ref mel) = analysis.full_mel {
        let title = "mel power spectrogram";
        plots.push(figure(title, &[Panel::new(mel, title, "dB")]));
    }
    if let Some(ref split) = analysis.split_mel {
        plots.push(figure(
            "mel power spectrogram by source",
            &[
                Panel::new(&split.harmonic, "mel power spectrogram (Harmonic)", "dB"),
                Panel {
                    matrix: &split.percussive,
                    title: "mel power spectrogram (Percussive)",
                    colorbar: None,
                },
            ],
        ));
    }
    if let Some(ref chroma) = analysis.chroma {
        plots.push(figure("Chromagram", &[Panel::new(chroma, "Chromagram", "energy")]));
    }
    if let Some(ref texture) = analysis.texture {
        for (matrix, title) in [
            (&texture.mfcc, "MFCC"),
            (&texture.delta, "MFCC-delta"),
            (&texture.delta2, "MFCC-delta2"),
        ] {
            plots.push(figure(title, &[Panel::new(matrix, title, "value")]));
        }
    }
    plots
}

/// Open every figure in the system viewer, one window per feature.
pub fn show(analysis: &Analysis) {
    for plot in figures(analysis) {
        plot.show();
    }
}

fn figure(title: &str, panels: &[Panel]) -> Plot {
    let mut plot = Plot::new();
    let n = panels.len();
    let height = (1.0 - PANEL_GAP * (n - 1) as f64) / n as f64;

    let mut layout = Layout::new()
        .title(Title::from(title))
        .width(FIGURE_WIDTH)
        .height(PANEL_HEIGHT * n);

    for (idx, panel) in panels.iter().enumerate() {
        // Panels stack top to bottom.
        let y_start = (n - 1 - idx) as f64 * (height + PANEL_GAP);
        let y_end = y_start + height;
        plot.add_trace(heatmap_trace(panel, idx));

        let x_axis = Axis::new()
            .title(Title::from("Time (s)"))
            .anchor(axis_name("y", idx).as_str());
        let y_axis = Axis::new()
            .title(Title::from(bin_axis_title(&panel.matrix.scale)))
            .domain(&[y_start, y_end])
            .anchor(axis_name("x", idx).as_str());

        layout = match idx {
            0 => layout.x_axis(x_axis).y_axis(y_axis),
            _ => layout.x_axis2(x_axis).y_axis2(y_axis),
        };
    }

    plot.set_layout(layout);
    plot
}

/// `x`, `x2`, `x3`, ... as plotly names subplot axes.
fn axis_name(prefix: &str, idx: usize) -> String {
    if idx == 0 {
        prefix.to_string()
    } else {
        format!("{prefix}{}", idx + 1)
    }
}

fn heatmap_trace(panel: &Panel, idx: usize) -> Box<dyn Trace> {
    let matrix = panel.matrix;
    let times = frame_times(matrix);
    let z = rows(matrix);
    match matrix.scale {
        BinScale::Chroma => {
            let classes: Vec<String> = (0..matrix.n_bins())
                .map(|b| pitch_class_name(b).to_string())
                .collect();
            style(HeatMap::new(times, classes, z), panel, idx)
        }
        _ => style(HeatMap::new(times, bin_values(matrix), z), panel, idx),
    }
}

fn style<Y>(heatmap: Box<HeatMap<f64, Y, Vec<f64>>>, panel: &Panel, idx: usize) -> Box<dyn Trace>
where
    Y: Serialize + Clone + 'static,
{
    let heatmap = heatmap
        .name(panel.title)
        .color_scale(ColorScale::Palette(ColorScalePalette::Viridis));
    let heatmap = match panel.colorbar {
        Some(title) => heatmap.color_bar(ColorBar::new().title(Title::from(title))),
        None => heatmap.show_scale(false),
    };
    if idx == 0 {
        heatmap
    } else {
        heatmap
            .x_axis(axis_name("x", idx).as_str())
            .y_axis(axis_name("y", idx).as_str())
    }
}

fn frame_times(matrix: &FeatureMatrix) -> Vec<f64> {
    (0..matrix.n_frames())
        .map(|t| matrix.frame_time(t) as f64)
        .collect()
}

fn rows(matrix: &FeatureMatrix) -> Vec<Vec<f64>> {
    matrix
        .data
        .rows()
        .into_iter()
        .map(|row| row.iter().map(|&v| v as f64).collect())
        .collect()
}

/// Centre frequency of each mel band, or the coefficient index.
fn bin_values(matrix: &FeatureMatrix) -> Vec<f64> {
    let bins = matrix.n_bins();
    match matrix.scale {
        BinScale::Mel { fmin, fmax } => {
            let (lo, hi) = (hz_to_mel(fmin), hz_to_mel(fmax));
            (0..bins)
                .map(|b| mel_to_hz(lo + (hi - lo) * (b + 1) as f32 / (bins + 1) as f32) as f64)
                .collect()
        }
        _ => (0..bins).map(|b| b as f64).collect(),
    }
}

fn bin_axis_title(scale: &BinScale) -> &'static str {
    match scale {
        BinScale::Mel { .. } => "Hz",
        BinScale::Chroma => "pitch class",
        BinScale::Cepstral => "coefficient",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::synth;
    use crate::pipeline::{analyze, Request, Settings};
    use ndarray::Array2;
    use serde_json::Value;

    fn json(plot: &Plot) -> Value {
        serde_json::from_str(&plot.to_json()).unwrap()
    }

    #[test]
    fn one_figure_per_requested_feature() {
        let wave = synth::mix(
            &synth::tone(220.0, 1.0, 22050),
            &synth::click_track(120.0, 1.0, 22050),
        );
        let request = Request {
            full_mel: true,
            split_mel: true,
            chroma: true,
            texture: true,
            tempo: false,
        };
        let analysis = analyze(&wave, &request, &Settings::default(), |_| {}).unwrap();
        let plots = figures(&analysis);
        assert_eq!(plots.len(), 6);

        let traces: Vec<usize> = plots
            .iter()
            .map(|p| json(p)["data"].as_array().unwrap().len())
            .collect();
        assert_eq!(traces, vec![1, 2, 1, 1, 1, 1]);
    }

    #[test]
    fn tempo_only_has_no_figures() {
        let analysis = Analysis::default();
        assert!(figures(&analysis).is_empty());
    }

    #[test]
    fn heatmaps_carry_a_colorbar_and_subplot_axes() {
        let matrix = FeatureMatrix {
            data: Array2::from_shape_fn((4, 6), |(b, t)| -((b * t) as f32)),
            sample_rate: 100,
            hop_length: 10,
            scale: BinScale::Mel { fmin: 0.0, fmax: 50.0 },
        };
        let plot = figure(
            "split",
            &[
                Panel::new(&matrix, "top", "dB"),
                Panel {
                    matrix: &matrix,
                    title: "bottom",
                    colorbar: None,
                },
            ],
        );
        let value = json(&plot);
        let data = value["data"].as_array().unwrap();
        assert!(data.iter().all(|t| t["type"] == "heatmap"));
        assert_eq!(data[0]["colorbar"]["title"]["text"], "dB");
        assert_eq!(data[1]["xaxis"], "x2");
        assert_eq!(data[1]["yaxis"], "y2");
        assert_eq!(data[1]["showscale"], false);
        assert_eq!(data[0]["z"].as_array().unwrap().len(), 4);
        assert_eq!(data[0]["x"].as_array().unwrap().len(), 6);
        assert!(value["layout"]["yaxis2"]["domain"].is_array());
    }

    #[test]
    fn chroma_rows_are_named_by_pitch_class() {
        let matrix = FeatureMatrix {
            data: Array2::zeros((12, 3)),
            sample_rate: 100,
            hop_length: 10,
            scale: BinScale::Chroma,
        };
        let plot = figure("Chromagram", &[Panel::new(&matrix, "Chromagram", "energy")]);
        let value = json(&plot);
        let y = value["data"][0]["y"].as_array().unwrap();
        assert_eq!(y[0], "C");
        assert_eq!(y[9], "A");
    }

    #[test]
    fn mel_rows_rise_in_frequency() {
        let matrix = FeatureMatrix {
            data: Array2::zeros((8, 2)),
            sample_rate: 22050,
            hop_length: 1024,
            scale: BinScale::Mel { fmin: 0.0, fmax: 11025.0 },
        };
        let centres = bin_values(&matrix);
        assert_eq!(centres.len(), 8);
        assert!(centres.windows(2).all(|w| w[0] < w[1]));
        assert!(centres[7] < 11025.0);
    }
}
