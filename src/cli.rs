use clap::Parser;
use std::path::PathBuf;

use crate::pipeline::Request;
use crate::render::Display;

#[derive(Parser, Debug)]
#[command(name = "timbrescope", about = "Tempo, mel spectrogram, chroma and MFCC texture analysis")]
pub struct Cli {
    /// mp3 or wav file to analyze
    #[arg(short, long)]
    pub filename: Option<PathBuf>,

    /// Full mel spectrogram
    #[arg(long, alias = "full_mel")]
    pub full_mel: bool,

    /// Per-source (harmonic / percussive) mel spectrogram
    #[arg(long, alias = "split_mel")]
    pub split_mel: bool,

    /// Chromagram of the harmonic component
    #[arg(long)]
    pub chroma: bool,

    /// MFCC texture with delta and delta-delta
    #[arg(long)]
    pub texture: bool,

    /// Tempo of the full and percussive signals (the default when no feature is selected)
    #[arg(long)]
    pub tempo: bool,

    /// Compute visual features without rendering them
    #[arg(long)]
    pub no_display: bool,

    /// Draw heatmaps in the terminal instead of opening plot windows
    #[arg(long)]
    pub ascii: bool,

    /// Print a JSON summary instead of heatmaps
    #[arg(long)]
    pub json: bool,

    /// Config file (defaults to timbrescope.toml or the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Analysis sample rate; input is resampled to it
    #[arg(long, default_value_t = 44100)]
    pub sample_rate: u32,

    /// Hop length in samples for the mel, texture and chroma frames
    #[arg(long, default_value_t = 1024)]
    pub hop_length: usize,

    /// Constant-Q resolution used by the chromagram (multiple of 12)
    #[arg(long, default_value_t = 36)]
    pub bins_per_octave: usize,

    /// Number of cepstral coefficients in the texture
    #[arg(long, default_value_t = 13)]
    pub n_mfcc: usize,

    /// Heatmap width in terminal columns (with --ascii)
    #[arg(long, default_value_t = 96)]
    pub width: usize,
}

impl Cli {
    pub fn request(&self) -> Request {
        let any = self.has_feature_flags();
        Request {
            full_mel: self.full_mel,
            split_mel: self.split_mel,
            chroma: self.chroma,
            texture: self.texture,
            tempo: self.tempo || !any,
        }
    }

    pub fn display(&self) -> Display {
        if self.no_display {
            Display::Off
        } else if self.ascii {
            Display::Terminal
        } else {
            Display::Window
        }
    }

    pub fn has_feature_flags(&self) -> bool {
        self.full_mel || self.split_mel || self.chroma || self.texture || self.tempo
    }
}
