mod audio;
mod cli;
mod config;
mod pipeline;
mod render;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use cli::Cli;
use pipeline::Settings;
use render::summary::Summary;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    // Load config: explicit --config path, or auto-detect timbrescope.toml / user config
    let config_path = cli.config.clone().or_else(config::find_config_path);
    let mut cfg = match config_path {
        Some(ref path) => match config::load_config(path) {
            Some(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            None => {
                log::warn!("Failed to load config from {}", path.display());
                config::Config::default()
            }
        },
        None => config::Config::default(),
    };

    // Merge: CLI values win unless left at their defaults
    if cli.sample_rate != 44100 { cfg.audio.sample_rate = cli.sample_rate; }
    if cli.hop_length != 1024 { cfg.audio.hop_length = cli.hop_length; }
    if cli.bins_per_octave != 36 { cfg.chroma.bins_per_octave = cli.bins_per_octave; }
    if cli.n_mfcc != 13 { cfg.texture.num_coeff = cli.n_mfcc; }

    let Some(ref filename) = cli.filename else {
        if cli.has_feature_flags() {
            log::warn!("Feature flags given without --filename; nothing to analyze");
        } else {
            log::info!("No input file given; nothing to analyze");
        }
        return Ok(());
    };

    let settings = Settings::from_config(cfg);
    let request = cli.request();
    log::debug!("Request: {:?}", request);
    log::debug!("Settings: {:?}", settings);

    println!("Filename: {}", filename.display());

    // 1. Decode audio
    log::info!("Decoding audio...");
    let waveform = audio::decode::decode_audio(filename, settings.sample_rate)
        .with_context(|| format!("Failed to load {}", filename.display()))?;
    log::info!(
        "Decoded {} samples at {}Hz ({:.1}s)",
        waveform.len(),
        waveform.sample_rate(),
        waveform.duration()
    );

    // 2. Analyze
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("[{elapsed_precise}] {spinner} {msg}")
            .context("Invalid progress template")?,
    );
    pb.enable_steady_tick(Duration::from_millis(100));

    let analysis = pipeline::analyze(&waveform, &request, &settings, |stage| {
        log::debug!("Stage: {}", stage);
        pb.set_message(stage.to_string());
    });
    pb.finish_and_clear();
    let analysis = analysis.context("Analysis failed")?;

    // 3. Render
    if cli.json {
        let summary = Summary::new(
            &filename.display().to_string(),
            waveform.sample_rate(),
            waveform.duration(),
            &analysis,
        );
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        render::print_analysis(&analysis, cli.width, cli.display());
    }

    log::info!("Done");
    Ok(())
}
