use std::path::Path;

use rubato::{FftFixedInOut, Resampler};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::error::{AnalysisError, Result};
use super::features::Waveform;

/// Analysis sampling rate used unless configured otherwise.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

const RESAMPLE_CHUNK: usize = 1024;

/// Decode an audio file to a mono waveform at `target_rate`.
pub fn decode_audio(path: &Path, target_rate: u32) -> Result<Waveform> {
    if !path.exists() {
        return Err(AnalysisError::NotFound(path.to_path_buf()));
    }
    if target_rate == 0 {
        return Err(AnalysisError::invalid("target sample rate must be positive"));
    }

    let file = std::fs::File::open(path)
        .map_err(|e| AnalysisError::decode(path, format!("failed to open file: {e}")))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| AnalysisError::decode(path, format!("failed to probe format: {e}")))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| AnalysisError::decode(path, "no audio tracks found"))?;

    let track_id = track.id;
    let source_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| AnalysisError::decode(path, "unknown sample rate"))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AnalysisError::decode(path, format!("failed to create decoder: {e}")))?;

    let mut all_samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                return Err(AnalysisError::decode(path, format!("failed to read packet: {e}")));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(e)) => {
                log::trace!("Skipping corrupt frame: {}", e);
                continue;
            }
            Err(e) => return Err(AnalysisError::decode(path, format!("decode error: {e}"))),
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        all_samples.extend(downmix(sample_buf.samples(), spec.channels.count()));
    }

    if all_samples.is_empty() {
        return Err(AnalysisError::decode(path, "no audio samples decoded"));
    }

    let samples = if source_rate == target_rate {
        all_samples
    } else {
        resample(&all_samples, source_rate, target_rate)
            .map_err(|reason| AnalysisError::decode(path, reason))?
    };

    log::debug!(
        "Decoded {}: {} samples, {}Hz -> {}Hz, {:.1}s",
        path.display(),
        samples.len(),
        source_rate,
        target_rate,
        samples.len() as f32 / target_rate as f32
    );

    Ok(Waveform::new(samples, target_rate))
}

/// Average interleaved channels into one.
fn downmix(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// FFT-based resampling of a mono signal, compensating for the resampler delay.
fn resample(
    samples: &[f32],
    from_rate: u32,
    to_rate: u32,
) -> std::result::Result<Vec<f32>, String> {
    let mut resampler =
        FftFixedInOut::<f32>::new(from_rate as usize, to_rate as usize, RESAMPLE_CHUNK, 1)
            .map_err(|e| format!("failed to build resampler: {e}"))?;

    let ratio = to_rate as f64 / from_rate as f64;
    let expected = (samples.len() as f64 * ratio).ceil() as usize;
    let delay = resampler.output_delay();
    let chunk_in = resampler.input_frames_next();

    let mut output = Vec::with_capacity(expected + delay + resampler.output_frames_next());
    let mut pos = 0;
    while output.len() < expected + delay {
        let end = (pos + chunk_in).min(samples.len());
        let mut chunk = if pos < samples.len() {
            samples[pos..end].to_vec()
        } else {
            Vec::new()
        };
        chunk.resize(chunk_in, 0.0);
        let input_channels = vec![chunk];

        let resampled = resampler
            .process(&input_channels, None)
            .map_err(|e| format!("resampling failed: {e}"))?;
        if let Some(channel) = resampled.first() {
            output.extend_from_slice(channel);
        }
        pos += chunk_in;
    }

    output.drain(..delay);
    output.truncate(expected);
    Ok(output)
}
