pub mod chroma;
pub mod decode;
pub mod error;
pub mod features;
pub mod hpss;
pub mod mel;
pub mod stft;
pub mod tempo;
pub mod texture;

#[cfg(test)]
pub mod synth;
