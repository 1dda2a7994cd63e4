//! Audio decoding, encoding and format normalization.

pub mod normalize;
pub mod wav;

pub use normalize::{NormalizedAudio, Normalizer};
pub use wav::{AudioInfo, WavSink, Waveform};
