//! Default configuration constants for sepscribe.
//!
//! Shared by the file configuration, the per-request job configuration and
//! the pipeline stages so that every layer agrees on the same values.

/// Default target sample rate in Hz for normalized audio.
///
/// 16kHz is what Whisper models are trained on.
pub const SAMPLE_RATE: u32 = 16000;

/// Lowest accepted target sample rate.
pub const MIN_SAMPLE_RATE: u32 = 8000;

/// Highest accepted target sample rate.
pub const MAX_SAMPLE_RATE: u32 = 192_000;

/// Default Whisper model size.
pub const DEFAULT_MODEL: &str = "small";

/// Language hint value that means "let the model detect it".
pub const AUTO_LANGUAGE: &str = "auto";

/// Language code reported when neither the model nor the caller provides one.
pub const UNDETERMINED_LANGUAGE: &str = "und";

/// Audio longer than this (in seconds) is transcribed in overlapping chunks.
pub const CHUNK_THRESHOLD_SECS: f64 = 45.0;

/// Length of one transcription window in seconds.
pub const CHUNK_LENGTH_SECS: f64 = 30.0;

/// Overlap between consecutive windows in seconds.
pub const CHUNK_OVERLAP_SECS: f64 = 5.0;

/// Leading audio used to estimate the noise profile for spectral gating.
pub const NOISE_PROFILE_SECS: f64 = 0.5;

/// Maximum accepted upload size (200 MiB).
pub const MAX_UPLOAD_BYTES: usize = 200 * 1024 * 1024;

/// Default HTTP bind address.
pub const HOST: &str = "0.0.0.0";

/// Default HTTP port.
pub const PORT: u16 = 8000;

/// Default transcoder executable.
pub const FFMPEG: &str = "ffmpeg";

/// Default source separation executable.
pub const DEMUCS: &str = "demucs";

/// Demucs model used for two-stem (vocals / accompaniment) separation.
pub const DEMUCS_MODEL: &str = "htdemucs_ft";

/// Payload returned when diarization is requested.
pub const DIARIZATION_WARNING: &str = "diarization not implemented in reference code";

/// Report the GPU backend compiled into this build.
pub fn gpu_backend() -> &'static str {
    if cfg!(feature = "cuda") {
        "CUDA"
    } else if cfg!(feature = "vulkan") {
        "Vulkan"
    } else if cfg!(feature = "hipblas") {
        "HipBLAS (AMD)"
    } else if cfg!(feature = "openblas") {
        "OpenBLAS"
    } else {
        "CPU"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_window_is_longer_than_overlap() {
        assert!(CHUNK_LENGTH_SECS > CHUNK_OVERLAP_SECS);
    }

    #[test]
    fn default_sample_rate_is_within_accepted_range() {
        assert!((MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&SAMPLE_RATE));
    }

    #[test]
    fn gpu_backend_defaults_to_cpu_without_gpu_features() {
        if !cfg!(any(
            feature = "cuda",
            feature = "vulkan",
            feature = "hipblas",
            feature = "openblas"
        )) {
            assert_eq!(gpu_backend(), "CPU");
        }
    }
}
