//! Duration-gated window planning for long audio.

use crate::defaults;

/// One transcription window, in seconds from the start of the waveform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkWindow {
    pub index: usize,
    pub start_secs: f64,
    pub end_secs: f64,
}

/// When and how to split audio into overlapping windows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkingPolicy {
    /// Audio strictly longer than this is chunked.
    pub threshold_secs: f64,
    pub chunk_length_secs: f64,
    pub overlap_secs: f64,
}

impl Default for ChunkingPolicy {
    fn default() -> Self {
        Self {
            threshold_secs: defaults::CHUNK_THRESHOLD_SECS,
            chunk_length_secs: defaults::CHUNK_LENGTH_SECS,
            overlap_secs: defaults::CHUNK_OVERLAP_SECS,
        }
    }
}

impl ChunkingPolicy {
    pub fn uses_chunking(&self, duration_secs: f64) -> bool {
        duration_secs > self.threshold_secs
    }

    pub fn windows(&self, duration_secs: f64) -> Vec<ChunkWindow> {
        plan_windows(duration_secs, self.chunk_length_secs, self.overlap_secs)
    }
}

/// `max(1, ceil((duration - overlap) / (length - overlap)))`.
///
/// A non-positive step yields a single window.
pub fn chunk_count(duration_secs: f64, chunk_length_secs: f64, overlap_secs: f64) -> usize {
    let step = chunk_length_secs - overlap_secs;
    if step <= 0.0 {
        return 1;
    }
    let n = ((duration_secs - overlap_secs) / step).ceil();
    if n.is_finite() && n > 1.0 { n as usize } else { 1 }
}

/// Windows start every `length - overlap` seconds and end at
/// `min(duration, start + length)`.
pub fn plan_windows(
    duration_secs: f64,
    chunk_length_secs: f64,
    overlap_secs: f64,
) -> Vec<ChunkWindow> {
    let step = chunk_length_secs - overlap_secs;
    (0..chunk_count(duration_secs, chunk_length_secs, overlap_secs))
        .map(|index| {
            let start_secs = (index as f64 * step).max(0.0);
            ChunkWindow {
                index,
                start_secs,
                end_secs: duration_secs.min(start_secs + chunk_length_secs),
            }
        })
        .collect()
}
