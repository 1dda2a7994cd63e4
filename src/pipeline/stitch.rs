//! Merging per-window model output into one transcript.
//!
//! Overlapping windows are not deduplicated: words spoken inside an overlap
//! appear once per window that covers them.

use crate::pipeline::types::TranscriptResult;
use crate::stt::{Segment, TranscriptionResult};

/// Round to millisecond precision.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Accumulates window results in order.
#[derive(Debug, Default)]
pub struct Stitcher {
    segments: Vec<Segment>,
    texts: Vec<String>,
    language: Option<String>,
}

impl Stitcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a window transcribed from audio starting at `offset_secs`.
    pub fn push_chunk(&mut self, offset_secs: f64, result: &TranscriptionResult) {
        self.segments.extend(result.segments.iter().map(|seg| {
            Segment::new(
                round3(seg.start + offset_secs),
                round3(seg.end + offset_secs),
                seg.text.trim(),
            )
        }));

        let text = result.text.trim();
        if !text.is_empty() {
            self.texts.push(text.to_string());
        }

        if self.language.is_none() {
            self.language = result
                .language
                .as_deref()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string);
        }
    }

    pub fn finish(self) -> TranscriptResult {
        TranscriptResult {
            segments: self.segments,
            text: self.texts.join(" "),
            language: self.language,
        }
    }
}

/// Single-shot result: timestamps rounded, texts trimmed.
pub fn single(result: &TranscriptionResult) -> TranscriptResult {
    let mut stitcher = Stitcher::new();
    stitcher.push_chunk(0.0, result);
    stitcher.finish()
}
