//! Result types produced by the pipeline.

use crate::defaults;
use crate::pipeline::timings::Timings;
use crate::separation::{SeparationAttempt, SeparationMethod};
use crate::stt::Segment;
use serde::{Deserialize, Serialize};

/// Stitched transcript for a whole waveform.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TranscriptResult {
    pub segments: Vec<Segment>,
    pub text: String,
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeparationInfo {
    pub enabled: bool,
    pub method: SeparationMethod,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<SeparationAttempt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionInfo {
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineInfo {
    pub separation: SeparationInfo,
    pub transcription: TranscriptionInfo,
}

/// Placeholder returned when diarization is requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diarization {
    pub warning: String,
}

impl Diarization {
    pub fn not_implemented() -> Self {
        Self {
            warning: defaults::DIARIZATION_WARNING.to_string(),
        }
    }
}

/// Final output of one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub request_id: String,
    pub duration_sec: f64,
    pub sample_rate: u32,
    pub pipeline: PipelineInfo,
    pub segments: Vec<Segment>,
    pub text: String,
    pub language: String,
    pub timings_ms: Timings,
    pub diarization: Option<Diarization>,
}
