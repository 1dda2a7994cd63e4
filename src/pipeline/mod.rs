//! The audio processing pipeline.
//!
//! `NORMALIZE -> SEPARATE (best-effort) -> CHUNK+STITCH | SINGLE-SHOT -> ASSEMBLE`

pub mod chunk;
pub mod job;
pub mod orchestrator;
pub mod stitch;
pub mod timings;
pub mod types;

pub use chunk::{ChunkWindow, ChunkingPolicy, chunk_count, plan_windows};
pub use job::{AudioJob, JobConfig};
pub use orchestrator::Pipeline;
pub use stitch::Stitcher;
pub use timings::Timings;
pub use types::{
    Diarization, PipelineInfo, PipelineResult, SeparationInfo, TranscriptResult,
    TranscriptionInfo,
};
