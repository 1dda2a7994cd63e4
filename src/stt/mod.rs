//! Speech-to-text: the transcriber seam, the Whisper backend and the model cache.

pub mod cache;
pub mod transcriber;
pub mod whisper;

pub use cache::{MockModelLoader, ModelCache, ModelLoader, WhisperModelLoader};
pub use transcriber::{MockTranscriber, Segment, Transcriber, TranscriptionResult};
pub use whisper::{WhisperConfig, WhisperTranscriber};
