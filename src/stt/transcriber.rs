use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;

/// A timed span of recognised text, in seconds from the start of the audio
/// handed to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl Segment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }
}

/// Raw model output for one waveform.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TranscriptionResult {
    pub text: String,
    /// Language detected by the model, if any.
    pub language: Option<String>,
    pub segments: Vec<Segment>,
}

/// Trait for speech-to-text transcription.
///
/// This trait allows swapping implementations (real Whisper vs mock).
pub trait Transcriber: Send + Sync {
    /// Transcribe a mono WAV file.
    ///
    /// `language` is an ISO code hint; `None` lets the model detect it.
    fn transcribe(&self, wav: &Path, language: Option<&str>) -> Result<TranscriptionResult>;

    /// Get the name of the loaded model
    fn model_name(&self) -> &str;
}

/// Implement Transcriber for Arc<T> to allow sharing across jobs.
impl<T: Transcriber + ?Sized> Transcriber for Arc<T> {
    fn transcribe(&self, wav: &Path, language: Option<&str>) -> Result<TranscriptionResult> {
        (**self).transcribe(wav, language)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Mock transcriber for testing.
///
/// Returns the same configured result for every call and records the
/// language hint of each call.
#[derive(Debug)]
pub struct MockTranscriber {
    model_name: String,
    result: TranscriptionResult,
    should_fail: bool,
    calls: Mutex<Vec<Option<String>>>,
}

impl Clone for MockTranscriber {
    fn clone(&self) -> Self {
        Self {
            model_name: self.model_name.clone(),
            result: self.result.clone(),
            should_fail: self.should_fail,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl MockTranscriber {
    /// Create a new mock transcriber with default settings
    pub fn new(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            result: TranscriptionResult {
                text: "mock transcription".to_string(),
                language: Some("en".to_string()),
                segments: vec![Segment::new(0.0, 1.0, "mock transcription")],
            },
            should_fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Return `text` as a single segment spanning `[0, 1)`.
    pub fn with_response(mut self, text: &str) -> Self {
        self.result.text = text.to_string();
        self.result.segments = vec![Segment::new(0.0, 1.0, text)];
        self
    }

    /// Return these segments; text is their trimmed concatenation.
    pub fn with_segments(mut self, segments: Vec<Segment>) -> Self {
        self.result.text = segments
            .iter()
            .map(|s| s.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        self.result.segments = segments;
        self
    }

    /// Report this detected language (`None` = nothing detected).
    pub fn with_language(mut self, language: Option<&str>) -> Self {
        self.result.language = language.map(str::to_string);
        self
    }

    /// Configure the mock to fail on transcribe
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Language hints seen so far, one entry per call.
    pub fn calls(&self) -> Vec<Option<String>> {
        match self.calls.lock() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Transcriber for MockTranscriber {
    fn transcribe(&self, wav: &Path, language: Option<&str>) -> Result<TranscriptionResult> {
        match self.calls.lock() {
            Ok(mut calls) => calls.push(language.map(str::to_string)),
            Err(poisoned) => poisoned.into_inner().push(language.map(str::to_string)),
        }
        if self.should_fail {
            return Err(PipelineError::Transcription {
                message: "mock transcription failure".to_string(),
            });
        }
        if !wav.exists() {
            return Err(PipelineError::Transcription {
                message: format!("Audio file not found: {}", wav.display()),
            });
        }
        Ok(self.result.clone())
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_mock_transcriber_returns_response() {
        let wav = NamedTempFile::new().unwrap();
        let transcriber = MockTranscriber::new("test-model").with_response("Hello, this is a test");

        let result = transcriber.transcribe(wav.path(), None).unwrap();
        assert_eq!(result.text, "Hello, this is a test");
        assert_eq!(result.segments.len(), 1);
        assert_eq!(result.language.as_deref(), Some("en"));
    }

    #[test]
    fn test_mock_transcriber_returns_error_when_configured() {
        let wav = NamedTempFile::new().unwrap();
        let transcriber = MockTranscriber::new("test-model").with_failure();

        match transcriber.transcribe(wav.path(), None) {
            Err(PipelineError::Transcription { message }) => {
                assert_eq!(message, "mock transcription failure");
            }
            other => panic!("Expected Transcription error, got {:?}", other),
        }
    }

    #[test]
    fn test_mock_transcriber_missing_audio_is_error() {
        let transcriber = MockTranscriber::new("test-model");
        let result = transcriber.transcribe(Path::new("/nonexistent/audio.wav"), None);
        assert!(matches!(result, Err(PipelineError::Transcription { .. })));
    }

    #[test]
    fn test_mock_transcriber_records_language_hints() {
        let wav = NamedTempFile::new().unwrap();
        let transcriber = MockTranscriber::new("tiny");
        transcriber.transcribe(wav.path(), Some("de")).unwrap();
        transcriber.transcribe(wav.path(), None).unwrap();
        assert_eq!(transcriber.calls(), vec![Some("de".to_string()), None]);
    }

    #[test]
    fn test_with_segments_builds_text() {
        let wav = NamedTempFile::new().unwrap();
        let transcriber = MockTranscriber::new("tiny").with_segments(vec![
            Segment::new(0.0, 1.0, " hello "),
            Segment::new(1.0, 1.5, "  "),
            Segment::new(1.5, 2.0, "world"),
        ]);
        let result = transcriber.transcribe(wav.path(), None).unwrap();
        assert_eq!(result.text, "hello world");
        assert_eq!(result.segments.len(), 3);
    }

    #[test]
    fn test_transcriber_trait_is_object_safe() {
        let wav = NamedTempFile::new().unwrap();
        let transcriber: Arc<dyn Transcriber> =
            Arc::new(MockTranscriber::new("test-model").with_response("boxed test"));

        assert_eq!(transcriber.model_name(), "test-model");
        let result = transcriber.transcribe(wav.path(), None).unwrap();
        assert_eq!(result.text, "boxed test");
    }

    #[test]
    fn test_clone_resets_call_log() {
        let wav = NamedTempFile::new().unwrap();
        let original = MockTranscriber::new("tiny");
        original.transcribe(wav.path(), None).unwrap();
        assert!(original.clone().calls().is_empty());
    }
}
