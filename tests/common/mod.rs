#![allow(dead_code)]

use sepscribe::audio::{Normalizer, Waveform};
use sepscribe::error::PipelineError;
use sepscribe::pipeline::{ChunkingPolicy, Pipeline};
use sepscribe::process::{CommandExecutor, MockCommandExecutor};
use sepscribe::separation::Separator;
use sepscribe::stt::{MockModelLoader, MockTranscriber, ModelCache, Transcriber};
use std::f32::consts::PI;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// How the fake demucs behaves.
#[derive(Clone, Copy, Debug)]
pub enum Demucs {
    /// Writes `<out>/<model>/<track>/vocals.wav` (a copy of the input) and
    /// the `no_vocals.wav` sibling.
    Succeeds,
    /// Exits non-zero.
    Fails,
}

fn arg_after<'a>(args: &[&'a str], flag: &str) -> Option<&'a str> {
    let pos = args.iter().position(|a| *a == flag)?;
    args.get(pos + 1).copied()
}

fn tool_failed(tool: &str) -> PipelineError {
    PipelineError::ToolFailed {
        tool: tool.to_string(),
        status: "exit status: 1".to_string(),
        stderr: "simulated failure".to_string(),
    }
}

/// Stand-ins for ffmpeg (copies the `-i` WAV to the output path) and demucs.
pub fn fake_tools(demucs: Demucs) -> Arc<MockCommandExecutor> {
    Arc::new(MockCommandExecutor::with_handler(move |command, args| {
        match command {
            "ffmpeg" => {
                let input = arg_after(args, "-i").ok_or_else(|| tool_failed("ffmpeg"))?;
                let output = args.last().ok_or_else(|| tool_failed("ffmpeg"))?;
                std::fs::copy(input, output)?;
                Ok(String::new())
            }
            "demucs" => match demucs {
                Demucs::Fails => Err(tool_failed("demucs")),
                Demucs::Succeeds => {
                    let model = arg_after(args, "-n").ok_or_else(|| tool_failed("demucs"))?;
                    let out = arg_after(args, "-o").ok_or_else(|| tool_failed("demucs"))?;
                    let input = Path::new(args.last().ok_or_else(|| tool_failed("demucs"))?);
                    let stem = input
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    let track = Path::new(out).join(model).join(stem);
                    std::fs::create_dir_all(&track)?;
                    std::fs::copy(input, track.join("vocals.wav"))?;
                    Waveform::new(vec![0.0; 160], 16000).write(&track.join("no_vocals.wav"))?;
                    Ok(String::new())
                }
            },
            other => Err(PipelineError::ToolNotFound {
                tool: other.to_string(),
            }),
        }
    }))
}

/// ffmpeg that cannot decode anything.
pub fn broken_ffmpeg() -> Arc<MockCommandExecutor> {
    Arc::new(MockCommandExecutor::with_handler(|command, _| {
        Err(PipelineError::ToolFailed {
            tool: command.to_string(),
            status: "exit status: 1".to_string(),
            stderr: "Invalid data found when processing input".to_string(),
        })
    }))
}

/// Pipeline wired to fakes. The returned log records every model load.
pub fn pipeline(
    executor: Arc<MockCommandExecutor>,
    separator: Separator,
    transcriber: MockTranscriber,
) -> (Pipeline, Arc<Mutex<Vec<String>>>) {
    let loader =
        MockModelLoader::new(move |_| Ok(Arc::new(transcriber.clone()) as Arc<dyn Transcriber>));
    let loads = loader.load_log();
    let executor: Arc<dyn CommandExecutor> = executor;
    let pipeline = Pipeline::new(
        Normalizer::new(executor, "ffmpeg"),
        separator,
        Arc::new(ModelCache::new(loader)),
        ChunkingPolicy::default(),
    );
    (pipeline, loads)
}

/// Demucs then spectral gating, both driven through `executor`.
pub fn standard_separator(executor: Arc<MockCommandExecutor>) -> Separator {
    Separator::standard(executor, "demucs", "htdemucs_ft", 0.5)
}

/// A 440 Hz tone over low-level pseudo-random noise, with a leading
/// noise-only lead-in so spectral gating has a profile to learn from.
pub fn tone_with_noise(seconds: f64, sample_rate: u32) -> Waveform {
    let total = (seconds * sample_rate as f64).round() as usize;
    let lead_in = (sample_rate / 2) as usize;
    let mut state: u32 = 0x2545_f491;
    let samples = (0..total)
        .map(|i| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let noise = (state as f32 / u32::MAX as f32 - 0.5) * 0.02;
            let tone = if i >= lead_in {
                0.4 * (2.0 * PI * 440.0 * i as f32 / sample_rate as f32).sin()
            } else {
                0.0
            };
            tone + noise
        })
        .collect();
    Waveform::new(samples, sample_rate)
}

/// Write `seconds` of test audio at 16 kHz to `dir/name`.
pub fn write_clip(dir: &Path, name: &str, seconds: f64) -> PathBuf {
    let path = dir.join(name);
    tone_with_noise(seconds, 16000)
        .write(&path)
        .unwrap_or_else(|e| panic!("failed to write {}: {e}", path.display()));
    path
}

/// Job workspaces (`req_*`) still present under `root`.
pub fn leftover_workspaces(root: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(root)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| e.file_name().to_string_lossy().starts_with("req_"))
                .map(|e| e.path())
                .collect()
        })
        .unwrap_or_default()
}
