//! Primary separation: the demucs two-stem source separation model.

use super::{SeparationMethod, SeparationStrategy};
use crate::error::{PipelineError, Result};
use crate::process::CommandExecutor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const OUTPUT_DIR: &str = "demucs_out";

/// Runs the demucs CLI and picks up the vocals stem it writes.
pub struct DemucsSeparator {
    executor: Arc<dyn CommandExecutor>,
    program: String,
    model: String,
}

impl DemucsSeparator {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        program: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            executor,
            program: program.into(),
            model: model.into(),
        }
    }
}

impl SeparationStrategy for DemucsSeparator {
    fn name(&self) -> &str {
        "demucs"
    }

    fn method(&self) -> SeparationMethod {
        SeparationMethod::PrimaryModel
    }

    fn separate(&self, input: &Path, workspace: &Path) -> Result<PathBuf> {
        let out_dir = workspace.join(OUTPUT_DIR);
        std::fs::create_dir_all(&out_dir)?;

        let out_arg = utf8(&out_dir)?;
        let input_arg = utf8(input)?;
        let args = [
            "--two-stems=vocals",
            "-n",
            self.model.as_str(),
            "-o",
            out_arg,
            input_arg,
        ];
        self.executor
            .execute(&self.program, &args)
            .map_err(|e| PipelineError::Separation {
                message: e.to_string(),
            })?;

        find_vocals(&out_dir).ok_or_else(|| PipelineError::Separation {
            message: format!("No vocals stem found under {}", out_dir.display()),
        })
    }
}

/// First `.wav` under `root` whose file name or containing directory names
/// the vocals stem, walking entries in sorted order.
///
/// The `no_vocals` accompaniment stem is never selected.
pub fn find_vocals(root: &Path) -> Option<PathBuf> {
    walk(root, root)
}

fn walk(root: &Path, dir: &Path) -> Option<PathBuf> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .collect();
    entries.sort();

    for path in &entries {
        if path.is_file() && is_vocals_wav(root, path) {
            return Some(path.clone());
        }
    }
    entries
        .iter()
        .filter(|p| p.is_dir())
        .find_map(|sub| walk(root, sub))
}

fn is_vocals_wav(root: &Path, path: &Path) -> bool {
    let is_wav = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
    if !is_wav {
        return false;
    }

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_lowercase();
    if stem.starts_with("no_vocals") {
        return false;
    }
    if stem.contains("vocals") {
        return true;
    }

    path.parent()
        .and_then(|p| p.strip_prefix(root).ok())
        .is_some_and(|rel| rel.to_string_lossy().to_lowercase().contains("vocals"))
}

fn utf8(path: &Path) -> Result<&str> {
    path.to_str().ok_or_else(|| PipelineError::Separation {
        message: format!("Path is not valid UTF-8: {}", path.display()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::MockCommandExecutor;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"RIFF").unwrap();
    }

    /// Mimics demucs' layout: `<out>/<model>/<track>/{vocals,no_vocals}.wav`.
    fn fake_demucs() -> MockCommandExecutor {
        MockCommandExecutor::with_handler(|_, args| {
            let out = args[args.iter().position(|a| *a == "-o").unwrap() + 1];
            let model = args[args.iter().position(|a| *a == "-n").unwrap() + 1];
            let track = Path::new(args[args.len() - 1]).file_stem().unwrap();
            let dir = Path::new(out).join(model).join(track);
            touch(&dir.join("no_vocals.wav"));
            touch(&dir.join("vocals.wav"));
            Ok(String::new())
        })
    }

    #[test]
    fn separate_invokes_two_stem_mode() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("job_normalized.wav");
        touch(&input);
        let executor = Arc::new(fake_demucs());
        let separator = DemucsSeparator::new(executor.clone(), "demucs", "htdemucs_ft");

        let vocals = separator.separate(&input, dir.path()).unwrap();

        assert_eq!(
            vocals,
            dir.path()
                .join("demucs_out/htdemucs_ft/job_normalized/vocals.wav")
        );
        let calls = executor.calls();
        assert_eq!(calls[0].0, "demucs");
        assert_eq!(calls[0].1[0], "--two-stems=vocals");
        assert!(calls[0].1.windows(2).any(|w| w[0] == "-n" && w[1] == "htdemucs_ft"));
        assert!(!calls[0].1.iter().any(|a| a == "--mp3"));
    }

    #[test]
    fn tool_failure_is_separation_error() {
        let dir = TempDir::new().unwrap();
        let separator =
            DemucsSeparator::new(Arc::new(MockCommandExecutor::failing()), "demucs", "htdemucs");
        let result = separator.separate(&dir.path().join("in.wav"), dir.path());
        assert!(matches!(result, Err(PipelineError::Separation { .. })));
    }

    #[test]
    fn success_without_vocals_file_is_error() {
        let dir = TempDir::new().unwrap();
        let separator = DemucsSeparator::new(
            Arc::new(MockCommandExecutor::succeeding()),
            "demucs",
            "htdemucs",
        );
        match separator.separate(&dir.path().join("in.wav"), dir.path()) {
            Err(PipelineError::Separation { message }) => assert!(message.contains("vocals")),
            other => panic!("Expected Separation error, got {:?}", other),
        }
    }

    #[test]
    fn find_vocals_accepts_directory_match() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("model/Vocals/track.WAV"));
        assert_eq!(
            find_vocals(dir.path()),
            Some(dir.path().join("model/Vocals/track.WAV"))
        );
    }

    #[test]
    fn find_vocals_skips_accompaniment_and_other_formats() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("model/track/no_vocals.wav"));
        touch(&dir.path().join("model/track/vocals.mp3"));
        assert_eq!(find_vocals(dir.path()), None);
    }

    #[test]
    fn find_vocals_is_deterministic() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("b/vocals.wav"));
        touch(&dir.path().join("a/vocals.wav"));
        assert_eq!(find_vocals(dir.path()), Some(dir.path().join("a/vocals.wav")));
        assert_eq!(find_vocals(dir.path()), Some(dir.path().join("a/vocals.wav")));
    }

    #[test]
    fn find_vocals_missing_root_is_none() {
        let dir = TempDir::new().unwrap();
        assert_eq!(find_vocals(&dir.path().join("missing")), None);
    }
}
