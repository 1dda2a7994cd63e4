//! Loaded-model cache shared by all jobs.
//!
//! Models are loaded on first use and never evicted. Lookups take a read
//! lock; a miss loads outside any lock, then inserts. When two jobs race on
//! the same size the first inserted handle wins and the other is dropped.

use crate::error::{PipelineError, Result};
use crate::models;
use crate::stt::transcriber::Transcriber;
use crate::stt::whisper::{WhisperConfig, WhisperTranscriber};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Loads a transcriber for a model size.
pub trait ModelLoader: Send + Sync {
    fn load(&self, model_size: &str) -> Result<Arc<dyn Transcriber>>;
}

pub struct ModelCache {
    loader: Box<dyn ModelLoader>,
    models: RwLock<HashMap<String, Arc<dyn Transcriber>>>,
}

impl ModelCache {
    pub fn new(loader: impl ModelLoader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            models: RwLock::new(HashMap::new()),
        }
    }

    /// Get the transcriber for `model_size`, loading it on first use.
    pub fn get(&self, model_size: &str) -> Result<Arc<dyn Transcriber>> {
        if let Some(model) = self
            .models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(model_size)
        {
            return Ok(Arc::clone(model));
        }

        tracing::info!(model = model_size, "Loading model");
        let loaded = self.loader.load(model_size)?;

        let mut models = self.models.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(
            models.entry(model_size.to_string()).or_insert(loaded),
        ))
    }

    pub fn contains(&self, model_size: &str) -> bool {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(model_size)
    }

    pub fn len(&self) -> usize {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Loads `ggml-<size>.bin` files from a models directory.
#[derive(Debug, Clone)]
pub struct WhisperModelLoader {
    models_dir: PathBuf,
    threads: Option<usize>,
}

impl WhisperModelLoader {
    pub fn new(models_dir: impl Into<PathBuf>, threads: Option<usize>) -> Self {
        Self {
            models_dir: models_dir.into(),
            threads,
        }
    }
}

impl ModelLoader for WhisperModelLoader {
    fn load(&self, model_size: &str) -> Result<Arc<dyn Transcriber>> {
        let model_path = models::model_path(&self.models_dir, model_size);
        if !model_path.is_file() {
            return Err(PipelineError::Transcription {
                message: format!(
                    "Model '{}' is not installed at {}. Run: sepscribe models install {}",
                    model_size,
                    model_path.display(),
                    model_size
                ),
            });
        }
        let transcriber = WhisperTranscriber::new(WhisperConfig {
            model_path,
            threads: self.threads,
        })?;
        Ok(Arc::new(transcriber))
    }
}

type LoadFn = dyn Fn(&str) -> Result<Arc<dyn Transcriber>> + Send + Sync;

/// Loader for tests: delegates to a closure and records requested sizes.
pub struct MockModelLoader {
    factory: Box<LoadFn>,
    loads: Arc<Mutex<Vec<String>>>,
}

impl MockModelLoader {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&str) -> Result<Arc<dyn Transcriber>> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            loads: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared handle to the log of requested sizes; stays valid after the
    /// loader is moved into a cache.
    pub fn load_log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.loads)
    }
}

impl ModelLoader for MockModelLoader {
    fn load(&self, model_size: &str) -> Result<Arc<dyn Transcriber>> {
        self.loads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(model_size.to_string());
        (self.factory)(model_size)
    }
}
