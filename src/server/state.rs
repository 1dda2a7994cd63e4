use crate::pipeline::Pipeline;
use std::path::PathBuf;
use std::sync::Arc;

/// Shared state for request handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub max_upload_bytes: usize,
    /// Parent directory for job workspaces; system temp dir if `None`.
    pub workspace_root: Option<PathBuf>,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>, max_upload_bytes: usize) -> Self {
        Self {
            pipeline,
            max_upload_bytes,
            workspace_root: None,
        }
    }

    pub fn with_workspace_root(mut self, root: Option<PathBuf>) -> Self {
        self.workspace_root = root;
        self
    }
}
