//! Whisper model management.

pub mod catalog;
pub mod download;

pub use catalog::{ModelInfo, get_model, list_models};
pub use download::{is_model_installed, model_path, models_dir};
