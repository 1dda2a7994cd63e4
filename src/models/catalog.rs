//! Whisper model metadata catalog.
//!
//! Model sizes accepted in a job configuration are the names listed here.
//! Files follow the whisper.cpp naming scheme `ggml-<file_id>.bin`.

const BASE_URL: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

/// Metadata for a Whisper model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    /// Model size as requested by callers (e.g., "tiny", "base.en", "large")
    pub name: &'static str,
    /// Identifier in the upstream file name
    pub file_id: &'static str,
    /// Approximate download size in megabytes
    pub size_mb: u32,
    /// Whether this model supports English only
    pub english_only: bool,
}

impl ModelInfo {
    /// On-disk file name.
    pub fn filename(&self) -> String {
        format!("ggml-{}.bin", self.file_id)
    }

    /// Download URL on Hugging Face.
    pub fn url(&self) -> String {
        format!("{}/{}", BASE_URL, self.filename())
    }
}

/// Catalog of available Whisper models.
///
/// Models range from tiny (75 MB, fast, lower accuracy) to large (3094 MB, slower, highest accuracy).
/// The `.en` suffix indicates English-only models.
pub const MODELS: &[ModelInfo] = &[
    ModelInfo {
        name: "tiny",
        file_id: "tiny",
        size_mb: 75,
        english_only: false,
    },
    ModelInfo {
        name: "tiny.en",
        file_id: "tiny.en",
        size_mb: 75,
        english_only: true,
    },
    ModelInfo {
        name: "base",
        file_id: "base",
        size_mb: 142,
        english_only: false,
    },
    ModelInfo {
        name: "base.en",
        file_id: "base.en",
        size_mb: 142,
        english_only: true,
    },
    ModelInfo {
        name: "small",
        file_id: "small",
        size_mb: 466,
        english_only: false,
    },
    ModelInfo {
        name: "small.en",
        file_id: "small.en",
        size_mb: 466,
        english_only: true,
    },
    ModelInfo {
        name: "medium",
        file_id: "medium",
        size_mb: 1533,
        english_only: false,
    },
    ModelInfo {
        name: "medium.en",
        file_id: "medium.en",
        size_mb: 1533,
        english_only: true,
    },
    ModelInfo {
        name: "large",
        file_id: "large-v3",
        size_mb: 3094,
        english_only: false,
    },
];

/// Find a model by name. Names are case-sensitive.
pub fn get_model(name: &str) -> Option<&'static ModelInfo> {
    MODELS.iter().find(|m| m.name == name)
}

pub fn list_models() -> &'static [ModelInfo] {
    MODELS
}

/// Catalog names joined for error messages.
pub fn model_names() -> String {
    MODELS.iter().map(|m| m.name).collect::<Vec<_>>().join(", ")
}

/// Catalog name whose file carries `file_id`; ids outside the catalog are
/// returned unchanged.
pub fn name_for_file_id(file_id: &str) -> &str {
    MODELS
        .iter()
        .find(|m| m.file_id == file_id)
        .map_or(file_id, |m| m.name)
}

/// File name for `name`, falling back to `ggml-<name>.bin` outside the catalog.
pub fn filename_for(name: &str) -> String {
    get_model(name)
        .map(ModelInfo::filename)
        .unwrap_or_else(|| format!("ggml-{name}.bin"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_model_exists() {
        let model = get_model("tiny.en").unwrap();
        assert_eq!(model.name, "tiny.en");
        assert_eq!(model.size_mb, 75);
        assert!(model.english_only);
    }

    #[test]
    fn test_get_model_not_found() {
        assert!(get_model("nonexistent").is_none());
    }

    #[test]
    fn test_get_model_case_sensitive() {
        assert!(get_model("tiny").is_some());
        assert!(get_model("Tiny").is_none());
    }

    #[test]
    fn test_default_model_is_in_catalog() {
        assert!(get_model(crate::defaults::DEFAULT_MODEL).is_some());
    }

    #[test]
    fn test_large_resolves_to_v3_file() {
        let large = get_model("large").unwrap();
        assert_eq!(large.filename(), "ggml-large-v3.bin");
        assert_eq!(
            large.url(),
            "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-large-v3.bin"
        );
    }

    #[test]
    fn test_name_for_file_id_maps_back_to_catalog() {
        assert_eq!(name_for_file_id("large-v3"), "large");
        assert_eq!(name_for_file_id("base.en"), "base.en");
        assert_eq!(name_for_file_id("custom-q5"), "custom-q5");
        for model in list_models() {
            assert_eq!(name_for_file_id(model.file_id), model.name);
        }
    }

    #[test]
    fn test_filename_for_unknown_model() {
        assert_eq!(filename_for("custom-q5"), "ggml-custom-q5.bin");
        assert_eq!(filename_for("base"), "ggml-base.bin");
    }

    #[test]
    fn test_english_models_have_en_suffix() {
        for model in list_models() {
            assert_eq!(model.english_only, model.name.ends_with(".en"), "{}", model.name);
        }
    }

    #[test]
    fn test_model_names_are_unique() {
        let mut names: Vec<_> = list_models().iter().map(|m| m.name).collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    #[test]
    fn test_model_names_lists_all() {
        let names = model_names();
        for model in list_models() {
            assert!(names.contains(model.name));
        }
    }
}
