//! Platform directories for settings and model files, resolved with `dirs`.
//!
//! ```text
//! <config_dir>/cogai-risk/settings.toml
//! <data_local_dir>/cogai-risk/models/
//!     wav2vec2-base-960h/model.onnx     speech embedding encoder
//! ```
//!
//! On Linux these are `~/.config` and `~/.local/share`; on macOS both live
//! under `~/Library/Application Support`; on Windows `%APPDATA%` and
//! `%LOCALAPPDATA%`.

use std::path::PathBuf;

/// Subdirectory of [`AppPaths::models_dir`] holding the embedding encoder.
pub const EMBEDDING_MODEL_NAME: &str = "wav2vec2-base-960h";

/// Resolved locations for one installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub settings_file: PathBuf,
    pub models_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "cogai-risk";

    /// Platform locations; `.` stands in for any directory the platform
    /// does not define.
    pub fn new() -> Self {
        let base = |dir: Option<PathBuf>| {
            dir.unwrap_or_else(|| PathBuf::from("."))
                .join(Self::APP_NAME)
        };
        Self::from_dirs(base(dirs::config_dir()), base(dirs::data_local_dir()))
    }

    fn from_dirs(config_dir: PathBuf, data_dir: PathBuf) -> Self {
        Self {
            settings_file: config_dir.join("settings.toml"),
            config_dir,
            models_dir: data_dir.join("models"),
        }
    }

    /// Default directory of the ONNX speech encoder.
    pub fn embedding_model_dir(&self) -> PathBuf {
        self.models_dir.join(EMBEDDING_MODEL_NAME)
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_paths_use_app_name() {
        let paths = AppPaths::new();
        assert!(paths.config_dir.ends_with("cogai-risk"));
        assert!(paths.settings_file.ends_with("cogai-risk/settings.toml"));
        assert!(paths.models_dir.ends_with("models"));
    }

    #[test]
    fn embedding_model_lives_under_models_dir() {
        let paths = AppPaths::new();
        let dir = paths.embedding_model_dir();
        assert!(dir.starts_with(&paths.models_dir));
        assert!(dir.ends_with(EMBEDDING_MODEL_NAME));
    }
}
