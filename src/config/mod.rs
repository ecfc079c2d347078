//! Configuration module.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each pipeline
//! stage, `AppPaths` for cross-platform data directories, and TOML
//! persistence via `AppConfig::load_from` / `AppConfig::save_to`.

pub mod paths;
pub mod settings;

pub use paths::{AppPaths, EMBEDDING_MODEL_NAME};
pub use settings::{
    AppConfig, AudioConfig, ClassifierConfig, EmbeddingConfig, PipelineConfig,
    CANONICAL_SAMPLE_RATE, MODEL_PATH_ENV,
};
