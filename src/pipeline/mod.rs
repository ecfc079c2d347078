//! Prediction pipeline.
//!
//! # Architecture
//!
//! ```text
//! Assessment + Vec<AudioSample>
//!   │
//!   ▼
//! PredictionService::predict            (one call per assessment, blocking)
//!   ├─ PredictionStore::get             → cached row, returned unchanged
//!   ├─ AudioDecoder → AcousticFeatureExtractor → SpeechEmbedder   per sample
//!   ├─ aggregate_embeddings + tabular_vector
//!   ├─ RiskClassifier                   (HeuristicClassifier on any failure)
//!   └─ PredictionStore::insert          → Inserted | Duplicate
//!
//! PipelineHealth ←── invocations / fallbacks / cache_hits
//! ```
//!
//! Async callers use [`PredictionService::predict_async`], which moves the
//! call onto `tokio::task::spawn_blocking`.

pub mod health;
pub mod orchestrator;
pub mod store;

pub use health::{HealthSnapshot, PipelineHealth};
pub use orchestrator::{Assessment, PipelineError, PredictionService, StageError, FALLBACK_TARGET};
pub use store::{InMemoryPredictionStore, InsertOutcome, PredictionStore, StoreError};
