//! Cognitive risk prediction from speech samples and cognitive test scores.
//!
//! * [`audio`]: decode uploaded samples to 16 kHz mono PCM.
//! * [`features`]: acoustic statistics, speech embeddings, tabular scores.
//! * [`classifier`]: model-backed classification with a heuristic fallback.
//! * [`pipeline`]: the idempotent, fail-open [`pipeline::PredictionService`].
//! * [`prediction`]: the persisted result and its report view.
//! * [`config`]: TOML settings and platform paths.

pub mod audio;
pub mod classifier;
pub mod config;
pub mod features;
pub mod pipeline;
pub mod prediction;
