//! Feature extraction stages.
//!
//! This module provides:
//! * [`AcousticFeatureExtractor`]: MFCC, rolloff and zero-crossing statistics.
//! * [`SpeechEmbedder`]: learned per-sample embedding, plus
//!   [`aggregate_embeddings`] for the assessment-level mean.
//! * [`tabular_vector`]: cognitive sub-scores in canonical order.
//! * [`FeatureBundle`]: everything the classifier sees for one assessment.

pub mod acoustic;
pub mod embedding;
pub mod spectral;
pub mod tabular;

use std::collections::BTreeMap;

pub use acoustic::{AcousticFeatureExtractor, AcousticFeatures, ExtractionError};
pub use embedding::{
    aggregate_embeddings, load_embedder, EmbeddingError, NoModelEmbedder, SpeechEmbedder,
};
#[cfg(feature = "onnx")]
pub use embedding::OnnxSpeechEmbedder;
pub use tabular::{tabular_vector, CognitiveScores, TABULAR_FIELDS};

/// Combined, ephemeral features for one assessment.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureBundle {
    /// Acoustic statistics keyed by task id.
    pub audio: BTreeMap<String, AcousticFeatures>,
    /// Assessment-level mean embedding.
    pub speech_embedding: Vec<f32>,
    /// Sub-scores in [`TABULAR_FIELDS`] order.
    pub tabular: [f64; 4],
}
