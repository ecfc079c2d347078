//! Risk classification.
//!
//! This module provides:
//! * [`TabularModel`]: the typed interface a trained artifact implements.
//! * [`LinearArtifact`]: the JSON artifact format shipped with the crate.
//! * [`RiskClassifier`]: the interface the orchestrator calls.
//! * [`ModelBackedClassifier`]: scores with a loaded model; may fail.
//! * [`HeuristicClassifier`]: constant fallback; never fails.
//! * [`load_classifier`]: startup selection between the two.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use cogai_risk::classifier::load_classifier;
//! use cogai_risk::config::AppConfig;
//!
//! let config = AppConfig::default();
//! let classifier = load_classifier(&config.classifier);
//! println!("fallback only: {}", classifier.is_fallback());
//! ```

pub mod artifact;
pub mod fallback;
pub mod model;

use std::sync::Arc;

use thiserror::Error;

use crate::config::ClassifierConfig;
use crate::features::FeatureBundle;
use crate::prediction::ScoredRisk;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use artifact::{ArtifactKind, LinearArtifact, ModelLoadError};
pub use fallback::{fallback_importances, HeuristicClassifier, FALLBACK_PROBABILITY};
pub use model::{normalize_importances, ModelBackedClassifier, MODEL_RECOMMENDATIONS};

// ---------------------------------------------------------------------------
// TabularModel
// ---------------------------------------------------------------------------

/// Output of [`TabularModel::score`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Score {
    /// Calibrated probability of the positive class.
    Probability(f64),
    /// Unbounded regression output; clamped into `[0, 1]` by the classifier.
    Raw(f64),
}

/// Failure while invoking a loaded model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    #[error("feature shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: usize, got: usize },

    #[error("model produced a non-finite value: {0}")]
    NonFinite(f64),

    #[error("model runtime error: {0}")]
    Runtime(String),
}

/// A trained model over the four-element tabular vector.
///
/// `importances()` returning `None` means the model offers no explanation.
pub trait TabularModel: Send + Sync {
    fn score(&self, features: &[f64]) -> Result<Score, InferenceError>;

    fn importances(&self) -> Option<Vec<f64>>;
}

// ---------------------------------------------------------------------------
// RiskClassifier
// ---------------------------------------------------------------------------

/// Interface the orchestrator classifies through.
pub trait RiskClassifier: Send + Sync {
    fn classify(&self, features: &FeatureBundle) -> Result<ScoredRisk, InferenceError>;

    /// `true` when this classifier is the heuristic stand-in.
    fn is_fallback(&self) -> bool {
        false
    }
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn TabularModel>, _: Box<dyn RiskClassifier>) {}
};

/// Pick the classifier for the process lifetime.
///
/// A missing artifact selects [`HeuristicClassifier`] quietly.  An artifact
/// that exists but cannot be read or parsed is logged and also selects the
/// fallback.
pub fn load_classifier(config: &ClassifierConfig) -> Arc<dyn RiskClassifier> {
    match LinearArtifact::load(&config.model_path) {
        Ok(artifact) => {
            log::info!(
                "classifier: loaded {:?} artifact from {}",
                artifact.kind,
                config.model_path.display()
            );
            Arc::new(ModelBackedClassifier::new(Arc::new(artifact)))
        }
        Err(ModelLoadError::NotFound(path)) => {
            log::info!(
                "classifier: no artifact at {}, using heuristic fallback",
                path.display()
            );
            Arc::new(HeuristicClassifier::new())
        }
        Err(e) => {
            log::error!("classifier: {e}; using heuristic fallback");
            Arc::new(HeuristicClassifier::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_artifact_selects_fallback() {
        let dir = tempdir().unwrap();
        let cfg = ClassifierConfig {
            model_path: dir.path().join("model.json"),
        };
        assert!(load_classifier(&cfg).is_fallback());
    }

    #[test]
    fn malformed_artifact_selects_fallback() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, "not a model").unwrap();
        let cfg = ClassifierConfig { model_path: path };
        assert!(load_classifier(&cfg).is_fallback());
    }

    #[test]
    fn valid_artifact_selects_model() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, r#"{"kind":"logistic","weights":[0,0,0,0],"intercept":0}"#)
            .unwrap();
        let cfg = ClassifierConfig { model_path: path };
        assert!(!load_classifier(&cfg).is_fallback());
    }
}
