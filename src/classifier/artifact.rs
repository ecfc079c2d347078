//! Serialised tabular model artifacts.
//!
//! An artifact is a JSON file describing a linear model over the tabular
//! vector:
//!
//! ```json
//! {
//!   "kind": "logistic",
//!   "weights": [-1.2, -0.8, -0.6, -0.9],
//!   "intercept": 2.1,
//!   "feature_importances": [0.4, 0.2, 0.15, 0.25]
//! }
//! ```
//!
//! * `logistic` yields a probability (`sigmoid(w·x + b)`).
//! * `regressor` yields a raw score (`w·x + b`) that the classifier clamps.
//! * `feature_importances` is optional; without it the model offers no
//!   explanation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{InferenceError, Score, TabularModel};

// ---------------------------------------------------------------------------
// ModelLoadError
// ---------------------------------------------------------------------------

/// Why an artifact could not be loaded.
#[derive(Debug, Clone, Error)]
pub enum ModelLoadError {
    #[error("classifier artifact not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("cannot read classifier artifact {}: {reason}", .path.display())]
    Io { path: PathBuf, reason: String },

    #[error("malformed classifier artifact: {0}")]
    Parse(String),
}

// ---------------------------------------------------------------------------
// LinearArtifact
// ---------------------------------------------------------------------------

/// Output semantics of a [`LinearArtifact`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Logistic,
    Regressor,
}

/// Linear model over the tabular features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearArtifact {
    pub kind: ArtifactKind,
    pub weights: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
    #[serde(default)]
    pub feature_importances: Option<Vec<f64>>,
}

impl LinearArtifact {
    /// Read and parse an artifact file.
    pub fn load(path: &Path) -> Result<Self, ModelLoadError> {
        if !path.exists() {
            return Err(ModelLoadError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|e| ModelLoadError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ModelLoadError> {
        serde_json::from_str(content).map_err(|e| ModelLoadError::Parse(e.to_string()))
    }
}

impl TabularModel for LinearArtifact {
    fn score(&self, features: &[f64]) -> Result<Score, InferenceError> {
        if features.len() != self.weights.len() {
            return Err(InferenceError::ShapeMismatch {
                expected: self.weights.len(),
                got: features.len(),
            });
        }

        let z = self.intercept
            + self
                .weights
                .iter()
                .zip(features)
                .map(|(w, x)| w * x)
                .sum::<f64>();

        Ok(match self.kind {
            ArtifactKind::Logistic => Score::Probability(1.0 / (1.0 + (-z).exp())),
            ArtifactKind::Regressor => Score::Raw(z),
        })
    }

    fn importances(&self) -> Option<Vec<f64>> {
        self.feature_importances.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn logistic_scores_probability() {
        let a = LinearArtifact {
            kind: ArtifactKind::Logistic,
            weights: vec![0.0; 4],
            intercept: 0.0,
            feature_importances: None,
        };
        match a.score(&[0.8, 0.7, 0.6, 0.5]).unwrap() {
            Score::Probability(p) => assert!((p - 0.5).abs() < 1e-12),
            other => panic!("expected probability, got {other:?}"),
        }
        assert!(a.importances().is_none());
    }

    #[test]
    fn regressor_scores_raw() {
        let a = LinearArtifact::from_json(
            r#"{"kind":"regressor","weights":[1,1,1,1],"intercept":-1.0}"#,
        )
        .unwrap();
        match a.score(&[0.5, 0.5, 0.5, 0.5]).unwrap() {
            Score::Raw(r) => assert!((r - 1.0).abs() < 1e-12),
            other => panic!("expected raw, got {other:?}"),
        }
    }

    #[test]
    fn shape_mismatch_is_inference_error() {
        let a = LinearArtifact::from_json(r#"{"kind":"logistic","weights":[1,2,3]}"#).unwrap();
        assert!(matches!(
            a.score(&[0.0; 4]),
            Err(InferenceError::ShapeMismatch {
                expected: 3,
                got: 4
            })
        ));
    }

    #[test]
    fn load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(
            &path,
            r#"{"kind":"logistic","weights":[1,0,0,0],"intercept":0,"feature_importances":[1,2,3,4]}"#,
        )
        .unwrap();

        let a = LinearArtifact::load(&path).unwrap();
        assert_eq!(a.kind, ArtifactKind::Logistic);
        assert_eq!(a.importances(), Some(vec![1.0, 2.0, 3.0, 4.0]));
    }

    #[test]
    fn missing_and_malformed_files() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            LinearArtifact::load(&dir.path().join("absent.json")),
            Err(ModelLoadError::NotFound(_))
        ));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{ not json").unwrap();
        assert!(matches!(
            LinearArtifact::load(&bad),
            Err(ModelLoadError::Parse(_))
        ));
    }
}
