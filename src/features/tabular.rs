//! Cognitive sub-scores → fixed-order numeric vector.
//!
//! The field order in [`TABULAR_FIELDS`] is the contract every classifier
//! artifact is trained against; reordering it breaks persisted models.

use serde::{Deserialize, Serialize};

/// Canonical order of the tabular features.
pub const TABULAR_FIELDS: [&str; 4] = [
    "memory_score",
    "attention_score",
    "language_score",
    "executive_score",
];

/// The four cognitive sub-scores of an assessment; any may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CognitiveScores {
    #[serde(default)]
    pub memory_score: Option<f64>,
    #[serde(default)]
    pub attention_score: Option<f64>,
    #[serde(default)]
    pub language_score: Option<f64>,
    #[serde(default)]
    pub executive_score: Option<f64>,
}

impl CognitiveScores {
    pub fn new(memory: f64, attention: f64, language: f64, executive: f64) -> Self {
        Self {
            memory_score: Some(memory),
            attention_score: Some(attention),
            language_score: Some(language),
            executive_score: Some(executive),
        }
    }
}

/// Emit the scores in [`TABULAR_FIELDS`] order, `0.0` for missing values.
///
/// ```
/// use cogai_risk::features::{tabular_vector, CognitiveScores};
///
/// let scores = CognitiveScores { memory_score: Some(0.8), ..Default::default() };
/// assert_eq!(tabular_vector(&scores), [0.8, 0.0, 0.0, 0.0]);
/// ```
pub fn tabular_vector(scores: &CognitiveScores) -> [f64; 4] {
    [
        scores.memory_score.unwrap_or(0.0),
        scores.attention_score.unwrap_or(0.0),
        scores.language_score.unwrap_or(0.0),
        scores.executive_score.unwrap_or(0.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_follows_field_list() {
        let v = tabular_vector(&CognitiveScores::new(0.8, 0.7, 0.6, 0.5));
        assert_eq!(v, [0.8, 0.7, 0.6, 0.5]);
        assert_eq!(TABULAR_FIELDS[0], "memory_score");
        assert_eq!(TABULAR_FIELDS[3], "executive_score");
    }

    #[test]
    fn missing_scores_default_to_zero() {
        let v = tabular_vector(&CognitiveScores::default());
        assert_eq!(v, [0.0; 4]);
    }

    #[test]
    fn deserialises_with_absent_fields() {
        let s: CognitiveScores = serde_json::from_str(r#"{"language_score": 0.4}"#).unwrap();
        assert_eq!(tabular_vector(&s), [0.0, 0.0, 0.4, 0.0]);
    }
}
