//! Risk prediction value types.
//!
//! [`RiskPrediction`] is the single persisted output of the pipeline.  Its
//! serialised field names and value domains are the external contract:
//!
//! | Field                 | Domain                                  |
//! |-----------------------|-----------------------------------------|
//! | `risk_level`          | `"Low"` / `"Medium"` / `"High"`         |
//! | `probability`         | `[0.0, 1.0]`                            |
//! | `feature_importances` | ordered `{feature, contribution, direction}` |
//! | `recommendations`     | ordered strings                         |
//! | `generated_at`        | UTC timestamp                           |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::features::CognitiveScores;

// ---------------------------------------------------------------------------
// RiskLevel
// ---------------------------------------------------------------------------

/// Upper bound (exclusive) of the `Low` band.
pub const LOW_UPPER: f64 = 0.33;
/// Upper bound (exclusive) of the `Medium` band.
pub const MEDIUM_UPPER: f64 = 0.66;

/// Discrete risk band derived from a probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Map a probability onto its band.
    ///
    /// ```
    /// use cogai_risk::prediction::RiskLevel;
    ///
    /// assert_eq!(RiskLevel::from_probability(0.329), RiskLevel::Low);
    /// assert_eq!(RiskLevel::from_probability(0.33), RiskLevel::Medium);
    /// assert_eq!(RiskLevel::from_probability(0.66), RiskLevel::High);
    /// ```
    pub fn from_probability(probability: f64) -> Self {
        if probability < LOW_UPPER {
            RiskLevel::Low
        } else if probability < MEDIUM_UPPER {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clamp `p` into `[0, 1]`.
pub fn clamp_probability(p: f64) -> f64 {
    p.clamp(0.0, 1.0)
}

// ---------------------------------------------------------------------------
// FeatureImportance
// ---------------------------------------------------------------------------

/// Whether a feature pushes the risk up or down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Positive,
    Negative,
}

/// One entry of the explainability breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub contribution: f64,
    pub direction: Direction,
}

impl FeatureImportance {
    pub fn new(feature: impl Into<String>, contribution: f64, direction: Direction) -> Self {
        Self {
            feature: feature.into(),
            contribution,
            direction,
        }
    }
}

// ---------------------------------------------------------------------------
// RiskPrediction
// ---------------------------------------------------------------------------

/// Classifier output before it is stamped with a generation time.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRisk {
    pub risk_level: RiskLevel,
    pub probability: f64,
    pub feature_importances: Vec<FeatureImportance>,
    pub recommendations: Vec<String>,
}

impl ScoredRisk {
    /// Stamp the result with `generated_at` to produce the persisted record.
    pub fn into_prediction(self, generated_at: DateTime<Utc>) -> RiskPrediction {
        RiskPrediction {
            risk_level: self.risk_level,
            probability: self.probability,
            feature_importances: self.feature_importances,
            recommendations: self.recommendations,
            generated_at,
        }
    }
}

/// The persisted, immutable result for one assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskPrediction {
    pub risk_level: RiskLevel,
    pub probability: f64,
    pub feature_importances: Vec<FeatureImportance>,
    pub recommendations: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// RiskReport
// ---------------------------------------------------------------------------

/// Render-ready view combining a prediction with the assessment's sub-scores.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskReport {
    pub assessment_id: String,
    pub risk_level: RiskLevel,
    pub probability: f64,
    pub feature_importances: Vec<FeatureImportance>,
    pub sub_scores: SubScores,
    pub recommendations: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

/// Sub-scores with missing values resolved to `0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SubScores {
    pub memory_score: f64,
    pub attention_score: f64,
    pub language_score: f64,
    pub executive_score: f64,
}

impl RiskReport {
    pub fn assemble(
        assessment_id: impl Into<String>,
        scores: &CognitiveScores,
        prediction: &RiskPrediction,
    ) -> Self {
        Self {
            assessment_id: assessment_id.into(),
            risk_level: prediction.risk_level,
            probability: prediction.probability,
            feature_importances: prediction.feature_importances.clone(),
            sub_scores: SubScores {
                memory_score: scores.memory_score.unwrap_or(0.0),
                attention_score: scores.attention_score.unwrap_or(0.0),
                language_score: scores.language_score.unwrap_or(0.0),
                executive_score: scores.executive_score.unwrap_or(0.0),
            },
            recommendations: prediction.recommendations.clone(),
            generated_at: prediction.generated_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_are_half_open() {
        assert_eq!(RiskLevel::from_probability(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_probability(0.3299), RiskLevel::Low);
        assert_eq!(RiskLevel::from_probability(0.33), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_probability(0.6599), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_probability(0.66), RiskLevel::High);
        assert_eq!(RiskLevel::from_probability(1.0), RiskLevel::High);
    }

    #[test]
    fn clamp_bounds_probability() {
        assert_eq!(clamp_probability(-0.2), 0.0);
        assert_eq!(clamp_probability(1.7), 1.0);
        assert_eq!(clamp_probability(0.42), 0.42);
    }

    #[test]
    fn prediction_serialises_with_contract_field_names() {
        let pred = ScoredRisk {
            risk_level: RiskLevel::Medium,
            probability: 0.5,
            feature_importances: vec![FeatureImportance::new(
                "memory_score",
                0.12,
                Direction::Negative,
            )],
            recommendations: vec!["x".into()],
        }
        .into_prediction(Utc::now());

        let json = serde_json::to_value(&pred).unwrap();
        assert_eq!(json["risk_level"], "Medium");
        assert_eq!(json["feature_importances"][0]["feature"], "memory_score");
        assert_eq!(json["feature_importances"][0]["direction"], "negative");
        assert!(json.get("generated_at").is_some());
        assert!(json.get("recommendations").is_some());
    }

    #[test]
    fn report_resolves_missing_sub_scores() {
        let scores = CognitiveScores {
            memory_score: Some(0.8),
            attention_score: None,
            language_score: Some(0.6),
            executive_score: None,
        };
        let pred = ScoredRisk {
            risk_level: RiskLevel::High,
            probability: 0.7,
            feature_importances: Vec::new(),
            recommendations: Vec::new(),
        }
        .into_prediction(Utc::now());

        let report = RiskReport::assemble("a-1", &scores, &pred);
        assert_eq!(report.assessment_id, "a-1");
        assert_eq!(report.sub_scores.memory_score, 0.8);
        assert_eq!(report.sub_scores.attention_score, 0.0);
        assert_eq!(report.sub_scores.executive_score, 0.0);
        assert_eq!(report.generated_at, pred.generated_at);
    }
}
