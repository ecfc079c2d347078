//! Heuristic fallback classifier.
//!
//! [`HeuristicClassifier`] returns one constant, documented prediction.  It is
//! used when no artifact is configured and whenever any stage of the
//! model-backed path fails.  It makes no attempt to be accurate.
//!
//! | Field                 | Value                                              |
//! |-----------------------|----------------------------------------------------|
//! | `risk_level`          | `Medium`                                           |
//! | `probability`         | `0.48`                                             |
//! | `feature_importances` | `speech_rate 0.18 positive`, `memory_score 0.12 negative` |
//! | `recommendations`     | share with a clinician; memory reinforcement       |

use crate::features::FeatureBundle;
use crate::prediction::{Direction, FeatureImportance, RiskLevel, ScoredRisk};

use super::{InferenceError, RiskClassifier};

/// Probability reported by the fallback.
pub const FALLBACK_PROBABILITY: f64 = 0.48;

pub const FALLBACK_RECOMMENDATIONS: [&str; 2] = [
    "Share results with a clinician",
    "Engage in memory reinforcement activities",
];

/// The fixed importance pair reported whenever no model-derived signal exists.
pub fn fallback_importances() -> Vec<FeatureImportance> {
    vec![
        FeatureImportance::new("speech_rate", 0.18, Direction::Positive),
        FeatureImportance::new("memory_score", 0.12, Direction::Negative),
    ]
}

/// Constant-output classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicClassifier;

impl HeuristicClassifier {
    pub fn new() -> Self {
        Self
    }

    /// The fallback contract, independent of any input.
    pub fn prediction(&self) -> ScoredRisk {
        ScoredRisk {
            risk_level: RiskLevel::Medium,
            probability: FALLBACK_PROBABILITY,
            feature_importances: fallback_importances(),
            recommendations: FALLBACK_RECOMMENDATIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl RiskClassifier for HeuristicClassifier {
    /// Never returns `Err(_)`.
    fn classify(&self, _features: &FeatureBundle) -> Result<ScoredRisk, InferenceError> {
        Ok(self.prediction())
    }

    fn is_fallback(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn bundle(tabular: [f64; 4]) -> FeatureBundle {
        FeatureBundle {
            audio: BTreeMap::new(),
            speech_embedding: vec![0.0; 768],
            tabular,
        }
    }

    #[test]
    fn contract_holds() {
        let p = HeuristicClassifier::new().prediction();
        assert_eq!(p.risk_level, RiskLevel::Medium);
        assert!((0.48..=0.55).contains(&p.probability));
        assert_eq!(p.feature_importances.len(), 2);
        assert_eq!(p.recommendations.len(), 2);
        assert_eq!(p.feature_importances[0].feature, "speech_rate");
        assert_eq!(p.feature_importances[1].direction, Direction::Negative);
    }

    #[test]
    fn output_ignores_input() {
        let c = HeuristicClassifier::new();
        let a = c.classify(&bundle([0.0; 4])).unwrap();
        let b = c.classify(&bundle([1.0, 0.2, 0.9, 0.4])).unwrap();
        assert_eq!(a, b);
        assert!(c.is_fallback());
    }

    #[test]
    fn level_agrees_with_thresholds() {
        let p = HeuristicClassifier::new().prediction();
        assert_eq!(RiskLevel::from_probability(p.probability), p.risk_level);
    }
}
