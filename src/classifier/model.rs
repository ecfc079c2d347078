//! Classifier backed by a loaded [`TabularModel`].

use std::sync::Arc;

use crate::features::{FeatureBundle, TABULAR_FIELDS};
use crate::prediction::{
    clamp_probability, Direction, FeatureImportance, RiskLevel, ScoredRisk,
};

use super::fallback::fallback_importances;
use super::{InferenceError, RiskClassifier, Score, TabularModel};

pub const MODEL_RECOMMENDATIONS: [&str; 3] = [
    "Share results with a clinician",
    "Maintain routine cognitive activities",
    "Follow up screening in 3 months",
];

/// Scores the tabular vector with a shared model.
///
/// Errors from the model propagate to the caller; the orchestrator converts
/// them into the heuristic fallback for that invocation only.
#[derive(Clone)]
pub struct ModelBackedClassifier {
    model: Arc<dyn TabularModel>,
}

impl std::fmt::Debug for ModelBackedClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBackedClassifier").finish_non_exhaustive()
    }
}

impl ModelBackedClassifier {
    pub fn new(model: Arc<dyn TabularModel>) -> Self {
        Self { model }
    }
}

impl RiskClassifier for ModelBackedClassifier {
    fn classify(&self, features: &FeatureBundle) -> Result<ScoredRisk, InferenceError> {
        let raw = match self.model.score(&features.tabular)? {
            Score::Probability(p) | Score::Raw(p) => p,
        };
        if !raw.is_finite() {
            return Err(InferenceError::NonFinite(raw));
        }
        let probability = clamp_probability(raw);

        let feature_importances = match self.model.importances() {
            Some(values) => normalize_importances(&values)?,
            None => fallback_importances(),
        };

        log::debug!(
            "classifier: probability={probability:.3} from {} importances",
            feature_importances.len()
        );

        Ok(ScoredRisk {
            risk_level: RiskLevel::from_probability(probability),
            probability,
            feature_importances,
            recommendations: MODEL_RECOMMENDATIONS.iter().map(|s| s.to_string()).collect(),
        })
    }
}

/// Label raw importances with [`TABULAR_FIELDS`] and scale them so the
/// absolute contributions sum to one.
///
/// Negative values are reported with [`Direction::Negative`].  An all-zero
/// vector divides by `1.0` and so stays all zero.
///
/// ```
/// use cogai_risk::classifier::normalize_importances;
///
/// let imp = normalize_importances(&[2.0, -1.0, 1.0, 0.0]).unwrap();
/// assert_eq!(imp[0].contribution, 0.5);
/// assert_eq!(imp[1].contribution, 0.25);
/// ```
pub fn normalize_importances(values: &[f64]) -> Result<Vec<FeatureImportance>, InferenceError> {
    if values.len() != TABULAR_FIELDS.len() {
        return Err(InferenceError::ShapeMismatch {
            expected: TABULAR_FIELDS.len(),
            got: values.len(),
        });
    }
    if let Some(bad) = values.iter().copied().find(|v| !v.is_finite()) {
        return Err(InferenceError::NonFinite(bad));
    }

    let total = match values.iter().map(|v| v.abs()).sum::<f64>() {
        t if t > 0.0 => t,
        _ => 1.0,
    };

    Ok(TABULAR_FIELDS
        .iter()
        .zip(values)
        .map(|(name, &v)| {
            let direction = if v < 0.0 {
                Direction::Negative
            } else {
                Direction::Positive
            };
            FeatureImportance::new(*name, v.abs() / total, direction)
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ArtifactKind, LinearArtifact};
    use std::collections::BTreeMap;

    struct FixedModel {
        score: Score,
        importances: Option<Vec<f64>>,
    }

    impl TabularModel for FixedModel {
        fn score(&self, _features: &[f64]) -> Result<Score, InferenceError> {
            Ok(self.score)
        }

        fn importances(&self) -> Option<Vec<f64>> {
            self.importances.clone()
        }
    }

    fn bundle(tabular: [f64; 4]) -> FeatureBundle {
        FeatureBundle {
            audio: BTreeMap::new(),
            speech_embedding: vec![0.0; 768],
            tabular,
        }
    }

    fn classifier(score: Score, importances: Option<Vec<f64>>) -> ModelBackedClassifier {
        ModelBackedClassifier::new(Arc::new(FixedModel { score, importances }))
    }

    #[test]
    fn probability_maps_to_level() {
        let r = classifier(Score::Probability(0.7), None)
            .classify(&bundle([0.0; 4]))
            .unwrap();
        assert_eq!(r.risk_level, RiskLevel::High);
        assert_eq!(r.probability, 0.7);
        assert_eq!(r.recommendations.len(), 3);
        assert!(!classifier(Score::Probability(0.7), None).is_fallback());
    }

    #[test]
    fn raw_scores_are_clamped() {
        let hi = classifier(Score::Raw(3.5), None).classify(&bundle([0.0; 4])).unwrap();
        let lo = classifier(Score::Raw(-1.0), None).classify(&bundle([0.0; 4])).unwrap();
        assert_eq!(hi.probability, 1.0);
        assert_eq!(hi.risk_level, RiskLevel::High);
        assert_eq!(lo.probability, 0.0);
        assert_eq!(lo.risk_level, RiskLevel::Low);
    }

    #[test]
    fn non_finite_score_is_error() {
        let r = classifier(Score::Raw(f64::NAN), None).classify(&bundle([0.0; 4]));
        assert!(matches!(r, Err(InferenceError::NonFinite(_))));
    }

    #[test]
    fn missing_importances_use_fixed_pair() {
        let r = classifier(Score::Probability(0.2), None)
            .classify(&bundle([0.0; 4]))
            .unwrap();
        assert_eq!(r.feature_importances, fallback_importances());
    }

    #[test]
    fn importances_are_normalised_and_labelled() {
        let r = classifier(Score::Probability(0.5), Some(vec![0.4, 0.2, 0.3, 0.1]))
            .classify(&bundle([0.0; 4]))
            .unwrap();
        let total: f64 = r.feature_importances.iter().map(|i| i.contribution.abs()).sum();
        assert!((total - 1.0).abs() < 1e-9);
        let names: Vec<&str> = r.feature_importances.iter().map(|i| i.feature.as_str()).collect();
        assert_eq!(names, TABULAR_FIELDS.to_vec());
        assert!(r
            .feature_importances
            .iter()
            .all(|i| i.direction == Direction::Positive));
    }

    #[test]
    fn signed_importances_report_direction() {
        let imp = normalize_importances(&[-3.0, 1.0, 0.0, 0.0]).unwrap();
        assert_eq!(imp[0].direction, Direction::Negative);
        assert!((imp[0].contribution - 0.75).abs() < 1e-12);
        assert_eq!(imp[1].direction, Direction::Positive);
        let total: f64 = imp.iter().map(|i| i.contribution.abs()).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn all_zero_importances_stay_zero() {
        let imp = normalize_importances(&[0.0; 4]).unwrap();
        assert!(imp.iter().all(|i| i.contribution == 0.0));
    }

    #[test]
    fn wrong_importance_length_is_error() {
        let r = classifier(Score::Probability(0.5), Some(vec![1.0, 2.0]))
            .classify(&bundle([0.0; 4]));
        assert!(matches!(
            r,
            Err(InferenceError::ShapeMismatch {
                expected: 4,
                got: 2
            })
        ));
    }

    #[test]
    fn linear_artifact_end_to_end() {
        // High sub-scores, negative weights: low risk.
        let artifact = LinearArtifact {
            kind: ArtifactKind::Logistic,
            weights: vec![-2.0, -2.0, -2.0, -2.0],
            intercept: 2.0,
            feature_importances: Some(vec![0.4, 0.3, 0.2, 0.1]),
        };
        let c = ModelBackedClassifier::new(Arc::new(artifact));
        let r = c.classify(&bundle([0.9, 0.9, 0.9, 0.9])).unwrap();
        assert!(r.probability < 0.33);
        assert_eq!(r.risk_level, RiskLevel::Low);
        assert!((r.feature_importances[0].contribution - 0.4).abs() < 1e-9);
    }
}
