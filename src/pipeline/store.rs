//! Persistence boundary for predictions.
//!
//! The store is the only collaborator whose failures escape the pipeline.
//! Implementations must make `insert` atomic per assessment id: a second
//! insert for the same id reports [`InsertOutcome::Duplicate`] and leaves the
//! existing row untouched.

use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

use crate::prediction::RiskPrediction;

/// Failure talking to the backing store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("prediction store unavailable: {0}")]
    Unavailable(String),

    #[error("prediction store lock poisoned")]
    Poisoned,
}

/// Result of [`PredictionStore::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A prediction already existed for this id; nothing was written.
    Duplicate,
}

pub trait PredictionStore: Send + Sync {
    fn get(&self, assessment_id: &str) -> Result<Option<RiskPrediction>, StoreError>;

    fn insert(
        &self,
        assessment_id: &str,
        prediction: &RiskPrediction,
    ) -> Result<InsertOutcome, StoreError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn PredictionStore>) {}
};

// ---------------------------------------------------------------------------
// InMemoryPredictionStore
// ---------------------------------------------------------------------------

/// Process-local store, keyed by assessment id.
#[derive(Debug, Default)]
pub struct InMemoryPredictionStore {
    rows: RwLock<HashMap<String, RiskPrediction>>,
}

impl InMemoryPredictionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PredictionStore for InMemoryPredictionStore {
    fn get(&self, assessment_id: &str) -> Result<Option<RiskPrediction>, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::Poisoned)?;
        Ok(rows.get(assessment_id).cloned())
    }

    fn insert(
        &self,
        assessment_id: &str,
        prediction: &RiskPrediction,
    ) -> Result<InsertOutcome, StoreError> {
        let mut rows = self.rows.write().map_err(|_| StoreError::Poisoned)?;
        if rows.contains_key(assessment_id) {
            return Ok(InsertOutcome::Duplicate);
        }
        rows.insert(assessment_id.to_string(), prediction.clone());
        Ok(InsertOutcome::Inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prediction::{RiskLevel, ScoredRisk};
    use chrono::Utc;

    fn prediction(p: f64) -> RiskPrediction {
        ScoredRisk {
            risk_level: RiskLevel::from_probability(p),
            probability: p,
            feature_importances: Vec::new(),
            recommendations: Vec::new(),
        }
        .into_prediction(Utc::now())
    }

    #[test]
    fn insert_then_get() {
        let store = InMemoryPredictionStore::new();
        assert!(store.get("a").unwrap().is_none());

        let p = prediction(0.2);
        assert_eq!(store.insert("a", &p).unwrap(), InsertOutcome::Inserted);
        assert_eq!(store.get("a").unwrap(), Some(p));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn second_insert_is_duplicate_and_keeps_first_row() {
        let store = InMemoryPredictionStore::new();
        let first = prediction(0.2);
        store.insert("a", &first).unwrap();

        assert_eq!(
            store.insert("a", &prediction(0.9)).unwrap(),
            InsertOutcome::Duplicate
        );
        assert_eq!(store.get("a").unwrap(), Some(first));
    }
}
