//! Prediction orchestrator: assessment + audio samples → one persisted
//! [`RiskPrediction`].
//!
//! # Flow
//!
//! ```text
//! predict(assessment, samples)
//!   └─▶ per-assessment lock
//!         ├─ store.get(id) = Some  → return stored row          [cache hit]
//!         └─ None
//!              ├─ for each sample: decode → acoustic → embed
//!              ├─ aggregate embeddings, tabular vector
//!              ├─ classify
//!              │    └─ any StageError → heuristic fallback     [fallback]
//!              └─ store.insert(id)
//!                   ├─ Inserted  → return new row
//!                   └─ Duplicate → re-read and return stored row
//! ```
//!
//! Stage failures never reach the caller.  [`StoreError`] is the only error
//! [`PredictionService::predict`] returns.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::{AudioDecoder, AudioSample, DecodeError};
use crate::classifier::{load_classifier, HeuristicClassifier, InferenceError, RiskClassifier};
use crate::config::{AppConfig, CANONICAL_SAMPLE_RATE};
use crate::features::{
    aggregate_embeddings, load_embedder, tabular_vector, AcousticFeatureExtractor,
    AcousticFeatures, CognitiveScores, EmbeddingError, ExtractionError, FeatureBundle,
    SpeechEmbedder,
};
use crate::prediction::{RiskPrediction, RiskReport, ScoredRisk};

use super::health::PipelineHealth;
use super::store::{InsertOutcome, PredictionStore, StoreError};

/// Log target for fallback activations.
pub const FALLBACK_TARGET: &str = "cogai_risk::fallback";

// ---------------------------------------------------------------------------
// Assessment
// ---------------------------------------------------------------------------

/// The caller-supplied record a prediction is computed for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub id: String,
    #[serde(flatten)]
    pub scores: CognitiveScores,
}

impl Assessment {
    pub fn new(id: impl Into<String>, scores: CognitiveScores) -> Self {
        Self {
            id: id.into(),
            scores,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A failure in one pipeline stage.  Always absorbed into the fallback.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("sample {task_id}: {source}")]
    Decode {
        task_id: String,
        #[source]
        source: DecodeError,
    },

    #[error("sample {task_id}: {source}")]
    Extraction {
        task_id: String,
        #[source]
        source: ExtractionError,
    },

    #[error("sample {task_id}: {source}")]
    Embedding {
        task_id: String,
        #[source]
        source: EmbeddingError,
    },

    #[error("embedding aggregation: {0}")]
    Aggregation(#[source] ExtractionError),

    #[error("classifier model unavailable")]
    ModelUnavailable,

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error("time budget of {budget:?} exceeded after {elapsed:?}")]
    TimeBudgetExceeded { budget: Duration, elapsed: Duration },
}

impl StageError {
    /// Short stage name used in fallback log events.
    pub fn stage(&self) -> &'static str {
        match self {
            StageError::Decode { .. } => "decode",
            StageError::Extraction { .. } => "acoustic",
            StageError::Embedding { .. } => "embedding",
            StageError::Aggregation(_) => "aggregate",
            StageError::ModelUnavailable | StageError::Inference(_) => "classify",
            StageError::TimeBudgetExceeded { .. } => "budget",
        }
    }

    /// Whether skipping the offending sample is a sensible recovery.
    fn is_sample_local(&self) -> bool {
        match self {
            StageError::Decode { .. } | StageError::Extraction { .. } => true,
            StageError::Embedding { source, .. } => {
                !matches!(source, EmbeddingError::ModelUnavailable(_))
            }
            _ => false,
        }
    }
}

/// Errors from [`PredictionService::predict_async`].
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The blocking task panicked or was cancelled.
    #[error("internal error: {0}")]
    Internal(String),
}

// ---------------------------------------------------------------------------
// PredictionService
// ---------------------------------------------------------------------------

/// Everything needed to turn assessments into predictions.
///
/// Built once at startup and shared behind an `Arc`.  Models are loaded in
/// [`from_config`](Self::from_config) and never reloaded.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use cogai_risk::config::AppConfig;
/// use cogai_risk::features::CognitiveScores;
/// use cogai_risk::pipeline::{Assessment, InMemoryPredictionStore, PredictionService};
///
/// let config = AppConfig::load().unwrap_or_default();
/// let service = PredictionService::from_config(&config, Arc::new(InMemoryPredictionStore::new()))
///     .expect("valid audio config");
///
/// let assessment = Assessment::new("a-1", CognitiveScores::new(0.8, 0.7, 0.6, 0.5));
/// let prediction = service.predict(&assessment, &[]).expect("store available");
/// println!("{} ({:.2})", prediction.risk_level, prediction.probability);
/// ```
pub struct PredictionService {
    decoder: AudioDecoder,
    extractor: AcousticFeatureExtractor,
    embedder: Arc<dyn SpeechEmbedder>,
    classifier: Arc<dyn RiskClassifier>,
    fallback: HeuristicClassifier,
    store: Arc<dyn PredictionStore>,
    health: PipelineHealth,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    time_budget: Option<Duration>,
    isolate_sample_failures: bool,
}

impl std::fmt::Debug for PredictionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictionService")
            .field("decoder", &self.decoder)
            .field("time_budget", &self.time_budget)
            .field("isolate_sample_failures", &self.isolate_sample_failures)
            .finish_non_exhaustive()
    }
}

impl PredictionService {
    /// Assemble a service from already-built collaborators.
    ///
    /// `config.audio.sample_rate` must be [`CANONICAL_SAMPLE_RATE`]; the
    /// embedding encoder and the acoustic statistics are only defined there.
    pub fn new(
        config: &AppConfig,
        embedder: Arc<dyn SpeechEmbedder>,
        classifier: Arc<dyn RiskClassifier>,
        store: Arc<dyn PredictionStore>,
    ) -> Result<Self, ExtractionError> {
        if config.audio.sample_rate != CANONICAL_SAMPLE_RATE {
            return Err(ExtractionError::InvalidConfig(format!(
                "sample_rate={} (only {CANONICAL_SAMPLE_RATE} Hz is supported)",
                config.audio.sample_rate
            )));
        }
        Ok(Self {
            decoder: AudioDecoder::new(config.audio.sample_rate),
            extractor: AcousticFeatureExtractor::new(&config.audio)?,
            embedder,
            classifier,
            fallback: HeuristicClassifier::new(),
            store,
            health: PipelineHealth::new(),
            locks: Mutex::new(HashMap::new()),
            time_budget: match config.pipeline.time_budget_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            isolate_sample_failures: config.pipeline.isolate_sample_failures,
        })
    }

    /// Load the embedding model and classifier artifact named by `config`.
    ///
    /// Missing models are not an error here; they select the fallback path.
    pub fn from_config(
        config: &AppConfig,
        store: Arc<dyn PredictionStore>,
    ) -> Result<Self, ExtractionError> {
        let embedder = load_embedder(&config.embedding);
        let classifier = load_classifier(&config.classifier);
        log::info!(
            "pipeline: ready (embedding dim {}, classifier {})",
            embedder.dimension(),
            if classifier.is_fallback() { "heuristic" } else { "model" }
        );
        Self::new(config, embedder, classifier, store)
    }

    pub fn health(&self) -> &PipelineHealth {
        &self.health
    }

    /// Return the prediction for `assessment`, computing and persisting it on
    /// first call.
    ///
    /// Calls for the same assessment id are serialised.  Later calls return
    /// the stored row unchanged, including its `generated_at`.
    pub fn predict(
        &self,
        assessment: &Assessment,
        samples: &[AudioSample],
    ) -> Result<RiskPrediction, StoreError> {
        self.health.record_invocation();

        let lock = self.lock_for(&assessment.id);
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.predict_locked(assessment, samples)
        };
        drop(lock);
        self.release_lock(&assessment.id);

        result
    }

    /// [`predict`](Self::predict) on tokio's blocking pool.
    pub async fn predict_async(
        self: &Arc<Self>,
        assessment: Assessment,
        samples: Vec<AudioSample>,
    ) -> Result<RiskPrediction, PipelineError> {
        let service = Arc::clone(self);
        tokio::task::spawn_blocking(move || service.predict(&assessment, &samples))
            .await
            .map_err(|e| PipelineError::Internal(format!("prediction task failed: {e}")))?
            .map_err(PipelineError::from)
    }

    /// Predict and combine the result with the assessment's sub-scores.
    pub fn report(
        &self,
        assessment: &Assessment,
        samples: &[AudioSample],
    ) -> Result<RiskReport, StoreError> {
        let prediction = self.predict(assessment, samples)?;
        Ok(RiskReport::assemble(
            assessment.id.clone(),
            &assessment.scores,
            &prediction,
        ))
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn predict_locked(
        &self,
        assessment: &Assessment,
        samples: &[AudioSample],
    ) -> Result<RiskPrediction, StoreError> {
        if let Some(existing) = self.store.get(&assessment.id)? {
            self.health.record_cache_hit();
            log::debug!("pipeline: {} already predicted", assessment.id);
            return Ok(existing);
        }

        let scored = match self.compute(assessment, samples) {
            Ok(scored) => scored,
            Err(e) => {
                self.health.record_fallback();
                log::warn!(
                    target: FALLBACK_TARGET,
                    "assessment {}: stage={} error={e}",
                    assessment.id,
                    e.stage()
                );
                self.fallback.prediction()
            }
        };

        let prediction = scored.into_prediction(Utc::now());
        match self.store.insert(&assessment.id, &prediction)? {
            InsertOutcome::Inserted => {
                log::info!(
                    "pipeline: {} → {} ({:.3})",
                    assessment.id,
                    prediction.risk_level,
                    prediction.probability
                );
                Ok(prediction)
            }
            InsertOutcome::Duplicate => {
                log::debug!(
                    "pipeline: {} inserted concurrently, returning stored row",
                    assessment.id
                );
                self.store.get(&assessment.id)?.ok_or_else(|| {
                    StoreError::Unavailable(format!(
                        "duplicate reported for {} but no row found",
                        assessment.id
                    ))
                })
            }
        }
    }

    fn compute(
        &self,
        assessment: &Assessment,
        samples: &[AudioSample],
    ) -> Result<ScoredRisk, StageError> {
        let started = Instant::now();
        let mut audio: BTreeMap<String, AcousticFeatures> = BTreeMap::new();
        let mut embeddings = Vec::with_capacity(samples.len());

        for sample in samples {
            match self.process_sample(sample) {
                Ok((features, embedding)) => {
                    audio.insert(sample.task_id.clone(), features);
                    embeddings.push(embedding);
                }
                Err(e) if self.isolate_sample_failures && e.is_sample_local() => {
                    log::warn!("pipeline: {}: skipping {e}", assessment.id);
                }
                Err(e) => return Err(e),
            }
            self.check_budget(started)?;
        }

        let speech_embedding = aggregate_embeddings(&embeddings, self.embedder.dimension())
            .map_err(StageError::Aggregation)?;
        let features = FeatureBundle {
            audio,
            speech_embedding,
            tabular: tabular_vector(&assessment.scores),
        };
        log::debug!(
            "pipeline: {}: {} of {} samples featurised",
            assessment.id,
            features.audio.len(),
            samples.len()
        );

        if self.classifier.is_fallback() {
            return Err(StageError::ModelUnavailable);
        }
        self.check_budget(started)?;

        Ok(self.classifier.classify(&features)?)
    }

    fn process_sample(
        &self,
        sample: &AudioSample,
    ) -> Result<(AcousticFeatures, Vec<f32>), StageError> {
        let task_id = || sample.task_id.clone();

        let pcm = self.decoder.decode(sample).map_err(|source| StageError::Decode {
            task_id: task_id(),
            source,
        })?;
        let features = self
            .extractor
            .extract(&pcm)
            .map_err(|source| StageError::Extraction {
                task_id: task_id(),
                source,
            })?;
        let embedding = self
            .embedder
            .embed(&pcm)
            .map_err(|source| StageError::Embedding {
                task_id: task_id(),
                source,
            })?;

        Ok((features, embedding))
    }

    fn check_budget(&self, started: Instant) -> Result<(), StageError> {
        match self.time_budget {
            Some(budget) if started.elapsed() > budget => Err(StageError::TimeBudgetExceeded {
                budget,
                elapsed: started.elapsed(),
            }),
            _ => Ok(()),
        }
    }

    fn lock_for(&self, assessment_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(assessment_id.to_string()).or_default())
    }

    /// Drop the per-id lock once no other caller holds it.
    fn release_lock(&self, assessment_id: &str) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(assessment_id)
            .is_some_and(|l| Arc::strong_count(l) == 1)
        {
            locks.remove(assessment_id);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
