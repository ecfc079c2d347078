//! Learned speech embeddings.
//!
//! # Overview
//!
//! [`SpeechEmbedder`] is the interface the pipeline uses.  It is object-safe
//! and `Send + Sync` so it can be held behind an `Arc<dyn SpeechEmbedder>`
//! and shared by every invocation.
//!
//! [`OnnxSpeechEmbedder`] (behind the `onnx` feature) runs a frozen
//! wav2vec2-style encoder exported to ONNX and mean-pools its frame
//! representations into one vector per sample.
//!
//! [`NoModelEmbedder`] stands in when no model could be loaded at startup;
//! every call fails with [`EmbeddingError::ModelUnavailable`].
//!
//! [`aggregate_embeddings`] folds per-sample vectors into one
//! assessment-level vector.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use super::acoustic::ExtractionError;
use crate::config::EmbeddingConfig;

// ---------------------------------------------------------------------------
// EmbeddingError
// ---------------------------------------------------------------------------

/// All errors that can arise from the embedding subsystem.
#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    /// The model file was not found at the given path.
    #[error("embedding model not found: {}", .0.display())]
    ModelNotFound(PathBuf),

    /// The runtime failed to build a session from the model file.
    #[error("embedding model initialisation failed: {0}")]
    ModelInit(String),

    /// No model is loaded in this process.
    #[error("embedding model unavailable: {0}")]
    ModelUnavailable(String),

    /// An error occurred during the inference pass.
    #[error("embedding inference failed: {0}")]
    Inference(String),
}

// ---------------------------------------------------------------------------
// SpeechEmbedder trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface for speech embedding models.
///
/// # Contract
///
/// - `audio` is **16 kHz, mono, f32** PCM.
/// - The returned vector has exactly [`dimension`](Self::dimension) entries.
/// - Implementations must not mutate shared model state during inference.
pub trait SpeechEmbedder: Send + Sync {
    /// Produce one pooled embedding for `audio`.
    fn embed(&self, audio: &[f32]) -> Result<Vec<f32>, EmbeddingError>;

    /// Width of the vectors returned by [`embed`](Self::embed).
    fn dimension(&self) -> usize;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn SpeechEmbedder>) {}
};

// ---------------------------------------------------------------------------
// NoModelEmbedder
// ---------------------------------------------------------------------------

/// Placeholder used when the embedding model could not be loaded.
#[derive(Debug, Clone)]
pub struct NoModelEmbedder {
    reason: String,
    dimension: usize,
}

impl NoModelEmbedder {
    pub fn new(reason: impl Into<String>, dimension: usize) -> Self {
        Self {
            reason: reason.into(),
            dimension,
        }
    }
}

impl SpeechEmbedder for NoModelEmbedder {
    fn embed(&self, _audio: &[f32]) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::ModelUnavailable(self.reason.clone()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Build the process-wide embedder from config.
///
/// Never fails: when the model cannot be loaded the returned
/// [`NoModelEmbedder`] carries the reason, and every assessment with audio
/// takes the fallback path.
pub fn load_embedder(config: &EmbeddingConfig) -> Arc<dyn SpeechEmbedder> {
    #[cfg(feature = "onnx")]
    {
        let dir = config.resolved_model_dir();
        match OnnxSpeechEmbedder::load(&dir, config.dimension, config.intra_threads) {
            Ok(embedder) => Arc::new(embedder),
            Err(e) => {
                log::warn!("embedding: {e}; audio assessments will use the fallback");
                Arc::new(NoModelEmbedder::new(e.to_string(), config.dimension))
            }
        }
    }

    #[cfg(not(feature = "onnx"))]
    {
        log::warn!("embedding: built without the `onnx` feature; audio assessments will use the fallback");
        Arc::new(NoModelEmbedder::new(
            "built without the `onnx` feature",
            config.dimension,
        ))
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Elementwise mean of per-sample embeddings.
///
/// Returns the zero vector of `dimension` when `vectors` is empty.
///
/// ```
/// use cogai_risk::features::aggregate_embeddings;
///
/// let v = aggregate_embeddings(&[vec![1.0, 2.0], vec![3.0, 6.0]], 2).unwrap();
/// assert_eq!(v, vec![2.0, 4.0]);
/// assert_eq!(aggregate_embeddings(&[], 3).unwrap(), vec![0.0; 3]);
/// ```
pub fn aggregate_embeddings(
    vectors: &[Vec<f32>],
    dimension: usize,
) -> Result<Vec<f32>, ExtractionError> {
    let mut sum = vec![0.0_f64; dimension];
    for v in vectors {
        if v.len() != dimension {
            return Err(ExtractionError::DimensionMismatch {
                expected: dimension,
                got: v.len(),
            });
        }
        for (acc, &x) in sum.iter_mut().zip(v) {
            *acc += x as f64;
        }
    }

    let n = vectors.len().max(1) as f64;
    Ok(sum.into_iter().map(|s| (s / n) as f32).collect())
}

/// Zero-mean, unit-variance normalisation expected by wav2vec2 encoders.
pub fn normalize_waveform(audio: &[f32]) -> Vec<f32> {
    if audio.is_empty() {
        return Vec::new();
    }
    let n = audio.len() as f64;
    let mean = audio.iter().map(|&x| x as f64).sum::<f64>() / n;
    let var = audio.iter().map(|&x| (x as f64 - mean).powi(2)).sum::<f64>() / n;
    let denom = (var + 1e-7).sqrt();
    audio
        .iter()
        .map(|&x| ((x as f64 - mean) / denom) as f32)
        .collect()
}

/// Frame count `T` of an encoder output shaped `[1, T, dimension]`.
pub fn encoder_frames(shape: &[i64], dimension: usize) -> Result<usize, EmbeddingError> {
    match shape {
        [1, frames, d] if *frames > 0 && *d as usize == dimension => Ok(*frames as usize),
        [1, 0, _] => Err(EmbeddingError::Inference("encoder produced no frames".into())),
        _ => Err(EmbeddingError::Inference(format!(
            "unexpected output shape {shape:?}, expected [1, T, {dimension}]"
        ))),
    }
}

/// Mean over the `frames` rows of a row-major `[frames, dimension]` buffer.
///
/// ```
/// use cogai_risk::features::embedding::mean_pool;
///
/// let pooled = mean_pool(&[1.0, 2.0, 3.0, 6.0], 2, 2).unwrap();
/// assert_eq!(pooled, vec![2.0, 4.0]);
/// ```
pub fn mean_pool(data: &[f32], frames: usize, dimension: usize) -> Result<Vec<f32>, EmbeddingError> {
    if frames == 0 {
        return Err(EmbeddingError::Inference("encoder produced no frames".into()));
    }
    if dimension == 0 {
        return Err(EmbeddingError::Inference("zero-width embedding".into()));
    }
    if data.len() != frames * dimension {
        return Err(EmbeddingError::Inference(format!(
            "output holds {} values, expected {frames} x {dimension}",
            data.len()
        )));
    }

    let mut pooled = vec![0.0_f32; dimension];
    for row in data.chunks_exact(dimension) {
        for (p, &x) in pooled.iter_mut().zip(row) {
            *p += x;
        }
    }
    for p in &mut pooled {
        *p /= frames as f32;
    }
    Ok(pooled)
}

// ---------------------------------------------------------------------------
// ONNX embedder (`onnx` feature)
// ---------------------------------------------------------------------------

#[cfg(feature = "onnx")]
mod onnx {
    use super::{encoder_frames, mean_pool, normalize_waveform, EmbeddingError, SpeechEmbedder};
    use ort::session::Session;
    use std::path::Path;
    use std::sync::Mutex;

    /// The convolutional front-end needs at least one receptive field.
    const MIN_INPUT_SAMPLES: usize = 400;

    /// Frozen wav2vec2-style encoder running on ONNX Runtime.
    ///
    /// `model_dir` must contain `model.onnx` with a single `input_values`
    /// input of shape `[1, n]` and `last_hidden_state` `[1, T, D]` as its
    /// first output.
    ///
    /// `ort::Session::run` takes `&mut self`, so the session sits behind a
    /// `Mutex`; every call allocates its own input and pooling buffers.
    pub struct OnnxSpeechEmbedder {
        session: Mutex<Session>,
        dimension: usize,
    }

    impl std::fmt::Debug for OnnxSpeechEmbedder {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("OnnxSpeechEmbedder")
                .field("dimension", &self.dimension)
                .finish_non_exhaustive()
        }
    }

    impl OnnxSpeechEmbedder {
        /// Load `model_dir/model.onnx`.
        ///
        /// # Errors
        ///
        /// - [`EmbeddingError::ModelNotFound`]: the file does not exist.
        /// - [`EmbeddingError::ModelInit`]: ONNX Runtime rejected it.
        pub fn load(
            model_dir: &Path,
            dimension: usize,
            intra_threads: usize,
        ) -> Result<Self, EmbeddingError> {
            let model_path = model_dir.join("model.onnx");
            if !model_path.exists() {
                return Err(EmbeddingError::ModelNotFound(model_path));
            }

            let session = Session::builder()
                .map_err(|e: ort::Error| EmbeddingError::ModelInit(e.to_string()))?
                .with_intra_threads(intra_threads.max(1))
                .map_err(|e: ort::Error| EmbeddingError::ModelInit(e.to_string()))?
                .commit_from_file(&model_path)
                .map_err(|e: ort::Error| {
                    EmbeddingError::ModelInit(format!("ONNX load failed: {e}"))
                })?;

            log::info!("embedding: ONNX model loaded from {}", model_dir.display());

            Ok(Self {
                session: Mutex::new(session),
                dimension,
            })
        }

        fn infer(&self, audio: &[f32]) -> Result<Vec<f32>, EmbeddingError> {
            use ort::value::TensorRef;

            let mut input = normalize_waveform(audio);
            if input.len() < MIN_INPUT_SAMPLES {
                input.resize(MIN_INPUT_SAMPLES, 0.0);
            }
            let n = input.len();

            let array = ndarray::Array2::from_shape_vec((1, n), input)
                .map_err(|e| EmbeddingError::Inference(e.to_string()))?;
            let tensor = TensorRef::from_array_view(&array)
                .map_err(|e| EmbeddingError::Inference(e.to_string()))?;

            let mut session = self
                .session
                .lock()
                .map_err(|_| EmbeddingError::Inference("session lock poisoned".to_string()))?;

            let outputs = session
                .run(ort::inputs![tensor])
                .map_err(|e| EmbeddingError::Inference(format!("ONNX inference failed: {e}")))?;

            let (shape, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| EmbeddingError::Inference(format!("output extraction: {e}")))?;

            let frames = encoder_frames(shape, self.dimension)?;
            mean_pool(data, frames, self.dimension)
        }
    }

    impl SpeechEmbedder for OnnxSpeechEmbedder {
        fn embed(&self, audio: &[f32]) -> Result<Vec<f32>, EmbeddingError> {
            self.infer(audio)
        }

        fn dimension(&self) -> usize {
            self.dimension
        }
    }
}

#[cfg(feature = "onnx")]
pub use onnx::OnnxSpeechEmbedder;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
