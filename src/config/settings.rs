//! Pipeline settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

/// Environment variable that overrides [`ClassifierConfig::model_path`].
pub const MODEL_PATH_ENV: &str = "MODEL_PATH";

/// The only PCM rate the pipeline accepts; the speech encoder is trained on it.
pub const CANONICAL_SAMPLE_RATE: u32 = 16_000;

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Decoding target and acoustic analysis parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// PCM rate every sample is resampled to.  The prediction service
    /// rejects anything but [`CANONICAL_SAMPLE_RATE`].
    pub sample_rate: u32,
    /// Number of cepstral coefficients kept per frame.
    pub n_mfcc: usize,
    /// Analysis window length in samples.
    pub n_fft: usize,
    /// Hop between successive frames in samples.
    pub hop_length: usize,
    /// Number of mel bands the power spectrum is folded into before the DCT.
    pub n_mels: usize,
    /// Fraction of spectral energy below the rolloff frequency (0.0 – 1.0).
    pub rolloff_percent: f64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: CANONICAL_SAMPLE_RATE,
            n_mfcc: 40,
            n_fft: 1024,
            hop_length: 512,
            n_mels: 128,
            rolloff_percent: 0.85,
        }
    }
}

// ---------------------------------------------------------------------------
// EmbeddingConfig
// ---------------------------------------------------------------------------

/// Settings for the pretrained speech embedding model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Directory holding `model.onnx`.  `None` means the platform models dir.
    pub model_dir: Option<PathBuf>,
    /// Width of the pooled embedding vector.
    pub dimension: usize,
    /// Intra-op threads handed to ONNX Runtime.
    pub intra_threads: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_dir: None,
            dimension: 768,
            intra_threads: 2,
        }
    }
}

impl EmbeddingConfig {
    /// Resolve the model directory, falling back to
    /// [`AppPaths::embedding_model_dir`].
    pub fn resolved_model_dir(&self) -> PathBuf {
        self.model_dir
            .clone()
            .unwrap_or_else(|| AppPaths::new().embedding_model_dir())
    }
}

// ---------------------------------------------------------------------------
// ClassifierConfig
// ---------------------------------------------------------------------------

/// Location of the serialised tabular classifier artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Path to the JSON artifact.  A missing file selects the heuristic
    /// fallback for the process lifetime.
    pub model_path: PathBuf,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("model.json"),
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

/// Orchestrator behaviour knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Wall-clock budget for one invocation; exceeding it between stages
    /// routes the call to the fallback.  `0` disables the check.
    pub time_budget_secs: u64,
    /// Skip samples that fail to decode or extract instead of sending the
    /// whole assessment to the fallback.
    pub isolate_sample_failures: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            time_budget_secs: 120,
            isolate_sample_failures: false,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use cogai_risk::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub embedding: EmbeddingConfig,
    pub classifier: ClassifierConfig,
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml` and
    /// apply environment overrides.
    ///
    /// Returns the defaults when the file does not exist yet.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&AppPaths::new().settings_file)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save to an explicit path, creating parent directories as needed.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// `MODEL_PATH` wins over the file setting.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var(MODEL_PATH_ENV) {
            if !path.trim().is_empty() {
                self.classifier.model_path = PathBuf::from(path);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
