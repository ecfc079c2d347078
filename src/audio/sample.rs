//! Input audio records owned by an assessment.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Where a sample's encoded bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// Encoded container bytes already in memory.
    Bytes(Arc<[u8]>),
    /// Encoded container on disk (the upload store writes files here).
    Path(PathBuf),
}

/// One recorded speech task.  Read-only input to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSample {
    pub task_id: String,
    pub source: AudioSource,
    /// Rate claimed by the uploader; the container header takes precedence.
    pub declared_sample_rate: Option<u32>,
    pub duration_ms: Option<u64>,
    pub language: Option<String>,
}

impl AudioSample {
    pub fn from_bytes(task_id: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::new(task_id, AudioSource::Bytes(bytes.into()))
    }

    pub fn from_path(task_id: impl Into<String>, path: impl AsRef<Path>) -> Self {
        Self::new(task_id, AudioSource::Path(path.as_ref().to_path_buf()))
    }

    fn new(task_id: impl Into<String>, source: AudioSource) -> Self {
        Self {
            task_id: task_id.into(),
            source,
            declared_sample_rate: None,
            duration_ms: None,
            language: None,
        }
    }

    pub fn with_declared_sample_rate(mut self, rate: u32) -> Self {
        self.declared_sample_rate = Some(rate);
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// Serialisable description of a file-backed sample, as listed in an
/// assessment manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleManifest {
    pub task_id: String,
    pub path: PathBuf,
    #[serde(default)]
    pub sample_rate: Option<u32>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub language: Option<String>,
}

impl From<SampleManifest> for AudioSample {
    fn from(m: SampleManifest) -> Self {
        AudioSample {
            task_id: m.task_id,
            source: AudioSource::Path(m.path),
            declared_sample_rate: m.sample_rate,
            duration_ms: m.duration_ms,
            language: m.language,
        }
    }
}
