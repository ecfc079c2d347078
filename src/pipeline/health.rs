//! Pipeline health counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters shared by every invocation of one service.
#[derive(Debug, Default)]
pub struct PipelineHealth {
    invocations: AtomicU64,
    fallbacks: AtomicU64,
    cache_hits: AtomicU64,
}

/// Point-in-time copy of [`PipelineHealth`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct HealthSnapshot {
    pub invocations: u64,
    pub fallbacks: u64,
    pub cache_hits: u64,
}

impl PipelineHealth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_invocation(&self) {
        self.invocations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            invocations: self.invocations.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
        }
    }

    /// Share of computed (non-cached) predictions that came from the fallback.
    ///
    /// `0.0` before anything has been computed.
    pub fn fallback_rate(&self) -> f64 {
        let s = self.snapshot();
        let computed = s.invocations.saturating_sub(s.cache_hits);
        if computed == 0 {
            0.0
        } else {
            s.fallbacks as f64 / computed as f64
        }
    }
}
