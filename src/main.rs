//! `cogai-risk`: score one assessment from a manifest file.
//!
//! # Startup sequence
//!
//! 1. Initialise logging (`RUST_LOG`, default `info`).
//! 2. Load [`AppConfig`] (defaults on first run, `MODEL_PATH` applied).
//! 3. Build the [`PredictionService`] once: embedding model, classifier
//!    artifact, in-memory store.
//! 4. Read the manifest, run the prediction on the blocking pool.
//! 5. Print the [`RiskReport`](cogai_risk::prediction::RiskReport) as JSON.
//!
//! # Manifest
//!
//! ```json
//! {
//!   "assessment": { "id": "a-1", "memory_score": 0.8, "attention_score": 0.7 },
//!   "samples": [ { "task_id": "story_recall", "path": "story.wav" } ]
//! }
//! ```
//!
//! Relative sample paths are resolved against the manifest's directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;

use cogai_risk::{
    audio::{AudioSample, SampleManifest},
    config::AppConfig,
    pipeline::{Assessment, InMemoryPredictionStore, PredictionService},
    prediction::RiskReport,
};

/// Command-line arguments for cogai-risk
#[derive(Parser, Debug)]
#[command(name = "cogai-risk")]
#[command(about = "Cognitive risk prediction from speech samples and test scores")]
#[command(version)]
struct Args {
    /// Assessment manifest (JSON)
    manifest: PathBuf,

    /// Settings file; defaults to the platform config directory
    #[arg(short, long, env = "COGAI_RISK_CONFIG")]
    config: Option<PathBuf>,

    /// Classifier artifact, overriding config and MODEL_PATH
    #[arg(long)]
    model_path: Option<PathBuf>,

    /// Pretty-print the report
    #[arg(long)]
    pretty: bool,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    assessment: Assessment,
    #[serde(default)]
    samples: Vec<SampleManifest>,
}

fn load_config(args: &Args) -> AppConfig {
    let loaded = match &args.config {
        Some(path) => AppConfig::load_from(path).map(|mut c| {
            c.apply_env_overrides();
            c
        }),
        None => AppConfig::load(),
    };
    let mut config = loaded.unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        let mut c = AppConfig::default();
        c.apply_env_overrides();
        c
    });
    if let Some(path) = &args.model_path {
        config.classifier.model_path = path.clone();
    }
    config
}

fn read_manifest(path: &Path) -> Result<(Assessment, Vec<AudioSample>)> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read manifest {}", path.display()))?;
    let manifest: Manifest = serde_json::from_str(&content)
        .with_context(|| format!("malformed manifest {}", path.display()))?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let samples = manifest
        .samples
        .into_iter()
        .map(|mut s| {
            if s.path.is_relative() {
                s.path = base.join(&s.path);
            }
            AudioSample::from(s)
        })
        .collect();

    Ok((manifest.assessment, samples))
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    // 2. Configuration
    let config = load_config(&args);

    // 3. Service
    let service = Arc::new(
        PredictionService::from_config(&config, Arc::new(InMemoryPredictionStore::new()))
            .context("invalid audio configuration")?,
    );

    // 4. Prediction
    let (assessment, samples) = read_manifest(&args.manifest)?;
    log::info!(
        "Scoring assessment {} with {} sample(s)",
        assessment.id,
        samples.len()
    );
    let prediction = service
        .predict_async(assessment.clone(), samples)
        .await
        .context("prediction failed")?;

    let health = service.health().snapshot();
    log::debug!("pipeline health: {health:?}");

    // 5. Output
    let report = RiskReport::assemble(assessment.id.clone(), &assessment.scores, &prediction);
    let json = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{json}");

    Ok(())
}
