//! Handcrafted acoustic statistics per speech sample.
//!
//! For every sample the extractor reports:
//!
//! * `mfcc_mean` / `mfcc_std`: per-coefficient mean and population standard
//!   deviation of the MFCCs across frames,
//! * `spectral_rolloff_mean`: mean frequency (Hz) below which
//!   `rolloff_percent` of each frame's magnitude lies,
//! * `zero_cross_mean`: mean fraction of sign changes per frame.
//!
//! The extractor is deterministic and carries no state between calls.

use serde::Serialize;
use thiserror::Error;

use crate::config::AudioConfig;

use super::spectral::{dct_basis, mel_filterbank, power_to_db, Stft};

// ---------------------------------------------------------------------------
// ExtractionError
// ---------------------------------------------------------------------------

/// Failures while computing features from decoded audio.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractionError {
    #[error("signal is empty")]
    EmptySignal,

    #[error("signal contains a non-finite value at index {index}")]
    NonFinite { index: usize },

    #[error("invalid analysis configuration: {0}")]
    InvalidConfig(String),

    #[error("embedding has {got} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, got: usize },
}

// ---------------------------------------------------------------------------
// AcousticFeatures
// ---------------------------------------------------------------------------

/// Fixed-shape statistics record for one sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcousticFeatures {
    pub mfcc_mean: Vec<f64>,
    pub mfcc_std: Vec<f64>,
    pub spectral_rolloff_mean: f64,
    pub zero_cross_mean: f64,
}

// ---------------------------------------------------------------------------
// AcousticFeatureExtractor
// ---------------------------------------------------------------------------

/// Computes [`AcousticFeatures`] from 16 kHz mono PCM.
///
/// The FFT plan, mel filterbank and DCT basis are built once in
/// [`new`](Self::new) and only read afterwards.
#[derive(Debug)]
pub struct AcousticFeatureExtractor {
    sample_rate: u32,
    n_fft: usize,
    rolloff_percent: f64,
    stft: Stft,
    mel_basis: Vec<Vec<f64>>,
    dct: Vec<Vec<f64>>,
}

impl AcousticFeatureExtractor {
    pub fn new(config: &AudioConfig) -> Result<Self, ExtractionError> {
        if config.n_fft < 2 || config.hop_length == 0 {
            return Err(ExtractionError::InvalidConfig(format!(
                "n_fft={} hop_length={}",
                config.n_fft, config.hop_length
            )));
        }
        if config.n_mfcc == 0 || config.n_mfcc > config.n_mels {
            return Err(ExtractionError::InvalidConfig(format!(
                "n_mfcc={} must be in 1..={}",
                config.n_mfcc, config.n_mels
            )));
        }
        if !(0.0..=1.0).contains(&config.rolloff_percent) {
            return Err(ExtractionError::InvalidConfig(format!(
                "rolloff_percent={} outside [0, 1]",
                config.rolloff_percent
            )));
        }

        Ok(Self {
            sample_rate: config.sample_rate,
            n_fft: config.n_fft,
            rolloff_percent: config.rolloff_percent,
            stft: Stft::new(config.n_fft, config.hop_length),
            mel_basis: mel_filterbank(config.sample_rate, config.n_fft, config.n_mels),
            dct: dct_basis(config.n_mels, config.n_mfcc),
        })
    }

    pub fn n_mfcc(&self) -> usize {
        self.dct.len()
    }

    /// Compute the statistics record for `audio`.
    pub fn extract(&self, audio: &[f32]) -> Result<AcousticFeatures, ExtractionError> {
        if audio.is_empty() {
            return Err(ExtractionError::EmptySignal);
        }
        if let Some(index) = audio.iter().position(|s| !s.is_finite()) {
            return Err(ExtractionError::NonFinite { index });
        }

        let n_frames = self.stft.frame_count(audio.len());
        let bin_hz = self.sample_rate as f64 / self.n_fft as f64;

        let mut mel_frames: Vec<Vec<f64>> = Vec::with_capacity(n_frames);
        let mut rolloff_sum = 0.0_f64;

        self.stft.frames(audio, |_, magnitude| {
            mel_frames.push(
                self.mel_basis
                    .iter()
                    .map(|filter| {
                        filter
                            .iter()
                            .zip(magnitude)
                            .map(|(w, &m)| w * (m as f64) * (m as f64))
                            .sum()
                    })
                    .collect(),
            );
            rolloff_sum += self.rolloff_bin(magnitude) as f64 * bin_hz;
        });

        power_to_db(&mut mel_frames);

        let (mfcc_mean, mfcc_std) = self.cepstral_stats(&mel_frames);

        Ok(AcousticFeatures {
            mfcc_mean,
            mfcc_std,
            spectral_rolloff_mean: rolloff_sum / mel_frames.len().max(1) as f64,
            zero_cross_mean: self.zero_crossing_mean(audio, n_frames),
        })
    }

    /// First bin at which the cumulative magnitude reaches the rolloff share.
    fn rolloff_bin(&self, magnitude: &[f32]) -> usize {
        let total: f64 = magnitude.iter().map(|&m| m as f64).sum();
        let threshold = self.rolloff_percent * total;
        let mut cumulative = 0.0;
        for (k, &m) in magnitude.iter().enumerate() {
            cumulative += m as f64;
            if cumulative >= threshold {
                return k;
            }
        }
        magnitude.len().saturating_sub(1)
    }

    /// Per-coefficient mean and population std over all frames.
    fn cepstral_stats(&self, mel_db: &[Vec<f64>]) -> (Vec<f64>, Vec<f64>) {
        let coeffs: Vec<Vec<f64>> = mel_db
            .iter()
            .map(|frame| {
                self.dct
                    .iter()
                    .map(|basis| basis.iter().zip(frame).map(|(b, x)| b * x).sum())
                    .collect()
            })
            .collect();

        let n = coeffs.len().max(1) as f64;
        let mean: Vec<f64> = (0..self.dct.len())
            .map(|k| coeffs.iter().map(|c| c[k]).sum::<f64>() / n)
            .collect();
        let std = mean
            .iter()
            .enumerate()
            .map(|(k, m)| {
                let var = coeffs.iter().map(|c| (c[k] - m).powi(2)).sum::<f64>() / n;
                var.sqrt()
            })
            .collect();
        (mean, std)
    }

    /// Mean zero-crossing rate over centred frames (edge-padded).
    fn zero_crossing_mean(&self, audio: &[f32], n_frames: usize) -> f64 {
        let hop = self.stft.hop();
        let half = self.n_fft as isize / 2;
        let last = audio.len() as isize - 1;
        let at = |i: isize| audio[i.clamp(0, last) as usize];

        let mut total = 0.0_f64;
        for frame in 0..n_frames {
            let start = (frame * hop) as isize - half;
            let mut crossings = 0usize;
            let mut prev_negative = at(start).is_sign_negative() && at(start) != 0.0;
            for i in 1..self.n_fft as isize {
                let x = at(start + i);
                let negative = x.is_sign_negative() && x != 0.0;
                if negative != prev_negative {
                    crossings += 1;
                }
                prev_negative = negative;
            }
            total += crossings as f64 / self.n_fft as f64;
        }
        total / n_frames.max(1) as f64
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
