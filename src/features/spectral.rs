//! Short-time spectral analysis primitives shared by the acoustic extractor.
//!
//! Conventions follow the common speech-analysis defaults:
//!
//! | Step           | Choice                                              |
//! |----------------|-----------------------------------------------------|
//! | Framing        | centred, `n_fft / 2` zero padding on both sides     |
//! | Window         | periodic Hann                                       |
//! | Mel scale      | Slaney (linear below 1 kHz, log above), area-normalised |
//! | dB scaling     | `10·log10(max(S, 1e-10))`, floored at `max − 80 dB` |
//! | Cepstrum       | orthonormal DCT-II over mel bands                   |

use std::f64::consts::PI;
use std::sync::Arc;

use realfft::{RealFftPlanner, RealToComplex};

/// Floor applied before taking logarithms of power values.
const AMIN: f64 = 1e-10;
/// Dynamic range kept below the spectrogram peak.
const TOP_DB: f64 = 80.0;

// ---------------------------------------------------------------------------
// Stft
// ---------------------------------------------------------------------------

/// A planned forward transform with its analysis window.
///
/// The plan and window are immutable after construction, so one `Stft` can
/// be shared across threads; all per-frame buffers are allocated by
/// [`Stft::frames`].
pub struct Stft {
    n_fft: usize,
    hop: usize,
    window: Vec<f32>,
    fft: Arc<dyn RealToComplex<f32>>,
}

impl std::fmt::Debug for Stft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stft")
            .field("n_fft", &self.n_fft)
            .field("hop", &self.hop)
            .finish_non_exhaustive()
    }
}

impl Stft {
    pub fn new(n_fft: usize, hop: usize) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        Self {
            n_fft,
            hop,
            window: hann_periodic(n_fft),
            fft: planner.plan_fft_forward(n_fft),
        }
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    pub fn n_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Number of centred frames produced for a signal of `len` samples.
    pub fn frame_count(&self, len: usize) -> usize {
        1 + len / self.hop
    }

    /// Compute the magnitude spectrum of every centred frame and hand it to
    /// `visit` together with the frame index.
    pub fn frames(&self, signal: &[f32], mut visit: impl FnMut(usize, &[f32])) {
        let pad = self.n_fft / 2;
        let mut input = self.fft.make_input_vec();
        let mut output = self.fft.make_output_vec();
        let mut scratch = self.fft.make_scratch_vec();
        let mut magnitude = vec![0.0_f32; self.n_bins()];

        for frame in 0..self.frame_count(signal.len()) {
            // Frame start in padded coordinates; shift back into the signal.
            let start = (frame * self.hop) as isize - pad as isize;
            for (i, slot) in input.iter_mut().enumerate() {
                let idx = start + i as isize;
                let x = if idx >= 0 && (idx as usize) < signal.len() {
                    signal[idx as usize]
                } else {
                    0.0
                };
                *slot = x * self.window[i];
            }

            // Lengths come from the plan itself, so this cannot fail.
            if self
                .fft
                .process_with_scratch(&mut input, &mut output, &mut scratch)
                .is_err()
            {
                continue;
            }

            for (m, c) in magnitude.iter_mut().zip(output.iter()) {
                *m = c.norm();
            }
            visit(frame, &magnitude);
        }
    }
}

/// Periodic Hann window (the FFT-friendly variant).
pub fn hann_periodic(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| (0.5 - 0.5 * (2.0 * PI * i as f64 / n as f64).cos()) as f32)
        .collect()
}

// ---------------------------------------------------------------------------
// Mel filterbank
// ---------------------------------------------------------------------------

const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn log_step() -> f64 {
    6.4_f64.ln() / 27.0
}

pub fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

/// Triangular, area-normalised mel filters spanning `0 .. sample_rate / 2`.
///
/// Returns `n_mels` rows of `n_fft / 2 + 1` weights.
pub fn mel_filterbank(sample_rate: u32, n_fft: usize, n_mels: usize) -> Vec<Vec<f64>> {
    let n_bins = n_fft / 2 + 1;
    let fft_freqs: Vec<f64> = (0..n_bins)
        .map(|k| k as f64 * sample_rate as f64 / n_fft as f64)
        .collect();

    let mel_max = hz_to_mel(sample_rate as f64 / 2.0);
    let mel_points: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_max * i as f64 / (n_mels + 1) as f64))
        .collect();

    (0..n_mels)
        .map(|m| {
            let (lo, centre, hi) = (mel_points[m], mel_points[m + 1], mel_points[m + 2]);
            let enorm = 2.0 / (hi - lo);
            fft_freqs
                .iter()
                .map(|&f| {
                    let rising = (f - lo) / (centre - lo);
                    let falling = (hi - f) / (hi - centre);
                    rising.min(falling).max(0.0) * enorm
                })
                .collect()
        })
        .collect()
}

// ---------------------------------------------------------------------------
// dB scaling and DCT
// ---------------------------------------------------------------------------

/// Convert a power spectrogram (frames × bands) to decibels in place,
/// flooring every value at `peak − 80 dB`.
pub fn power_to_db(frames: &mut [Vec<f64>]) {
    let mut peak = f64::NEG_INFINITY;
    for row in frames.iter_mut() {
        for v in row.iter_mut() {
            *v = 10.0 * v.max(AMIN).log10();
            peak = peak.max(*v);
        }
    }
    let floor = peak - TOP_DB;
    for row in frames.iter_mut() {
        for v in row.iter_mut() {
            *v = v.max(floor);
        }
    }
}

/// Orthonormal DCT-II basis: `n_out` rows of `n_in` coefficients.
pub fn dct_basis(n_in: usize, n_out: usize) -> Vec<Vec<f64>> {
    let n = n_in as f64;
    (0..n_out)
        .map(|k| {
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            (0..n_in)
                .map(|i| scale * (PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * n)).cos())
                .collect()
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mel_scale_round_trips() {
        for hz in [0.0, 250.0, 999.0, 1000.0, 4000.0, 8000.0] {
            let back = mel_to_hz(hz_to_mel(hz));
            assert!((back - hz).abs() < 1e-6, "{hz} -> {back}");
        }
        // Linear region: 200/3 Hz per mel.
        assert!((hz_to_mel(200.0) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn filterbank_shape_and_non_negative() {
        let fb = mel_filterbank(16_000, 1024, 128);
        assert_eq!(fb.len(), 128);
        assert!(fb.iter().all(|row| row.len() == 513));
        assert!(fb.iter().flatten().all(|&w| w >= 0.0));
        // Every filter covers at least one bin at this resolution except
        // possibly the narrowest low-frequency ones.
        let covered = fb.iter().filter(|row| row.iter().any(|&w| w > 0.0)).count();
        assert!(covered > 100);
    }

    #[test]
    fn dct_basis_is_orthonormal() {
        let basis = dct_basis(16, 16);
        for a in 0..16 {
            for b in 0..16 {
                let dot: f64 = basis[a].iter().zip(&basis[b]).map(|(x, y)| x * y).sum();
                let expected = if a == b { 1.0 } else { 0.0 };
                assert!((dot - expected).abs() < 1e-9, "<{a},{b}> = {dot}");
            }
        }
    }

    #[test]
    fn power_to_db_applies_floor() {
        let mut frames = vec![vec![1.0, 1e-12], vec![1e-3, 0.0]];
        power_to_db(&mut frames);
        assert!((frames[0][0] - 0.0).abs() < 1e-9);
        assert!((frames[1][0] + 30.0).abs() < 1e-9);
        // 1e-12 and 0 are both floored to peak - 80.
        assert!((frames[0][1] + 80.0).abs() < 1e-9);
        assert!((frames[1][1] + 80.0).abs() < 1e-9);
    }

    #[test]
    fn stft_frame_count_is_centred() {
        let stft = Stft::new(1024, 512);
        assert_eq!(stft.frame_count(0), 1);
        assert_eq!(stft.frame_count(16_000), 32);

        let mut seen = 0;
        stft.frames(&vec![0.0; 16_000], |_, mag| {
            assert_eq!(mag.len(), 513);
            seen += 1;
        });
        assert_eq!(seen, 32);
    }

    #[test]
    fn stft_peaks_at_tone_bin() {
        let n_fft = 1024;
        let rate = 16_000.0;
        // Bin 64 = 1000 Hz at this resolution.
        let tone: Vec<f32> = (0..8_000)
            .map(|i| (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / rate).sin())
            .collect();
        let stft = Stft::new(n_fft, 512);
        stft.frames(&tone, |frame, mag| {
            if frame == 5 {
                let peak = mag
                    .iter()
                    .enumerate()
                    .max_by(|a, b| a.1.total_cmp(b.1))
                    .map(|(i, _)| i)
                    .unwrap();
                assert_eq!(peak, 64);
            }
        });
    }
}
