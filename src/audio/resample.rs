//! Resampling and channel mixing utilities.
//!
//! Every downstream stage requires **16 kHz mono `f32`** audio.  This module
//! provides the two conversion steps:
//!
//! 1. [`downmix_to_mono`]: average any number of interleaved channels.
//! 2. [`resample`]: band-limited sinc resampling via `rubato`
//!    (`SincFixedIn` + `BlackmanHarris2` window).

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use super::decode::DecodeError;

/// Frames handed to the resampler per `process` call.
const CHUNK_SIZE: usize = 1024;

// ---------------------------------------------------------------------------
// downmix_to_mono
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono by averaging all channels.
///
/// * `channels == 1` returns the input as an owned `Vec`.
/// * `channels == 0` returns an empty vector.
///
/// ```rust
/// use cogai_risk::audio::downmix_to_mono;
///
/// let stereo = vec![0.5_f32, -0.5, 0.2, 0.4]; // L R L R
/// let mono = downmix_to_mono(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[0] - 0.0).abs() < 1e-6);
/// assert!((mono[1] - 0.3).abs() < 1e-6);
/// ```
pub fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => samples
            .chunks_exact(n)
            .map(|frame| frame.iter().sum::<f32>() / n as f32)
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// resample
// ---------------------------------------------------------------------------

/// Resample mono `samples` from `from_rate` Hz to `to_rate` Hz.
///
/// The resampler's group delay is trimmed from the front and the tail is
/// flushed with silence, so the output is time-aligned with the input and
/// exactly `floor(len * to_rate / from_rate)` samples long.
///
/// * Equal rates return the input unchanged.
/// * Empty input returns an empty vector.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, DecodeError> {
    if from_rate == to_rate {
        return Ok(samples.to_vec());
    }
    if samples.is_empty() {
        return Ok(Vec::new());
    }
    if from_rate == 0 || to_rate == 0 {
        return Err(DecodeError::Resample(format!(
            "invalid rate conversion {from_rate} Hz -> {to_rate} Hz"
        )));
    }

    let delay = measure_delay(from_rate, to_rate)?;
    let expected_len = (samples.len() as u64 * to_rate as u64 / from_rate as u64) as usize;

    let resampler = new_resampler(from_rate, to_rate)?;
    let mut output = run_chunks(resampler, samples, expected_len + delay, from_rate, to_rate)?;
    output.drain(..delay.min(output.len()));
    output.truncate(expected_len);

    Ok(output)
}

fn new_resampler(from_rate: u32, to_rate: u32) -> Result<SincFixedIn<f32>, DecodeError> {
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let ratio = to_rate as f64 / from_rate as f64;
    SincFixedIn::<f32>::new(ratio, 2.0, params, CHUNK_SIZE, 1)
        .map_err(|e| DecodeError::Resample(format!("resampler init: {e}")))
}

/// Feed `samples` through `resampler` in fixed chunks, padding with silence
/// until at least `wanted` output frames exist.
fn run_chunks(
    mut resampler: SincFixedIn<f32>,
    samples: &[f32],
    wanted: usize,
    from_rate: u32,
    to_rate: u32,
) -> Result<Vec<f32>, DecodeError> {
    let out_per_chunk = (CHUNK_SIZE as u64 * to_rate as u64 / from_rate as u64).max(1) as usize;
    let max_chunks = samples.len().div_ceil(CHUNK_SIZE) + wanted.div_ceil(out_per_chunk) + 2;

    let mut output = Vec::with_capacity(wanted + CHUNK_SIZE);
    for i in 0..max_chunks {
        if output.len() >= wanted {
            break;
        }
        let start = (i * CHUNK_SIZE).min(samples.len());
        let end = ((i + 1) * CHUNK_SIZE).min(samples.len());
        let mut chunk = samples[start..end].to_vec();
        chunk.resize(CHUNK_SIZE, 0.0);

        let result = resampler
            .process(&[chunk], None)
            .map_err(|e| DecodeError::Resample(format!("resample: {e}")))?;
        if let Some(channel) = result.first() {
            output.extend_from_slice(channel);
        }
    }
    Ok(output)
}

/// Output-frame delay of the resampler for this rate pair.
///
/// An impulse is placed on an input frame whose output position is an
/// integer, pushed through an identically configured resampler, and the
/// peak of the response is located.  `output_delay()` is used only to size
/// the flush.
fn measure_delay(from_rate: u32, to_rate: u32) -> Result<usize, DecodeError> {
    let g = gcd(from_rate, to_rate) as usize;
    let (step_in, step_out) = (from_rate as usize / g, to_rate as usize / g);

    // Latest input frame in the first half chunk that lands on a whole
    // output frame.
    let half = CHUNK_SIZE / 2;
    let (pos_in, pos_out) = if step_in <= half {
        let k = half / step_in;
        (k * step_in, k * step_out)
    } else {
        (half, (half as u64 * to_rate as u64 / from_rate as u64) as usize)
    };

    let resampler = new_resampler(from_rate, to_rate)?;
    let reported = resampler.output_delay();

    let mut impulse = vec![0.0_f32; CHUNK_SIZE];
    impulse[pos_in] = 1.0;
    let wanted = pos_out + 2 * reported + CHUNK_SIZE;
    let response = run_chunks(resampler, &impulse, wanted, from_rate, to_rate)?;

    Ok(argmax(&response).saturating_sub(pos_out))
}

fn argmax(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f32::MIN), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
        .0
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|n| (2.0 * std::f32::consts::PI * freq * n as f32 / rate as f32).sin())
            .collect()
    }

    // ---- downmix_to_mono ---------------------------------------------------

    #[test]
    fn downmix_already_mono() {
        let input = vec![0.1_f32, 0.2, 0.3];
        assert_eq!(downmix_to_mono(&input, 1), input);
    }

    #[test]
    fn downmix_two_channel() {
        let out = downmix_to_mono(&[1.0_f32, -1.0, 0.5, 0.5], 2);
        assert_eq!(out.len(), 2);
        assert!((out[0] - 0.0).abs() < 1e-6);
        assert!((out[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn downmix_zero_channels() {
        assert!(downmix_to_mono(&[1.0_f32, 2.0], 0).is_empty());
    }

    // ---- resample ----------------------------------------------------------

    #[test]
    fn same_rate_is_noop() {
        let input: Vec<f32> = (0..160).map(|i| i as f32 / 160.0).collect();
        assert_eq!(resample(&input, 16_000, 16_000).unwrap(), input);
    }

    #[test]
    fn empty_input() {
        assert!(resample(&[], 48_000, 16_000).unwrap().is_empty());
    }

    #[test]
    fn downsample_48k_output_length() {
        let input = vec![0.0_f32; 48_000];
        let out = resample(&input, 48_000, 16_000).unwrap();
        assert_eq!(out.len(), 16_000);
    }

    #[test]
    fn upsample_8k_output_length() {
        let input = vec![0.0_f32; 8_000];
        let out = resample(&input, 8_000, 16_000).unwrap();
        assert_eq!(out.len(), 16_000);
    }

    #[test]
    fn short_input_still_yields_full_length() {
        // Much shorter than one resampler chunk.
        let input = vec![0.25_f32; 300];
        let out = resample(&input, 44_100, 16_000).unwrap();
        assert_eq!(out.len(), 300 * 16_000 / 44_100);
    }

    #[test]
    fn tone_stays_aligned_after_delay_compensation() {
        let from = 48_000;
        let input = sine(440.0, from, from as usize);
        let out = resample(&input, from, 16_000).unwrap();
        let reference = sine(440.0, 16_000, 16_000);

        // Compare away from the edges where the sinc filter sees padding.
        let max_err = out[2_000..14_000]
            .iter()
            .zip(&reference[2_000..14_000])
            .map(|(a, b)| (a - b).abs())
            .fold(0.0_f32, f32::max);
        assert!(max_err < 0.2, "max error {max_err}");
    }

    #[test]
    fn tone_stays_aligned_from_44k1() {
        let from = 44_100;
        let input = sine(440.0, from, from as usize);
        let out = resample(&input, from, 16_000).unwrap();
        let reference = sine(440.0, 16_000, 16_000);

        let max_err = out[2_000..14_000]
            .iter()
            .zip(&reference[2_000..14_000])
            .map(|(a, b)| (a - b).abs())
            .fold(0.0_f32, f32::max);
        assert!(max_err < 0.2, "max error {max_err}");
    }

    #[test]
    fn tone_stays_aligned_when_upsampling() {
        let input = sine(440.0, 8_000, 8_000);
        let out = resample(&input, 8_000, 16_000).unwrap();
        let reference = sine(440.0, 16_000, 16_000);

        let max_err = out[2_000..14_000]
            .iter()
            .zip(&reference[2_000..14_000])
            .map(|(a, b)| (a - b).abs())
            .fold(0.0_f32, f32::max);
        assert!(max_err < 0.2, "max error {max_err}");
    }

    #[test]
    fn impulse_lands_on_its_output_frame() {
        let mut input = vec![0.0_f32; 48_000];
        input[30_000] = 1.0;
        let out = resample(&input, 48_000, 16_000).unwrap();

        assert_eq!(argmax(&out), 10_000);
    }

    #[test]
    fn gcd_reduces_common_rates() {
        assert_eq!(gcd(48_000, 16_000), 16_000);
        assert_eq!(gcd(44_100, 16_000), 100);
    }

    #[test]
    fn zero_rate_is_rejected() {
        assert!(matches!(
            resample(&[0.1, 0.2], 0, 16_000),
            Err(DecodeError::Resample(_))
        ));
    }
}
