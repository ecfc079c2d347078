//! Container/codec decoding to canonical mono PCM.
//!
//! [`AudioDecoder`] probes the sample's byte source with symphonia, decodes
//! the default track, downmixes to mono and resamples to the canonical rate.
//! Individual corrupt packets are skipped; anything that prevents producing
//! a signal at all is a [`DecodeError`].

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

use super::resample::{downmix_to_mono, resample};
use super::sample::{AudioSample, AudioSource};

// ---------------------------------------------------------------------------
// DecodeError
// ---------------------------------------------------------------------------

/// Reasons a sample could not be turned into PCM.
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    /// The byte source could not be opened.
    #[error("cannot open audio source {path}: {reason}")]
    Io { path: String, reason: String },

    /// No registered container format recognised the data.
    #[error("unsupported or corrupt container: {0}")]
    Probe(String),

    /// The container holds no decodable audio track.
    #[error("no audio track found")]
    NoTrack,

    /// Neither the codec parameters nor the decoded frames carried a rate.
    #[error("unknown sample rate")]
    UnknownSampleRate,

    /// Codec instantiation or a fatal packet error.
    #[error("codec error: {0}")]
    Codec(String),

    /// Decoding finished without a single sample.
    #[error("no audio samples decoded")]
    Empty,

    /// Rate conversion failed.
    #[error("resampling failed: {0}")]
    Resample(String),
}

// ---------------------------------------------------------------------------
// AudioDecoder
// ---------------------------------------------------------------------------

/// Decodes [`AudioSample`]s to mono `f32` PCM at a fixed target rate.
#[derive(Debug, Clone)]
pub struct AudioDecoder {
    target_rate: u32,
}

impl AudioDecoder {
    pub fn new(target_rate: u32) -> Self {
        Self { target_rate }
    }

    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    /// Decode `sample` to mono PCM at [`target_rate`](Self::target_rate).
    pub fn decode(&self, sample: &AudioSample) -> Result<Vec<f32>, DecodeError> {
        let mut hint = Hint::new();

        let source: Box<dyn MediaSource> = match &sample.source {
            AudioSource::Bytes(bytes) => Box::new(Cursor::new(bytes.clone())),
            AudioSource::Path(path) => {
                if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                    hint.with_extension(ext);
                }
                let file = std::fs::File::open(path).map_err(|e| DecodeError::Io {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;
                Box::new(file)
            }
        };

        let (mono, source_rate) = decode_stream(source, &hint)?;

        if let Some(declared) = sample.declared_sample_rate {
            if declared != source_rate {
                log::warn!(
                    "audio: task {} declares {declared} Hz but container reports {source_rate} Hz; using container rate",
                    sample.task_id
                );
            }
        }

        let pcm = resample(&mono, source_rate, self.target_rate)?;

        log::debug!(
            "audio: decoded task {} ({} samples, {:.2}s @ {} Hz)",
            sample.task_id,
            pcm.len(),
            pcm.len() as f32 / self.target_rate as f32,
            self.target_rate
        );

        Ok(pcm)
    }
}

/// Decode every packet of the default track; returns mono samples and the
/// source sample rate.
fn decode_stream(source: Box<dyn MediaSource>, hint: &Hint) -> Result<(Vec<f32>, u32), DecodeError> {
    let mss = MediaSourceStream::new(source, Default::default());

    let probed = symphonia::default::get_probe()
        .format(hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| DecodeError::Probe(e.to_string()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoTrack)?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let mut source_rate = codec_params.sample_rate;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::Codec(e.to_string()))?;

    let mut mono: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(DecodeError::Codec(format!("packet: {e}"))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("audio: skipping corrupt frame: {e}");
                continue;
            }
            Err(e) => return Err(DecodeError::Codec(format!("decode: {e}"))),
        };

        let spec = *decoded.spec();
        let frames = decoded.frames();
        if frames == 0 {
            continue;
        }
        source_rate.get_or_insert(spec.rate);

        let mut buf = SampleBuffer::<f32>::new(frames as u64, spec);
        buf.copy_interleaved_ref(decoded);
        mono.extend(downmix_to_mono(buf.samples(), spec.channels.count()));
    }

    if mono.is_empty() {
        return Err(DecodeError::Empty);
    }

    let rate = source_rate.ok_or(DecodeError::UnknownSampleRate)?;
    Ok((mono, rate))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn wav_bytes(rate: u32, channels: u16, frames: &[i16]) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in frames {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn decodes_mono_wav_at_target_rate() {
        let frames: Vec<i16> = (0..16_000).map(|i| ((i % 100) as i16 - 50) * 200).collect();
        let sample = AudioSample::from_bytes("t1", wav_bytes(16_000, 1, &frames));

        let pcm = AudioDecoder::new(16_000).decode(&sample).unwrap();
        assert_eq!(pcm.len(), 16_000);
        assert!((pcm[0] - (-50.0 * 200.0 / 32768.0)).abs() < 1e-4);
    }

    #[test]
    fn downmixes_stereo() {
        // L = +0.5 full-scale, R = -0.5 full-scale -> silence.
        let frames: Vec<i16> = (0..3_200).map(|i| if i % 2 == 0 { 16_384 } else { -16_384 }).collect();
        let sample = AudioSample::from_bytes("t1", wav_bytes(16_000, 2, &frames));

        let pcm = AudioDecoder::new(16_000).decode(&sample).unwrap();
        assert_eq!(pcm.len(), 1_600);
        assert!(pcm.iter().all(|s| s.abs() < 1e-4));
    }

    #[test]
    fn resamples_to_target_rate() {
        let frames = vec![0_i16; 44_100];
        let sample = AudioSample::from_bytes("t1", wav_bytes(44_100, 1, &frames));

        let pcm = AudioDecoder::new(16_000).decode(&sample).unwrap();
        assert_eq!(pcm.len(), 16_000);
    }

    #[test]
    fn reads_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        std::fs::write(&path, wav_bytes(16_000, 1, &vec![100_i16; 800])).unwrap();

        let sample = AudioSample::from_path("t1", &path);
        let pcm = AudioDecoder::new(16_000).decode(&sample).unwrap();
        assert_eq!(pcm.len(), 800);
    }

    #[test]
    fn garbage_bytes_fail_to_probe() {
        let sample = AudioSample::from_bytes("t1", b"definitely not audio".to_vec());
        let err = AudioDecoder::new(16_000).decode(&sample).unwrap_err();
        assert!(matches!(err, DecodeError::Probe(_)), "got {err:?}");
    }

    #[test]
    fn missing_file_is_io_error() {
        let sample = AudioSample::from_path("t1", PathBuf::from("/nonexistent/clip.wav"));
        let err = AudioDecoder::new(16_000).decode(&sample).unwrap_err();
        assert!(matches!(err, DecodeError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/clip.wav"));
    }

    #[test]
    fn header_only_wav_is_empty() {
        let sample = AudioSample::from_bytes("t1", wav_bytes(16_000, 1, &[]));
        let err = AudioDecoder::new(16_000).decode(&sample).unwrap_err();
        assert!(
            matches!(err, DecodeError::Empty | DecodeError::Codec(_) | DecodeError::Probe(_)),
            "got {err:?}"
        );
    }
}
