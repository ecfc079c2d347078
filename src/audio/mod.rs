//! Audio input: encoded sample → decoded PCM → mono → 16 kHz.
//!
//! # Pipeline
//!
//! ```text
//! AudioSample (bytes | path) → symphonia probe/decode → downmix_to_mono
//!           → resample (rubato sinc) → Vec<f32> @ 16 kHz
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use cogai_risk::audio::{AudioDecoder, AudioSample};
//!
//! let decoder = AudioDecoder::new(16_000);
//! let sample = AudioSample::from_path("picture-description", "uploads/a1/story.wav");
//! let pcm = decoder.decode(&sample).unwrap();
//! println!("{} samples", pcm.len());
//! ```

pub mod decode;
pub mod resample;
pub mod sample;

pub use decode::{AudioDecoder, DecodeError};
pub use resample::{downmix_to_mono, resample};
pub use sample::{AudioSample, AudioSource, SampleManifest};
