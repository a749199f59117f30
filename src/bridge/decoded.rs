//! Pre-decoded audio used in place of a live capture device.

use std::path::Path;
use std::sync::Arc;

use hound::{SampleFormat, WavReader};

use super::{pcm_i16_to_f32, SampleSource};
use crate::error::DecodeError;

/// A flat run of normalized mono samples with a known length
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedAudio {
    samples: Vec<f32>,
    sample_rate_hz: u32,
}

impl DecodedAudio {
    pub fn from_samples(samples: Vec<f32>, sample_rate_hz: u32) -> Self {
        Self {
            samples,
            sample_rate_hz,
        }
    }

    /// Convert signed 16-bit PCM (`sample / 32768`)
    pub fn from_pcm_i16(pcm: &[i16], sample_rate_hz: u32) -> Self {
        Self {
            samples: pcm.iter().map(|&s| pcm_i16_to_f32(s)).collect(),
            sample_rate_hz,
        }
    }

    /// Decode a WAV file. Only the first channel of multi-channel files is kept.
    pub fn open_wav<P: AsRef<Path>>(path: P) -> Result<Self, DecodeError> {
        let mut reader = WavReader::open(path)?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let samples = match spec.sample_format {
            SampleFormat::Float => reader
                .samples::<f32>()
                .step_by(channels)
                .collect::<Result<Vec<_>, _>>()?,
            SampleFormat::Int if spec.bits_per_sample == 16 => reader
                .samples::<i16>()
                .step_by(channels)
                .map(|s| s.map(pcm_i16_to_f32))
                .collect::<Result<Vec<_>, _>>()?,
            SampleFormat::Int if (1..=32).contains(&spec.bits_per_sample) => {
                let scale = (1_u64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .step_by(channels)
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<Vec<_>, _>>()?
            }
            SampleFormat::Int => return Err(DecodeError::BitDepth(spec.bits_per_sample)),
        };

        log::info!(
            "Decoded {} samples @ {}Hz ({} channel(s) in file)",
            samples.len(),
            spec.sample_rate,
            channels
        );

        Ok(Self {
            samples,
            sample_rate_hz: spec.sample_rate,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }
}

/// What a reader does once it reaches the end of the audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EndOfInput {
    /// Wrap around to the first sample
    #[default]
    Loop,
    /// Emit silence from then on
    ZeroFill,
}

/// Sequential reader over shared decoded audio
#[derive(Debug, Clone)]
pub struct DecodedReader {
    audio: Arc<DecodedAudio>,
    position: usize,
    end: EndOfInput,
}

impl DecodedReader {
    pub fn new(audio: Arc<DecodedAudio>, end: EndOfInput) -> Self {
        Self {
            audio,
            position: 0,
            end,
        }
    }

    /// Next sample index to be read
    pub fn position(&self) -> usize {
        self.position
    }
}

impl SampleSource for DecodedReader {
    fn fill(&mut self, out: &mut [f32]) {
        let samples = self.audio.samples();
        if samples.is_empty() {
            out.fill(0.0);
            return;
        }

        let mut written = 0;
        while written < out.len() {
            if self.position >= samples.len() {
                match self.end {
                    EndOfInput::Loop => self.position = 0,
                    EndOfInput::ZeroFill => {
                        out[written..].fill(0.0);
                        return;
                    }
                }
            }
            let take = (samples.len() - self.position).min(out.len() - written);
            out[written..written + take]
                .copy_from_slice(&samples[self.position..self.position + take]);
            self.position += take;
            written += take;
        }
    }
}
