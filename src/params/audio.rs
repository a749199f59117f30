//! Pipeline configuration and constants.

use std::time::Duration;

use crate::error::ConfigError;
use crate::fft;
use crate::queue::{WaitKind, MIN_DEPTH};

/// Sizes, rates and timing for one capture/transform/playback pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Device sample rate (Hz)
    pub sample_rate_hz: u32,

    /// Samples per device callback
    /// 256 = 5.8ms @ 44.1kHz
    pub chunk_size: usize,

    /// Transform size and queue frame width (power of 2, >= 4)
    pub fft_size: usize,

    /// Number of queue slots (power of 2, >= 2; one slot stays free)
    pub queue_depth: usize,

    /// How blocked queue sides wait
    pub wait: WaitKind,

    /// Upper bound on how long `close` waits for callbacks and workers (milliseconds)
    pub shutdown_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: audio_constants::SAMPLE_RATE_HZ,
            chunk_size: audio_constants::CHUNK_SIZE,
            fft_size: audio_constants::FFT_SIZE,
            queue_depth: audio_constants::QUEUE_DEPTH,
            wait: WaitKind::default(),
            shutdown_timeout_ms: audio_constants::SHUTDOWN_TIMEOUT_MS,
        }
    }
}

impl PipelineConfig {
    /// Magnitude bins per frame
    pub fn bin_count(&self) -> usize {
        fft::bin_count(self.fft_size)
    }

    /// Center frequency of magnitude bin `index` (bin 0 is the first above DC)
    pub fn bin_to_hz(&self, index: usize) -> f32 {
        (index + 1) as f32 * self.sample_rate_hz as f32 / self.fft_size as f32
    }

    /// Magnitude bin nearest to `hz`, clamped to the valid range
    pub fn hz_to_bin(&self, hz: f32) -> usize {
        let k = (hz * self.fft_size as f32 / self.sample_rate_hz as f32).round() as usize;
        k.clamp(1, self.bin_count().max(1)) - 1
    }

    /// Wall time covered by one device callback
    pub fn chunk_period(&self) -> Duration {
        Duration::from_secs_f64(self.chunk_size as f64 / self.sample_rate_hz as f64)
    }

    /// Wall time covered by one queue frame
    pub fn frame_period(&self) -> Duration {
        Duration::from_secs_f64(self.fft_size as f64 / self.sample_rate_hz as f64)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Validate configuration (FFT size and depth must be powers of 2, etc.)
    pub fn validate(&self) -> Result<(), ConfigError> {
        if fft::validate_size(self.fft_size).is_err() {
            return Err(ConfigError::NotPowerOfTwo {
                name: "FFT size",
                min: fft::MIN_SIZE,
                value: self.fft_size,
            });
        }
        if self.queue_depth < MIN_DEPTH || !self.queue_depth.is_power_of_two() {
            return Err(ConfigError::NotPowerOfTwo {
                name: "queue depth",
                min: MIN_DEPTH,
                value: self.queue_depth,
            });
        }
        if self.sample_rate_hz == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        if self.chunk_size == 0 || self.chunk_size > u16::MAX as usize {
            return Err(ConfigError::ChunkSize(self.chunk_size));
        }
        Ok(())
    }
}

/// Audio constants (defaults for the demo pipelines)
pub mod audio_constants {
    pub const SAMPLE_RATE_HZ: u32 = 44100;

    /// Samples per device callback
    pub const CHUNK_SIZE: usize = 256;

    /// 2^10 samples = 23.2ms @ 44.1kHz
    pub const FFT_SIZE: usize = 1024;

    pub const QUEUE_DEPTH: usize = 4;

    /// Sleep between polls of a blocked queue side
    pub const WAIT_SLEEP_US: u64 = 10;

    pub const SHUTDOWN_TIMEOUT_MS: u64 = 500;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bin_count(), 511);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_fft = PipelineConfig {
            fft_size: 1000,
            ..Default::default()
        };
        assert!(matches!(
            bad_fft.validate(),
            Err(ConfigError::NotPowerOfTwo { value: 1000, .. })
        ));

        let bad_depth = PipelineConfig {
            queue_depth: 3,
            ..Default::default()
        };
        assert!(bad_depth.validate().is_err());

        let zero_rate = PipelineConfig {
            sample_rate_hz: 0,
            ..Default::default()
        };
        assert_eq!(zero_rate.validate(), Err(ConfigError::ZeroSampleRate));

        let zero_chunk = PipelineConfig {
            chunk_size: 0,
            ..Default::default()
        };
        assert_eq!(zero_chunk.validate(), Err(ConfigError::ChunkSize(0)));
    }

    #[test]
    fn test_bin_frequency_mapping() {
        let config = PipelineConfig::default();

        // 44100 / 1024 ≈ 43.07 Hz per bin, first bin is one step above DC
        assert!((config.bin_to_hz(0) - 43.07).abs() < 0.01);
        assert_eq!(config.hz_to_bin(43.07), 0);
        assert_eq!(config.hz_to_bin(440.0), 9);
        assert_eq!(config.hz_to_bin(0.0), 0);
        assert_eq!(config.hz_to_bin(100_000.0), config.bin_count() - 1);
    }

    #[test]
    fn test_periods() {
        let config = PipelineConfig::default();
        let chunk_ms = config.chunk_period().as_secs_f64() * 1000.0;
        assert!((chunk_ms - 5.805).abs() < 0.01);

        let frame_ms = config.frame_period().as_secs_f64() * 1000.0;
        assert!((frame_ms - 4.0 * chunk_ms).abs() < 1e-3);
    }
}
