//! Test-tone synthesis.
//!
//! Tones are specified relative to the transform size rather than in Hz: a
//! `ratio` of 0.0 gives the shortest half-period (2 samples) and 1.0 the
//! longest (`fft_size / 2` samples), so every setting lands on the spectrum.

use std::f32::consts::PI;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

use crate::bridge::SampleSource;

/// Shortest half-period in samples
pub const MIN_HALF_PERIOD: usize = 2;

/// Tone shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaveForm {
    #[default]
    Square,
    Sine,
    Silent,
}

impl WaveForm {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Square,
            1 => Self::Sine,
            _ => Self::Silent,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Square => 0,
            Self::Sine => 1,
            Self::Silent => 2,
        }
    }
}

/// Half-period in samples for `ratio` (clamped to `[0, 1]`) at `fft_size`
pub fn half_period(ratio: f32, fft_size: usize) -> usize {
    let max = (fft_size / 2).max(MIN_HALF_PERIOD);
    let span = (max - MIN_HALF_PERIOD) as f32;
    let half = (MIN_HALF_PERIOD as f32 + ratio.clamp(0.0, 1.0) * span).round() as usize;
    half.clamp(MIN_HALF_PERIOD, max)
}

/// Frequency in Hz of a tone with the given half-period
pub fn tone_frequency_hz(half_period: usize, sample_rate_hz: u32) -> f32 {
    sample_rate_hz as f32 / (2 * half_period.max(1)) as f32
}

/// Shape and pitch of a running tone, adjustable from any thread
#[derive(Debug, Clone)]
pub struct ToneControl {
    form: Arc<AtomicU8>,
    ratio: Arc<AtomicU32>,
}

impl Default for ToneControl {
    fn default() -> Self {
        Self::new(WaveForm::default(), 0.5)
    }
}

impl ToneControl {
    pub fn new(form: WaveForm, ratio: f32) -> Self {
        Self {
            form: Arc::new(AtomicU8::new(form.as_u8())),
            ratio: Arc::new(AtomicU32::new(clamp_ratio(ratio).to_bits())),
        }
    }

    pub fn form(&self) -> WaveForm {
        WaveForm::from_u8(self.form.load(Ordering::Relaxed))
    }

    pub fn set_form(&self, form: WaveForm) {
        self.form.store(form.as_u8(), Ordering::Relaxed);
    }

    pub fn ratio(&self) -> f32 {
        f32::from_bits(self.ratio.load(Ordering::Relaxed))
    }

    /// Set the pitch ratio, clamped to `[0, 1]`
    pub fn set_ratio(&self, ratio: f32) {
        self.ratio
            .store(clamp_ratio(ratio).to_bits(), Ordering::Relaxed);
    }
}

fn clamp_ratio(ratio: f32) -> f32 {
    if ratio.is_nan() {
        0.0
    } else {
        ratio.clamp(0.0, 1.0)
    }
}

/// Generates the tone described by a [`ToneControl`]
#[derive(Debug)]
pub struct ToneGenerator {
    control: ToneControl,
    fft_size: usize,
    index: usize,
    form: WaveForm,
    half: usize,
}

impl ToneGenerator {
    pub fn new(control: ToneControl, fft_size: usize) -> Self {
        let form = control.form();
        let half = half_period(control.ratio(), fft_size);
        Self {
            control,
            fft_size,
            index: 0,
            form,
            half,
        }
    }

    /// Half-period currently being generated
    pub fn half_period(&self) -> usize {
        self.half
    }

    fn refresh(&mut self) {
        let form = self.control.form();
        let half = half_period(self.control.ratio(), self.fft_size);
        if form != self.form || half != self.half {
            self.form = form;
            self.half = half;
            self.index = 0;
        }
    }
}

impl SampleSource for ToneGenerator {
    fn fill(&mut self, out: &mut [f32]) {
        self.refresh();
        let period = 2 * self.half;

        for sample in out.iter_mut() {
            *sample = match self.form {
                WaveForm::Square => {
                    if (self.index / self.half) % 2 == 1 {
                        1.0
                    } else {
                        -1.0
                    }
                }
                WaveForm::Sine => (PI * self.index as f32 / self.half as f32).sin(),
                WaveForm::Silent => 0.0,
            };
            // Wrap on whole periods so the phase never loses precision
            self.index = (self.index + 1) % period;
        }
    }
}
