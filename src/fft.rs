//! Fixed-size real FFT engine.
//!
//! Wraps a planned `rustfft` transform in the packed real-FFT layout used by
//! the classic Ooura `rdft` routines, so the rest of the pipeline can work on
//! plain `f32` frames in place.
//!
//! # Data format
//!
//! Forward transform:
//! - Input: `n` real-valued time-domain samples
//! - Output: `a[0]` = DC, `a[1]` = Nyquist,
//!   `a[2*k], a[2*k+1]` = real/imaginary of bin `k` for `1 <= k < n/2`
//!
//! Inverse transform:
//! - Input: packed frequency-domain data (as produced by `forward`)
//! - Output: `n` time-domain samples, peak-normalized to 1.0

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::error::FftError;

/// Smallest supported transform size
pub const MIN_SIZE: usize = 4;

/// Number of magnitude bins produced for a transform of `size` samples.
///
/// DC and Nyquist are excluded, leaving `(size - 2) / 2` bins.
pub const fn bin_count(size: usize) -> usize {
    size.saturating_sub(2) / 2
}

/// Check that `size` is a usable transform size
pub fn validate_size(size: usize) -> Result<(), FftError> {
    if size < MIN_SIZE || !size.is_power_of_two() {
        return Err(FftError::InvalidSize(size));
    }
    Ok(())
}

/// In-place real FFT over a fixed power-of-two size.
///
/// Twiddles and scratch space are allocated once in [`RealFft::new`]; the
/// transforms themselves never allocate.
pub struct RealFft {
    size: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    work: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl RealFft {
    /// Plan forward and inverse transforms for `size` samples
    pub fn new(size: usize) -> Result<Self, FftError> {
        validate_size(size)?;

        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(size);
        let inverse = planner.plan_fft_inverse(size);

        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());

        Ok(Self {
            size,
            forward,
            inverse,
            work: vec![Complex::new(0.0, 0.0); size],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
        })
    }

    /// Transform size in samples
    pub fn size(&self) -> usize {
        self.size
    }

    /// Forward real DFT in place, packed as described in the module docs.
    ///
    /// # Panics
    ///
    /// Panics if `buffer.len() != self.size()`.
    pub fn forward(&mut self, buffer: &mut [f32]) {
        assert_eq!(buffer.len(), self.size, "buffer length must be {}", self.size);
        let half = self.size / 2;

        for (w, &x) in self.work.iter_mut().zip(buffer.iter()) {
            *w = Complex::new(x, 0.0);
        }
        self.forward
            .process_with_scratch(&mut self.work, &mut self.scratch);

        buffer[0] = self.work[0].re;
        buffer[1] = self.work[half].re;
        for k in 1..half {
            buffer[2 * k] = self.work[k].re;
            buffer[2 * k + 1] = self.work[k].im;
        }
    }

    /// Forward transform followed by magnitude extraction into `bins`.
    ///
    /// # Panics
    ///
    /// Panics if `buffer.len() != self.size()` or
    /// `bins.len() != bin_count(self.size())`.
    pub fn forward_bins(&mut self, buffer: &mut [f32], bins: &mut [f32]) {
        self.forward(buffer);
        magnitudes(buffer, bins);
    }

    /// Inverse real DFT in place, then peak-normalize the result.
    ///
    /// An all-zero input stays all zero.
    ///
    /// # Panics
    ///
    /// Panics if `buffer.len() != self.size()`.
    pub fn inverse(&mut self, buffer: &mut [f32]) {
        assert_eq!(buffer.len(), self.size, "buffer length must be {}", self.size);
        let n = self.size;
        let half = n / 2;

        self.work[0] = Complex::new(buffer[0], 0.0);
        self.work[half] = Complex::new(buffer[1], 0.0);
        for k in 1..half {
            let c = Complex::new(buffer[2 * k], buffer[2 * k + 1]);
            self.work[k] = c;
            self.work[n - k] = c.conj();
        }
        self.inverse
            .process_with_scratch(&mut self.work, &mut self.scratch);

        for (x, w) in buffer.iter_mut().zip(self.work.iter()) {
            *x = w.re;
        }
        peak_normalize(buffer);
    }
}

impl std::fmt::Debug for RealFft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealFft").field("size", &self.size).finish()
    }
}

/// Fill `bins` with `hypot(re, im)` of every packed bin after DC/Nyquist.
///
/// # Panics
///
/// Panics if `bins.len() != bin_count(spectrum.len())`.
pub fn magnitudes(spectrum: &[f32], bins: &mut [f32]) {
    assert_eq!(
        bins.len(),
        bin_count(spectrum.len()),
        "bin slice length must be {}",
        bin_count(spectrum.len())
    );
    for (bin, pair) in bins.iter_mut().zip(spectrum[2..].chunks_exact(2)) {
        *bin = pair[0].hypot(pair[1]);
    }
}

/// Divide every sample by the largest absolute value. Leaves silence untouched.
pub fn peak_normalize(buffer: &mut [f32]) {
    let peak = buffer.iter().fold(0.0_f32, |m, x| m.max(x.abs()));
    if peak > 0.0 {
        let scale = 1.0 / peak;
        for x in buffer.iter_mut() {
            *x *= scale;
        }
    }
}

/// One transform instance with its own time-domain buffer and magnitude bins.
///
/// Constructed once per session and reused without reallocation.
#[derive(Debug)]
pub struct FftContext {
    engine: RealFft,
    buffer: Box<[f32]>,
    bins: Box<[f32]>,
}

impl FftContext {
    pub fn new(size: usize) -> Result<Self, FftError> {
        let engine = RealFft::new(size)?;
        Ok(Self {
            engine,
            buffer: vec![0.0; size].into_boxed_slice(),
            bins: vec![0.0; bin_count(size)].into_boxed_slice(),
        })
    }

    pub fn size(&self) -> usize {
        self.engine.size()
    }

    pub fn buffer(&self) -> &[f32] {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut [f32] {
        &mut self.buffer
    }

    /// Magnitude spectrum from the last `forward` / `extract_bins`
    pub fn bins(&self) -> &[f32] {
        &self.bins
    }

    /// Transform the buffer and refresh the bins
    pub fn forward(&mut self) {
        self.engine.forward_bins(&mut self.buffer, &mut self.bins);
    }

    /// Transform the buffer, leaving the bins as they were
    pub fn forward_raw(&mut self) {
        self.engine.forward(&mut self.buffer);
    }

    /// Refresh the bins from a buffer that already holds a packed spectrum
    pub fn extract_bins(&mut self) {
        magnitudes(&self.buffer, &mut self.bins);
    }

    pub fn inverse(&mut self) {
        self.engine.inverse(&mut self.buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn assert_close(a: &[f32], b: &[f32], tol: f32) {
        assert_eq!(a.len(), b.len());
        for (i, (x, y)) in a.iter().zip(b).enumerate() {
            assert!((x - y).abs() <= tol, "index {}: {} vs {}", i, x, y);
        }
    }

    #[test]
    fn test_rejects_invalid_sizes() {
        for size in [0, 1, 2, 3, 6, 12, 1000] {
            assert_eq!(RealFft::new(size).err(), Some(FftError::InvalidSize(size)));
        }
        assert!(RealFft::new(4).is_ok());
        assert!(RealFft::new(1024).is_ok());
    }

    #[test]
    fn test_bin_count() {
        assert_eq!(bin_count(4), 1);
        assert_eq!(bin_count(8), 3);
        assert_eq!(bin_count(1024), 511);

        let ctx = FftContext::new(256).unwrap();
        assert_eq!(ctx.bins().len(), 127);
    }

    #[test]
    fn test_round_trip_is_peak_normalized() {
        let n = 64;
        let mut fft = RealFft::new(n).unwrap();
        let original: Vec<f32> = (0..n)
            .map(|i| 0.25 * (2.0 * PI * 3.0 * i as f32 / n as f32).sin() + 0.1 * (i % 5) as f32)
            .collect();

        let mut buffer = original.clone();
        fft.forward(&mut buffer);
        fft.inverse(&mut buffer);

        let peak = original.iter().fold(0.0_f32, |m, x| m.max(x.abs()));
        let expected: Vec<f32> = original.iter().map(|x| x / peak).collect();
        assert_close(&buffer, &expected, 1e-4);

        let max = buffer.iter().fold(0.0_f32, |m, x| m.max(x.abs()));
        assert!((max - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_round_trip_smallest_size() {
        let mut fft = RealFft::new(4).unwrap();
        let mut buffer = [0.5, -2.0, 1.0, 0.25];
        fft.forward(&mut buffer);
        fft.inverse(&mut buffer);
        assert_close(&buffer, &[0.25, -1.0, 0.5, 0.125], 1e-5);
    }

    #[test]
    fn test_zero_input_stays_zero() {
        let mut fft = RealFft::new(32).unwrap();
        let mut buffer = vec![0.0_f32; 32];
        let mut bins = vec![0.0_f32; bin_count(32)];

        fft.forward_bins(&mut buffer, &mut bins);
        assert!(buffer.iter().all(|&x| x == 0.0));
        assert!(bins.iter().all(|&x| x == 0.0));

        fft.inverse(&mut buffer);
        assert!(buffer.iter().all(|&x| x == 0.0 && !x.is_nan()));
    }

    #[test]
    fn test_packed_layout_dc_and_nyquist() {
        let mut fft = RealFft::new(8).unwrap();

        // Constant signal: everything lands in DC
        let mut dc = [1.0_f32; 8];
        fft.forward(&mut dc);
        assert!((dc[0] - 8.0).abs() < 1e-5);
        assert!(dc[1].abs() < 1e-5);
        assert!(dc[2..].iter().all(|x| x.abs() < 1e-5));

        // Alternating signal: everything lands in Nyquist
        let mut nyquist = [1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0];
        fft.forward(&mut nyquist);
        assert!(nyquist[0].abs() < 1e-5);
        assert!((nyquist[1] - 8.0).abs() < 1e-5);
    }

    #[test]
    fn test_sine_peaks_in_expected_bin() {
        let n = 1024;
        let cycles = 40;
        let mut ctx = FftContext::new(n).unwrap();
        for (i, x) in ctx.buffer_mut().iter_mut().enumerate() {
            *x = (2.0 * PI * cycles as f32 * i as f32 / n as f32).sin();
        }
        ctx.forward();

        assert!(ctx.bins().iter().all(|&b| b >= 0.0));
        let (peak, _) = ctx
            .bins()
            .iter()
            .enumerate()
            .fold((0, 0.0_f32), |acc, (i, &b)| if b > acc.1 { (i, b) } else { acc });
        // bins[i] holds frequency index i + 1
        assert_eq!(peak + 1, cycles);
        assert!((ctx.bins()[peak] - n as f32 / 2.0).abs() < 1.0);
    }

    #[test]
    fn test_context_extract_bins_matches_forward() {
        let n = 128;
        let mut a = FftContext::new(n).unwrap();
        let mut b = FftContext::new(n).unwrap();
        for (i, (x, y)) in a
            .buffer_mut()
            .iter_mut()
            .zip(b.buffer_mut().iter_mut())
            .enumerate()
        {
            let v = ((i * 7) % 13) as f32 - 6.0;
            *x = v;
            *y = v;
        }

        a.forward();
        b.forward_raw();
        assert!(b.bins().iter().all(|&x| x == 0.0));
        b.extract_bins();
        assert_close(a.bins(), b.bins(), 1e-4);
    }

    #[test]
    fn test_peak_normalize() {
        let mut buffer = [0.5, -4.0, 2.0];
        peak_normalize(&mut buffer);
        assert_eq!(buffer, [0.125, -1.0, 0.5]);

        let mut silent = [0.0_f32; 4];
        peak_normalize(&mut silent);
        assert_eq!(silent, [0.0; 4]);
    }
}
