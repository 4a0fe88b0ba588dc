//! Analyser tap after the final mix
//!
//! The voice bank pushes every mixed sample into the tap; visualizers pull
//! fixed-size windows whenever they like. Pulls never block rendering for
//! longer than a window copy.
//!
//! Frequency data follows the usual web-analyser conventions: Hann window,
//! magnitude in dB, exponential smoothing between pulls.

use crate::{ReplayError, Result};
use parking_lot::Mutex;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;
use std::fmt;
use std::sync::Arc;

/// Default window length
pub const DEFAULT_ANALYSER_SIZE: usize = 2048;
/// Smallest window length accepted
pub const MIN_ANALYSER_SIZE: usize = 32;
/// Largest window length accepted
pub const MAX_ANALYSER_SIZE: usize = 32768;

const SMOOTHING: f32 = 0.8;
const MIN_DB: f32 = -100.0;
const MAX_DB: f32 = -30.0;

struct TapState {
    ring: Vec<f32>,
    write_pos: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    scratch: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
}

impl TapState {
    /// Copy the ring into `out` oldest sample first
    fn snapshot(&self, out: &mut [f32]) {
        let size = self.ring.len();
        let n = out.len().min(size);
        let start = (self.write_pos + size - n) % size;
        for (i, slot) in out.iter_mut().take(n).enumerate() {
            *slot = self.ring[(start + i) % size];
        }
    }
}

/// Cloneable handle to the post-mix sample window
#[derive(Clone)]
pub struct AnalyserTap {
    inner: Arc<Mutex<TapState>>,
    size: usize,
}

impl fmt::Debug for AnalyserTap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyserTap").field("size", &self.size).finish()
    }
}

impl AnalyserTap {
    /// Create a tap holding `size` samples (power of two, 32..=32768)
    pub fn new(size: usize) -> Result<Self> {
        validate_size(size)?;
        let fft = FftPlanner::<f32>::new().plan_fft_forward(size);
        let window = (0..size)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / size as f32).cos()))
            .collect();
        let state = TapState {
            ring: vec![0.0; size],
            write_pos: 0,
            fft,
            window,
            scratch: vec![Complex::new(0.0, 0.0); size],
            smoothed: vec![0.0; size / 2],
        };
        Ok(AnalyserTap {
            inner: Arc::new(Mutex::new(state)),
            size,
        })
    }

    /// Window length in samples
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of frequency bins (half the window)
    pub fn frequency_bin_count(&self) -> usize {
        self.size / 2
    }

    /// Append mixed samples
    pub fn push_block(&self, samples: &[f32]) {
        let mut state = self.inner.lock();
        let size = state.ring.len();
        for &sample in samples {
            let pos = state.write_pos;
            state.ring[pos] = sample;
            state.write_pos = (pos + 1) % size;
        }
    }

    /// Zero the window and the smoothing memory
    pub fn clear(&self) {
        let mut state = self.inner.lock();
        state.ring.iter_mut().for_each(|s| *s = 0.0);
        state.smoothed.iter_mut().for_each(|s| *s = 0.0);
        state.write_pos = 0;
    }

    /// Latest `out.len()` samples (at most `size`), oldest first
    pub fn time_domain_data(&self, out: &mut [f32]) {
        self.inner.lock().snapshot(out);
    }

    /// Smoothed magnitude spectrum in dB, one value per bin
    ///
    /// Fills at most [`frequency_bin_count`](Self::frequency_bin_count) values.
    pub fn frequency_data(&self, out: &mut [f32]) {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        let size = state.ring.len();

        let mut frame = vec![0.0f32; size];
        state.snapshot(&mut frame);
        for ((slot, &sample), &w) in state.scratch.iter_mut().zip(&frame).zip(&state.window) {
            *slot = Complex::new(sample * w, 0.0);
        }
        state.fft.process(&mut state.scratch);

        let scale = 1.0 / size as f32;
        for (smoothed, bin) in state.smoothed.iter_mut().zip(&state.scratch) {
            let magnitude = bin.norm() * scale;
            *smoothed = SMOOTHING * *smoothed + (1.0 - SMOOTHING) * magnitude;
        }

        for (slot, &magnitude) in out.iter_mut().zip(&state.smoothed) {
            *slot = if magnitude > 0.0 {
                20.0 * magnitude.log10()
            } else {
                f32::NEG_INFINITY
            };
        }
    }

    /// Frequency data scaled to 0..=255 between -100 dB and -30 dB
    pub fn byte_frequency_data(&self, out: &mut [u8]) {
        let mut db = vec![0.0f32; out.len().min(self.frequency_bin_count())];
        self.frequency_data(&mut db);
        for (slot, &value) in out.iter_mut().zip(&db) {
            let norm = ((value - MIN_DB) / (MAX_DB - MIN_DB)).clamp(0.0, 1.0);
            *slot = (norm * 255.0) as u8;
        }
    }

    /// Root-mean-square level of the current window
    pub fn rms(&self) -> f32 {
        let state = self.inner.lock();
        let sum: f32 = state.ring.iter().map(|s| s * s).sum();
        (sum / state.ring.len() as f32).sqrt()
    }
}

/// Check an analyser window length
pub fn validate_size(size: usize) -> Result<()> {
    if !size.is_power_of_two() || !(MIN_ANALYSER_SIZE..=MAX_ANALYSER_SIZE).contains(&size) {
        return Err(ReplayError::ConfigError(format!(
            "analyser size must be a power of two between {MIN_ANALYSER_SIZE} and {MAX_ANALYSER_SIZE}, got {size}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_sizes() {
        assert!(AnalyserTap::new(0).is_err());
        assert!(AnalyserTap::new(1000).is_err());
        assert!(AnalyserTap::new(16).is_err());
        assert!(AnalyserTap::new(65536).is_err());
        assert!(AnalyserTap::new(1024).is_ok());
    }

    #[test]
    fn test_time_domain_oldest_first() {
        let tap = AnalyserTap::new(32).unwrap();
        let samples: Vec<f32> = (0..40).map(|i| i as f32).collect();
        tap.push_block(&samples);

        let mut out = [0.0f32; 4];
        tap.time_domain_data(&mut out);
        assert_eq!(out, [36.0, 37.0, 38.0, 39.0]);

        let mut full = vec![0.0f32; 64];
        tap.time_domain_data(&mut full);
        assert_eq!(full[0], 8.0);
        assert_eq!(full[31], 39.0);
        assert_eq!(full[32], 0.0);
    }

    #[test]
    fn test_spectrum_peaks_at_tone_bin() {
        let size = 1024;
        let tap = AnalyserTap::new(size).unwrap();
        let bin = 64;
        let samples: Vec<f32> = (0..size)
            .map(|i| (2.0 * PI * bin as f32 * i as f32 / size as f32).sin())
            .collect();
        tap.push_block(&samples);

        let mut db = vec![0.0f32; tap.frequency_bin_count()];
        tap.frequency_data(&mut db);
        let peak = db
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, bin);
    }

    #[test]
    fn test_silence_maps_to_zero_bytes() {
        let tap = AnalyserTap::new(64).unwrap();
        let mut bytes = [7u8; 32];
        tap.byte_frequency_data(&mut bytes);
        assert!(bytes.iter().all(|&b| b == 0));
        assert_eq!(tap.rms(), 0.0);
    }

    #[test]
    fn test_clones_share_window() {
        let tap = AnalyserTap::new(32).unwrap();
        let viewer = tap.clone();
        tap.push_block(&[0.5; 32]);
        assert!((viewer.rms() - 0.5).abs() < 1e-6);
        viewer.clear();
        assert_eq!(tap.rms(), 0.0);
    }
}
