//! Bandpass-filtered noise voice

use std::f64::consts::PI;

/// Second-order bandpass (constant 0 dB peak), direct form I
#[derive(Debug, Clone, Copy)]
pub struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Biquad {
    /// Pass-through filter
    pub fn new() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    /// Configure as bandpass around `center` Hz
    pub fn set_bandpass(&mut self, center: f64, q: f64, sample_rate: f64) {
        let nyquist = sample_rate * 0.5;
        let center = center.clamp(1.0, nyquist * 0.95);
        let w0 = 2.0 * PI * (center / sample_rate);
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q.max(0.1));
        let a0 = 1.0 + alpha;
        self.b0 = (alpha / a0) as f32;
        self.b1 = 0.0;
        self.b2 = (-alpha / a0) as f32;
        self.a1 = (-2.0 * cos_w0 / a0) as f32;
        self.a2 = ((1.0 - alpha) / a0) as f32;
    }

    /// Clear the delay line
    pub fn clear(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }

    /// Filter one sample
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let y = self.b0 * x + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1
            - self.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }
}

impl Default for Biquad {
    fn default() -> Self {
        Self::new()
    }
}

const LFSR_SEED: u32 = 0x1FFFF;

/// 17-bit LFSR noise through a bandpass filter
#[derive(Debug, Clone)]
pub struct NoiseVoice {
    lfsr: u32,
    filter: Biquad,
    center: f64,
    q: f64,
    gain: f32,
    sample_rate: f64,
}

impl NoiseVoice {
    /// Create a silent voice
    pub fn new(sample_rate: u32) -> Self {
        let sample_rate = sample_rate.max(1) as f64;
        let mut filter = Biquad::new();
        filter.set_bandpass(1000.0, 1.0, sample_rate);
        NoiseVoice {
            lfsr: LFSR_SEED,
            filter,
            center: 1000.0,
            q: 1.0,
            gain: 0.0,
            sample_rate,
        }
    }

    /// Step to a new filter center, Q and gain
    pub fn set(&mut self, center: f64, q: f64, gain: f32) {
        let center_ok = center.is_finite() && center > 0.0;
        let q_ok = q.is_finite() && q > 0.0;
        if (center_ok && center != self.center) || (q_ok && q != self.q) {
            if center_ok {
                self.center = center;
            }
            if q_ok {
                self.q = q;
            }
            self.filter.set_bandpass(self.center, self.q, self.sample_rate);
        }
        self.gain = gain.clamp(0.0, 1.0);
    }

    /// Silence, reseed and clear the filter
    pub fn reset(&mut self) {
        self.lfsr = LFSR_SEED;
        self.filter.clear();
        self.gain = 0.0;
    }

    /// Current filter center
    pub fn center(&self) -> f64 {
        self.center
    }

    /// Current gain
    pub fn gain(&self) -> f32 {
        self.gain
    }

    #[inline]
    fn next_white(&mut self) -> f32 {
        let bit = (self.lfsr ^ (self.lfsr >> 3)) & 1;
        self.lfsr = (self.lfsr >> 1) | (bit << 16);
        if self.lfsr & 1 != 0 {
            1.0
        } else {
            -1.0
        }
    }

    /// Next output sample
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let white = self.next_white();
        let shaped = self.filter.process(white);
        shaped.clamp(-1.0, 1.0) * self.gain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lfsr_never_locks_up() {
        let mut voice = NoiseVoice::new(44_100);
        let mut ones = 0;
        for _ in 0..10_000 {
            if voice.next_white() > 0.0 {
                ones += 1;
            }
            assert_ne!(voice.lfsr, 0);
        }
        assert!(ones > 4_000 && ones < 6_000, "ones = {ones}");
    }

    #[test]
    fn test_zero_gain_is_silent() {
        let mut voice = NoiseVoice::new(44_100);
        voice.set(3000.0, 1.0, 0.0);
        assert!((0..256).all(|_| voice.next_sample() == 0.0));
    }

    #[test]
    fn test_output_bounded_by_gain() {
        let mut voice = NoiseVoice::new(44_100);
        voice.set(7000.0, 1.0, 0.5);
        for _ in 0..4096 {
            assert!(voice.next_sample().abs() <= 0.5);
        }
    }

    #[test]
    fn test_bandpass_rejects_dc() {
        let mut filter = Biquad::new();
        filter.set_bandpass(2000.0, 1.0, 44_100.0);
        let mut y = 0.0;
        for _ in 0..10_000 {
            y = filter.process(1.0);
        }
        assert!(y.abs() < 1e-3, "dc leak {y}");
    }
}
