//! Square-wave tone voice

/// Phase-accumulator square oscillator with a stepped gain
#[derive(Debug, Clone, Copy)]
pub struct ToneVoice {
    frequency: f64,
    phase: f64,
    phase_inc: f64,
    gain: f32,
    sample_rate: f64,
}

impl ToneVoice {
    /// Create a silent voice
    pub fn new(sample_rate: u32) -> Self {
        let sample_rate = sample_rate.max(1) as f64;
        ToneVoice {
            frequency: 1.0,
            phase: 0.0,
            phase_inc: 1.0 / sample_rate,
            gain: 0.0,
            sample_rate,
        }
    }

    /// Step to a new frequency and gain, keeping the waveform phase
    pub fn set(&mut self, frequency: f64, gain: f32) {
        if frequency.is_finite() && frequency > 0.0 {
            self.frequency = frequency;
            // above Nyquist the square aliases into noise; cap it
            self.phase_inc = (frequency / self.sample_rate).min(0.5);
        }
        self.gain = gain.clamp(0.0, 1.0);
    }

    /// Silence and rewind
    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.gain = 0.0;
    }

    /// Current frequency
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Current gain
    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Next output sample in `[-gain, gain]`
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let out = if self.phase < 0.5 { 1.0 } else { -1.0 };
        self.phase += self.phase_inc;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        out * self.gain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_period() {
        let mut voice = ToneVoice::new(8);
        voice.set(2.0, 1.0);
        let samples: Vec<f32> = (0..8).map(|_| voice.next_sample()).collect();
        assert_eq!(samples, vec![1.0, 1.0, -1.0, -1.0, 1.0, 1.0, -1.0, -1.0]);
    }

    #[test]
    fn test_gain_clamped_and_invalid_frequency_ignored() {
        let mut voice = ToneVoice::new(44_100);
        voice.set(440.0, 3.0);
        assert_eq!(voice.gain(), 1.0);
        voice.set(f64::NAN, -1.0);
        assert_eq!(voice.frequency(), 440.0);
        assert_eq!(voice.gain(), 0.0);
        assert_eq!(voice.next_sample().abs(), 0.0);
    }
}
