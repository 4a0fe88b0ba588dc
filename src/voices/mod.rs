//! Chip voice bank
//!
//! Leaf audio primitives (square tone voices, bandpass noise voice) and the
//! [`VoiceSink`] seam the session drives. [`VoiceBank`] is the software
//! implementation; tests and tools can plug in their own sink.

mod bank;
mod noise;
mod tone;

pub use bank::{VoiceBank, DEFAULT_EVENT_CAPACITY};
pub use noise::{Biquad, NoiseVoice};
pub use tone::ToneVoice;

use crate::analyser::AnalyserTap;
use crate::decoder::VoiceTargets;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// Destination of decoded voice targets
///
/// Implementations must clamp gains to `[0, 1]` and apply each target set as
/// a step at time `at` (audio-clock seconds).
pub trait VoiceSink: Send {
    /// Schedule a target set for audio-clock time `at`
    fn apply_targets(&mut self, targets: &VoiceTargets, at: f64);

    /// Drop pending changes and silence every voice
    fn reset(&mut self);

    /// Current audio-clock time in seconds
    fn current_time(&self) -> f64;
}

/// Voice bank shared between the scheduler worker and the audio callback
#[derive(Debug, Clone)]
pub struct SharedVoiceBank {
    inner: Arc<Mutex<VoiceBank>>,
    tap: AnalyserTap,
}

impl SharedVoiceBank {
    /// Wrap a bank
    pub fn new(bank: VoiceBank) -> Self {
        let tap = bank.analyser().clone();
        SharedVoiceBank {
            inner: Arc::new(Mutex::new(bank)),
            tap,
        }
    }

    /// Lock the bank
    pub fn lock(&self) -> MutexGuard<'_, VoiceBank> {
        self.inner.lock()
    }

    /// Render samples, advancing the shared audio clock
    pub fn render(&self, out: &mut [f32]) {
        self.inner.lock().render(out);
    }

    /// Analyser handle; pulling from it never locks the bank
    pub fn analyser(&self) -> &AnalyserTap {
        &self.tap
    }

    /// Output sample rate
    pub fn sample_rate(&self) -> u32 {
        self.inner.lock().sample_rate()
    }
}

impl VoiceSink for SharedVoiceBank {
    fn apply_targets(&mut self, targets: &VoiceTargets, at: f64) {
        self.inner.lock().apply_targets(targets, at);
    }

    fn reset(&mut self) {
        self.inner.lock().reset();
    }

    fn current_time(&self) -> f64 {
        self.inner.lock().current_time()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_bank_clock_follows_render() {
        let bank = SharedVoiceBank::new(VoiceBank::with_analyser(100, 4, 32).unwrap());
        let renderer = bank.clone();
        let mut buf = [0.0f32; 50];
        renderer.render(&mut buf);
        assert!((bank.current_time() - 0.5).abs() < 1e-9);
    }
}
