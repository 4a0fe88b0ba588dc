//! Voice bank: three tone voices, one noise voice, final mix

use super::noise::NoiseVoice;
use super::tone::ToneVoice;
use super::VoiceSink;
use crate::analyser::AnalyserTap;
use crate::decoder::VoiceTargets;
use crate::Result;
use std::collections::VecDeque;

/// Default number of pending target sets
pub const DEFAULT_EVENT_CAPACITY: usize = 512;

/// Target set waiting for its due sample
#[derive(Debug, Clone, Copy)]
struct PendingTargets {
    at_sample: u64,
    targets: VoiceTargets,
}

/// Sample-accurate software voice bank
///
/// [`apply_targets`](VoiceSink::apply_targets) queues a target set stamped with
/// its due audio-clock time; [`render`](Self::render) switches the voices at
/// exactly that sample. Changes are steps, never ramps. Times already in the
/// past take effect at the next rendered sample.
#[derive(Debug)]
pub struct VoiceBank {
    sample_rate: u32,
    tones: [ToneVoice; 3],
    noise: NoiseVoice,
    pending: VecDeque<PendingTargets>,
    capacity: usize,
    samples_rendered: u64,
    current: VoiceTargets,
    tap: AnalyserTap,
}

impl VoiceBank {
    /// Create a silent bank
    pub fn new(sample_rate: u32, capacity: usize, tap: AnalyserTap) -> Self {
        let sample_rate = sample_rate.max(1);
        VoiceBank {
            sample_rate,
            tones: [ToneVoice::new(sample_rate); 3],
            noise: NoiseVoice::new(sample_rate),
            pending: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
            samples_rendered: 0,
            current: VoiceTargets::default(),
            tap,
        }
    }

    /// Create a bank with its own analyser of `analyser_size` samples
    pub fn with_analyser(sample_rate: u32, capacity: usize, analyser_size: usize) -> Result<Self> {
        Ok(Self::new(sample_rate, capacity, AnalyserTap::new(analyser_size)?))
    }

    /// Output sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Handle to the post-mix analyser
    pub fn analyser(&self) -> &AnalyserTap {
        &self.tap
    }

    /// Samples rendered since creation
    pub fn samples_rendered(&self) -> u64 {
        self.samples_rendered
    }

    /// Target sets waiting for their due sample
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Targets currently driving the voices
    pub fn current_targets(&self) -> &VoiceTargets {
        &self.current
    }

    fn sample_for(&self, at: f64) -> u64 {
        if at.is_finite() && at > 0.0 {
            (at * self.sample_rate as f64).round() as u64
        } else {
            0
        }
    }

    fn enqueue(&mut self, at_sample: u64, targets: VoiceTargets) {
        if self.pending.len() >= self.capacity {
            if let Some(oldest) = self.pending.pop_front() {
                log::warn!(
                    "voice event queue full ({}), applying event due at sample {} early",
                    self.capacity,
                    oldest.at_sample
                );
                self.switch_to(&oldest.targets);
            }
        }
        let at_sample = at_sample.max(self.samples_rendered);
        let pos = self.pending.partition_point(|p| p.at_sample <= at_sample);
        self.pending.insert(pos, PendingTargets { at_sample, targets });
    }

    fn switch_to(&mut self, targets: &VoiceTargets) {
        for (voice, target) in self.tones.iter_mut().zip(&targets.tones) {
            let gain = if target.enabled { target.gain } else { 0.0 };
            voice.set(target.frequency, gain);
        }
        let noise = &targets.noise;
        let gain = if noise.enabled { noise.gain } else { 0.0 };
        self.noise.set(noise.center_frequency, noise.q, gain);
        self.current = *targets;
    }

    /// Render mono samples into `out`, advancing the audio clock
    pub fn render(&mut self, out: &mut [f32]) {
        for slot in out.iter_mut() {
            while let Some(next) = self.pending.front() {
                if next.at_sample > self.samples_rendered {
                    break;
                }
                if let Some(due) = self.pending.pop_front() {
                    self.switch_to(&due.targets);
                }
            }

            let mut mix = self.noise.next_sample();
            for voice in self.tones.iter_mut() {
                mix += voice.next_sample();
            }
            *slot = (mix * 0.25).clamp(-1.0, 1.0);
            self.samples_rendered += 1;
        }
        self.tap.push_block(out);
    }

    /// Render `count` samples into a new buffer
    pub fn render_vec(&mut self, count: usize) -> Vec<f32> {
        let mut out = vec![0.0; count];
        self.render(&mut out);
        out
    }
}

impl VoiceSink for VoiceBank {
    fn apply_targets(&mut self, targets: &VoiceTargets, at: f64) {
        let at_sample = self.sample_for(at);
        self.enqueue(at_sample, *targets);
    }

    fn reset(&mut self) {
        self.pending.clear();
        for voice in self.tones.iter_mut() {
            voice.reset();
        }
        self.noise.reset();
        self.current = VoiceTargets::default();
    }

    fn current_time(&self) -> f64 {
        self.samples_rendered as f64 / self.sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::ToneTarget;

    fn bank() -> VoiceBank {
        VoiceBank::with_analyser(1000, 8, 32).unwrap()
    }

    fn tone_a(gain: f32) -> VoiceTargets {
        let mut targets = VoiceTargets::default();
        targets.tones[0] = ToneTarget {
            frequency: 100.0,
            gain,
            enabled: true,
        };
        targets
    }

    #[test]
    fn test_change_lands_on_exact_sample() {
        let mut bank = bank();
        bank.apply_targets(&tone_a(1.0), 0.010);
        let out = bank.render_vec(20);
        assert!(out[..10].iter().all(|&s| s == 0.0));
        assert_eq!(out[10], 0.25);
        assert_eq!(bank.pending_len(), 0);
    }

    #[test]
    fn test_past_events_apply_immediately() {
        let mut bank = bank();
        bank.render_vec(50);
        bank.apply_targets(&tone_a(1.0), 0.001);
        let out = bank.render_vec(1);
        assert_eq!(out[0].abs(), 0.25);
    }

    #[test]
    fn test_gain_clamped_on_apply() {
        let mut bank = bank();
        bank.apply_targets(&tone_a(7.0), 0.0);
        bank.render_vec(1);
        assert_eq!(bank.tones[0].gain(), 1.0);
    }

    #[test]
    fn test_disabled_target_is_silent() {
        let mut bank = bank();
        let mut targets = tone_a(1.0);
        targets.tones[0].enabled = false;
        bank.apply_targets(&targets, 0.0);
        assert!(bank.render_vec(16).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_overflow_applies_oldest_early() {
        let mut bank = bank();
        for i in 0..9 {
            bank.apply_targets(&tone_a(i as f32 / 10.0), 1.0 + i as f64);
        }
        assert_eq!(bank.pending_len(), 8);
        assert_eq!(bank.current_targets().tones[0].frequency, 100.0);
        assert_eq!(bank.current_targets().tones[0].gain, 0.0);
    }

    #[test]
    fn test_reset_drops_pending_and_silences() {
        let mut bank = bank();
        bank.apply_targets(&tone_a(1.0), 0.0);
        bank.render_vec(5);
        bank.apply_targets(&tone_a(0.5), 1.0);
        bank.reset();
        assert_eq!(bank.pending_len(), 0);
        assert!(bank.render_vec(16).iter().all(|&s| s == 0.0));
        assert!((bank.current_time() - 0.021).abs() < 1e-9);
    }

    #[test]
    fn test_mix_feeds_analyser() {
        let mut bank = bank();
        bank.apply_targets(&tone_a(1.0), 0.0);
        bank.render_vec(32);
        assert!((bank.analyser().rms() - 0.25).abs() < 1e-6);
    }
}
