//! Approximate envelope generator
//!
//! Produces a 0..1 volume multiplier from the envelope period (R11/R12) and
//! shape (R13). The real chip walks a 32-step DAC through a 4-bit shape law;
//! this generator instead keeps a continuous phase in `[0, 1)` and maps it to
//! one of four wave families:
//!
//! - rising ramp, repeating (`/|/|/|`)
//! - rising ramp then hold (`/‾‾‾‾`)
//! - symmetric triangle (`/\/\/\`)
//! - falling ramp, the default (`|\|\|\`)
//!
//! It is an approximation, not a chip-exact envelope.
//!
//! The generator has two states. It is *resynchronising* right after a reset
//! (shape or period changed: phase 0, level 1.0) and *running* once the next
//! frame advances it by the elapsed audio-clock time.

use bitflags::bitflags;

/// Period change smaller than this (in seconds) does not retrigger
pub const PERIOD_TOLERANCE_SECS: f64 = 1e-9;

/// Smallest envelope period accepted, guards the phase division
pub const MIN_PERIOD_SECS: f64 = 1e-6;

bitflags! {
    /// Envelope Shape Control - Register R13
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EnvelopeShape: u8 {
        /// Bit 0: freeze at the end of the first cycle
        const HOLD = 0x01;
        /// Bit 1: reverse direction every cycle
        const ALTERNATE = 0x02;
        /// Bit 2: start low and rise
        const ATTACK = 0x04;
        /// Bit 3: keep cycling after the first ramp
        const CONTINUE = 0x08;
    }
}

impl EnvelopeShape {
    /// Create from raw register value (upper nibble ignored)
    pub fn from_register(value: u8) -> Self {
        EnvelopeShape::from_bits_truncate(value & 0x0F)
    }

    /// Wave family this shape is approximated by
    pub fn family(self) -> WaveFamily {
        let cont = self.contains(EnvelopeShape::CONTINUE);
        let attack = self.contains(EnvelopeShape::ATTACK);
        let alternate = self.contains(EnvelopeShape::ALTERNATE);
        let hold = self.contains(EnvelopeShape::HOLD);

        if cont && alternate && !hold {
            WaveFamily::Triangle
        } else if attack && cont && !hold && !alternate {
            WaveFamily::RisingRamp
        } else if attack {
            WaveFamily::RisingHold
        } else {
            WaveFamily::FallingRamp
        }
    }
}

/// Envelope waveform families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveFamily {
    /// 0 → 1, repeating
    RisingRamp,
    /// 0 → 1 once, then 1 forever
    RisingHold,
    /// 0 → 1 → 0, repeating
    Triangle,
    /// 1 → 0, repeating
    FallingRamp,
}

impl WaveFamily {
    /// Level for a phase in `[0, 1)`; `completed_cycles` lets hold shapes hold
    pub fn level(self, phase: f64, completed_cycles: u64) -> f32 {
        let phase = phase.rem_euclid(1.0);
        let level = match self {
            WaveFamily::RisingRamp => phase,
            WaveFamily::RisingHold => {
                if completed_cycles > 0 {
                    1.0
                } else {
                    phase
                }
            }
            WaveFamily::Triangle => {
                if phase < 0.5 {
                    phase * 2.0
                } else {
                    2.0 - phase * 2.0
                }
            }
            WaveFamily::FallingRamp => 1.0 - phase,
        };
        (level as f32).clamp(0.0, 1.0)
    }
}

/// Generator state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvelopeStatus {
    /// Just reset by a shape/period change
    #[default]
    Resynchronizing,
    /// Accumulating phase
    Running,
}

/// Envelope generator state, owned by a playback session
#[derive(Debug, Clone, Default)]
pub struct EnvelopeState {
    period: f64,
    shape: Option<EnvelopeShape>,
    phase: f64,
    completed_cycles: u64,
    level: f32,
    last_update: f64,
    status: EnvelopeStatus,
}

impl EnvelopeState {
    /// Fresh generator; the first update always resynchronises
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget all state (stop / re-initialisation)
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Apply one frame's envelope registers at audio-clock time `now`
    ///
    /// Resynchronises if the shape or period changed since the previous
    /// update, otherwise advances the phase by the elapsed time. Returns the
    /// new level.
    pub fn update(&mut self, period_secs: f64, shape: EnvelopeShape, now: f64) -> f32 {
        let period = if period_secs.is_finite() {
            period_secs.max(MIN_PERIOD_SECS)
        } else {
            MIN_PERIOD_SECS
        };

        let changed = match self.shape {
            None => true,
            Some(previous) => {
                previous != shape || (period - self.period).abs() > PERIOD_TOLERANCE_SECS
            }
        };

        if changed {
            self.resync(period, shape, now);
        } else {
            self.advance(now);
        }
        self.level
    }

    fn resync(&mut self, period: f64, shape: EnvelopeShape, now: f64) {
        log::debug!(
            "envelope resync: shape {:#03x}, period {:.6}s",
            shape.bits(),
            period
        );
        self.period = period;
        self.shape = Some(shape);
        self.phase = 0.0;
        self.completed_cycles = 0;
        self.level = 1.0;
        self.last_update = now;
        self.status = EnvelopeStatus::Resynchronizing;
    }

    fn advance(&mut self, now: f64) {
        let elapsed = (now - self.last_update).max(0.0);
        let total = self.phase + elapsed / self.period;
        let wraps = total.floor();
        self.completed_cycles = self.completed_cycles.saturating_add(wraps as u64);
        self.phase = total - wraps;
        self.last_update = now;
        self.status = EnvelopeStatus::Running;

        let family = self.shape.unwrap_or_default().family();
        self.level = family.level(self.phase, self.completed_cycles);
    }

    /// Last computed level (0..1)
    pub fn level(&self) -> f32 {
        self.level
    }

    /// Current phase in `[0, 1)`
    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Period in seconds
    pub fn period(&self) -> f64 {
        self.period
    }

    /// Current shape (None before the first update)
    pub fn shape(&self) -> Option<EnvelopeShape> {
        self.shape
    }

    /// Audio-clock time of the last update
    pub fn last_update(&self) -> f64 {
        self.last_update
    }

    /// State machine position
    pub fn status(&self) -> EnvelopeStatus {
        self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_shape_families() {
        assert_eq!(EnvelopeShape::from_register(0x0C).family(), WaveFamily::RisingRamp);
        assert_eq!(EnvelopeShape::from_register(0x0D).family(), WaveFamily::RisingHold);
        assert_eq!(EnvelopeShape::from_register(0x04).family(), WaveFamily::RisingHold);
        assert_eq!(EnvelopeShape::from_register(0x0E).family(), WaveFamily::Triangle);
        assert_eq!(EnvelopeShape::from_register(0x0A).family(), WaveFamily::Triangle);
        assert_eq!(EnvelopeShape::from_register(0x08).family(), WaveFamily::FallingRamp);
        assert_eq!(EnvelopeShape::from_register(0x00).family(), WaveFamily::FallingRamp);
        assert_eq!(EnvelopeShape::from_register(0xF9).family(), WaveFamily::FallingRamp);
    }

    #[test]
    fn test_first_update_resynchronizes() {
        let mut env = EnvelopeState::new();
        let level = env.update(0.1, EnvelopeShape::from_register(0x08), 5.0);
        assert_eq!(level, 1.0);
        assert_eq!(env.phase(), 0.0);
        assert_eq!(env.status(), EnvelopeStatus::Resynchronizing);
        assert_eq!(env.last_update(), 5.0);
    }

    #[test]
    fn test_advance_accumulates_phase() {
        let mut env = EnvelopeState::new();
        let shape = EnvelopeShape::from_register(0x08);
        env.update(0.1, shape, 0.0);
        let level = env.update(0.1, shape, 0.025);
        assert_eq!(env.status(), EnvelopeStatus::Running);
        assert_relative_eq!(env.phase(), 0.25, epsilon = 1e-9);
        assert_relative_eq!(level, 0.75, epsilon = 1e-6);
    }

    #[test]
    fn test_phase_wraps() {
        let mut env = EnvelopeState::new();
        let shape = EnvelopeShape::from_register(0x0C);
        env.update(0.1, shape, 0.0);
        env.update(0.1, shape, 0.13);
        assert_relative_eq!(env.phase(), 0.3, epsilon = 1e-9);
        assert_relative_eq!(env.level(), 0.3, epsilon = 1e-6);
    }

    #[test]
    fn test_shape_change_retriggers() {
        let mut env = EnvelopeState::new();
        env.update(0.1, EnvelopeShape::from_register(0x0C), 0.0);
        env.update(0.1, EnvelopeShape::from_register(0x0C), 0.05);
        assert!(env.phase() > 0.0);
        let level = env.update(0.1, EnvelopeShape::from_register(0x08), 0.07);
        assert_eq!(level, 1.0);
        assert_eq!(env.phase(), 0.0);
        assert_eq!(env.last_update(), 0.07);
    }

    #[test]
    fn test_period_change_retriggers_beyond_tolerance() {
        let mut env = EnvelopeState::new();
        let shape = EnvelopeShape::from_register(0x0C);
        env.update(0.1, shape, 0.0);
        env.update(0.1 + PERIOD_TOLERANCE_SECS / 10.0, shape, 0.02);
        assert_eq!(env.status(), EnvelopeStatus::Running);
        env.update(0.2, shape, 0.04);
        assert_eq!(env.status(), EnvelopeStatus::Resynchronizing);
    }

    #[test]
    fn test_rising_hold_holds_after_first_cycle() {
        let mut env = EnvelopeState::new();
        let shape = EnvelopeShape::from_register(0x0D);
        env.update(0.1, shape, 0.0);
        assert_relative_eq!(env.update(0.1, shape, 0.05), 0.5, epsilon = 1e-6);
        assert_eq!(env.update(0.1, shape, 0.15), 1.0);
        assert_eq!(env.update(0.1, shape, 0.33), 1.0);
    }

    #[test]
    fn test_triangle_levels() {
        assert_relative_eq!(WaveFamily::Triangle.level(0.25, 0), 0.5, epsilon = 1e-6);
        assert_relative_eq!(WaveFamily::Triangle.level(0.5, 0), 1.0, epsilon = 1e-6);
        assert_relative_eq!(WaveFamily::Triangle.level(0.75, 0), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_levels_clamped_for_any_phase() {
        for family in [
            WaveFamily::RisingRamp,
            WaveFamily::RisingHold,
            WaveFamily::Triangle,
            WaveFamily::FallingRamp,
        ] {
            for phase in [-3.7, -0.1, 0.0, 0.999_999, 1.0, 42.42] {
                let level = family.level(phase, 0);
                assert!((0.0..=1.0).contains(&level), "{family:?} at {phase}: {level}");
            }
        }
    }

    #[test]
    fn test_attack_rises_monotonically_within_one_period() {
        // One 50 Hz tick long, sampled at wake-up granularity finer than a tick
        let mut env = EnvelopeState::new();
        let shape = EnvelopeShape::ATTACK | EnvelopeShape::CONTINUE;
        let period = 0.02;
        env.update(period, shape, 0.0);

        let mut previous = 0.0f32;
        for step in 1..5 {
            let level = env.update(period, shape, step as f64 * 0.004);
            assert!(level > previous, "step {step}: {level} <= {previous}");
            assert!(level <= 1.0);
            previous = level;
        }
    }

    #[test]
    fn test_time_going_backwards_does_not_rewind() {
        let mut env = EnvelopeState::new();
        let shape = EnvelopeShape::from_register(0x0C);
        env.update(0.1, shape, 1.0);
        env.update(0.1, shape, 1.02);
        let phase = env.phase();
        env.update(0.1, shape, 0.5);
        assert_eq!(env.phase(), phase);
    }
}
