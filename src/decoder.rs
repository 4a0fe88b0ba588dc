//! Register decoder
//!
//! Maps one [`RegisterFrame`] plus the session's [`EnvelopeState`] to the
//! frequency, on/off and gain targets of the voice bank. Decoding is total:
//! every 14-byte input yields finite frequencies > 0 and gains in `[0, 1]`.
//! Out-of-range derived values (zero tone period, odd clock settings) are
//! replaced with safe floors rather than reported.

use crate::envelope::{EnvelopeShape, EnvelopeState};
use crate::registers::{self, Channel};
use crate::track::{RegisterFrame, Track};
use serde::{Deserialize, Serialize};

/// Upper bound of a user volume scalar (mixer sliders go to 150%)
pub const MAX_USER_VOLUME: f32 = 1.5;

/// Fallback used when a configured floor frequency is unusable
const FALLBACK_FLOOR_HZ: f64 = 1.0;

/// Tunable chip-timing approximations
///
/// None of these are authoritative chip constants: the noise mapping and the
/// envelope period are empirical and can be tuned against reference material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChipConfig {
    /// Chip master clock (Atari ST: 2 MHz)
    pub master_clock_hz: f64,
    /// Tone frequency substituted for a zero tone period
    pub min_tone_frequency_hz: f64,
    /// Noise bandpass center at noise period 0
    pub noise_base_hz: f64,
    /// Noise bandpass center increment per noise period step
    pub noise_step_hz: f64,
    /// Noise bandpass Q
    pub noise_q: f64,
    /// Master clock cycles per envelope period unit
    pub envelope_clock_divider: f64,
}

impl Default for ChipConfig {
    fn default() -> Self {
        ChipConfig {
            master_clock_hz: 2_000_000.0,
            min_tone_frequency_hz: 1.0,
            noise_base_hz: 1000.0,
            noise_step_hz: 200.0,
            noise_q: 1.0,
            envelope_clock_divider: 256.0,
        }
    }
}

impl ChipConfig {
    /// Copy of this config with the track's declared master clock applied
    pub fn for_track(&self, track: &Track) -> ChipConfig {
        let mut config = self.clone();
        if let Some(clock) = track.info().master_clock {
            if clock > 0 {
                config.master_clock_hz = clock as f64;
            }
        }
        config
    }

    fn tone_floor(&self) -> f64 {
        if self.min_tone_frequency_hz.is_finite() && self.min_tone_frequency_hz > 0.0 {
            self.min_tone_frequency_hz
        } else {
            FALLBACK_FLOOR_HZ
        }
    }

    /// Tone frequency for a 12-bit period, floored for period 0
    pub fn tone_frequency(&self, period: u16) -> f64 {
        let floor = self.tone_floor();
        if period == 0 {
            return floor;
        }
        let freq = self.master_clock_hz / (16.0 * period as f64);
        if freq.is_finite() && freq > 0.0 {
            freq
        } else {
            floor
        }
    }

    /// Bandpass center frequency for a 5-bit noise period (linear approximation)
    pub fn noise_center(&self, period: u8) -> f64 {
        let center = period as f64 * self.noise_step_hz + self.noise_base_hz;
        if center.is_finite() && center > 0.0 {
            center
        } else {
            self.tone_floor()
        }
    }

    /// Envelope period in seconds for a 16-bit register period
    pub fn envelope_period_secs(&self, period: u16) -> f64 {
        let units = period.max(1) as f64;
        units * self.envelope_clock_divider / self.master_clock_hz
    }
}

/// User control for one voice path
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelControl {
    /// Force the path silent
    pub muted: bool,
    /// Volume scalar, 0.0..=1.5
    pub volume: f32,
}

impl Default for ChannelControl {
    fn default() -> Self {
        ChannelControl {
            muted: false,
            volume: 1.0,
        }
    }
}

impl ChannelControl {
    /// Create a control with the volume clamped into range
    pub fn new(muted: bool, volume: f32) -> Self {
        ChannelControl {
            muted,
            volume: clamp_volume(volume),
        }
    }

    /// Volume clamped to `0.0..=MAX_USER_VOLUME`
    pub fn effective_volume(&self) -> f32 {
        clamp_volume(self.volume)
    }
}

fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, MAX_USER_VOLUME)
    }
}

/// Mute flags and volume scalars for channels A/B/C and the noise path
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserControls {
    /// Tone channels A, B, C
    pub channels: [ChannelControl; 3],
    /// Noise path
    pub noise: ChannelControl,
}

impl UserControls {
    /// Control of one tone channel
    pub fn channel(&self, channel: Channel) -> &ChannelControl {
        &self.channels[channel.index()]
    }

    /// Mutable control of one tone channel
    pub fn channel_mut(&mut self, channel: Channel) -> &mut ChannelControl {
        &mut self.channels[channel.index()]
    }

    /// Same controls with every volume clamped into range
    pub fn clamped(&self) -> UserControls {
        let mut out = *self;
        for control in out.channels.iter_mut().chain(std::iter::once(&mut out.noise)) {
            control.volume = control.effective_volume();
        }
        out
    }
}

/// Target state of one tone voice
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ToneTarget {
    /// Oscillator frequency in Hz (always > 0)
    pub frequency: f64,
    /// Output gain 0..1
    pub gain: f32,
    /// Tone audible this tick
    pub enabled: bool,
}

impl Default for ToneTarget {
    fn default() -> Self {
        ToneTarget {
            frequency: FALLBACK_FLOOR_HZ,
            gain: 0.0,
            enabled: false,
        }
    }
}

/// Target state of the noise voice
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NoiseTarget {
    /// Bandpass center frequency in Hz (always > 0)
    pub center_frequency: f64,
    /// Bandpass Q
    pub q: f64,
    /// Output gain 0..1
    pub gain: f32,
    /// Noise audible this tick
    pub enabled: bool,
}

impl Default for NoiseTarget {
    fn default() -> Self {
        NoiseTarget {
            center_frequency: 1000.0,
            q: 1.0,
            gain: 0.0,
            enabled: false,
        }
    }
}

/// Everything the voice bank needs for one tick
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VoiceTargets {
    /// Tone voices A, B, C
    pub tones: [ToneTarget; 3],
    /// Noise voice
    pub noise: NoiseTarget,
}

impl VoiceTargets {
    /// Tone target of one channel
    pub fn tone(&self, channel: Channel) -> &ToneTarget {
        &self.tones[channel.index()]
    }
}

/// Frame-to-targets decoder
#[derive(Debug, Clone, Default)]
pub struct RegisterDecoder {
    config: ChipConfig,
}

impl RegisterDecoder {
    /// Create a decoder with the given chip approximations
    pub fn new(config: ChipConfig) -> Self {
        RegisterDecoder { config }
    }

    /// Chip approximations in use
    pub fn config(&self) -> &ChipConfig {
        &self.config
    }

    /// Decode one frame at audio-clock time `now`
    ///
    /// Advances (or resynchronises) `envelope` exactly once.
    pub fn decode(
        &self,
        frame: &RegisterFrame,
        envelope: &mut EnvelopeState,
        controls: &UserControls,
        now: f64,
    ) -> VoiceTargets {
        let env_period = self
            .config
            .envelope_period_secs(registers::envelope_period(frame));
        let env_shape = EnvelopeShape::from_register(registers::envelope_shape(frame));
        let env_level = envelope.update(env_period, env_shape, now).clamp(0.0, 1.0);

        let mixer = registers::mixer(frame);
        let mut targets = VoiceTargets::default();
        let mut noise_level = 0.0f32;
        let mut noise_wanted = false;

        for channel in Channel::ALL {
            let control = controls.channel(channel);
            let volume = control.effective_volume();
            let amp = registers::amplitude(frame, channel);

            let level = if amp.use_envelope {
                env_level
            } else {
                amp.level as f32 / 15.0
            };
            let audible = amp.use_envelope || amp.level > 0;
            let effective = (level * volume).clamp(0.0, 1.0);

            let enabled = mixer.tone_enabled(channel) && audible && !control.muted;
            targets.tones[channel.index()] = ToneTarget {
                frequency: self
                    .config
                    .tone_frequency(registers::tone_period(frame, channel)),
                gain: if enabled { effective } else { 0.0 },
                enabled,
            };

            if mixer.noise_enabled(channel) && audible && !control.muted && effective > 0.0 {
                noise_wanted = true;
                noise_level = noise_level.max(effective);
            }
        }

        let noise_control = controls.noise;
        let noise_enabled = noise_wanted && !noise_control.muted;
        let q = if self.config.noise_q.is_finite() && self.config.noise_q > 0.0 {
            self.config.noise_q
        } else {
            1.0
        };
        targets.noise = NoiseTarget {
            center_frequency: self.config.noise_center(registers::noise_period(frame)),
            q,
            gain: if noise_enabled {
                (noise_level * noise_control.effective_volume()).clamp(0.0, 1.0)
            } else {
                0.0
            },
            enabled: noise_enabled,
        };

        targets
    }
}
