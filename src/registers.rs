//! PSG register layout
//!
//! Names the 14 registers of a frame and extracts the bit fields the decoder
//! works with. The layout is fixed by the chip model:
//!
//! | Register | Contents |
//! |---|---|
//! | R0/R1, R2/R3, R4/R5 | 12-bit tone period A/B/C (low byte, high nibble) |
//! | R6 | 5-bit noise period |
//! | R7 | mixer (tone/noise disable bits, active high) |
//! | R8/R9/R10 | amplitude A/B/C (bits 0-3 level, bit 4 envelope mode) |
//! | R11/R12 | 16-bit envelope period (low, high) |
//! | R13 | 4-bit envelope shape |

use crate::track::RegisterFrame;
use bitflags::bitflags;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive as _;
use std::fmt;

/// Register address within a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum Register {
    /// Channel A tone period, low byte - R0
    ChAFreqLo = 0x00,
    /// Channel A tone period, high nibble - R1
    ChAFreqHi = 0x01,
    /// Channel B tone period, low byte - R2
    ChBFreqLo = 0x02,
    /// Channel B tone period, high nibble - R3
    ChBFreqHi = 0x03,
    /// Channel C tone period, low byte - R4
    ChCFreqLo = 0x04,
    /// Channel C tone period, high nibble - R5
    ChCFreqHi = 0x05,
    /// Noise period - R6
    NoiseFreq = 0x06,
    /// Mixer control - R7
    MixerCtrl = 0x07,
    /// Channel A amplitude - R8
    ChAAmplitude = 0x08,
    /// Channel B amplitude - R9
    ChBAmplitude = 0x09,
    /// Channel C amplitude - R10
    ChCAmplitude = 0x0A,
    /// Envelope period, low byte - R11
    EnvelopeFreqLo = 0x0B,
    /// Envelope period, high byte - R12
    EnvelopeFreqHi = 0x0C,
    /// Envelope shape - R13
    EnvelopeShape = 0x0D,
}

impl Register {
    /// Index into a [`RegisterFrame`]
    pub fn addr(self) -> usize {
        self as usize
    }
}

/// Tone channel selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum Channel {
    /// Channel A
    A = 0,
    /// Channel B
    B = 1,
    /// Channel C
    C = 2,
}

impl Channel {
    /// All tone channels in register order
    pub const ALL: [Channel; 3] = [Channel::A, Channel::B, Channel::C];

    /// Zero-based channel index
    pub fn index(self) -> usize {
        self as usize
    }

    /// Channel for a zero-based index
    pub fn from_index(index: usize) -> Option<Channel> {
        Channel::from_usize(index)
    }

    fn period_registers(self) -> (Register, Register) {
        match self {
            Channel::A => (Register::ChAFreqLo, Register::ChAFreqHi),
            Channel::B => (Register::ChBFreqLo, Register::ChBFreqHi),
            Channel::C => (Register::ChCFreqLo, Register::ChCFreqHi),
        }
    }

    fn amplitude_register(self) -> Register {
        match self {
            Channel::A => Register::ChAAmplitude,
            Channel::B => Register::ChBAmplitude,
            Channel::C => Register::ChCAmplitude,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Channel::A => "A",
            Channel::B => "B",
            Channel::C => "C",
        };
        f.write_str(name)
    }
}

bitflags! {
    /// Mixer Control Register (R7) bitflags
    ///
    /// A set bit disables the path; a clear bit enables it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MixerFlags: u8 {
        /// Channel A tone disable
        const CH_A_TONE = 0x01;
        /// Channel B tone disable
        const CH_B_TONE = 0x02;
        /// Channel C tone disable
        const CH_C_TONE = 0x04;
        /// Channel A noise disable
        const CH_A_NOISE = 0x08;
        /// Channel B noise disable
        const CH_B_NOISE = 0x10;
        /// Channel C noise disable
        const CH_C_NOISE = 0x20;
    }
}

impl MixerFlags {
    /// Create mixer flags from raw register value (I/O direction bits ignored)
    pub fn from_register(value: u8) -> Self {
        MixerFlags::from_bits_truncate(value)
    }

    /// Check if the tone path of a channel is enabled
    pub fn tone_enabled(&self, channel: Channel) -> bool {
        let bit = match channel {
            Channel::A => MixerFlags::CH_A_TONE,
            Channel::B => MixerFlags::CH_B_TONE,
            Channel::C => MixerFlags::CH_C_TONE,
        };
        !self.contains(bit)
    }

    /// Check if the noise path of a channel is enabled
    pub fn noise_enabled(&self, channel: Channel) -> bool {
        let bit = match channel {
            Channel::A => MixerFlags::CH_A_NOISE,
            Channel::B => MixerFlags::CH_B_NOISE,
            Channel::C => MixerFlags::CH_C_NOISE,
        };
        !self.contains(bit)
    }
}

/// Decoded amplitude register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Amplitude {
    /// Static level 0-15
    pub level: u8,
    /// Bit 4: follow the envelope instead of the static level
    pub use_envelope: bool,
}

/// 12-bit tone period of a channel
#[inline]
pub fn tone_period(frame: &RegisterFrame, channel: Channel) -> u16 {
    let (lo, hi) = channel.period_registers();
    (((frame[hi.addr()] as u16) & 0x0F) << 8) | frame[lo.addr()] as u16
}

/// 5-bit noise period
#[inline]
pub fn noise_period(frame: &RegisterFrame) -> u8 {
    frame[Register::NoiseFreq.addr()] & 0x1F
}

/// Mixer register
#[inline]
pub fn mixer(frame: &RegisterFrame) -> MixerFlags {
    MixerFlags::from_register(frame[Register::MixerCtrl.addr()])
}

/// Amplitude register of a channel
#[inline]
pub fn amplitude(frame: &RegisterFrame, channel: Channel) -> Amplitude {
    let raw = frame[channel.amplitude_register().addr()];
    Amplitude {
        level: raw & 0x0F,
        use_envelope: raw & 0x10 != 0,
    }
}

/// 16-bit envelope period
#[inline]
pub fn envelope_period(frame: &RegisterFrame) -> u16 {
    ((frame[Register::EnvelopeFreqHi.addr()] as u16) << 8)
        | frame[Register::EnvelopeFreqLo.addr()] as u16
}

/// 4-bit envelope shape code
#[inline]
pub fn envelope_shape(frame: &RegisterFrame) -> u8 {
    frame[Register::EnvelopeShape.addr()] & 0x0F
}
