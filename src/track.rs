//! Register frame streams
//!
//! A [`Track`] is the decoded form of a chiptune: an ordered list of
//! 14-register snapshots plus the tick rate they were captured at.

use crate::{ReplayError, Result};
use std::fmt;
use std::ops::Index;

/// Number of sound-chip registers in one frame (R0-R13)
pub const REGISTER_COUNT: usize = 14;

/// Tick rate used when a source format does not declare one
pub const DEFAULT_TICK_RATE: f64 = 50.0;

/// One tick worth of chip register state (R0-R13)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RegisterFrame([u8; REGISTER_COUNT]);

impl RegisterFrame {
    /// Create a frame from its 14 register values
    pub const fn new(registers: [u8; REGISTER_COUNT]) -> Self {
        RegisterFrame(registers)
    }

    /// Build a frame from the first 14 bytes of a slice
    ///
    /// Returns `None` if fewer than 14 bytes are available.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let head = bytes.get(..REGISTER_COUNT)?;
        let mut registers = [0u8; REGISTER_COUNT];
        registers.copy_from_slice(head);
        Some(RegisterFrame(registers))
    }

    /// Raw register values
    pub fn registers(&self) -> &[u8; REGISTER_COUNT] {
        &self.0
    }
}

impl Index<usize> for RegisterFrame {
    type Output = u8;

    fn index(&self, index: usize) -> &u8 {
        &self.0[index]
    }
}

impl From<[u8; REGISTER_COUNT]> for RegisterFrame {
    fn from(registers: [u8; REGISTER_COUNT]) -> Self {
        RegisterFrame(registers)
    }
}

impl fmt::Debug for RegisterFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RegisterFrame[")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{value:02X}")?;
        }
        write!(f, "]")
    }
}

/// Container format a track was decoded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceFormat {
    /// Constructed in memory
    #[default]
    Memory,
    /// Headerless 14-byte register dump
    Raw,
    /// YM3 (interleaved 14-register stream)
    Ym3,
    /// YM3 with trailing loop frame
    Ym3b,
    /// YM4 (header, metadata, 14 registers)
    Ym4,
    /// YM5 (header with clock/rate, 16 registers)
    Ym5,
    /// YM6 (YM5 layout with extended effects)
    Ym6,
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceFormat::Memory => "memory",
            SourceFormat::Raw => "raw",
            SourceFormat::Ym3 => "YM3",
            SourceFormat::Ym3b => "YM3b",
            SourceFormat::Ym4 => "YM4",
            SourceFormat::Ym5 => "YM5",
            SourceFormat::Ym6 => "YM6",
        };
        f.write_str(name)
    }
}

/// Descriptive metadata carried alongside the frames
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackInfo {
    /// Song title
    pub title: String,
    /// Composer
    pub author: String,
    /// Free-form comment
    pub comment: String,
    /// Container the frames came from
    pub format: SourceFormat,
    /// Chip master clock declared by the container (YM5/YM6)
    pub master_clock: Option<u32>,
    /// Loop frame declared by the container (informational)
    pub loop_frame: u32,
}

/// An ordered, finite sequence of register frames and its tick rate
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    frames: Vec<RegisterFrame>,
    rate: f64,
    info: TrackInfo,
}

impl Track {
    /// Create a track, validating the tick rate
    ///
    /// The frame list may be empty (silence). The rate must be finite and > 0.
    pub fn new(frames: Vec<RegisterFrame>, rate: f64) -> Result<Self> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(ReplayError::ConfigError(format!(
                "tick rate must be a positive number of ticks per second, got {rate}"
            )));
        }
        Ok(Track {
            frames,
            rate,
            info: TrackInfo::default(),
        })
    }

    /// Create a track at the default 50 Hz tick rate
    pub fn with_default_rate(frames: Vec<RegisterFrame>) -> Self {
        Track {
            frames,
            rate: DEFAULT_TICK_RATE,
            info: TrackInfo::default(),
        }
    }

    /// Attach metadata
    pub fn with_info(mut self, info: TrackInfo) -> Self {
        self.info = info;
        self
    }

    /// All frames in playback order
    pub fn frames(&self) -> &[RegisterFrame] {
        &self.frames
    }

    /// Number of frames
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// True when the track holds no frames
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Ticks per second
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Seconds between two ticks
    pub fn tick_period(&self) -> f64 {
        1.0 / self.rate
    }

    /// Metadata
    pub fn info(&self) -> &TrackInfo {
        &self.info
    }

    /// Nominal playback length in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.frames.len() as f64 / self.rate
    }

    /// Human-readable summary for CLI output
    pub fn format_info(&self) -> String {
        format!(
            "  Song: {}\n  Author: {}\n  Comment: {}\n  Duration: {:.2}s ({} frames @ {}Hz)\n  Format: {}",
            self.info.title,
            self.info.author,
            self.info.comment,
            self.duration_seconds(),
            self.frames.len(),
            self.rate,
            self.info.format
        )
    }
}
