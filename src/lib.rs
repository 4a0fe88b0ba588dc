//! PSG register-frame replayer with a lookahead scheduler
//!
//! Replays chiptune music captured as per-frame snapshots of the 14 YM2149/AY
//! sound-chip registers and renders it through a small software synthesizer:
//! three tone voices and one bandpass-filtered noise voice, each with its own
//! gain. A lookahead scheduler feeds frames to the register decoder ahead of
//! the audio clock so coarse host timers never starve the output.
//!
//! # Pipeline
//! - [`format`]: container decoding (YM3..YM6, raw dumps, LHA) into a [`Track`]
//! - [`scheduler`]: paces frames against the audio clock with a lead window
//! - [`decoder`]: maps one register frame (plus envelope state) to voice targets
//! - [`envelope`]: approximate envelope generator, resynchronised on change
//! - [`voices`]: tone/noise generators with sample-accurate parameter steps
//! - [`analyser`]: read-only tap after the final mix for visualizers
//!
//! The synthesis is deliberately musical rather than chip-exact: envelope law,
//! noise colour and tone waveform are approximations tuned via [`ChipConfig`].
//!
//! # Quick start
//! ## Offline render
//! ```no_run
//! use psg_replay::{format, export, PlayerConfig, UserControls};
//! let data = std::fs::read("song.ym").unwrap();
//! let track = format::load_track(&data).unwrap();
//! let samples = export::render_track(&track, &PlayerConfig::default(), UserControls::default()).unwrap();
//! ```
//!
//! ## Live playback
//! ```no_run
//! use psg_replay::{format, LivePlayer, PlayerConfig};
//! let track = format::load_file("song.ym").unwrap();
//! let player = LivePlayer::new(PlayerConfig::default()).unwrap();
//! player.load(track);
//! player.play();
//! // an audio backend renders from player.voice_bank(); see the `streaming` feature
//! ```

#![warn(missing_docs)]

pub mod analyser;
pub mod config;
pub mod decoder;
pub mod envelope;
pub mod export;
pub mod format;
pub mod live;
pub mod registers;
pub mod scheduler;
pub mod session;
pub mod track;
pub mod visualization;
pub mod voices;

#[cfg(feature = "streaming")]
pub mod streaming; // Audio Output & Streaming

/// Error types for replayer operations
#[derive(thiserror::Error, Debug)]
pub enum ReplayError {
    /// Malformed or truncated container data
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Recognised container variant that has no software playback path
    #[error("Unsupported format {format}: {hint}")]
    UnsupportedFormat {
        /// Detected format tag
        format: String,
        /// What the user can do about it
        hint: String,
    },

    /// Decompression error
    #[error("Decompression error: {0}")]
    DecompressionError(String),

    /// IO error from filesystem or device
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Audio device error
    #[error("Audio device error: {0}")]
    AudioDeviceError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Error writing an exported file
    #[error("Export error: {0}")]
    ExportError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for ReplayError {
    /// Converts a String into `ReplayError::Other`.
    ///
    /// Prefer an explicit variant (`ParseError`, `ConfigError`, ...) where the
    /// caller needs to tell failures apart.
    fn from(msg: String) -> Self {
        ReplayError::Other(msg)
    }
}

impl From<&str> for ReplayError {
    fn from(msg: &str) -> Self {
        ReplayError::Other(msg.to_string())
    }
}

/// Result type for replayer operations
pub type Result<T> = std::result::Result<T, ReplayError>;

// Public API exports
pub use analyser::AnalyserTap;
pub use config::PlayerConfig;
pub use decoder::{ChannelControl, ChipConfig, RegisterDecoder, UserControls, VoiceTargets};
pub use envelope::{EnvelopeShape, EnvelopeState};
pub use live::LivePlayer;
pub use registers::{Channel, MixerFlags};
pub use scheduler::{LookaheadScheduler, SchedulerState, TickBatch};
pub use session::PlaybackSession;
pub use track::{RegisterFrame, Track, TrackInfo};
pub use voices::{SharedVoiceBank, VoiceBank, VoiceSink};

#[cfg(feature = "streaming")]
pub use streaming::AudioDevice;
