//! Audio output
//!
//! The audio callback is the clock: [`AudioDevice`] pulls fixed-size blocks
//! straight from the [`SharedVoiceBank`](crate::SharedVoiceBank), so every
//! rendered block advances the time the scheduler paces against.

mod audio_device;

pub use audio_device::AudioDevice;

/// Samples rendered per lock of the voice bank
pub const RENDER_BLOCK_SIZE: usize = 512;

/// Visualization refresh interval for terminal front-ends
pub const VISUALIZATION_UPDATE_MS: u64 = 50;
