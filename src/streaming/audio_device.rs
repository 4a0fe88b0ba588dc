//! Audio device integration using rodio
//!
//! Plays the shared voice bank on the system output device.

use super::RENDER_BLOCK_SIZE;
use crate::voices::SharedVoiceBank;
use crate::{ReplayError, Result};
use rodio::{OutputStream, Sink, Source};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Mono source rendering blocks from the voice bank on demand
struct VoiceBankSource {
    bank: SharedVoiceBank,
    sample_rate: u32,
    finished: Arc<AtomicBool>,
    block: Vec<f32>,
    block_pos: usize,
}

impl VoiceBankSource {
    fn new(bank: SharedVoiceBank, finished: Arc<AtomicBool>) -> Self {
        let sample_rate = bank.sample_rate();
        VoiceBankSource {
            bank,
            sample_rate,
            finished,
            block: vec![0.0f32; RENDER_BLOCK_SIZE],
            block_pos: RENDER_BLOCK_SIZE,
        }
    }
}

impl Source for VoiceBankSource {
    fn current_frame_len(&self) -> Option<usize> {
        // rate and channel count never change
        None
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

impl Iterator for VoiceBankSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.finished.load(Ordering::Relaxed) {
            return None;
        }
        if self.block_pos >= self.block.len() {
            self.bank.render(&mut self.block);
            self.block_pos = 0;
        }
        let sample = self.block[self.block_pos];
        self.block_pos += 1;
        Some(sample)
    }
}

/// Audio playback device using rodio
pub struct AudioDevice {
    _stream: OutputStream,
    sink: Sink,
    finished: Arc<AtomicBool>,
}

impl AudioDevice {
    /// Open the default output device and start pulling from `bank`
    pub fn new(bank: SharedVoiceBank) -> Result<Self> {
        let (stream, stream_handle) = OutputStream::try_default().map_err(|e| {
            ReplayError::AudioDeviceError(format!("failed to create audio stream: {e}"))
        })?;
        let sink = Sink::try_new(&stream_handle).map_err(|e| {
            ReplayError::AudioDeviceError(format!("failed to create audio sink: {e}"))
        })?;

        let finished = Arc::new(AtomicBool::new(false));
        sink.append(VoiceBankSource::new(bank, Arc::clone(&finished)));
        log::info!("audio device opened");

        Ok(AudioDevice {
            _stream: stream,
            sink,
            finished,
        })
    }

    /// Pause output; the audio clock stops with it
    pub fn pause(&self) {
        self.sink.pause();
    }

    /// Resume output
    pub fn play(&self) {
        self.sink.play();
    }

    /// True while output is paused
    pub fn is_paused(&self) -> bool {
        self.sink.is_paused()
    }

    /// End the stream; the bank is no longer rendered
    pub fn finish(&self) {
        self.finished.store(true, Ordering::Relaxed);
    }
}

impl Drop for AudioDevice {
    fn drop(&mut self) {
        self.finish();
        self.sink.pause();
    }
}
