//! Offline rendering and export
//!
//! Runs a track through the same session, scheduler and voice bank as live
//! playback, but against a virtual audio clock that only advances as blocks
//! are rendered. The result is deterministic for a given track and config.

use crate::config::PlayerConfig;
use crate::decoder::{UserControls, VoiceTargets};
use crate::session::PlaybackSession;
use crate::track::Track;
use crate::voices::{VoiceBank, VoiceSink};
use crate::{ReplayError, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Peak level after normalisation
const NORMALIZE_PEAK: f32 = 0.95;

fn block_len(config: &PlayerConfig) -> usize {
    ((config.poll_interval_secs * config.sample_rate as f64).round() as usize).max(1)
}

/// Render a whole track to mono samples at `config.sample_rate`
///
/// The output covers exactly `len / rate` seconds; an empty track renders
/// to an empty buffer.
pub fn render_track(
    track: &Track,
    config: &PlayerConfig,
    controls: UserControls,
) -> Result<Vec<f32>> {
    config.validate()?;
    let bank = VoiceBank::with_analyser(
        config.sample_rate,
        config.event_queue_capacity,
        config.analyser_size,
    )?;
    let mut session = PlaybackSession::new(bank, config);
    session.load(track.clone());
    session.set_controls(controls);

    let total = (track.duration_seconds() * config.sample_rate as f64).ceil() as usize;
    let mut out = vec![0.0f32; total];
    if !session.play_at(0.0) {
        return Ok(out);
    }

    let block = block_len(config);
    for chunk in out.chunks_mut(block) {
        if session.is_playing() {
            session.wake();
        }
        session.sink_mut().render(chunk);
    }
    log::info!(
        "rendered {} frames to {} samples ({:.2}s)",
        track.len(),
        total,
        total as f64 / config.sample_rate as f64
    );
    Ok(out)
}

/// Scale samples so the loudest one sits at 0.95 full scale
pub fn normalize_samples(samples: &mut [f32]) {
    let peak = samples.iter().fold(0.0f32, |peak, s| peak.max(s.abs()));
    if peak > 0.0 {
        let scale = NORMALIZE_PEAK / peak;
        for sample in samples.iter_mut() {
            *sample *= scale;
        }
    }
}

/// Write mono 16-bit PCM
pub fn write_wav_file<P: AsRef<Path>>(path: P, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path.as_ref(), spec)
        .map_err(|e| ReplayError::ExportError(format!("failed to create WAV file: {e}")))?;
    for &sample in samples {
        let sample_i16 = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer
            .write_sample(sample_i16)
            .map_err(|e| ReplayError::ExportError(format!("failed to write sample: {e}")))?;
    }
    writer
        .finalize()
        .map_err(|e| ReplayError::ExportError(format!("failed to finalize WAV file: {e}")))?;
    Ok(())
}

/// Render a track and write it as a WAV file; returns the sample count
pub fn export_wav<P: AsRef<Path>>(
    track: &Track,
    config: &PlayerConfig,
    controls: UserControls,
    path: P,
    normalize: bool,
) -> Result<usize> {
    let mut samples = render_track(track, config, controls)?;
    if normalize {
        normalize_samples(&mut samples);
    }
    write_wav_file(path.as_ref(), &samples, config.sample_rate)?;
    log::info!("wrote {}", path.as_ref().display());
    Ok(samples.len())
}

/// One CSV row of the decode trace
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceRow {
    /// Frame index
    pub frame: usize,
    /// Due time in seconds
    pub time: f64,
    /// Channel A frequency
    pub a_freq: f64,
    /// Channel A gain
    pub a_gain: f32,
    /// Channel B frequency
    pub b_freq: f64,
    /// Channel B gain
    pub b_gain: f32,
    /// Channel C frequency
    pub c_freq: f64,
    /// Channel C gain
    pub c_gain: f32,
    /// Noise bandpass center
    pub noise_center: f64,
    /// Noise gain
    pub noise_gain: f32,
}

impl TraceRow {
    fn new(frame: usize, time: f64, targets: &VoiceTargets) -> Self {
        let [a, b, c] = targets.tones;
        TraceRow {
            frame,
            time,
            a_freq: a.frequency,
            a_gain: a.gain,
            b_freq: b.frequency,
            b_gain: b.gain,
            c_freq: c.frequency,
            c_gain: c.gain,
            noise_center: targets.noise.center_frequency,
            noise_gain: targets.noise.gain,
        }
    }
}

/// Sink that only keeps time; used when nothing needs to be heard
#[derive(Debug, Default)]
struct ClockSink {
    now: f64,
}

impl VoiceSink for ClockSink {
    fn apply_targets(&mut self, _targets: &VoiceTargets, _at: f64) {}

    fn reset(&mut self) {}

    fn current_time(&self) -> f64 {
        self.now
    }
}

/// Decode every frame of a track in playback order
pub fn decode_trace(
    track: &Track,
    config: &PlayerConfig,
    controls: UserControls,
) -> Result<Vec<TraceRow>> {
    config.validate()?;
    let mut session = PlaybackSession::new(ClockSink::default(), config);
    session.load(track.clone());
    session.set_controls(controls);

    let mut rows = Vec::with_capacity(track.len());
    if session.play_at(0.0) {
        while session.is_playing() {
            let now = session.sink().now;
            session.wake_with(now, |frame, time, targets| {
                rows.push(TraceRow::new(frame, time, targets));
            });
            session.sink_mut().now += config.poll_interval_secs;
        }
    }
    Ok(rows)
}

/// Write the decode trace of a track as CSV; returns the row count
pub fn write_decode_trace_csv<W: Write>(
    track: &Track,
    config: &PlayerConfig,
    controls: UserControls,
    writer: W,
) -> Result<usize> {
    let rows = decode_trace(track, config, controls)?;
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in &rows {
        csv_writer
            .serialize(row)
            .map_err(|e| ReplayError::ExportError(format!("failed to write trace row: {e}")))?;
    }
    csv_writer.flush()?;
    Ok(rows.len())
}
