//! Terminal Visualization Utilities
//!
//! Helpers for the CLI status lines. Everything here works from a register
//! frame, decoded voice targets or analyser data, so it never touches the
//! audio path.

use crate::decoder::{ChannelControl, ToneTarget};
use crate::registers::{self, Channel};
use crate::track::RegisterFrame;
use std::fmt::Write;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

const SPECTRUM_GLYPHS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Short name of an envelope shape code (R13)
pub fn envelope_shape_name(shape: u8) -> &'static str {
    match shape & 0x0F {
        0x00..=0x03 | 0x09 => "AD",
        0x04..=0x07 | 0x0F => "ATK",
        0x08 => "SAWDN",
        0x0A => "TRI",
        0x0B => "DNHOLD",
        0x0C => "SAWUP",
        0x0D => "HOLD",
        0x0E => "TRI",
        _ => "",
    }
}

/// Nearest note name for a frequency, e.g. `A4`
pub fn frequency_to_note_label(freq: f64) -> Option<String> {
    if !freq.is_finite() || freq <= 0.0 {
        return None;
    }
    let midi = (69.0 + 12.0 * (freq / 440.0).log2()).round();
    if !(0.0..=127.0).contains(&midi) {
        return None;
    }
    let midi = midi as i32;
    let octave = midi / 12 - 1;
    Some(format!("{}{}", NOTE_NAMES[(midi % 12) as usize], octave))
}

/// Compact channel status: tone/noise flags, level, envelope and mute
///
/// ```
/// use psg_replay::visualization::create_channel_status;
/// use psg_replay::{Channel, ChannelControl, RegisterFrame};
///
/// let mut regs = [0u8; 14];
/// regs[7] = 0x3E; // tone A only
/// regs[8] = 0x0C;
/// let status = create_channel_status(&RegisterFrame::new(regs), Channel::A, &ChannelControl::default());
/// assert_eq!(status, "T- A:12");
/// ```
pub fn create_channel_status(
    frame: &RegisterFrame,
    channel: Channel,
    control: &ChannelControl,
) -> String {
    let mixer = registers::mixer(frame);
    let amp = registers::amplitude(frame, channel);
    let mut status = String::with_capacity(24);

    status.push(if mixer.tone_enabled(channel) { 'T' } else { '-' });
    status.push(if mixer.noise_enabled(channel) { 'N' } else { '-' });
    if amp.use_envelope {
        write!(
            status,
            " E {}",
            envelope_shape_name(registers::envelope_shape(frame))
        )
        .ok();
    } else {
        write!(status, " A:{}", amp.level).ok();
    }
    if control.muted {
        status.push_str(" [M]");
    }
    status
}

/// Frequency and note of a tone target, `--` when silent
pub fn tone_highlight(target: &ToneTarget) -> String {
    if !target.enabled || target.gain <= 0.0 {
        return "--".to_string();
    }
    match frequency_to_note_label(target.frequency) {
        Some(note) => format!("{:>7.1}Hz {note}", target.frequency),
        None => format!("{:>7.1}Hz", target.frequency),
    }
}

/// Create a Unicode block bar representing an amplitude value
///
/// The output is always `max_length` characters wide; amplitude is clamped
/// to `0.0..=1.0`.
pub fn create_volume_bar(amplitude: f32, max_length: usize) -> String {
    let normalized = amplitude.clamp(0.0, 1.0);
    let block_count = ((normalized * max_length as f32) as usize).min(max_length);
    let mut bar = "█".repeat(block_count);
    bar.push_str(&" ".repeat(max_length - block_count));
    bar
}

/// One-line spectrum from analyser byte data, `width` columns wide
pub fn spectrum_line(bytes: &[u8], width: usize) -> String {
    if bytes.is_empty() || width == 0 {
        return " ".repeat(width);
    }
    let per_column = (bytes.len() / width).max(1);
    (0..width)
        .map(|col| {
            let start = (col * per_column).min(bytes.len() - 1);
            let end = (start + per_column).min(bytes.len());
            let peak = bytes[start..end].iter().copied().max().unwrap_or(0);
            if peak == 0 {
                ' '
            } else {
                SPECTRUM_GLYPHS[(peak as usize * SPECTRUM_GLYPHS.len() / 256).min(7)]
            }
        })
        .collect()
}
