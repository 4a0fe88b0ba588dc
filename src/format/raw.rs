//! Headerless register dumps
//!
//! A raw dump is just consecutive 14-byte frames, R0 first. There is no tag
//! to check, so the only validation is the length.

use crate::track::{RegisterFrame, SourceFormat, Track, TrackInfo, REGISTER_COUNT};
use crate::{ReplayError, Result};

/// File extensions treated as raw dumps by [`load_file`](super::load_file)
pub const RAW_EXTENSIONS: &[&str] = &["raw", "psg14"];

/// Parse a raw dump at `rate` ticks per second
pub fn parse_raw(data: &[u8], rate: f64) -> Result<Track> {
    if data.len() % REGISTER_COUNT != 0 {
        return Err(ReplayError::ParseError(format!(
            "raw register dump of {} bytes is not a whole number of {REGISTER_COUNT}-byte frames",
            data.len()
        )));
    }
    let frames = data
        .chunks_exact(REGISTER_COUNT)
        .filter_map(RegisterFrame::from_slice)
        .collect();
    Ok(Track::new(frames, rate)?.with_info(TrackInfo {
        format: SourceFormat::Raw,
        ..TrackInfo::default()
    }))
}
