//! Container decoding
//!
//! Turns file bytes into a [`Track`]. LHA archives are unpacked first, then
//! the container tag picks the parser. Every failure happens before a track
//! exists, so a failed load never leaves a half-built track behind.
//!
//! Some chip formats are recognised but have no register-dump playback path
//! (they need a CPU emulator or carry tracker data); they fail with
//! [`ReplayError::UnsupportedFormat`] and a hint on how to convert them.

pub mod compression;
pub mod raw;
pub mod ym;

use crate::track::{SourceFormat, Track, DEFAULT_TICK_RATE};
use crate::{ReplayError, Result};
use std::path::Path;

/// What the leading bytes of a (decompressed) file say it is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Container {
    /// A register-dump format this crate plays
    Supported(SourceFormat),
    /// A recognised format without a playback path
    Unsupported {
        /// Format tag
        format: &'static str,
        /// Suggested conversion
        hint: &'static str,
    },
    /// Nothing recognisable
    Unknown,
}

/// Classify decompressed file bytes by their tag
pub fn detect_container(data: &[u8]) -> Container {
    let magic = data.get(..4).unwrap_or(&[]);
    match magic {
        b"YM3!" => return Container::Supported(SourceFormat::Ym3),
        b"YM3b" => return Container::Supported(SourceFormat::Ym3b),
        b"YM4!" => return Container::Supported(SourceFormat::Ym4),
        b"YM5!" => return Container::Supported(SourceFormat::Ym5),
        b"YM6!" => return Container::Supported(SourceFormat::Ym6),
        b"YM2!" => {
            return Container::Unsupported {
                format: "YM2",
                hint: "Mad Max digidrum dumps are not supported; re-export the song as YM5 or YM6",
            }
        }
        b"YMT1" | b"YMT2" => {
            return Container::Unsupported {
                format: "YM tracker",
                hint: "tracker data has no register stream; render it to YM6 with a YM tracker converter",
            }
        }
        _ => {}
    }
    if data.starts_with(b"ZXAYEMUL") {
        return Container::Unsupported {
            format: "ZX AY",
            hint: "AY files contain Z80 code; capture a register dump (YM6) with a ZX Spectrum emulator",
        };
    }
    if data.get(12..16) == Some(b"SNDH".as_slice()) {
        return Container::Unsupported {
            format: "SNDH",
            hint: "SNDH files contain 68000 code; convert to YM6 with an Atari ST emulator or sndh2ym",
        };
    }
    Container::Unknown
}

/// Decode container bytes (optionally LHA-compressed) into a track
pub fn load_track(data: &[u8]) -> Result<Track> {
    let data = compression::decompress_if_needed(data)?;
    let track = match detect_container(&data) {
        Container::Supported(SourceFormat::Ym3) => ym::parse_ym3(&data)?,
        Container::Supported(SourceFormat::Ym3b) => ym::parse_ym3b(&data)?,
        Container::Supported(format @ (SourceFormat::Ym4 | SourceFormat::Ym5 | SourceFormat::Ym6)) => {
            ym::parse_ym_with_header(&data, format)?
        }
        Container::Supported(other) => {
            return Err(ReplayError::ParseError(format!(
                "{other} has no container tag and must be loaded explicitly"
            )))
        }
        Container::Unsupported { format, hint } => {
            return Err(ReplayError::UnsupportedFormat {
                format: format.to_string(),
                hint: hint.to_string(),
            })
        }
        Container::Unknown => {
            let shown: String = data
                .iter()
                .take(4)
                .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
                .collect();
            return Err(ReplayError::ParseError(format!(
                "unrecognized container tag '{shown}' ({} bytes)",
                data.len()
            )));
        }
    };
    log::info!(
        "decoded {} container: {} frames @ {} Hz",
        track.info().format,
        track.len(),
        track.rate()
    );
    Ok(track)
}

/// Read and decode a file; `.raw`/`.psg14` files are taken as raw dumps at 50 Hz
pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Track> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    let is_raw = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            raw::RAW_EXTENSIONS
                .iter()
                .any(|raw| raw.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false);
    if is_raw {
        let data = compression::decompress_if_needed(&data)?;
        return raw::parse_raw(&data, DEFAULT_TICK_RATE);
    }
    load_track(&data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_unsupported_formats_carry_hints() {
        let mut sndh = vec![0u8; 12];
        sndh.extend_from_slice(b"SNDH");
        sndh.extend_from_slice(&[0u8; 16]);
        for data in [
            b"YM2!rest".to_vec(),
            b"YMT1rest".to_vec(),
            b"ZXAYEMULrest".to_vec(),
            sndh,
        ] {
            match load_track(&data) {
                Err(ReplayError::UnsupportedFormat { hint, .. }) => assert!(!hint.is_empty()),
                other => panic!("expected UnsupportedFormat, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_unknown_tag_is_parse_error() {
        let err = load_track(b"RIFF\0\0\0\0WAVE").unwrap_err();
        assert!(matches!(err, ReplayError::ParseError(msg) if msg.contains("RIFF")));
        assert!(matches!(load_track(b""), Err(ReplayError::ParseError(_))));
    }

    #[test]
    fn test_load_track_dispatches_ym6() {
        let frames = vec![[0u8; 16]; 4];
        let data = ym::tests::build_ym5(b"YM6!", &frames, true, 50);
        let track = load_track(&data).unwrap();
        assert_eq!(track.len(), 4);
        assert_eq!(track.info().format, SourceFormat::Ym6);
    }

    #[test]
    fn test_load_file_raw_extension() {
        let mut file = tempfile::Builder::new().suffix(".psg14").tempfile().unwrap();
        file.write_all(&[0u8; 42]).unwrap();
        let track = load_file(file.path()).unwrap();
        assert_eq!(track.len(), 3);
        assert_eq!(track.info().format, SourceFormat::Raw);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        assert!(matches!(
            load_file("/nonexistent/song.ym"),
            Err(ReplayError::Io(_))
        ));
    }
}
