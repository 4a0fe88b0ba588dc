//! YM register-dump containers
//!
//! - YM3: `YM3!` + 14 interleaved register streams
//! - YM3b: `YM3b` + YM3 body + 4-byte loop frame
//! - YM4: `YM4!LeOnArD!` 26-byte header, digidrums, metadata, 14 registers/frame
//! - YM5/YM6: `YM5!`/`YM6!` 34-byte header with clock and rate, 16 registers/frame
//!
//! All multi-byte header fields are big-endian. Digidrum samples and the
//! YM5/YM6 effect registers (R14/R15) are parsed past and dropped.

use crate::track::{RegisterFrame, SourceFormat, Track, TrackInfo, DEFAULT_TICK_RATE, REGISTER_COUNT};
use crate::{ReplayError, Result};
use nom::bytes::complete::{tag, take, take_till};
use nom::number::complete::{be_u16, be_u32};
use nom::sequence::tuple;
use nom::IResult;

/// Frames stored register-by-register instead of frame-by-frame
const ATTR_INTERLEAVED: u32 = 0x01;

/// Upper bound on declared frame counts (about 33 minutes at 50 Hz)
const MAX_REASONABLE_FRAMES: u32 = 100_000;

const YM_SIGNATURE: &[u8] = b"LeOnArD!";

#[derive(Debug, Clone, PartialEq)]
struct YmHeader {
    frame_count: u32,
    attributes: u32,
    digidrum_count: u16,
    master_clock: Option<u32>,
    player_freq: Option<u16>,
    loop_frame: u32,
    extra_data_size: u16,
}

fn truncated(format: SourceFormat, section: &str) -> ReplayError {
    ReplayError::ParseError(format!("{format} truncated in {section}"))
}

fn ym4_header(input: &[u8]) -> IResult<&[u8], YmHeader> {
    let (input, _) = tag(YM_SIGNATURE)(input)?;
    let (input, (frame_count, attributes, digidrum_count, loop_frame)) =
        tuple((be_u32, be_u32, be_u16, be_u32))(input)?;
    Ok((
        input,
        YmHeader {
            frame_count,
            attributes,
            digidrum_count,
            master_clock: None,
            player_freq: None,
            loop_frame,
            extra_data_size: 0,
        },
    ))
}

fn ym5_header(input: &[u8]) -> IResult<&[u8], YmHeader> {
    let (input, _) = tag(YM_SIGNATURE)(input)?;
    let (input, (frame_count, attributes, digidrum_count, master_clock, player_freq)) =
        tuple((be_u32, be_u32, be_u16, be_u32, be_u16))(input)?;
    let (input, (loop_frame, extra_data_size)) = tuple((be_u32, be_u16))(input)?;
    Ok((
        input,
        YmHeader {
            frame_count,
            attributes,
            digidrum_count,
            master_clock: Some(master_clock),
            player_freq: Some(player_freq),
            loop_frame,
            extra_data_size,
        },
    ))
}

/// One size-prefixed digidrum sample
fn digidrum(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, size) = be_u32(input)?;
    take(size)(input)
}

/// NUL-terminated string, bytes mapped 1:1 to chars (Atari charset is close enough)
fn c_string(input: &[u8]) -> IResult<&[u8], String> {
    let (input, raw) = take_till(|b: u8| b == 0)(input)?;
    let (input, _) = tag(&b"\0"[..])(input)?;
    Ok((input, raw.iter().map(|&b| b as char).collect()))
}

fn metadata(input: &[u8]) -> IResult<&[u8], (String, String, String)> {
    tuple((c_string, c_string, c_string))(input)
}

/// Split a register block into frames, keeping R0-R13
fn split_frames(
    body: &[u8],
    frame_count: usize,
    registers_per_frame: usize,
    interleaved: bool,
) -> Vec<RegisterFrame> {
    (0..frame_count)
        .map(|frame| {
            let mut regs = [0u8; REGISTER_COUNT];
            for (reg, slot) in regs.iter_mut().enumerate() {
                let idx = if interleaved {
                    reg * frame_count + frame
                } else {
                    frame * registers_per_frame + reg
                };
                *slot = body[idx];
            }
            RegisterFrame::new(regs)
        })
        .collect()
}

/// Zero frames is a valid (silent) track, as for YM3
fn check_frame_count(format: SourceFormat, count: u32) -> Result<usize> {
    if count > MAX_REASONABLE_FRAMES {
        return Err(ReplayError::ParseError(format!(
            "{format} frame count {count} exceeds limit of {MAX_REASONABLE_FRAMES}"
        )));
    }
    Ok(count as usize)
}

/// Parse YM3 (`data` includes the magic)
pub fn parse_ym3(data: &[u8]) -> Result<Track> {
    let payload = data.get(4..).ok_or_else(|| truncated(SourceFormat::Ym3, "header"))?;
    if payload.len() % REGISTER_COUNT != 0 {
        return Err(ReplayError::ParseError(format!(
            "YM3 data size {} is not a multiple of {REGISTER_COUNT}",
            payload.len()
        )));
    }
    let frame_count = payload.len() / REGISTER_COUNT;
    let frames = split_frames(payload, frame_count, REGISTER_COUNT, true);
    build_track(frames, None, TrackInfo {
        format: SourceFormat::Ym3,
        ..TrackInfo::default()
    })
}

/// Parse YM3b (`data` includes the magic)
pub fn parse_ym3b(data: &[u8]) -> Result<Track> {
    if data.len() < 8 {
        return Err(truncated(SourceFormat::Ym3b, "header"));
    }
    let (payload, tail) = data[4..].split_at(data.len() - 8);
    if payload.len() % REGISTER_COUNT != 0 {
        return Err(ReplayError::ParseError(format!(
            "YM3b data size {} is not a multiple of {REGISTER_COUNT}",
            payload.len()
        )));
    }
    let frame_count = payload.len() / REGISTER_COUNT;
    let loop_frame = u32::from_be_bytes([tail[0], tail[1], tail[2], tail[3]]);
    if frame_count > 0 && loop_frame as usize >= frame_count {
        log::warn!("YM3b loop frame {loop_frame} beyond {frame_count} frames, ignoring");
    }
    let frames = split_frames(payload, frame_count, REGISTER_COUNT, true);
    build_track(frames, None, TrackInfo {
        format: SourceFormat::Ym3b,
        loop_frame: if (loop_frame as usize) < frame_count { loop_frame } else { 0 },
        ..TrackInfo::default()
    })
}

/// Parse YM4, YM5 or YM6 (`data` includes the magic)
pub fn parse_ym_with_header(data: &[u8], format: SourceFormat) -> Result<Track> {
    let input = data.get(4..).ok_or_else(|| truncated(format, "header"))?;
    let (mut input, header) = match format {
        SourceFormat::Ym4 => ym4_header(input),
        _ => ym5_header(input),
    }
    .map_err(|_| truncated(format, "header"))?;

    let frame_count = check_frame_count(format, header.frame_count)?;

    let (rest, _) = take::<_, _, nom::error::Error<&[u8]>>(header.extra_data_size as usize)(input)
        .map_err(|_| truncated(format, "extra data section"))?;
    input = rest;

    for index in 0..header.digidrum_count {
        let (rest, sample) =
            digidrum(input).map_err(|_| truncated(format, &format!("digidrum {index}")))?;
        log::trace!("skipping digidrum {index} ({} bytes)", sample.len());
        input = rest;
    }

    let (input, (title, author, comment)) =
        metadata(input).map_err(|_| truncated(format, "metadata strings"))?;

    let registers_per_frame = match format {
        SourceFormat::Ym4 => REGISTER_COUNT,
        _ => 16,
    };
    let body_len = frame_count
        .checked_mul(registers_per_frame)
        .ok_or_else(|| ReplayError::ParseError(format!("{format} frame data size overflow")))?;
    let (_, body) = take::<_, _, nom::error::Error<&[u8]>>(body_len)(input)
        .map_err(|_| truncated(format, "frame data"))?;

    let interleaved = header.attributes & ATTR_INTERLEAVED != 0;
    let frames = split_frames(body, frame_count, registers_per_frame, interleaved);

    let rate = header
        .player_freq
        .filter(|&freq| freq > 0)
        .map(f64::from);
    build_track(frames, rate, TrackInfo {
        title,
        author,
        comment,
        format,
        master_clock: header.master_clock.filter(|&clock| clock > 0),
        loop_frame: header.loop_frame,
    })
}

fn build_track(frames: Vec<RegisterFrame>, rate: Option<f64>, info: TrackInfo) -> Result<Track> {
    Ok(Track::new(frames, rate.unwrap_or(DEFAULT_TICK_RATE))?.with_info(info))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a YM5/YM6 file body for tests
    pub(crate) fn build_ym5(magic: &[u8; 4], frames: &[[u8; 16]], interleaved: bool, rate: u16) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(magic);
        data.extend_from_slice(YM_SIGNATURE);
        data.extend_from_slice(&(frames.len() as u32).to_be_bytes());
        data.extend_from_slice(&(if interleaved { ATTR_INTERLEAVED } else { 0 }).to_be_bytes());
        data.extend_from_slice(&1u16.to_be_bytes()); // one digidrum
        data.extend_from_slice(&1_773_400u32.to_be_bytes());
        data.extend_from_slice(&rate.to_be_bytes());
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(&2u16.to_be_bytes());
        data.extend_from_slice(&[0xEE, 0xEE]); // extra data
        data.extend_from_slice(&3u32.to_be_bytes());
        data.extend_from_slice(&[1, 2, 3]); // digidrum sample
        data.extend_from_slice(b"Title\0Author\0Comment\0");
        if interleaved {
            for reg in 0..16 {
                for frame in frames {
                    data.push(frame[reg]);
                }
            }
        } else {
            for frame in frames {
                data.extend_from_slice(frame);
            }
        }
        data.extend_from_slice(b"End!");
        data
    }

    fn sample_frames() -> Vec<[u8; 16]> {
        (0..3u8)
            .map(|i| {
                let mut f = [0u8; 16];
                for (r, slot) in f.iter_mut().enumerate() {
                    *slot = i * 16 + r as u8;
                }
                f
            })
            .collect()
    }

    #[test]
    fn test_ym5_interleaved_and_sequential_agree() {
        let frames = sample_frames();
        for interleaved in [false, true] {
            let data = build_ym5(b"YM5!", &frames, interleaved, 60);
            let track = parse_ym_with_header(&data, SourceFormat::Ym5).unwrap();
            assert_eq!(track.len(), 3);
            assert_eq!(track.rate(), 60.0);
            assert_eq!(track.frames()[2][13], 2 * 16 + 13);
            assert_eq!(track.info().title, "Title");
            assert_eq!(track.info().comment, "Comment");
            assert_eq!(track.info().master_clock, Some(1_773_400));
        }
    }

    #[test]
    fn test_zero_rate_defaults_to_50() {
        let data = build_ym5(b"YM6!", &sample_frames(), true, 0);
        let track = parse_ym_with_header(&data, SourceFormat::Ym6).unwrap();
        assert_eq!(track.rate(), DEFAULT_TICK_RATE);
        assert_eq!(track.info().format, SourceFormat::Ym6);
    }

    #[test]
    fn test_truncated_frames_rejected() {
        let mut data = build_ym5(b"YM5!", &sample_frames(), true, 50);
        data.truncate(data.len() - 10);
        let err = parse_ym_with_header(&data, SourceFormat::Ym5).unwrap_err();
        assert!(matches!(err, ReplayError::ParseError(msg) if msg.contains("frame data")));
    }

    #[test]
    fn test_ym3_deinterleaves() {
        let mut data = b"YM3!".to_vec();
        // two frames: register r of frame f = 10*r + f
        for reg in 0..14u8 {
            data.push(reg * 10);
            data.push(reg * 10 + 1);
        }
        let track = parse_ym3(&data).unwrap();
        assert_eq!(track.len(), 2);
        assert_eq!(track.frames()[1][7], 71);
        assert_eq!(track.rate(), 50.0);
    }

    #[test]
    fn test_ym3_bad_length() {
        let mut data = b"YM3!".to_vec();
        data.extend_from_slice(&[0u8; 15]);
        assert!(matches!(parse_ym3(&data), Err(ReplayError::ParseError(_))));
    }

    #[test]
    fn test_ym3b_loop_frame() {
        let mut data = b"YM3b".to_vec();
        data.extend_from_slice(&[0u8; 28]);
        data.extend_from_slice(&1u32.to_be_bytes());
        let track = parse_ym3b(&data).unwrap();
        assert_eq!(track.len(), 2);
        assert_eq!(track.info().loop_frame, 1);
    }

    #[test]
    fn test_ym4_header_layout() {
        let mut data = b"YM4!".to_vec();
        data.extend_from_slice(YM_SIGNATURE);
        data.extend_from_slice(&1u32.to_be_bytes());
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(&0u16.to_be_bytes());
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(b"A\0B\0C\0");
        data.extend_from_slice(&[9u8; 14]);
        let track = parse_ym_with_header(&data, SourceFormat::Ym4).unwrap();
        assert_eq!(track.len(), 1);
        assert_eq!(track.frames()[0][0], 9);
        assert_eq!(track.info().author, "B");
        assert_eq!(track.info().master_clock, None);
    }

    #[test]
    fn test_zero_frames_load_as_empty_track_in_every_format() {
        let ym5 = parse_ym_with_header(&build_ym5(b"YM5!", &[], false, 50), SourceFormat::Ym5).unwrap();
        let ym6 = parse_ym_with_header(&build_ym5(b"YM6!", &[], true, 50), SourceFormat::Ym6).unwrap();
        let ym3 = parse_ym3(b"YM3!").unwrap();
        for track in [&ym5, &ym6, &ym3] {
            assert!(track.is_empty());
            assert_eq!(track.duration_seconds(), 0.0);
        }
        assert_eq!(ym5.info().title, "Title");
    }
}
