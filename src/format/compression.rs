//! LHA decompression for YM files
//!
//! Most YM files in the wild are LHA archives (usually `-lh5-`) holding a
//! single uncompressed YM file. [`decompress_if_needed`] detects the archive
//! header and extracts the first entry; anything else passes through.

use crate::{ReplayError, Result};
use std::io::Read;
#[cfg(not(target_arch = "wasm32"))]
use std::io::Write;

/// Offset of the `-lh?-` method id in level 0-2 headers, after size and checksum
const LHA_SIGNATURE_OFFSET: usize = 2;

/// Length of the `-lh?-` method id
const LHA_SIGNATURE_LENGTH: usize = 5;

/// Maximum decompressed size: 100MB
const MAX_DECOMPRESSED_SIZE: usize = 100 * 1024 * 1024;

/// Offset of the `-lh?-` method id, if present
fn find_lha_signature(data: &[u8]) -> Option<usize> {
    let id = data.get(LHA_SIGNATURE_OFFSET..LHA_SIGNATURE_OFFSET + LHA_SIGNATURE_LENGTH)?;
    matches!(id, [b'-', b'l', b'h', level, b'-'] if (b'0'..=b'7').contains(level))
        .then_some(LHA_SIGNATURE_OFFSET)
}

/// True if the data starts with an LHA archive header
pub fn is_lha_compressed(data: &[u8]) -> bool {
    find_lha_signature(data).is_some()
}

/// Human-readable compression description, e.g. `LH5 compressed`
pub fn lha_info(data: &[u8]) -> Option<String> {
    find_lha_signature(data)
        .map(|offset| format!("LH{} compressed (LHA/LZH archive)", data[offset + 3] as char))
}

/// Extract the first archive entry, or return the data unchanged
pub fn decompress_if_needed(data: &[u8]) -> Result<Vec<u8>> {
    if !is_lha_compressed(data) {
        return Ok(data.to_vec());
    }
    log::debug!(
        "{} input, {} bytes",
        lha_info(data).unwrap_or_default(),
        data.len()
    );

    #[cfg(target_arch = "wasm32")]
    let reader = delharc::LhaDecodeReader::new(data).map_err(|e| {
        ReplayError::DecompressionError(format!("failed to parse LHA archive: {e}"))
    })?;

    // delharc's file parser is the most tolerant of odd level-2 headers
    #[cfg(not(target_arch = "wasm32"))]
    let temp_file = {
        let mut file = tempfile::NamedTempFile::new().map_err(|e| {
            ReplayError::DecompressionError(format!("failed to create temporary file: {e}"))
        })?;
        file.write_all(data)
            .and_then(|_| file.flush())
            .map_err(|e| {
                ReplayError::DecompressionError(format!(
                    "failed to stage {} compressed bytes: {e}",
                    data.len()
                ))
            })?;
        file
    };
    #[cfg(not(target_arch = "wasm32"))]
    let reader = delharc::parse_file(temp_file.path()).map_err(|e| {
        ReplayError::DecompressionError(format!("failed to parse LHA archive: {e}"))
    })?;

    let mut decompressed = Vec::new();
    reader
        .take(MAX_DECOMPRESSED_SIZE as u64)
        .read_to_end(&mut decompressed)
        .map_err(|e| ReplayError::DecompressionError(format!("LHA decompression failed: {e}")))?;

    if decompressed.len() >= MAX_DECOMPRESSED_SIZE {
        return Err(ReplayError::DecompressionError(
            "decompressed data exceeded the 100MB limit; the file is corrupt or hostile".into(),
        ));
    }
    Ok(decompressed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lha_magic_detection() {
        assert!(is_lha_compressed(b"\x22\x9a\x2d\x6c\x68\x35\x2d"));
        assert!(!is_lha_compressed(b"YM3!"));
        assert!(!is_lha_compressed(b"YM6!LeOnArD!"));
        assert!(!is_lha_compressed(b"XX"));
    }

    #[test]
    fn test_lha_levels() {
        for level in b'0'..=b'7' {
            let data = [0x20, 0x00, b'-', b'l', b'h', level, b'-'];
            assert!(is_lha_compressed(&data), "level {}", level as char);
        }
        assert!(!is_lha_compressed(&[0x20, 0x00, b'-', b'l', b'h', b'8', b'-']));
        assert_eq!(
            lha_info(b"\x20\x15-lh5-").as_deref(),
            Some("LH5 compressed (LHA/LZH archive)")
        );
    }

    #[test]
    fn test_method_id_only_at_header_offset() {
        // register data that happens to spell a method id
        assert!(!is_lha_compressed(b"\x20-lh5-\x00\x00"));
        let mut frames = vec![0u8; 28];
        frames[16..21].copy_from_slice(b"-lh5-");
        assert!(!is_lha_compressed(&frames));
        assert_eq!(decompress_if_needed(&frames).unwrap(), frames);
    }

    #[test]
    fn test_uncompressed_passthrough() {
        let data = b"YM3!\x00\x01\x02";
        assert_eq!(decompress_if_needed(data).unwrap(), data.to_vec());
    }

    #[test]
    fn test_corrupt_archive_is_decompression_error() {
        let mut data = vec![0x20, 0x00, b'-', b'l', b'h', b'5', b'-'];
        data.extend_from_slice(&[0xFF; 16]);
        assert!(matches!(
            decompress_if_needed(&data),
            Err(ReplayError::DecompressionError(_))
        ));
    }
}
