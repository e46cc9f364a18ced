//! LZH (LHA) container support.
//!
//! Most YM dumps in the wild ship inside a single-file LHA archive,
//! almost always packed with the `-lh5-` method. The container is a small
//! header (sizes little-endian) followed by the packed payload:
//!
//! ```text
//! +0  header size (u8)     bytes after the first two
//! +1  header checksum (u8) frequently zeroed by the original rippers
//! +2  method id            "-lh0-", "-lh4-" or "-lh5-"
//! +7  packed size (u32)
//! +11 original size (u32)
//! ... remaining header bytes are skipped
//! ```
//!
//! The method id is located by scanning the first few bytes rather than
//! assuming a fixed position, since some packers prepend padding. The header
//! checksum is deliberately not verified: the corpus contains files authored
//! with it zeroed.

mod lh5;

use log::debug;

use crate::bytes::ByteReader;
use crate::error::{Result, YmError};

/// How many leading bytes may precede the LZH header.
const HEADER_SEARCH_LIMIT: usize = 8;

/// Fixed header bytes consumed before the variable tail: size, checksum,
/// method id, packed size, original size.
const HEADER_FIXED_LEN: usize = 15;

fn find_header(data: &[u8]) -> Option<usize> {
    if data.len() < HEADER_FIXED_LEN {
        return None;
    }
    let limit = HEADER_SEARCH_LIMIT.min(data.len() - 7);
    (0..=limit).find(|&i| {
        data[i + 2] == b'-' && data[i + 3] == b'l' && data[i + 4] == b'h' && data[i + 6] == b'-'
    })
}

/// Does this buffer start with an LZH container?
pub fn is_lzh(data: &[u8]) -> bool {
    find_header(data).is_some()
}

/// Unpack a single-file LZH container into its original bytes.
///
/// Supports `-lh0-` (stored) and `-lh4-`/`-lh5-` (LZ77 + Huffman; the
/// reference decoder drives both methods through the same engine). The
/// output is exactly `original size` bytes long.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let start = find_header(data)
        .ok_or_else(|| YmError::FormatUnsupported("no LZH header".into()))?;
    let mut r = ByteReader::new(&data[start..]);

    let header_size = usize::from(r.u8()?);
    let _checksum = r.u8()?;
    let m = r.take(5)?;
    let method = [m[0], m[1], m[2], m[3], m[4]];
    let packed_size = r.le_u32()? as usize;
    let original_size = r.le_u32()? as usize;

    let tail = (header_size + 2)
        .checked_sub(HEADER_FIXED_LEN)
        .ok_or(YmError::CorruptStream("header size too small"))?;
    r.skip(tail)?;

    debug!(
        "LZH container: method {}, {} packed -> {} original bytes",
        String::from_utf8_lossy(&method),
        packed_size,
        original_size
    );

    match &method {
        b"-lh0-" => {
            let stored = r
                .take(original_size)
                .map_err(|_| YmError::Truncated("stored LZH payload"))?;
            Ok(stored.to_vec())
        }
        b"-lh4-" | b"-lh5-" => {
            let packed = r
                .take(packed_size)
                .map_err(|_| YmError::Truncated("packed LZH payload"))?;
            lh5::decompress(packed, original_size)
        }
        _ => Err(YmError::FormatUnsupported(format!(
            "LZH method {}",
            String::from_utf8_lossy(&method)
        ))),
    }
}
