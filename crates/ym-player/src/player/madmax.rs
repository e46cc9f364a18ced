//! Built-in Mad Max (YM2) digi-drum bank.
//!
//! YM2 files do not embed their drums; the Mad Max driver carried its own
//! PCM bank and register dumps merely index into it. The bank asset here
//! uses a trivial length-prefixed layout (1-byte sample count, then per
//! sample a little-endian u16 length and the raw bytes). The PCM itself is a
//! dump of the original player and is distributed separately; the asset
//! ships with an empty bank, and drum triggers outside the bank are skipped
//! the same way the driver skips out-of-range indices.

use std::sync::{Arc, OnceLock};

const BANK_BIN: &[u8] = include_bytes!("madmax_samples.bin");

static BANK: OnceLock<Vec<Arc<[u8]>>> = OnceLock::new();

fn parse_bank() -> Vec<Arc<[u8]>> {
    let data = BANK_BIN;
    if data.is_empty() {
        return Vec::new();
    }
    let count = usize::from(data[0]);
    let mut samples = Vec::with_capacity(count);
    let mut offset = 1;
    for _ in 0..count {
        if offset + 2 > data.len() {
            break;
        }
        let len = usize::from(u16::from_le_bytes([data[offset], data[offset + 1]]));
        offset += 2;
        if offset + len > data.len() {
            break;
        }
        samples.push(Arc::from(&data[offset..offset + len]));
        offset += len;
    }
    samples
}

/// Fetch sample `index` from the bank, if present.
pub(crate) fn sample(index: usize) -> Option<Arc<[u8]>> {
    BANK.get_or_init(parse_bank).get(index).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_bank_index_is_none() {
        assert!(sample(usize::from(u8::MAX)).is_none());
    }
}
