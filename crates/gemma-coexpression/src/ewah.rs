//! 64-bit EWAH (word-aligned run-length) bitmap codec.
//!
//! Byte-compatible with JavaEWAH's `EWAHCompressedBitmap.serialize`, all
//! integers big-endian:
//!
//! ```text
//! ┌────────────┬─────────────┬──────────────────────┬─────────────┐
//! │ i32 size   │ i32 words   │ u64 × words          │ i32 rlw pos │
//! │ (in bits)  │ (>= 1)      │ marker, literals ... │             │
//! └────────────┴─────────────┴──────────────────────┴─────────────┘
//! ```
//!
//! Every marker ("running length word") is followed by its literal words:
//!
//! ```text
//! bit 0      running bit (value of the run)
//! bits 1-32  running length, in 64-bit words
//! bits 33-63 number of literal words that follow
//! ```

use roaring::RoaringBitmap;

use crate::error::SupportDataError;

const WORD_BITS: u64 = 64;
const RUNNING_LENGTH_BITS: u32 = 32;
const LITERAL_BITS: u32 = 64 - 1 - RUNNING_LENGTH_BITS;
const MAX_RUNNING_LENGTH: u64 = (1 << RUNNING_LENGTH_BITS) - 1;
const MAX_LITERALS: u64 = (1 << LITERAL_BITS) - 1;

const HEADER_BYTES: usize = 8;
const TRAILER_BYTES: usize = 4;

/// Largest position that can be stored; `size in bits` must fit an `i32`.
pub const MAX_POSITION: u32 = i32::MAX as u32 - 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Marker {
    running_bit: bool,
    running_length: u64,
    literals: u64,
}

impl Marker {
    fn from_word(word: u64) -> Self {
        Self {
            running_bit: word & 1 == 1,
            running_length: (word >> 1) & MAX_RUNNING_LENGTH,
            literals: word >> (1 + RUNNING_LENGTH_BITS),
        }
    }

    fn to_word(self) -> u64 {
        u64::from(self.running_bit)
            | (self.running_length << 1)
            | (self.literals << (1 + RUNNING_LENGTH_BITS))
    }
}

// ============================================================================
// Encoding
// ============================================================================

struct Writer {
    buffer: Vec<u64>,
    rlw: usize,
    marker: Marker,
}

impl Writer {
    fn new() -> Self {
        Self {
            buffer: vec![0],
            rlw: 0,
            marker: Marker::default(),
        }
    }

    fn start_marker(&mut self) {
        self.buffer[self.rlw] = self.marker.to_word();
        self.buffer.push(0);
        self.rlw = self.buffer.len() - 1;
        self.marker = Marker::default();
    }

    fn push_run(&mut self, bit: bool, mut count: u64) {
        while count > 0 {
            let m = self.marker;
            let extendable = m.literals == 0
                && (m.running_length == 0 || m.running_bit == bit)
                && m.running_length < MAX_RUNNING_LENGTH;
            if !extendable {
                self.start_marker();
                continue;
            }
            let take = count.min(MAX_RUNNING_LENGTH - m.running_length);
            self.marker.running_bit = bit;
            self.marker.running_length += take;
            count -= take;
        }
    }

    fn push_literal(&mut self, word: u64) {
        if self.marker.literals == MAX_LITERALS {
            self.start_marker();
        }
        self.buffer.push(word);
        self.marker.literals += 1;
    }

    /// Append one non-empty word at `index`, filling the gap with zero runs.
    fn push_word(&mut self, next_index: &mut u64, index: u64, word: u64) {
        if index > *next_index {
            self.push_run(false, index - *next_index);
        }
        if word == u64::MAX {
            self.push_run(true, 1);
        } else {
            self.push_literal(word);
        }
        *next_index = index + 1;
    }

    fn finish(mut self) -> (Vec<u64>, usize) {
        self.buffer[self.rlw] = self.marker.to_word();
        (self.buffer, self.rlw)
    }
}

/// Encode a set of positions.
///
/// Full words become runs of ones; an empty set encodes as a single empty
/// marker (20 bytes).
pub fn encode(positions: &RoaringBitmap) -> Result<Vec<u8>, SupportDataError> {
    let size_in_bits = match positions.max() {
        None => 0,
        Some(max) if max > MAX_POSITION => return Err(SupportDataError::IdOutOfRange(u64::from(max))),
        Some(max) => max + 1,
    };

    let mut writer = Writer::new();
    let mut next_index = 0u64;
    let mut current: Option<(u64, u64)> = None;

    for pos in positions.iter() {
        let index = u64::from(pos) / WORD_BITS;
        let bit = 1u64 << (u64::from(pos) % WORD_BITS);
        if let Some((i, word)) = current.as_mut() {
            if *i == index {
                *word |= bit;
                continue;
            }
        }
        if let Some((i, word)) = current.take() {
            writer.push_word(&mut next_index, i, word);
        }
        current = Some((index, bit));
    }
    if let Some((i, word)) = current {
        writer.push_word(&mut next_index, i, word);
    }

    let (words, rlw) = writer.finish();
    let mut out = Vec::with_capacity(HEADER_BYTES + words.len() * 8 + TRAILER_BYTES);
    out.extend_from_slice(&(size_in_bits as i32).to_be_bytes());
    out.extend_from_slice(&(words.len() as i32).to_be_bytes());
    for word in &words {
        out.extend_from_slice(&word.to_be_bytes());
    }
    out.extend_from_slice(&(rlw as i32).to_be_bytes());
    Ok(out)
}

// ============================================================================
// Decoding
// ============================================================================

fn read_i32(bytes: &[u8], at: usize) -> i32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[at..at + 4]);
    i32::from_be_bytes(buf)
}

fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[at..at + 8]);
    u64::from_be_bytes(buf)
}

/// Decode a serialized bitmap, validating its structure.
///
/// Never returns a partial result: any inconsistency is
/// [`SupportDataError::Corrupt`].
pub fn decode(bytes: &[u8]) -> Result<RoaringBitmap, SupportDataError> {
    if bytes.len() < HEADER_BYTES + TRAILER_BYTES {
        return Err(SupportDataError::corrupt(format!(
            "{} bytes is too short for a bitmap header",
            bytes.len()
        )));
    }

    let size_in_bits = read_i32(bytes, 0);
    let word_count = read_i32(bytes, 4);
    if size_in_bits < 0 {
        return Err(SupportDataError::corrupt(format!("negative size {size_in_bits}")));
    }
    if word_count < 1 {
        return Err(SupportDataError::corrupt(format!("word count {word_count} is below 1")));
    }
    let word_count = word_count as usize;
    let expected = HEADER_BYTES + word_count * 8 + TRAILER_BYTES;
    if bytes.len() != expected {
        return Err(SupportDataError::corrupt(format!(
            "{word_count} words need {expected} bytes, got {}",
            bytes.len()
        )));
    }

    let words: Vec<u64> = (0..word_count)
        .map(|i| read_u64(bytes, HEADER_BYTES + i * 8))
        .collect();
    let rlw = read_i32(bytes, expected - TRAILER_BYTES);
    if rlw < 0 || rlw as usize >= word_count {
        return Err(SupportDataError::corrupt(format!(
            "marker position {rlw} outside of {word_count} words"
        )));
    }

    let size = size_in_bits as u64;
    let mut out = RoaringBitmap::new();
    let mut offset = 0u64; // in words
    let mut last_marker = 0usize;
    let mut i = 0usize;

    while i < words.len() {
        let marker = Marker::from_word(words[i]);
        last_marker = i;
        i += 1;

        let run_end = offset.saturating_add(marker.running_length);
        if marker.running_bit && marker.running_length > 0 {
            let start = offset.saturating_mul(WORD_BITS);
            let end = run_end.saturating_mul(WORD_BITS);
            if end > size {
                return Err(SupportDataError::corrupt(format!(
                    "run of ones ends at bit {end}, beyond size {size}"
                )));
            }
            out.insert_range(start as u32..end as u32);
        }
        offset = run_end;

        let literals = marker.literals as usize;
        if literals > words.len() - i {
            return Err(SupportDataError::corrupt(format!(
                "marker at word {last_marker} claims {literals} literals, {} words remain",
                words.len() - i
            )));
        }
        for &literal in &words[i..i + literals] {
            let base = offset.saturating_mul(WORD_BITS);
            let mut rest = literal;
            while rest != 0 {
                let pos = base.saturating_add(u64::from(rest.trailing_zeros()));
                if pos >= size {
                    return Err(SupportDataError::corrupt(format!(
                        "bit {pos} set beyond size {size}"
                    )));
                }
                out.insert(pos as u32);
                rest &= rest - 1;
            }
            offset = offset.saturating_add(1);
        }
        i += literals;
    }

    if last_marker != rlw as usize {
        return Err(SupportDataError::corrupt(format!(
            "last marker is word {last_marker}, header says {rlw}"
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bitmap(positions: &[u32]) -> RoaringBitmap {
        positions.iter().copied().collect()
    }

    #[test]
    fn test_empty_is_single_marker() {
        let bytes = encode(&RoaringBitmap::new()).unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert!(decode(&bytes).unwrap().is_empty());
    }

    #[test]
    fn test_single_bit_layout() {
        // 17 empty words, then one literal with bit 6 set.
        let bytes = encode(&bitmap(&[1094])).unwrap();
        let mut expected = Vec::new();
        expected.extend_from_slice(&1095i32.to_be_bytes());
        expected.extend_from_slice(&2i32.to_be_bytes());
        expected.extend_from_slice(&((17u64 << 1) | (1u64 << 33)).to_be_bytes());
        expected.extend_from_slice(&64u64.to_be_bytes());
        expected.extend_from_slice(&0i32.to_be_bytes());
        assert_eq!(bytes, expected);
        assert_eq!(decode(&bytes).unwrap(), bitmap(&[1094]));
    }

    #[test]
    fn test_full_words_become_runs() {
        let mut set: RoaringBitmap = (0..128).collect();
        set.insert(200);
        let bytes = encode(&set).unwrap();
        // ones-run marker, zero-run marker, one literal
        assert_eq!(bytes.len(), HEADER_BYTES + 3 * 8 + TRAILER_BYTES);
        assert_eq!(read_u64(&bytes, HEADER_BYTES), 1 | (2 << 1));
        assert_eq!(decode(&bytes).unwrap(), set);
    }

    #[test]
    fn test_out_of_range_position() {
        let err = encode(&bitmap(&[MAX_POSITION + 1])).unwrap_err();
        assert_eq!(err, SupportDataError::IdOutOfRange(u64::from(MAX_POSITION) + 1));
        assert!(encode(&bitmap(&[MAX_POSITION])).is_ok());
    }

    #[test]
    fn test_largest_position_round_trips() {
        let set = bitmap(&[0, MAX_POSITION]);
        assert_eq!(decode(&encode(&set).unwrap()).unwrap(), set);
    }

    fn assert_corrupt(bytes: &[u8]) {
        match decode(bytes) {
            Err(SupportDataError::Corrupt(_)) => {}
            other => panic!("expected corrupt, got {other:?}"),
        }
    }

    #[test]
    fn test_truncated_input() {
        let bytes = encode(&bitmap(&[3, 90])).unwrap();
        assert_corrupt(&bytes[..5]);
        assert_corrupt(&bytes[..bytes.len() - 1]);
    }

    #[test]
    fn test_bad_header_values() {
        let mut bytes = encode(&bitmap(&[1094])).unwrap();
        bytes[4..8].copy_from_slice(&0i32.to_be_bytes());
        assert_corrupt(&bytes);

        let mut bytes = encode(&bitmap(&[1094])).unwrap();
        bytes[0..4].copy_from_slice(&(-1i32).to_be_bytes());
        assert_corrupt(&bytes);
    }

    #[test]
    fn test_bit_beyond_size() {
        let mut bytes = encode(&bitmap(&[1094])).unwrap();
        bytes[0..4].copy_from_slice(&1000i32.to_be_bytes());
        assert_corrupt(&bytes);
    }

    #[test]
    fn test_wrong_marker_position() {
        let mut bytes = encode(&bitmap(&[1094])).unwrap();
        let at = bytes.len() - TRAILER_BYTES;
        bytes[at..].copy_from_slice(&1i32.to_be_bytes());
        assert_corrupt(&bytes);
        bytes[at..].copy_from_slice(&7i32.to_be_bytes());
        assert_corrupt(&bytes);
    }

    #[test]
    fn test_literal_count_overrun() {
        let mut bytes = encode(&bitmap(&[1094])).unwrap();
        let marker = (17u64 << 1) | (5u64 << 33);
        bytes[HEADER_BYTES..HEADER_BYTES + 8].copy_from_slice(&marker.to_be_bytes());
        assert_corrupt(&bytes);
    }

    #[test]
    fn test_larger_size_than_needed_is_accepted() {
        let mut bytes = encode(&bitmap(&[5])).unwrap();
        bytes[0..4].copy_from_slice(&4096i32.to_be_bytes());
        assert_eq!(decode(&bytes).unwrap(), bitmap(&[5]));
    }
}
