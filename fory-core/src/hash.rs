//! MurmurHash3 wrapper used for MetaString de-duplication keys and the
//! struct schema-hash guard (spec.md §4.2/§4.8).
//!
//! Grounded on the teacher's general preference for a cheap non-crypto
//! hash ahead of its `FxHashMap` dedup caches (`structured/resolver.rs`);
//! here the hash also has to be stable across runs (no random per-process
//! seed), which is why it reaches for `murmur3` instead of `fxhash` for
//! anything that ends up on the wire or keyed by content rather than by
//! pointer identity.

use std::io::Cursor;

use murmur3::murmur3_x64_128;

/// Fixed seed so hashes are stable across processes and languages don't
/// need to exchange one. Matches the convention of hashing wire content
/// with a well-known constant seed rather than a random one.
const SEED: u32 = 47;

/// Hashes `bytes` with MurmurHash3-x64-128 and folds the 128-bit digest
/// down to 64 bits by XOR-ing the two halves.
pub fn murmur3_64(bytes: &[u8]) -> u64 {
    let digest = murmur3_x64_128(&mut Cursor::new(bytes), SEED).expect("in-memory cursor read cannot fail");
    ((digest >> 64) as u64) ^ (digest as u64)
}

/// Folds a 64-bit hash further to 32 bits for contexts that need a
/// compact schema hash (spec.md §4.8 struct schema hash).
#[inline]
pub fn fold_to_32(v: u64) -> u32 {
    ((v >> 32) as u32) ^ (v as u32)
}

/// Convenience: hash straight to a 32-bit value.
#[inline]
pub fn murmur3_32(bytes: &[u8]) -> u32 {
    fold_to_32(murmur3_64(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_across_calls() {
        let a = murmur3_64(b"hello fory");
        let b = murmur3_64(b"hello fory");
        assert_eq!(a, b);
    }

    #[test]
    fn distinguishes_distinct_inputs() {
        assert_ne!(murmur3_64(b"foo"), murmur3_64(b"bar"));
    }

    #[test]
    fn fold_is_deterministic() {
        let h = murmur3_64(b"struct Point { x, y }");
        assert_eq!(fold_to_32(h), fold_to_32(h));
    }
}
