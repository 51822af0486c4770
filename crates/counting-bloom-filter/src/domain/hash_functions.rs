//! Element fingerprinting
//!
//! Uses MurmurHash3 x64_128 so a single pass over the encoded element
//! yields both words needed by the double-hashing index scheme.

use std::fmt;
use std::io::Cursor;

/// Seed shared by every filter handle. Changing it reshuffles every slot.
const FINGERPRINT_SEED: u32 = 0;

/// 128-bit element fingerprint split into two 64-bit words
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub h1: u64,
    pub h2: u64,
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}{:016x}", self.h2, self.h1)
    }
}

/// Compute the fingerprint of an encoded element
///
/// `h1` is the low half of the 128-bit hash, `h2` the high half.
pub fn fingerprint(encoded: &[u8]) -> Fingerprint {
    let mut cursor = Cursor::new(encoded);

    // Reading from an in-memory cursor cannot fail
    let hash = murmur3::murmur3_x64_128(&mut cursor, FINGERPRINT_SEED).unwrap_or(0);

    Fingerprint {
        h1: hash as u64,
        h2: (hash >> 64) as u64,
    }
}
