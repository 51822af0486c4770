//! Double-hashing expansion of a fingerprint into k counter slots
//!
//! Probe i lands on `(running & i64::MAX) % m`, where `running` starts at
//! `h1` and then alternately advances by `h2` (after even probes) and `h1`
//! (after odd probes).
//!
//! Each slot owns `W` contiguous bits of the shared bit array, so slot `s`
//! covers absolute bit offsets `[s * W, s * W + W)`.

use std::ops::Range;

use super::hash_functions::Fingerprint;

/// Mask clearing the sign bit, keeping indices non-negative like a signed 64-bit store index
const INDEX_MASK: u64 = i64::MAX as u64;

/// One counter slot and the bit range it occupies
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotGroup {
    /// Slot index in `[0, m)`
    pub slot: u64,
    /// Absolute offset of the counter's most significant bit
    pub start_bit: u64,
    /// Counter width in bits
    pub width: u32,
}

impl SlotGroup {
    /// Absolute bit offsets, most significant bit first
    pub fn bit_offsets(&self) -> Range<u64> {
        self.start_bit..self.start_bit + u64::from(self.width)
    }
}

/// Derive the k slot groups of an element
///
/// # Arguments
/// * `fingerprint` - Element fingerprint
/// * `k` - Number of hash iterations
/// * `m` - Number of counter slots (must be non-zero)
/// * `width` - Counter width in bits
pub fn derive_slot_groups(fingerprint: Fingerprint, k: u32, m: u64, width: u32) -> Vec<SlotGroup> {
    let mut running = fingerprint.h1;
    let mut groups = Vec::with_capacity(k as usize);

    for i in 0..k {
        let slot = (running & INDEX_MASK) % m;
        groups.push(SlotGroup {
            slot,
            start_bit: slot * u64::from(width),
            width,
        });

        running = if i % 2 == 0 {
            running.wrapping_add(fingerprint.h2)
        } else {
            running.wrapping_add(fingerprint.h1)
        };
    }

    groups
}

/// Flatten groups into the bit offsets a store transaction must touch, in group order
pub fn bit_offsets(groups: &[SlotGroup]) -> Vec<u64> {
    groups.iter().flat_map(SlotGroup::bit_offsets).collect()
}
