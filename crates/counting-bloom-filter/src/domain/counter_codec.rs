//! Fixed-width saturating counters stored as raw bits
//!
//! A counter is `W` bits, most significant bit first, holding an unsigned
//! value in `[0, max_count]`. The codec never touches the store; it only
//! converts between bit groups read from the store and integer values.

use bitvec::prelude::*;

use super::parameters::counter_width;
use crate::error::CounterError;

/// Bits of one counter, MSB first
pub type CounterBits = BitVec<u8, Msb0>;

/// Encoder/decoder for counters of one filter
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CounterCodec {
    width: u32,
    max_count: u64,
}

impl CounterCodec {
    /// Create a codec for counters of `width` bits that saturate at `max_count`
    ///
    /// `max_count` must fit in `width` bits.
    pub fn new(width: u32, max_count: u64) -> Self {
        debug_assert!(width > 0 && width < 64, "unsupported counter width {}", width);
        debug_assert!(
            max_count >> width == 0,
            "max_count {} does not fit {} bits",
            max_count,
            width
        );
        Self { width, max_count }
    }

    /// Create a codec with the minimal width for `max_count`
    pub fn for_max_count(max_count: u32) -> Self {
        Self::new(counter_width(max_count), u64::from(max_count))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn max_count(&self) -> u64 {
        self.max_count
    }

    /// Decode a counter
    pub fn decode(&self, bits: &BitSlice<u8, Msb0>) -> u64 {
        debug_assert_eq!(bits.len(), self.width as usize);
        bits.iter()
            .by_vals()
            .fold(0u64, |acc, bit| (acc << 1) | u64::from(bit))
    }

    /// Encode `value`, which must be below `2^W`
    pub fn encode(&self, value: u64) -> CounterBits {
        debug_assert!(value >> self.width == 0, "{} does not fit {} bits", value, self.width);
        (0..self.width).rev().map(|shift| (value >> shift) & 1 == 1).collect()
    }

    /// Counter plus one, refusing to go past `max_count`
    pub fn increment(&self, bits: &BitSlice<u8, Msb0>) -> Result<CounterBits, CounterError> {
        let current = self.decode(bits);
        if current >= self.max_count {
            return Err(CounterError::Saturated);
        }
        Ok(self.encode(current + 1))
    }

    /// Counter minus one, refusing to go below zero
    pub fn decrement(&self, bits: &BitSlice<u8, Msb0>) -> Result<CounterBits, CounterError> {
        let current = self.decode(bits);
        if current == 0 {
            return Err(CounterError::Underflow);
        }
        Ok(self.encode(current - 1))
    }
}
