//! Outbound Ports (Driven Ports)
//!
//! These traits define what the filter engine needs from the outside world:
//! a shared bit-addressable store and a way to turn elements into bytes.

use std::time::{Duration, SystemTime};

use async_trait::async_trait;

use crate::domain::{ConfigGuard, FilterConfig};
use crate::error::{CodecError, StoreError};

/// Outcome of a guarded store transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Guarded<T> {
    /// Guard held and every operation in the batch was applied
    Committed(T),
    /// Stored config no longer matches the guard; nothing was applied
    ConfigChanged,
    /// A compared bit no longer holds its expected value; nothing was applied
    StateChanged,
}

impl<T> Guarded<T> {
    /// Transform the committed value, keeping conflicts as they are
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Guarded<U> {
        match self {
            Guarded::Committed(value) => Guarded::Committed(f(value)),
            Guarded::ConfigChanged => Guarded::ConfigChanged,
            Guarded::StateChanged => Guarded::StateChanged,
        }
    }
}

/// One bit write of a compare-and-set batch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitUpdate {
    /// Absolute bit offset
    pub offset: u64,
    /// Value the bit held when it was read
    pub expected: bool,
    /// Value to store
    pub value: bool,
}

/// Population count taken together with the config in one round trip
#[derive(Clone, Debug, PartialEq)]
pub struct CardinalitySnapshot {
    /// Number of set bits across the whole bit array
    pub set_bits: u64,
    /// Config record, if the filter is initialized
    pub config: Option<FilterConfig>,
}

/// Shared storage for one named filter (Driven Port)
///
/// A filter is a bit array plus a small config record. Both must be
/// addressed as one logical object: lifecycle operations apply to both.
///
/// Guarded methods are atomic: the guard check and the whole batch of bit
/// operations execute as one indivisible transaction.
#[async_trait]
pub trait FilterStore: Send + Sync {
    /// Read bits at `offsets`, in order, if the stored config matches `guard`
    ///
    /// Bits never written read as `false`.
    async fn read_bits(
        &self,
        guard: &ConfigGuard,
        offsets: &[u64],
    ) -> Result<Guarded<Vec<bool>>, StoreError>;

    /// Apply `updates` if the stored config matches `guard` and every
    /// updated bit still holds its `expected` value
    async fn compare_and_set_bits(
        &self,
        guard: &ConfigGuard,
        updates: &[BitUpdate],
    ) -> Result<Guarded<()>, StoreError>;

    /// Load the config record
    async fn load_config(&self) -> Result<Option<FilterConfig>, StoreError>;

    /// Store `config` unless a config record already exists
    ///
    /// Returns `true` if this call created the record.
    async fn create_config_if_absent(&self, config: &FilterConfig) -> Result<bool, StoreError>;

    /// Count set bits and read the config atomically
    async fn cardinality(&self) -> Result<CardinalitySnapshot, StoreError>;

    /// Expire the filter after `ttl`; `true` if the config record exists
    async fn expire(&self, ttl: Duration) -> Result<bool, StoreError>;

    /// Expire the filter at `deadline`; `true` if the config record exists
    async fn expire_at(&self, deadline: SystemTime) -> Result<bool, StoreError>;

    /// Remove any expiry; `true` if the config record had one
    async fn clear_expire(&self) -> Result<bool, StoreError>;

    /// Remaining time to live, `None` if the filter is absent or never expires
    async fn time_to_live(&self) -> Result<Option<Duration>, StoreError>;

    /// Delete the bit array and the config record; `true` if anything existed
    async fn delete(&self) -> Result<bool, StoreError>;

    /// Bytes held by the bit array and the config record
    async fn size_in_memory(&self) -> Result<u64, StoreError>;
}

/// Deterministic byte encoding of filter elements (Driven Port)
///
/// Equal elements must always encode to equal bytes, across processes.
pub trait ElementCodec<T: ?Sized>: Send + Sync {
    /// Encode an element
    fn encode(&self, element: &T) -> Result<Vec<u8>, CodecError>;
}
