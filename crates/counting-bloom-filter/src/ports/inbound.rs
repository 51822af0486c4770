//! Inbound Ports (Driving Ports)
//!
//! The API that callers use to interact with one shared counting filter.

use std::time::{Duration, SystemTime};

use async_trait::async_trait;

use crate::error::FilterError;

/// Primary counting Bloom filter API (Driving Port)
///
/// Every operation other than `try_init` fails with
/// [`FilterError::NotInitialized`] until some handle has initialized the
/// filter.
#[async_trait]
pub trait CountingBloomFilterApi<T: ?Sized + Sync>: Send + Sync {
    /// Add an element
    ///
    /// # Returns
    /// `true` only if every one of the element's counters was zero before
    /// the write. If just some were zero, all of them are set to 1 and the
    /// result is `false`. If none were zero the counter is incremented,
    /// unless it already sits at `max_count`, in which case nothing changes;
    /// both report `false`.
    async fn add(&self, element: &T) -> Result<bool, FilterError>;

    /// Check whether an element might be present
    async fn contains(&self, element: &T) -> Result<bool, FilterError>;

    /// Remove one occurrence of an element
    ///
    /// Only safe for elements previously added through this filter.
    ///
    /// # Returns
    /// `true` if the counter was decremented, `false` if the element was absent
    async fn remove(&self, element: &T) -> Result<bool, FilterError>;

    /// Size the filter for `expected_insertions` at `false_probability` and
    /// store the config, unless one already exists
    ///
    /// # Returns
    /// `true` if this call initialized the filter, `false` if it was already
    /// initialized (the existing config is left untouched)
    async fn try_init(
        &self,
        expected_insertions: u64,
        false_probability: f64,
    ) -> Result<bool, FilterError>;

    /// Approximate number of elements, from the bit array's fill ratio
    async fn count(&self) -> Result<u64, FilterError>;

    /// Expected insertions the filter was sized for
    async fn expected_insertions(&self) -> Result<u64, FilterError>;

    /// Target false positive probability
    async fn false_probability(&self) -> Result<f64, FilterError>;

    /// Number of counter slots
    async fn size(&self) -> Result<u64, FilterError>;

    /// Number of hash iterations per element
    async fn hash_iterations(&self) -> Result<u32, FilterError>;

    /// Expire the whole filter after `ttl`
    async fn expire(&self, ttl: Duration) -> Result<bool, FilterError>;

    /// Expire the whole filter at `deadline`
    async fn expire_at(&self, deadline: SystemTime) -> Result<bool, FilterError>;

    /// Remove any expiry from the whole filter
    async fn clear_expire(&self) -> Result<bool, FilterError>;

    /// Delete the bit array and the config
    async fn delete(&self) -> Result<bool, FilterError>;
}
