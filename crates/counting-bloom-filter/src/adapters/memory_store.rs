//! In-memory filter store
//!
//! Reference adapter for the [`FilterStore`] port. Holds the bit array, the
//! config record and the expiry deadline of one named filter behind a single
//! async mutex, so every guarded transaction is trivially atomic.
//!
//! Clones share state: several engine handles built over clones of one store
//! behave like several processes sharing a remote filter.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use bitvec::prelude::*;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::{ConfigGuard, FilterConfig};
use crate::error::StoreError;
use crate::ports::{BitUpdate, CardinalitySnapshot, FilterStore, Guarded};

#[derive(Default)]
struct FilterState {
    bits: BitVec<u8, Msb0>,
    config: Option<FilterConfig>,
    expires_at: Option<SystemTime>,
}

impl FilterState {
    /// Drop everything once the deadline has passed (lazy expiration)
    fn evict_if_expired(&mut self, now: SystemTime) {
        if matches!(self.expires_at, Some(deadline) if now >= deadline) {
            *self = FilterState::default();
        }
    }

    fn exists(&self) -> bool {
        self.config.is_some() || !self.bits.is_empty()
    }

    fn guard_holds(&self, guard: &ConfigGuard) -> bool {
        self.config
            .as_ref()
            .is_some_and(|config| guard.holds_for(config))
    }

    fn bit(&self, offset: u64) -> bool {
        usize::try_from(offset)
            .ok()
            .and_then(|index| self.bits.get(index).map(|bit| *bit))
            .unwrap_or(false)
    }

    /// Set a bit, growing the array in whole bytes like a bitmap store does
    fn set_bit(&mut self, offset: u64, value: bool) -> Result<(), StoreError> {
        let index = usize::try_from(offset)
            .map_err(|_| StoreError::CommandError(format!("bit offset {} out of range", offset)))?;
        if index >= self.bits.len() {
            if !value {
                return Ok(());
            }
            self.bits.resize((index / 8 + 1) * 8, false);
        }
        self.bits.set(index, value);
        Ok(())
    }
}

/// Shared in-memory storage for one named filter
#[derive(Clone)]
pub struct InMemoryFilterStore {
    name: Arc<str>,
    state: Arc<Mutex<FilterState>>,
}

impl InMemoryFilterStore {
    /// Create an empty store for the filter called `name`
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(FilterState::default())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Copy of the raw bit array
    pub async fn bits(&self) -> BitVec<u8, Msb0> {
        let mut state = self.state.lock().await;
        state.evict_if_expired(SystemTime::now());
        state.bits.clone()
    }
}

#[async_trait]
impl FilterStore for InMemoryFilterStore {
    async fn read_bits(
        &self,
        guard: &ConfigGuard,
        offsets: &[u64],
    ) -> Result<Guarded<Vec<bool>>, StoreError> {
        let mut state = self.state.lock().await;
        state.evict_if_expired(SystemTime::now());

        if !state.guard_holds(guard) {
            return Ok(Guarded::ConfigChanged);
        }

        Ok(Guarded::Committed(
            offsets.iter().map(|&offset| state.bit(offset)).collect(),
        ))
    }

    async fn compare_and_set_bits(
        &self,
        guard: &ConfigGuard,
        updates: &[BitUpdate],
    ) -> Result<Guarded<()>, StoreError> {
        let mut state = self.state.lock().await;
        state.evict_if_expired(SystemTime::now());

        if !state.guard_holds(guard) {
            return Ok(Guarded::ConfigChanged);
        }

        // Check the whole batch before touching anything
        if updates
            .iter()
            .any(|update| state.bit(update.offset) != update.expected)
        {
            return Ok(Guarded::StateChanged);
        }

        for update in updates {
            state.set_bit(update.offset, update.value)?;
        }

        Ok(Guarded::Committed(()))
    }

    async fn load_config(&self) -> Result<Option<FilterConfig>, StoreError> {
        let mut state = self.state.lock().await;
        state.evict_if_expired(SystemTime::now());
        Ok(state.config.clone())
    }

    async fn create_config_if_absent(&self, config: &FilterConfig) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        state.evict_if_expired(SystemTime::now());

        if state.config.is_some() {
            return Ok(false);
        }

        state.config = Some(config.clone());
        debug!(filter = %self.name, size = config.size, "Config record created");
        Ok(true)
    }

    async fn cardinality(&self) -> Result<CardinalitySnapshot, StoreError> {
        let mut state = self.state.lock().await;
        state.evict_if_expired(SystemTime::now());

        Ok(CardinalitySnapshot {
            set_bits: state.bits.count_ones() as u64,
            config: state.config.clone(),
        })
    }

    async fn expire(&self, ttl: Duration) -> Result<bool, StoreError> {
        let now = SystemTime::now();
        let deadline = now.checked_add(ttl).ok_or_else(|| {
            StoreError::CommandError(format!("ttl {:?} overflows the clock", ttl))
        })?;
        self.expire_at(deadline).await
    }

    async fn expire_at(&self, deadline: SystemTime) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        state.evict_if_expired(SystemTime::now());

        if !state.exists() {
            return Ok(false);
        }

        state.expires_at = Some(deadline);
        debug!(filter = %self.name, ?deadline, "Expiry set");
        Ok(state.config.is_some())
    }

    async fn clear_expire(&self) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        state.evict_if_expired(SystemTime::now());

        let had_expiry = state.expires_at.take().is_some();
        Ok(had_expiry && state.config.is_some())
    }

    async fn time_to_live(&self) -> Result<Option<Duration>, StoreError> {
        let now = SystemTime::now();
        let mut state = self.state.lock().await;
        state.evict_if_expired(now);

        Ok(state
            .expires_at
            .and_then(|deadline| deadline.duration_since(now).ok()))
    }

    async fn delete(&self) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        state.evict_if_expired(SystemTime::now());

        let existed = state.exists();
        *state = FilterState::default();
        debug!(filter = %self.name, existed, "Filter deleted");
        Ok(existed)
    }

    async fn size_in_memory(&self) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        state.evict_if_expired(SystemTime::now());

        let config_bytes = match &state.config {
            Some(config) => bincode::serialized_size(config)
                .map_err(|e| StoreError::CorruptConfig(e.to_string()))?,
            None => 0,
        };
        Ok(state.bits.as_raw_slice().len() as u64 + config_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> FilterConfig {
        FilterConfig::derive(100, 0.01, 7).unwrap()
    }

    async fn initialized_store() -> (InMemoryFilterStore, FilterConfig) {
        let store = InMemoryFilterStore::new("test");
        let config = test_config();
        assert!(store.create_config_if_absent(&config).await.unwrap());
        (store, config)
    }

    #[tokio::test]
    async fn test_create_config_first_writer_wins() {
        let (store, config) = initialized_store().await;

        let other = FilterConfig::derive(5000, 0.001, 9).unwrap();
        assert!(!store.create_config_if_absent(&other).await.unwrap());
        assert_eq!(store.load_config().await.unwrap(), Some(config));
    }

    #[tokio::test]
    async fn test_unwritten_bits_read_false() {
        let (store, config) = initialized_store().await;

        let result = store.read_bits(&config.guard(), &[0, 17, 2876]).await.unwrap();
        assert_eq!(result, Guarded::Committed(vec![false, false, false]));
    }

    #[tokio::test]
    async fn test_guard_mismatch_aborts_read() {
        let (store, _) = initialized_store().await;

        let stale = FilterConfig::derive(200, 0.01, 7).unwrap().guard();
        let result = store.read_bits(&stale, &[0]).await.unwrap();
        assert_eq!(result, Guarded::ConfigChanged);
    }

    #[tokio::test]
    async fn test_missing_config_fails_guard() {
        let store = InMemoryFilterStore::new("empty");

        let result = store.read_bits(&test_config().guard(), &[0]).await.unwrap();
        assert_eq!(result, Guarded::ConfigChanged);
    }

    #[tokio::test]
    async fn test_compare_and_set_applies_batch() {
        let (store, config) = initialized_store().await;
        let guard = config.guard();

        let updates = [
            BitUpdate { offset: 3, expected: false, value: true },
            BitUpdate { offset: 9, expected: false, value: true },
        ];
        let result = store.compare_and_set_bits(&guard, &updates).await.unwrap();
        assert_eq!(result, Guarded::Committed(()));

        let bits = store.read_bits(&guard, &[3, 4, 9]).await.unwrap();
        assert_eq!(bits, Guarded::Committed(vec![true, false, true]));
    }

    #[tokio::test]
    async fn test_compare_and_set_rejects_stale_expectation() {
        let (store, config) = initialized_store().await;
        let guard = config.guard();

        let set = [BitUpdate { offset: 5, expected: false, value: true }];
        store.compare_and_set_bits(&guard, &set).await.unwrap();

        // Second writer still believes bit 5 is clear; bit 6 must stay untouched
        let stale = [
            BitUpdate { offset: 6, expected: false, value: true },
            BitUpdate { offset: 5, expected: false, value: true },
        ];
        let result = store.compare_and_set_bits(&guard, &stale).await.unwrap();
        assert_eq!(result, Guarded::StateChanged);

        let bits = store.read_bits(&guard, &[5, 6]).await.unwrap();
        assert_eq!(bits, Guarded::Committed(vec![true, false]));
    }

    #[tokio::test]
    async fn test_cardinality_counts_set_bits() {
        let (store, config) = initialized_store().await;

        let updates: Vec<BitUpdate> = [1u64, 2, 40]
            .iter()
            .map(|&offset| BitUpdate { offset, expected: false, value: true })
            .collect();
        store.compare_and_set_bits(&config.guard(), &updates).await.unwrap();

        let snapshot = store.cardinality().await.unwrap();
        assert_eq!(snapshot.set_bits, 3);
        assert_eq!(snapshot.config, Some(config));
    }

    #[tokio::test]
    async fn test_delete_removes_bits_and_config() {
        let (store, config) = initialized_store().await;
        let set = [BitUpdate { offset: 0, expected: false, value: true }];
        store.compare_and_set_bits(&config.guard(), &set).await.unwrap();

        assert!(store.delete().await.unwrap());
        assert!(store.load_config().await.unwrap().is_none());
        assert!(store.bits().await.is_empty());
        assert!(!store.delete().await.unwrap());
    }

    #[tokio::test]
    async fn test_expire_evicts_whole_filter() {
        let (store, _) = initialized_store().await;

        assert!(store.expire(Duration::from_millis(20)).await.unwrap());
        assert!(store.time_to_live().await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(store.load_config().await.unwrap().is_none());
        assert!(store.time_to_live().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_expire_keeps_filter() {
        let (store, config) = initialized_store().await;

        store.expire(Duration::from_millis(20)).await.unwrap();
        assert!(store.clear_expire().await.unwrap());
        assert!(!store.clear_expire().await.unwrap());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(store.load_config().await.unwrap(), Some(config));
    }

    #[tokio::test]
    async fn test_expire_on_missing_filter() {
        let store = InMemoryFilterStore::new("missing");
        assert!(!store.expire(Duration::from_secs(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let (store, config) = initialized_store().await;
        let other = store.clone();

        assert_eq!(other.load_config().await.unwrap(), Some(config));
        assert_eq!(other.name(), "test");
    }

    #[tokio::test]
    async fn test_size_in_memory_grows_by_bytes() {
        let (store, config) = initialized_store().await;
        let empty = store.size_in_memory().await.unwrap();
        assert!(empty > 0, "config record occupies memory");

        let set = [BitUpdate { offset: 20, expected: false, value: true }];
        store.compare_and_set_bits(&config.guard(), &set).await.unwrap();

        assert_eq!(store.size_in_memory().await.unwrap(), empty + 3);
    }
}
