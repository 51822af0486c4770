//! Durable filter config plus the per-handle cache
//!
//! The cache is filled once under a write lock; every caller racing the
//! first load waits for it instead of reading the store itself. A guard
//! conflict evicts only the exact snapshot that failed, so a stale
//! observation cannot throw away a fresher config another task just loaded.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::domain::FilterConfig;
use crate::error::{FilterError, StoreError};
use crate::ports::FilterStore;

/// Config access for one filter handle
pub struct ConfigStore<S: FilterStore> {
    store: Arc<S>,
    cached: RwLock<Option<Arc<FilterConfig>>>,
}

impl<S: FilterStore> ConfigStore<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            cached: RwLock::new(None),
        }
    }

    /// Derive a config and store it unless one exists
    ///
    /// Returns `true` if this call created the config. Either way the cache
    /// ends up holding whatever the store now has.
    pub async fn try_initialize(
        &self,
        expected_insertions: u64,
        false_probability: f64,
        max_count: u32,
    ) -> Result<bool, FilterError> {
        let config = FilterConfig::derive(expected_insertions, false_probability, max_count)?;

        let mut cached = self.cached.write().await;
        if self.store.create_config_if_absent(&config).await? {
            info!(
                size = config.size,
                hash_iterations = config.hash_iterations,
                counter_width = config.counter_width,
                max_count = config.max_count,
                "Counting Bloom filter initialized"
            );
            *cached = Some(Arc::new(config));
            return Ok(true);
        }

        *cached = match self.store.load_config().await? {
            Some(existing) => Some(Arc::new(checked(existing)?)),
            None => None,
        };
        debug!("Counting Bloom filter already initialized, keeping existing config");
        Ok(false)
    }

    /// Config to run the next transaction against, loading it on first use
    pub async fn current(&self) -> Result<Arc<FilterConfig>, FilterError> {
        if let Some(config) = self.cached.read().await.as_ref() {
            return Ok(Arc::clone(config));
        }

        let mut cached = self.cached.write().await;
        // Another task may have loaded it while we waited for the lock
        if let Some(config) = cached.as_ref() {
            return Ok(Arc::clone(config));
        }

        let config = Arc::new(self.load().await?);
        debug!(size = config.size, hash_iterations = config.hash_iterations, "Config loaded");
        *cached = Some(Arc::clone(&config));
        Ok(config)
    }

    /// Read the config straight from the store, bypassing the cache
    pub async fn load(&self) -> Result<FilterConfig, FilterError> {
        match self.store.load_config().await? {
            Some(config) => Ok(checked(config)?),
            None => Err(FilterError::NotInitialized),
        }
    }

    /// Drop `stale` from the cache if it is still the cached snapshot
    pub async fn invalidate(&self, stale: &Arc<FilterConfig>) {
        let mut cached = self.cached.write().await;
        if cached.as_ref().is_some_and(|config| Arc::ptr_eq(config, stale)) {
            *cached = None;
        }
    }

    /// Forget the cached config unconditionally
    pub async fn clear(&self) {
        *self.cached.write().await = None;
    }
}

/// Reject records that would make slot derivation or decoding misbehave
pub(crate) fn checked(config: FilterConfig) -> Result<FilterConfig, StoreError> {
    if config.size == 0 || config.hash_iterations == 0 {
        return Err(StoreError::CorruptConfig(format!(
            "size {} and hash_iterations {} must be non-zero",
            config.size, config.hash_iterations
        )));
    }

    if config.counter_width == 0
        || config.counter_width >= 64
        || u64::from(config.max_count) >> config.counter_width != 0
    {
        return Err(StoreError::CorruptConfig(format!(
            "max_count {} does not fit counter_width {}",
            config.max_count, config.counter_width
        )));
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryFilterStore;

    fn config_store() -> (Arc<InMemoryFilterStore>, ConfigStore<InMemoryFilterStore>) {
        let store = Arc::new(InMemoryFilterStore::new("config-test"));
        (store.clone(), ConfigStore::new(store))
    }

    #[tokio::test]
    async fn test_current_before_init_fails() {
        let (_, configs) = config_store();

        assert!(matches!(
            configs.current().await,
            Err(FilterError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn test_try_initialize_primes_cache() {
        let (_, configs) = config_store();

        assert!(configs.try_initialize(100, 0.01, 7).await.unwrap());
        let first = configs.current().await.unwrap();
        let second = configs.current().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.size, 959);
    }

    #[tokio::test]
    async fn test_losing_initializer_adopts_existing_config() {
        let (store, configs) = config_store();
        let winner = ConfigStore::new(store);

        assert!(winner.try_initialize(100, 0.01, 7).await.unwrap());
        assert!(!configs.try_initialize(5000, 0.001, 9).await.unwrap());

        let current = configs.current().await.unwrap();
        assert_eq!(current.size, 959);
        assert_eq!(current.max_count, 7);
    }

    #[tokio::test]
    async fn test_invalid_parameters_write_nothing() {
        let (store, configs) = config_store();

        assert!(configs.try_initialize(100, 0.0, 7).await.is_err());
        assert!(store.load_config().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalidate_ignores_other_snapshots() {
        let (_, configs) = config_store();
        configs.try_initialize(100, 0.01, 7).await.unwrap();

        let cached = configs.current().await.unwrap();
        let unrelated = Arc::new((*cached).clone());

        configs.invalidate(&unrelated).await;
        assert!(Arc::ptr_eq(&cached, &configs.current().await.unwrap()));

        configs.invalidate(&cached).await;
        assert!(!Arc::ptr_eq(&cached, &configs.current().await.unwrap()));
    }

    #[tokio::test]
    async fn test_corrupt_record_rejected() {
        let (store, configs) = config_store();
        let mut config = FilterConfig::derive(100, 0.01, 7).unwrap();
        config.hash_iterations = 0;
        store.create_config_if_absent(&config).await.unwrap();

        assert!(matches!(
            configs.current().await,
            Err(FilterError::Store(StoreError::CorruptConfig(_)))
        ));
    }
}
