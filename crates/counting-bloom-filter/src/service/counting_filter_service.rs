//! Counting Bloom Filter Service
//!
//! Orchestrates the domain logic against a shared [`FilterStore`].
//!
//! Every operation follows the same optimistic shape:
//!
//! 1. Derive the element's slot groups from the cached config
//! 2. Read the groups in one guarded transaction
//! 3. Decide the new counter value locally
//! 4. Write it to all k groups in one guarded compare-and-set
//!
//! A rejected transaction (config changed, or counter bits changed between
//! read and write) restarts from step 1 after a backoff, up to the retry
//! policy's attempt cap. Store errors are never retried.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use async_trait::async_trait;
use bitvec::prelude::*;
use tracing::{debug, warn};

use crate::adapters::BincodeElementCodec;
use crate::domain::{
    bit_offsets, derive_slot_groups, estimate_cardinality, fingerprint, CounterBits,
    FilterConfig, FilterOptions, Fingerprint, SlotGroup,
};
use crate::error::FilterError;
use crate::metrics::{ConflictKind, MetricsRecorder, NoOpMetrics};
use crate::ports::{BitUpdate, CountingBloomFilterApi, ElementCodec, FilterStore, Guarded};
use crate::service::config_store::{checked, ConfigStore};

/// Counter groups of one element as read in a single transaction
struct CounterSnapshot {
    groups: Vec<SlotGroup>,
    counters: Vec<CounterBits>,
}

impl CounterSnapshot {
    /// An element is absent as soon as one of its counters is zero
    fn any_zero(&self) -> bool {
        self.counters.iter().any(|counter| counter.not_any())
    }

    /// No group holds any set bit
    fn all_zero(&self) -> bool {
        self.counters.iter().all(|counter| counter.not_any())
    }

    fn first(&self) -> &BitSlice<u8, Msb0> {
        &self.counters[0]
    }

    /// Compare-and-set batch writing `value` into every group
    fn updates_to(&self, value: &BitSlice<u8, Msb0>) -> Vec<BitUpdate> {
        self.groups
            .iter()
            .zip(&self.counters)
            .flat_map(|(group, current)| {
                group
                    .bit_offsets()
                    .zip(current.iter().by_vals())
                    .zip(value.iter().by_vals())
                    .map(|((offset, expected), value)| BitUpdate {
                        offset,
                        expected,
                        value,
                    })
            })
            .collect()
    }
}

/// Counting Bloom filter handle over a shared store
///
/// Implements the [`CountingBloomFilterApi`] port. Handles are cheap; any
/// number of them, in any number of processes, may share one store.
pub struct CountingBloomFilterService<T: ?Sized, S: FilterStore, C = BincodeElementCodec> {
    /// Shared bit store (driven port)
    store: Arc<S>,
    /// Cached durable config
    config: ConfigStore<S>,
    /// Element encoder (driven port)
    codec: C,
    options: FilterOptions,
    metrics: Arc<dyn MetricsRecorder>,
    _element: PhantomData<fn(&T)>,
}

impl<T, S, C> CountingBloomFilterService<T, S, C>
where
    T: ?Sized,
    S: FilterStore,
    C: ElementCodec<T>,
{
    /// Create a handle with explicit codec and options
    pub fn new(store: Arc<S>, codec: C, options: FilterOptions) -> Result<Self, FilterError> {
        options.validate()?;
        Ok(Self {
            config: ConfigStore::new(Arc::clone(&store)),
            store,
            codec,
            options,
            metrics: Arc::new(NoOpMetrics),
            _element: PhantomData,
        })
    }

    /// Create a handle with the default codec and options
    pub fn with_defaults(store: Arc<S>) -> Self
    where
        C: Default,
    {
        Self {
            config: ConfigStore::new(Arc::clone(&store)),
            store,
            codec: C::default(),
            options: FilterOptions::default(),
            metrics: Arc::new(NoOpMetrics),
            _element: PhantomData,
        }
    }

    /// Report operations to `metrics`
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn options(&self) -> &FilterOptions {
        &self.options
    }

    /// Counter ceiling of the stored config
    pub async fn max_count(&self) -> Result<u32, FilterError> {
        Ok(self.config.load().await?.max_count)
    }

    /// Bits per counter of the stored config
    pub async fn counter_width(&self) -> Result<u32, FilterError> {
        Ok(self.config.load().await?.counter_width)
    }

    /// Remaining time to live of the whole filter
    pub async fn remain_time_to_live(&self) -> Result<Option<Duration>, FilterError> {
        Ok(self.store.time_to_live().await?)
    }

    /// Bytes used by the bit array and the config record
    pub async fn size_in_memory(&self) -> Result<u64, FilterError> {
        Ok(self.store.size_in_memory().await?)
    }

    fn fingerprint_of(&self, element: &T) -> Result<Fingerprint, FilterError> {
        let encoded = self.codec.encode(element)?;
        Ok(fingerprint(&encoded))
    }

    /// Read the element's counters against `config`
    async fn read_snapshot(
        &self,
        config: &FilterConfig,
        fingerprint: Fingerprint,
    ) -> Result<Guarded<CounterSnapshot>, FilterError> {
        let groups = derive_slot_groups(
            fingerprint,
            config.hash_iterations,
            config.size,
            config.counter_width,
        );
        let offsets = bit_offsets(&groups);
        let width = config.counter_width as usize;

        let read = self.store.read_bits(&config.guard(), &offsets).await?;
        Ok(read.map(|bits| CounterSnapshot {
            counters: bits
                .chunks(width)
                .map(|chunk| chunk.iter().copied().collect())
                .collect(),
            groups,
        }))
    }

    /// Account for a rejected transaction and wait before the next attempt
    ///
    /// Fails with `RetriesExhausted` once `attempt` reaches the cap.
    async fn on_conflict(
        &self,
        attempt: u32,
        kind: ConflictKind,
        stale: &Arc<FilterConfig>,
    ) -> Result<(), FilterError> {
        self.metrics.record_conflict(kind);
        if kind == ConflictKind::Config {
            self.config.invalidate(stale).await;
        }

        let retry = &self.options.retry;
        if attempt >= retry.max_attempts {
            self.metrics.record_retries_exhausted();
            warn!(attempts = attempt, ?kind, "Giving up after repeated guard conflicts");
            return Err(FilterError::RetriesExhausted { attempts: attempt });
        }

        let pause = retry.backoff(attempt);
        warn!(attempt, ?kind, ?pause, "Guarded transaction rejected, retrying");
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
        Ok(())
    }
}

fn conflict_kind<T>(outcome: &Guarded<T>) -> ConflictKind {
    match outcome {
        Guarded::StateChanged => ConflictKind::State,
        _ => ConflictKind::Config,
    }
}

#[async_trait]
impl<T, S, C> CountingBloomFilterApi<T> for CountingBloomFilterService<T, S, C>
where
    T: ?Sized + Sync,
    S: FilterStore,
    C: ElementCodec<T>,
{
    async fn add(&self, element: &T) -> Result<bool, FilterError> {
        let started = Instant::now();
        let fingerprint = self.fingerprint_of(element)?;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let config = self.config.current().await?;

            let snapshot = match self.read_snapshot(&config, fingerprint).await? {
                Guarded::Committed(snapshot) => snapshot,
                conflict => {
                    self.on_conflict(attempt, conflict_kind(&conflict), &config)
                        .await?;
                    continue;
                }
            };

            let codec = config.codec();
            let (next, inserted) = if snapshot.any_zero() {
                (codec.encode(1), snapshot.all_zero())
            } else {
                match codec.increment(snapshot.first()) {
                    Ok(next) => (next, false),
                    Err(_) => {
                        debug!(
                            %fingerprint,
                            max_count = config.max_count,
                            "Counter saturated, add refused"
                        );
                        self.metrics.record_saturated();
                        self.metrics.record_add(started.elapsed(), false);
                        return Ok(false);
                    }
                }
            };

            let updates = snapshot.updates_to(&next);
            match self
                .store
                .compare_and_set_bits(&config.guard(), &updates)
                .await?
            {
                Guarded::Committed(()) => {
                    debug!(
                        %fingerprint,
                        value = codec.decode(&next),
                        inserted,
                        "Counter incremented"
                    );
                    self.metrics.record_add(started.elapsed(), inserted);
                    return Ok(inserted);
                }
                conflict => {
                    self.on_conflict(attempt, conflict_kind(&conflict), &config)
                        .await?
                }
            }
        }
    }

    async fn contains(&self, element: &T) -> Result<bool, FilterError> {
        let started = Instant::now();
        let fingerprint = self.fingerprint_of(element)?;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let config = self.config.current().await?;

            match self.read_snapshot(&config, fingerprint).await? {
                Guarded::Committed(snapshot) => {
                    let found = !snapshot.any_zero();
                    self.metrics.record_lookup(started.elapsed(), found);
                    return Ok(found);
                }
                conflict => {
                    self.on_conflict(attempt, conflict_kind(&conflict), &config)
                        .await?
                }
            }
        }
    }

    async fn remove(&self, element: &T) -> Result<bool, FilterError> {
        let started = Instant::now();
        let fingerprint = self.fingerprint_of(element)?;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let config = self.config.current().await?;

            let snapshot = match self.read_snapshot(&config, fingerprint).await? {
                Guarded::Committed(snapshot) => snapshot,
                conflict => {
                    self.on_conflict(attempt, conflict_kind(&conflict), &config)
                        .await?;
                    continue;
                }
            };

            if snapshot.any_zero() {
                self.metrics.record_remove(started.elapsed(), false);
                return Ok(false);
            }

            let codec = config.codec();
            let next = match codec.decrement(snapshot.first()) {
                Ok(next) => next,
                Err(_) => {
                    self.metrics.record_remove(started.elapsed(), false);
                    return Ok(false);
                }
            };

            let updates = snapshot.updates_to(&next);
            match self
                .store
                .compare_and_set_bits(&config.guard(), &updates)
                .await?
            {
                Guarded::Committed(()) => {
                    debug!(%fingerprint, value = codec.decode(&next), "Counter decremented");
                    self.metrics.record_remove(started.elapsed(), true);
                    return Ok(true);
                }
                conflict => {
                    self.on_conflict(attempt, conflict_kind(&conflict), &config)
                        .await?
                }
            }
        }
    }

    async fn try_init(
        &self,
        expected_insertions: u64,
        false_probability: f64,
    ) -> Result<bool, FilterError> {
        self.config
            .try_initialize(expected_insertions, false_probability, self.options.max_count)
            .await
    }

    async fn count(&self) -> Result<u64, FilterError> {
        let snapshot = self.store.cardinality().await?;
        let config = checked(snapshot.config.ok_or(FilterError::NotInitialized)?)?;

        if snapshot.set_bits >= config.size {
            warn!(
                set_bits = snapshot.set_bits,
                size = config.size,
                "Bit array fuller than the estimator supports, clamping"
            );
        }

        Ok(estimate_cardinality(
            config.size,
            config.hash_iterations,
            snapshot.set_bits,
        ))
    }

    async fn expected_insertions(&self) -> Result<u64, FilterError> {
        Ok(self.config.load().await?.expected_insertions)
    }

    async fn false_probability(&self) -> Result<f64, FilterError> {
        Ok(self.config.load().await?.false_probability)
    }

    async fn size(&self) -> Result<u64, FilterError> {
        Ok(self.config.load().await?.size)
    }

    async fn hash_iterations(&self) -> Result<u32, FilterError> {
        Ok(self.config.load().await?.hash_iterations)
    }

    async fn expire(&self, ttl: Duration) -> Result<bool, FilterError> {
        Ok(self.store.expire(ttl).await?)
    }

    async fn expire_at(&self, deadline: SystemTime) -> Result<bool, FilterError> {
        Ok(self.store.expire_at(deadline).await?)
    }

    async fn clear_expire(&self) -> Result<bool, FilterError> {
        Ok(self.store.clear_expire().await?)
    }

    async fn delete(&self) -> Result<bool, FilterError> {
        let deleted = self.store.delete().await?;
        self.config.clear().await;
        Ok(deleted)
    }
}
