//! # Counting Bloom Filter
//!
//! Distributed counting Bloom filter stored in a shared bit-addressable
//! store. Any number of handles, in any number of processes, operate on the
//! same named filter; each slot holds a small fixed-width counter so
//! elements can be removed as well as added.
//!
//! ## Architecture
//!
//! This crate follows Hexagonal Architecture (Ports & Adapters):
//!
//! - **Domain Layer** (`domain/`): Pure logic, no I/O
//!   - `fingerprint`: 128-bit MurmurHash3 of an encoded element
//!   - `derive_slot_groups`: double-hashing slot derivation
//!   - `CounterCodec`: MSB-first fixed-width counters
//!   - `FilterConfig`: durable parameters plus their derivation
//!
//! - **Ports Layer** (`ports/`): Trait definitions
//!   - `CountingBloomFilterApi`: Driving port (inbound API)
//!   - `FilterStore`: Driven port (shared bit store with guarded transactions)
//!   - `ElementCodec`: Driven port (element encoding)
//!
//! - **Service Layer** (`service/`): Orchestration
//!   - `CountingBloomFilterService`: Implements `CountingBloomFilterApi`
//!
//! - **Adapters Layer** (`adapters/`): Port implementations
//!   - `InMemoryFilterStore`: in-process shared store
//!   - `BincodeElementCodec`, `RawBytesCodec`
//!
//! ## Invariants
//!
//! - An element's k counters are read in one guarded transaction and
//!   written in one guarded compare-and-set; a concurrent change to any of
//!   those bits aborts the write, so no update is lost
//! - Counters never exceed `max_count` and never go below zero
//! - An element whose slots are shared with no other element is reported
//!   present from its add until its matching remove. Shared slots carry no
//!   such guarantee: adding an element that is partly absent resets all of
//!   its counters to 1, and a later remove can then clear a slot another
//!   element still relies on
//! - The config, once stored, is never overwritten
//!
//! ## Usage Example
//!
//! ```ignore
//! use counting_bloom_filter::{
//!     CountingBloomFilterApi, CountingBloomFilterService, InMemoryFilterStore, RawBytesCodec,
//!     FilterOptions,
//! };
//! use std::sync::Arc;
//!
//! let store = Arc::new(InMemoryFilterStore::new("visitors"));
//! let filter: CountingBloomFilterService<str, _, _> =
//!     CountingBloomFilterService::new(store, RawBytesCodec, FilterOptions::default())?;
//!
//! filter.try_init(10_000, 0.01).await?;
//! filter.add("alice").await?;
//! assert!(filter.contains("alice").await?);
//! filter.remove("alice").await?;
//! ```

pub mod adapters;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod service;

// Re-exports for convenience
pub use adapters::{BincodeElementCodec, InMemoryFilterStore, RawBytesCodec};
pub use domain::{FilterConfig, FilterOptions, FilterOptionsBuilder, RetryPolicy};
pub use error::{CodecError, CounterError, FilterError, StoreError};
pub use metrics::{Metrics, MetricsRecorder, MetricsSnapshot, NoOpMetrics};
pub use ports::{CountingBloomFilterApi, ElementCodec, FilterStore};
pub use service::CountingBloomFilterService;
