//! Domain Layer - Pure business logic
//!
//! This layer contains:
//! - Element fingerprinting
//! - Double-hashing slot derivation
//! - Fixed-width counter codec
//! - Parameter calculations
//! - Configuration
//!
//! RULES:
//! - No I/O operations
//! - No async code
//! - Pure functions where possible

pub mod config;
pub mod counter_codec;
pub mod hash_functions;
pub mod index_scheme;
pub mod parameters;

pub use config::{ConfigGuard, FilterConfig, FilterOptions, FilterOptionsBuilder, RetryPolicy};
pub use counter_codec::{CounterBits, CounterCodec};
pub use hash_functions::{fingerprint, Fingerprint};
pub use index_scheme::{bit_offsets, derive_slot_groups, SlotGroup};
pub use parameters::{
    calculate_fpr, counter_width, estimate_cardinality, optimal_num_of_hash_iterations,
    optimal_num_of_slots, DEFAULT_MAX_COUNT, MAX_ADDRESSABLE_BITS,
};
