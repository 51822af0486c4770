//! Error types for the counting Bloom filter

use thiserror::Error;

/// Errors surfaced by filter operations
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("Counting Bloom filter is not initialized")]
    NotInitialized,

    #[error("Invalid false probability: {probability} (must be in (0, 1])")]
    InvalidFalseProbability { probability: f64 },

    #[error(
        "Counting Bloom filter size can't be greater than {max} bits, calculated size is {bits}"
    )]
    FilterTooLarge { bits: u64, max: u64 },

    #[error("Invalid filter parameters: {0}")]
    InvalidParameters(String),

    #[error("Gave up after {attempts} attempts: filter config or counters kept changing")]
    RetriesExhausted { attempts: u32 },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Element encoding error: {0}")]
    Codec(#[from] CodecError),
}

/// Errors from the backing bit store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Command error: {0}")]
    CommandError(String),

    #[error("Corrupt config record: {0}")]
    CorruptConfig(String),
}

/// Errors from element encoders
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Counter arithmetic refused by the codec.
///
/// Never returned to callers; `add`/`remove` report these as `false`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum CounterError {
    #[error("Counter already at its maximum value")]
    Saturated,

    #[error("Counter already at zero")]
    Underflow,
}
