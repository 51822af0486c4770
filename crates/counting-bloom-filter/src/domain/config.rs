//! Filter configuration and validation
//!
//! Two kinds of configuration live here:
//!
//! - [`FilterConfig`]: the durable record shared by every handle of one
//!   filter. Written once by `try_init`, immutable afterwards.
//! - [`FilterOptions`]: per-handle tuning (counter ceiling used when this
//!   handle initializes the filter, retry policy).
//!
//! # Example
//!
//! ```ignore
//! use counting_bloom_filter::domain::FilterOptionsBuilder;
//!
//! let options = FilterOptionsBuilder::new()
//!     .max_count(9)
//!     .max_attempts(32)
//!     .build()
//!     .expect("Valid options");
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::counter_codec::CounterCodec;
use super::parameters::{
    calculate_fpr, counter_width, optimal_num_of_hash_iterations, optimal_num_of_slots,
    DEFAULT_MAX_COUNT, MAX_ADDRESSABLE_BITS,
};
use crate::error::FilterError;

/// Durable filter parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Number of counter slots (m)
    pub size: u64,
    /// Number of hash iterations (k)
    pub hash_iterations: u32,
    /// Counter ceiling
    pub max_count: u32,
    /// Bits per counter (W)
    pub counter_width: u32,
    /// Expected insertions the filter was sized for
    pub expected_insertions: u64,
    /// Target false positive probability
    pub false_probability: f64,
}

impl FilterConfig {
    /// Derive parameters for `expected_insertions` at `false_probability`
    ///
    /// Rejects, before anything is written:
    /// - `false_probability` outside `(0, 1]`
    /// - `max_count` of zero
    /// - a computed size of zero
    /// - `size * counter_width` beyond [`MAX_ADDRESSABLE_BITS`]
    pub fn derive(
        expected_insertions: u64,
        false_probability: f64,
        max_count: u32,
    ) -> Result<Self, FilterError> {
        if !(false_probability > 0.0 && false_probability <= 1.0) {
            return Err(FilterError::InvalidFalseProbability {
                probability: false_probability,
            });
        }

        if max_count == 0 {
            return Err(FilterError::InvalidParameters(
                "max_count must be at least 1".to_string(),
            ));
        }

        let size = optimal_num_of_slots(expected_insertions, false_probability);
        if size == 0 {
            return Err(FilterError::InvalidParameters(format!(
                "calculated size is 0 for {} expected insertions at probability {}",
                expected_insertions, false_probability
            )));
        }

        let width = counter_width(max_count);
        let bits = size.saturating_mul(u64::from(width));
        if bits > MAX_ADDRESSABLE_BITS {
            return Err(FilterError::FilterTooLarge {
                bits,
                max: MAX_ADDRESSABLE_BITS,
            });
        }

        Ok(Self {
            size,
            hash_iterations: optimal_num_of_hash_iterations(expected_insertions, size),
            max_count,
            counter_width: width,
            expected_insertions,
            false_probability,
        })
    }

    /// Snapshot asserted by every guarded store transaction
    pub fn guard(&self) -> ConfigGuard {
        ConfigGuard {
            size: self.size,
            hash_iterations: self.hash_iterations,
            counter_width: self.counter_width,
        }
    }

    /// Codec for this filter's counters
    pub fn codec(&self) -> CounterCodec {
        CounterCodec::new(self.counter_width, u64::from(self.max_count))
    }

    /// Length of the bit array in bits
    pub fn total_bits(&self) -> u64 {
        self.size * u64::from(self.counter_width)
    }

    /// Theoretical false positive rate once `elements` distinct elements are present
    pub fn expected_fpr(&self, elements: u64) -> f64 {
        calculate_fpr(self.size, elements, self.hash_iterations)
    }
}

/// Parameters a guarded transaction expects the stored config to still hold
///
/// A mismatch means the filter was deleted and re-initialized with other
/// parameters; the whole transaction is aborted without effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConfigGuard {
    pub size: u64,
    pub hash_iterations: u32,
    pub counter_width: u32,
}

impl ConfigGuard {
    /// Whether `config` still matches this guard
    pub fn holds_for(&self, config: &FilterConfig) -> bool {
        config.size == self.size
            && config.hash_iterations == self.hash_iterations
            && config.counter_width == self.counter_width
    }
}

/// Bounded retry with exponential backoff for guard conflicts
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts before giving up with `RetriesExhausted`
    pub max_attempts: u32,
    /// Pause after the first conflict
    pub initial_backoff: Duration,
    /// Upper bound for a single pause
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 16,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    /// Pause before attempt `attempt + 1`, given `attempt` conflicts so far (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

/// Per-handle options
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterOptions {
    /// Counter ceiling written into the config when this handle initializes the filter
    pub max_count: u32,
    /// Retry policy for guard conflicts
    pub retry: RetryPolicy,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            max_count: DEFAULT_MAX_COUNT,
            retry: RetryPolicy::default(),
        }
    }
}

impl FilterOptions {
    /// Validate options
    pub fn validate(&self) -> Result<(), FilterError> {
        if self.max_count == 0 {
            return Err(FilterError::InvalidParameters(
                "max_count must be at least 1".to_string(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(FilterError::InvalidParameters(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        if self.retry.initial_backoff > self.retry.max_backoff {
            return Err(FilterError::InvalidParameters(
                "initial_backoff cannot exceed max_backoff".to_string(),
            ));
        }

        Ok(())
    }

    /// Builder-style method to set the counter ceiling
    pub fn with_max_count(mut self, max_count: u32) -> Self {
        self.max_count = max_count;
        self
    }

    /// Builder-style method to set the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Builder for FilterOptions with validation
#[derive(Default)]
pub struct FilterOptionsBuilder {
    max_count: Option<u32>,
    max_attempts: Option<u32>,
    initial_backoff: Option<Duration>,
    max_backoff: Option<Duration>,
}

impl FilterOptionsBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the counter ceiling
    pub fn max_count(mut self, max_count: u32) -> Self {
        self.max_count = Some(max_count);
        self
    }

    /// Set the number of attempts per operation
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Set the first backoff pause
    pub fn initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = Some(backoff);
        self
    }

    /// Set the backoff ceiling
    pub fn max_backoff(mut self, backoff: Duration) -> Self {
        self.max_backoff = Some(backoff);
        self
    }

    /// Build the options, validating all parameters
    pub fn build(self) -> Result<FilterOptions, FilterError> {
        let defaults = FilterOptions::default();

        let options = FilterOptions {
            max_count: self.max_count.unwrap_or(defaults.max_count),
            retry: RetryPolicy {
                max_attempts: self.max_attempts.unwrap_or(defaults.retry.max_attempts),
                initial_backoff: self
                    .initial_backoff
                    .unwrap_or(defaults.retry.initial_backoff),
                max_backoff: self.max_backoff.unwrap_or(defaults.retry.max_backoff),
            },
        };

        options.validate()?;
        Ok(options)
    }
}
