//! Optimal counting Bloom filter parameter calculation
//!
//! Formulas:
//! - m = ceil(-n*ln(p) / (ln(2)^2))  -- counter slots
//! - k = max(1, round((m/n) * ln(2))) -- hash iterations
//! - W = bit length of max_count      -- bits per counter slot

use std::f64::consts::LN_2;

/// Largest bit array the backing store can address (2 * i32::MAX bits)
pub const MAX_ADDRESSABLE_BITS: u64 = i32::MAX as u64 * 2;

/// Default counter ceiling; fits a 3-bit counter
pub const DEFAULT_MAX_COUNT: u32 = 7;

/// Number of counter slots for `expected_insertions` at `false_probability`
///
/// Returns 0 when no slots are needed (zero insertions or probability 1);
/// callers reject that.
pub fn optimal_num_of_slots(expected_insertions: u64, false_probability: f64) -> u64 {
    let n = expected_insertions as f64;
    (-n * false_probability.ln() / (LN_2 * LN_2)).ceil() as u64
}

/// Number of hash iterations for `size` slots holding `expected_insertions`
pub fn optimal_num_of_hash_iterations(expected_insertions: u64, size: u64) -> u32 {
    if expected_insertions == 0 {
        return 1;
    }
    let k = (size as f64 / expected_insertions as f64 * LN_2).round() as u32;
    k.max(1)
}

/// Minimal bit width holding every value in `0..=max_count`
pub fn counter_width(max_count: u32) -> u32 {
    u32::BITS - max_count.leading_zeros()
}

/// Theoretical false positive rate for `m` slots, `n` elements and `k` iterations
///
/// Formula: FPR = (1 - e^(-kn/m))^k
pub fn calculate_fpr(m: u64, n: u64, k: u32) -> f64 {
    if m == 0 {
        return 1.0;
    }
    let exponent = -(k as f64) * (n as f64) / (m as f64);
    (1.0 - exponent.exp()).powi(k as i32)
}

/// Fill-ratio cardinality estimate: n = -(m/k) * ln(1 - X/m)
///
/// The classic single-bit estimator, applied to a multi-bit counter array
/// where every set bit of every counter counts towards `set_bits`. This is an
/// approximation, not a count. `set_bits` is clamped below `m` so a
/// saturated array still yields a finite estimate.
pub fn estimate_cardinality(size: u64, hash_iterations: u32, set_bits: u64) -> u64 {
    if size == 0 || hash_iterations == 0 {
        return 0;
    }
    let set_bits = set_bits.min(size - 1);
    let m = size as f64;
    let fill_ratio = set_bits as f64 / m;

    (-(m / hash_iterations as f64) * (1.0 - fill_ratio).ln()).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_n100_fpr001() {
        // -100 * ln(0.01) / ln(2)^2 = 958.5..., rounded up
        assert_eq!(optimal_num_of_slots(100, 0.01), 959);
    }

    #[test]
    fn test_hash_iterations_n100_m959() {
        // 959 / 100 * ln(2) = 6.647...
        assert_eq!(optimal_num_of_hash_iterations(100, 959), 7);
    }

    #[test]
    fn test_hash_iterations_at_least_one() {
        assert_eq!(optimal_num_of_hash_iterations(1000, 1), 1);
        assert_eq!(optimal_num_of_hash_iterations(0, 10), 1);
    }

    #[test]
    fn test_zero_slots_for_degenerate_inputs() {
        assert_eq!(optimal_num_of_slots(0, 0.01), 0);
        assert_eq!(optimal_num_of_slots(100, 1.0), 0);
    }

    #[test]
    fn test_counter_width() {
        assert_eq!(counter_width(0), 0);
        assert_eq!(counter_width(1), 1);
        assert_eq!(counter_width(7), 3);
        assert_eq!(counter_width(8), 4);
        assert_eq!(counter_width(9), 4);
        assert_eq!(counter_width(15), 4);
        assert_eq!(counter_width(u32::MAX), 32);
    }

    #[test]
    fn test_lower_fpr_needs_more_slots() {
        assert!(optimal_num_of_slots(100, 0.01) > optimal_num_of_slots(100, 0.1));
    }

    #[test]
    fn test_fpr_meets_target() {
        let m = optimal_num_of_slots(100, 0.01);
        let k = optimal_num_of_hash_iterations(100, m);
        let fpr = calculate_fpr(m, 100, k);

        assert!(fpr <= 0.011, "Expected FPR <= 0.01, got {}", fpr);
    }

    #[test]
    fn test_estimate_empty_is_zero() {
        assert_eq!(estimate_cardinality(959, 7, 0), 0);
    }

    #[test]
    fn test_estimate_matches_formula() {
        let expected = (-(959.0 / 7.0) * (1.0f64 - 300.0 / 959.0).ln()).round() as u64;
        assert_eq!(estimate_cardinality(959, 7, 300), expected);
    }

    #[test]
    fn test_estimate_clamps_overfull_array() {
        // Multi-bit counters can set more bits than there are slots
        let clamped = estimate_cardinality(100, 2, 100);
        assert_eq!(estimate_cardinality(100, 2, 250), clamped);
        assert!(clamped > 0);
    }
}
