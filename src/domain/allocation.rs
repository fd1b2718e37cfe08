//! Error-weighted cash allocation
//!
//! Each instrument receives `error_i / total_error * pool`: the instruments whose
//! predictions missed by the most get the most capital for the next cycle. When the
//! total error is effectively zero the pool is split evenly.

/// Totals at or below this are treated as zero error
pub const MIN_TOTAL_ERROR: f64 = 1e-12;

/// Split `pool` across instruments in proportion to their prediction errors.
///
/// Negative or non-finite errors count as zero. Output order matches `errors`.
pub fn reallocate_cash(errors: &[f64], pool: f64) -> Vec<f64> {
    if errors.is_empty() {
        return Vec::new();
    }
    let pool = pool.max(0.0);

    let weights: Vec<f64> = errors
        .iter()
        .map(|e| if e.is_finite() && *e > 0.0 { *e } else { 0.0 })
        .collect();
    let total: f64 = weights.iter().sum();

    if total <= MIN_TOTAL_ERROR {
        return equal_split(errors.len(), pool);
    }
    weights.iter().map(|w| w / total * pool).collect()
}

/// `pool / n` for each of `n` instruments
pub fn equal_split(n: usize, pool: f64) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    vec![pool / n as f64; n]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_proportional_to_error() {
        let allocations = reallocate_cash(&[1.0, 2.0, 3.0], 600.0);
        assert_relative_eq!(allocations[0], 100.0, epsilon = 1e-9);
        assert_relative_eq!(allocations[1], 200.0, epsilon = 1e-9);
        assert_relative_eq!(allocations[2], 300.0, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_total_error_splits_evenly() {
        assert_eq!(reallocate_cash(&[0.0, 0.0, 0.0], 600.0), vec![200.0; 3]);
    }

    #[test]
    fn test_allocations_sum_to_pool() {
        let allocations = reallocate_cash(&[0.3, 4.1, 0.0, 2.2], 1234.5);
        assert_relative_eq!(allocations.iter().sum::<f64>(), 1234.5, epsilon = 1e-9);
        assert_eq!(allocations[2], 0.0);
    }

    #[test]
    fn test_invalid_errors_ignored() {
        let allocations = reallocate_cash(&[f64::NAN, -1.0, 5.0], 100.0);
        assert_eq!(allocations, vec![0.0, 0.0, 100.0]);
    }

    #[test]
    fn test_negative_pool_clamped() {
        assert_eq!(reallocate_cash(&[1.0, 1.0], -50.0), vec![0.0, 0.0]);
        assert!(reallocate_cash(&[], 100.0).is_empty());
    }
}
