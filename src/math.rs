use num_traits::Float;

/// Scale factor converting a median absolute deviation into a standard
/// deviation estimate under a normal distribution.
pub const MAD_SCALE: f32 = 1.4826;

/// Median of a slice. The slice is reordered in place.
///
/// Even-length slices return the mean of the two central elements.
pub fn median<F: Float>(values: &mut [F]) -> F {
    debug_assert!(!values.is_empty());

    values.sort_unstable_by(|a, b| a.partial_cmp(b).expect("non-comparable value"));

    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        let two = F::one() + F::one();
        (values[mid - 1] + values[mid]) / two
    }
}

/// Median absolute deviation around a precomputed median.
pub fn mad<F: Float>(values: &[F], center: F) -> F {
    let mut deviations: Vec<F> = values.iter().map(|&v| (v - center).abs()).collect();

    median(&mut deviations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_median_odd() {
        let mut values = [3.0f32, 1.0, 2.0];
        assert_relative_eq!(median(&mut values), 2.0);
    }

    #[test]
    fn test_median_even() {
        let mut values = [4.0f32, 1.0, 3.0, 2.0];
        assert_relative_eq!(median(&mut values), 2.5);
    }

    #[test]
    fn test_median_single() {
        let mut values = [7.0f32];
        assert_relative_eq!(median(&mut values), 7.0);
    }

    #[test]
    fn test_mad_uniform_is_zero() {
        let values = [5.0f32; 8];
        assert_relative_eq!(mad(&values, 5.0), 0.0);
    }

    #[test]
    fn test_mad_alternating() {
        // half at 10, half at 12: median 11, every deviation 1
        let values = [10.0f32, 12.0, 10.0, 12.0, 10.0, 12.0];
        assert_relative_eq!(mad(&values, 11.0), 1.0);
    }

    #[test]
    fn test_mad_resists_outlier() {
        let mut values = vec![10.0f32; 99];
        values.push(10_000.0);

        let center = median(&mut values.clone());
        assert_relative_eq!(center, 10.0);
        assert_relative_eq!(mad(&values, center), 0.0);
    }
}
