/// Smallest value, or 0 for an empty slice.
pub fn min(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().cloned().fold(f64::INFINITY, f64::min)
}

/// Largest value, or 0 for an empty slice.
pub fn max(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
}

/// Shift a series so its minimum sits at zero. Returns the shifted series
/// together with the original min and max for axis labels.
pub fn normalise(values: &[f64]) -> (Vec<f64>, f64, f64) {
    let lo = min(values);
    let hi = max(values);
    (values.iter().map(|v| v - lo).collect(), lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_zero() {
        assert_eq!(min(&[]), 0.0);
        assert_eq!(max(&[]), 0.0);
    }

    #[test]
    fn mixed_signs() {
        let v = [-10.0, 20.0, -30.0, 40.0];
        assert_eq!(min(&v), -30.0);
        assert_eq!(max(&v), 40.0);
    }

    #[test]
    fn normalise_keeps_bounds() {
        let (shifted, lo, hi) = normalise(&[5.0, 7.0, 6.0]);
        assert_eq!(shifted, vec![0.0, 2.0, 1.0]);
        assert_eq!((lo, hi), (5.0, 7.0));
    }
}
