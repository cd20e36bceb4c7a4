//! Precision helpers for monetary arithmetic on `f64`.
//!
//! Chained multiplications and sums leave base-2 noise such as
//! `0.1 + 0.2 = 0.30000000000000004`. Every accumulated amount is passed
//! through [`fix_rounding_error`] before it is stored or compared.

const DECIMAL_PLACES_FACTOR: f64 = 1e8;

/// Round to 8 decimal places. Non-finite values pass through untouched.
pub fn fix_rounding_error(x: f64) -> f64 {
    if !x.is_finite() {
        return x;
    }
    let rounded = (x * DECIMAL_PLACES_FACTOR).round() / DECIMAL_PLACES_FACTOR;
    // Avoid handing out negative zero.
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Epsilon-tolerant equality.
pub fn equal(a: f64, b: f64) -> bool {
    (a - b).abs() < f64::EPSILON
}

/// True when `x` is strictly greater than zero beyond machine epsilon.
pub fn is_positive(x: f64) -> bool {
    x > f64::EPSILON
}

/// True when `x` is zero within machine epsilon.
pub fn is_zero(x: f64) -> bool {
    x.abs() < f64::EPSILON
}

/// `numerator / denominator`, or 0 when the denominator is zero.
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if is_zero(denominator) {
        0.0
    } else {
        numerator / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixes_binary_noise() {
        assert_eq!(fix_rounding_error(0.1 + 0.2), 0.3);
        assert_eq!(fix_rounding_error(1.123456789), 1.12345679);
    }

    #[test]
    fn never_returns_negative_zero() {
        let v = fix_rounding_error(-0.000000001);
        assert!(v.is_sign_positive());
    }

    #[test]
    fn epsilon_comparisons() {
        assert!(equal(0.3, fix_rounding_error(0.1 + 0.2)));
        assert!(!is_positive(0.0));
        assert!(!is_positive(f64::EPSILON / 2.0));
        assert!(is_positive(0.00000001));
        assert!(is_zero(-0.0));
    }

    #[test]
    fn safe_ratio_guards_zero() {
        assert_eq!(safe_ratio(10.0, 0.0), 0.0);
        assert_eq!(safe_ratio(10.0, 4.0), 2.5);
    }
}
