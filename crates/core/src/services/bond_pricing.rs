//! Yield to maturity for fractional-period coupon bonds.
//!
//! The dirty price fraction `pf = (clean + accrued) / par` satisfies
//!
//! ```text
//! pf = Σ c·x^(nf+k) + x^(nf+ni)
//! ```
//!
//! where `x = 1 / (1 + y/m)` is the per-period discount factor, `c` the
//! coupon per period as a fraction of par, `ni`/`nf` the integer and
//! fractional parts of the periods left, and `k` runs over the remaining
//! coupons. The root in `x` is found with Newton-Raphson.

use chrono::NaiveDate;

use crate::errors::CoreError;
use crate::util::dates::{add_months_clamped, days_between};

/// Newton iterations before giving up.
pub const MAX_ITERATIONS: usize = 1000;

const TOLERANCE: f64 = 1e-6;
const INITIAL_GUESS: f64 = 0.5;

/// Where the settlement date sits in the coupon calendar.
#[derive(Debug, Clone, PartialEq)]
pub struct CouponPeriods {
    pub previous_coupon: NaiveDate,
    pub next_coupon: NaiveDate,
    /// Coupons still to be paid, the next one included.
    pub coupons_remaining: u32,
    /// Fraction of the current period still ahead of settlement, in `(0, 1]`.
    pub part_period: f64,
}

impl CouponPeriods {
    /// Periods to maturity, possibly fractional.
    pub fn periods(&self) -> f64 {
        f64::from(self.coupons_remaining - 1) + self.part_period
    }
}

/// Locate the coupon dates around `settlement` by stepping back from
/// `maturity` one period at a time.
pub fn coupon_periods(
    settlement: NaiveDate,
    maturity: NaiveDate,
    payments_per_year: u32,
) -> Result<CouponPeriods, CoreError> {
    if maturity <= settlement {
        return Err(CoreError::ValidationError(format!(
            "Maturity {maturity} must be after settlement {settlement}"
        )));
    }
    if payments_per_year == 0 || 12 % payments_per_year != 0 {
        return Err(CoreError::ValidationError(format!(
            "Unsupported payment frequency: {payments_per_year} per year"
        )));
    }
    let step = (12 / payments_per_year) as i32;
    let coupon_before = |k: i32| -> Result<NaiveDate, CoreError> {
        // Step from maturity each time so month-end clamping doesn't drift.
        add_months_clamped(maturity, -step * k).ok_or_else(|| {
            CoreError::ValidationError(format!("Coupon date out of range for maturity {maturity}"))
        })
    };

    let mut k = 0;
    let mut previous = coupon_before(1)?;
    while previous > settlement {
        k += 1;
        previous = coupon_before(k + 1)?;
    }
    let next = coupon_before(k)?;

    let period_days = days_between(previous, next) as f64;
    let part_period = days_between(settlement, next) as f64 / period_days;

    Ok(CouponPeriods {
        previous_coupon: previous,
        next_coupon: next,
        coupons_remaining: (k + 1) as u32,
        part_period,
    })
}

fn coupon_start(nf: f64) -> i32 {
    // With no fractional period the coupon at time 0 was paid already.
    if nf > 0.0 {
        0
    } else {
        1
    }
}

/// `f(x)` of the pricing polynomial.
fn ytm_poly(ni: i32, nf: f64, pf: f64, coupon: f64, x: f64) -> f64 {
    let coupons: f64 = (coupon_start(nf)..=ni)
        .map(|k| coupon * x.powf(nf + f64::from(k)))
        .sum();
    coupons + x.powf(nf + f64::from(ni)) - pf
}

/// `f'(x)` of the pricing polynomial.
fn d_ytm_poly(ni: i32, nf: f64, coupon: f64, x: f64) -> f64 {
    let coupons: f64 = (coupon_start(nf)..=ni)
        .map(|k| {
            let e = nf + f64::from(k);
            coupon * e * x.powf(e - 1.0)
        })
        .sum();
    let e = nf + f64::from(ni);
    coupons + e * x.powf(e - 1.0)
}

/// Accrued interest at settlement for a bond with the given par value.
pub fn accrued_interest(periods: &CouponPeriods, par: f64, coupon_rate: f64, payments_per_year: u32) -> f64 {
    par * coupon_rate / f64::from(payments_per_year) * (1.0 - periods.part_period)
}

/// Annualized yield to maturity.
///
/// `price` is the clean price in the same unit as `par` (e.g. 98.5 for a
/// bond with par 100); `coupon_rate` is annual as a fraction.
pub fn calculate_ytm(
    settlement: NaiveDate,
    maturity: NaiveDate,
    payments_per_year: u32,
    price: f64,
    par: f64,
    coupon_rate: f64,
) -> Result<f64, CoreError> {
    if price <= 0.0 || par <= 0.0 {
        return Err(CoreError::ValidationError(format!(
            "Price ({price}) and par ({par}) must be positive"
        )));
    }
    let periods = coupon_periods(settlement, maturity, payments_per_year)?;
    let accrued = accrued_interest(&periods, par, coupon_rate, payments_per_year);
    let pf = (price + accrued) / par;
    let coupon = coupon_rate / f64::from(payments_per_year);

    let n = periods.periods();
    let ni = n.floor() as i32;
    let nf = n - n.floor();

    let mut x = INITIAL_GUESS;
    for _ in 0..MAX_ITERATIONS {
        let fx = ytm_poly(ni, nf, pf, coupon, x);
        if fx.abs() < TOLERANCE {
            return Ok(f64::from(payments_per_year) * (1.0 / x - 1.0));
        }
        let dfx = d_ytm_poly(ni, nf, coupon, x);
        if dfx == 0.0 || !dfx.is_finite() {
            break;
        }
        x -= fx / dfx;
        if !x.is_finite() || x <= 0.0 {
            break;
        }
    }
    Err(CoreError::NoConvergence {
        iterations: MAX_ITERATIONS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn periods_on_coupon_date() {
        let p = coupon_periods(d(2024, 1, 15), d(2029, 1, 15), 2).unwrap();
        assert_eq!(p.coupons_remaining, 10);
        assert_eq!(p.part_period, 1.0);
        assert_eq!(p.next_coupon, d(2024, 7, 15));
        assert_eq!(p.previous_coupon, d(2024, 1, 15));
    }

    #[test]
    fn periods_mid_period() {
        let p = coupon_periods(d(2024, 4, 15), d(2029, 1, 15), 2).unwrap();
        assert_eq!(p.coupons_remaining, 10);
        assert_eq!(p.previous_coupon, d(2024, 1, 15));
        assert_eq!(p.next_coupon, d(2024, 7, 15));
        let expected = 91.0 / 182.0;
        assert!((p.part_period - expected).abs() < 1e-12);
    }

    #[test]
    fn polynomial_derivative_matches_finite_difference() {
        let (ni, nf, pf, c) = (7, 0.4, 1.02, 0.025);
        let x = 0.97;
        let h = 1e-7;
        let numeric = (ytm_poly(ni, nf, pf, c, x + h) - ytm_poly(ni, nf, pf, c, x - h)) / (2.0 * h);
        assert!((numeric - d_ytm_poly(ni, nf, c, x)).abs() < 1e-5);
    }
}
