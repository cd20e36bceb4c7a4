use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::deposit::DAYS_IN_YEAR;
use crate::util::dates::days_between;
use crate::util::floating::{fix_rounding_error, is_positive};

/// A scheduled coupon. `coupon_rate` overrides the bond's base rate for
/// the period ending on `date` (floating-rate and step-up bonds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestPayment {
    pub date: NaiveDate,
    #[serde(default)]
    pub coupon_rate: Option<f64>,
}

/// A scheduled amortization: `amount` of principal repaid per unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrincipalPayment {
    pub date: NaiveDate,
    pub amount: f64,
}

/// Terms of a bond or P2P loan.
///
/// Both schedules are ordered by date and consumed from the front: index 0
/// is always the next event due.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BondTerms {
    /// Annual coupon as a fraction of principal.
    pub coupon_rate: f64,
    pub maturity_date: NaiveDate,
    /// Outstanding principal per unit.
    pub principal_amount: f64,
    pub interest_payment_schedule: Vec<InterestPayment>,
    pub previous_interest_payment_date: NaiveDate,
    #[serde(default)]
    pub principal_payment_schedule: Vec<PrincipalPayment>,
    #[serde(default = "default_payments_per_year")]
    pub payments_per_year: u32,
    #[serde(default)]
    pub withhold_interest_tax: bool,
    #[serde(default)]
    pub interest_tax_rate: f64,
}

fn default_payments_per_year() -> u32 {
    1
}

impl BondTerms {
    pub fn coupon_rate_for_next_period(&self) -> f64 {
        self.interest_payment_schedule
            .first()
            .and_then(|p| p.coupon_rate)
            .unwrap_or(self.coupon_rate)
    }

    /// Interest accrued on one unit since the previous coupon, in whole days
    /// on an Actual/365 basis. Zero before the previous coupon date.
    pub fn accrued_interest(&self, date: NaiveDate) -> f64 {
        let days = days_between(self.previous_interest_payment_date, date).max(0) as f64;
        fix_rounding_error(
            days / DAYS_IN_YEAR * self.coupon_rate_for_next_period() * self.principal_amount,
        )
    }

    pub fn next_interest_date(&self) -> Option<NaiveDate> {
        self.interest_payment_schedule.first().map(|p| p.date)
    }

    /// The next principal event: the schedule head, or full redemption of the
    /// outstanding principal at maturity once the schedule is empty.
    pub fn next_principal_payment(&self) -> Option<PrincipalPayment> {
        if let Some(head) = self.principal_payment_schedule.first() {
            return Some(head.clone());
        }
        if is_positive(self.principal_amount) {
            return Some(PrincipalPayment {
                date: self.maturity_date,
                amount: self.principal_amount,
            });
        }
        None
    }

    /// Remove the coupon at the head of the schedule and roll the accrual
    /// start forward to its date.
    pub fn consume_interest_payment(&mut self) -> Option<InterestPayment> {
        if self.interest_payment_schedule.is_empty() {
            return None;
        }
        let paid = self.interest_payment_schedule.remove(0);
        self.previous_interest_payment_date = paid.date;
        Some(paid)
    }

    /// Apply a principal repayment. Removes the schedule head when the event
    /// came from the schedule.
    pub fn consume_principal_payment(&mut self, payment: &PrincipalPayment) {
        if self.principal_payment_schedule.first() == Some(payment) {
            self.principal_payment_schedule.remove(0);
        }
        self.principal_amount = fix_rounding_error(self.principal_amount - payment.amount).max(0.0);
    }

    pub fn is_fully_repaid(&self) -> bool {
        !is_positive(self.principal_amount)
    }

    pub fn payable(&self, full_interest: f64) -> f64 {
        if self.withhold_interest_tax {
            fix_rounding_error(full_interest * (1.0 - self.interest_tax_rate))
        } else {
            full_interest
        }
    }

    pub fn withholding(&self, full_interest: f64) -> f64 {
        if self.withhold_interest_tax {
            fix_rounding_error(full_interest * self.interest_tax_rate)
        } else {
            0.0
        }
    }
}
