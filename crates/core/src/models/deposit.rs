use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::util::dates::days_between;
use crate::util::floating::fix_rounding_error;

/// Day-count denominator (Actual/365).
pub const DAYS_IN_YEAR: f64 = 365.0;

/// Terms of a fixed-term deposit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositTerms {
    /// Annual rate as a fraction (0.05 = 5%).
    pub interest_rate: f64,
    pub auto_renew: bool,
    /// On renewal, add interest to the principal instead of paying it out.
    pub capitalize: bool,
    pub creation_date: NaiveDate,
    pub maturity_date: NaiveDate,
    #[serde(default)]
    pub withhold_interest_tax: bool,
    #[serde(default)]
    pub interest_tax_rate: f64,
}

impl DepositTerms {
    /// Term length in whole days.
    pub fn period(&self) -> i64 {
        days_between(self.creation_date, self.maturity_date)
    }

    /// Interest for the whole term on `principal` (Actual/365, whole days).
    pub fn full_interest(&self, principal: f64) -> f64 {
        let days = self.period().max(0) as f64;
        fix_rounding_error(days / DAYS_IN_YEAR * self.interest_rate * principal)
    }

    pub fn payable_interest(&self, principal: f64) -> f64 {
        let full = self.full_interest(principal);
        if self.withhold_interest_tax {
            fix_rounding_error(full * (1.0 - self.interest_tax_rate))
        } else {
            full
        }
    }

    pub fn withholding_tax(&self, principal: f64) -> f64 {
        if self.withhold_interest_tax {
            fix_rounding_error(self.full_interest(principal) * self.interest_tax_rate)
        } else {
            0.0
        }
    }

    pub fn is_matured(&self, today: NaiveDate) -> bool {
        self.maturity_date <= today
    }

    /// Start a new term of the same length at the old maturity date.
    pub fn renew(&mut self) {
        let period = self.period();
        self.creation_date = self.maturity_date;
        self.maturity_date = self.maturity_date + Duration::days(period);
    }
}
