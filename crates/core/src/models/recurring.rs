use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::transaction::Transaction;
use crate::util::dates::add_months_clamped;

/// How often a recurring transaction repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecurrenceType {
    /// A single scheduled occurrence.
    Never,
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
    /// Every `period` days.
    AfterGivenDays,
}

impl std::fmt::Display for RecurrenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecurrenceType::Never => write!(f, "Never"),
            RecurrenceType::Daily => write!(f, "Daily"),
            RecurrenceType::Weekly => write!(f, "Weekly"),
            RecurrenceType::Monthly => write!(f, "Monthly"),
            RecurrenceType::Quarterly => write!(f, "Quarterly"),
            RecurrenceType::Yearly => write!(f, "Yearly"),
            RecurrenceType::AfterGivenDays => write!(f, "After given days"),
        }
    }
}

/// A user-defined transaction template plus its schedule.
///
/// `tx.date` always holds the next occurrence that has not run yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringTransaction {
    pub id: Uuid,
    pub tx: Transaction,
    pub recurrence: RecurrenceType,
    /// Interval length for `AfterGivenDays`.
    #[serde(default = "default_period")]
    pub period: u32,
    /// Occurrences still to run; 0 means unlimited.
    #[serde(default)]
    pub transactions_left: u32,
    /// Execute without asking the user.
    #[serde(default)]
    pub auto_approve: bool,
    /// Halted after a failed execution.
    #[serde(default)]
    pub inactive: bool,
}

fn default_period() -> u32 {
    1
}

impl RecurringTransaction {
    pub fn new(tx: Transaction, recurrence: RecurrenceType) -> Self {
        Self {
            id: Uuid::new_v4(),
            tx,
            recurrence,
            period: 1,
            transactions_left: 0,
            auto_approve: false,
            inactive: false,
        }
    }

    pub fn with_period(mut self, period: u32) -> Self {
        self.period = period;
        self
    }

    pub fn with_transactions_left(mut self, left: u32) -> Self {
        self.transactions_left = left;
        self
    }

    pub fn auto_approved(mut self) -> Self {
        self.auto_approve = true;
        self
    }

    /// Date of the occurrence after `from`, or `None` for one-shot schedules.
    pub fn next_occurrence(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let step_months = |months: i32| {
            let date = add_months_clamped(from.date_naive(), months)?;
            Some(date.and_time(from.time()).and_utc())
        };
        match self.recurrence {
            RecurrenceType::Never => None,
            RecurrenceType::Daily => Some(from + Duration::days(1)),
            RecurrenceType::Weekly => Some(from + Duration::weeks(1)),
            RecurrenceType::Monthly => step_months(1),
            RecurrenceType::Quarterly => step_months(3),
            RecurrenceType::Yearly => step_months(12),
            RecurrenceType::AfterGivenDays => {
                Some(from + Duration::days(i64::from(self.period.max(1))))
            }
        }
    }

    /// The occurrence in `tx.date` is the last one.
    pub fn is_last_occurrence(&self) -> bool {
        self.recurrence == RecurrenceType::Never || self.transactions_left == 1
    }

    /// Move the template to its next occurrence and count one down.
    /// Returns `false` when the schedule is exhausted.
    pub fn advance(&mut self) -> bool {
        if self.is_last_occurrence() {
            return false;
        }
        let Some(next) = self.next_occurrence(self.tx.date) else {
            return false;
        };
        self.tx.date = next;
        if self.transactions_left > 0 {
            self.transactions_left -= 1;
        }
        true
    }
}
