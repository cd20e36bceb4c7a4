use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::transaction::{Transaction, TransactionType};
use crate::util::dates::start_of_day;

/// A future cash flow derived from an asset's terms or a recurring template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedEvent {
    pub date: NaiveDate,
    pub tx_type: TransactionType,
    pub account_id: Uuid,
    pub asset_id: Uuid,
    pub description: String,
    /// Money for cash flows, units for trades.
    pub amount: f64,
    pub rate: f64,
    pub currency: String,
    #[serde(default)]
    pub withholding_tax: f64,
    #[serde(default)]
    pub recurring_id: Option<Uuid>,
}

impl ProjectedEvent {
    /// Money moved by this event.
    pub fn value(&self) -> f64 {
        self.amount * self.rate
    }

    /// Concrete transaction for this event, settled on `cash_asset_id`.
    pub fn to_transaction(&self, cash_asset_id: Option<Uuid>, time: DateTime<Utc>) -> Transaction {
        let date = if time.date_naive() == self.date {
            time
        } else {
            start_of_day(self.date)
        };
        let mut tx = Transaction::new(
            self.tx_type,
            self.account_id,
            self.asset_id,
            date,
            self.amount,
            self.rate,
            &self.currency,
        )
        .with_description(&self.description);
        tx.cash_asset_id = cash_asset_id;
        tx.withholding_tax = self.withholding_tax;
        tx
    }
}
