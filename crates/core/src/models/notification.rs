use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::transaction::Transaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    /// A scheduled transaction was executed.
    TransactionDone,
    /// A transaction is due but needs the user (approval or cash asset choice).
    PendingTransaction,
    /// A recurring transaction failed and was switched off.
    RecurringDisabled,
}

/// A message for the user raised by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub date: DateTime<Utc>,
    pub message: String,
    /// The transaction executed or awaiting confirmation.
    #[serde(default)]
    pub transaction: Option<Transaction>,
    #[serde(default)]
    pub recurring_id: Option<Uuid>,
}

impl Notification {
    pub fn new(kind: NotificationKind, date: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            date,
            message: message.into(),
            transaction: None,
            recurring_id: None,
        }
    }

    pub fn with_transaction(mut self, tx: Transaction) -> Self {
        self.transaction = Some(tx);
        self
    }

    pub fn with_recurring(mut self, recurring_id: Uuid) -> Self {
        self.recurring_id = Some(recurring_id);
        self
    }
}
