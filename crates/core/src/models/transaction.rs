use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::util::floating::fix_rounding_error;

/// Kind of a logged or scheduled transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    Buy,
    Sell,
    /// Money flowing into the portfolio.
    CreditCash,
    /// Money leaving the portfolio.
    DebitCash,
    /// Move between two cash assets.
    Transfer,
    Interest,
    PrincipalPayment,
    DepositLiquidation,
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionType::Buy => write!(f, "Buy"),
            TransactionType::Sell => write!(f, "Sell"),
            TransactionType::CreditCash => write!(f, "Credit Cash"),
            TransactionType::DebitCash => write!(f, "Debit Cash"),
            TransactionType::Transfer => write!(f, "Transfer"),
            TransactionType::Interest => write!(f, "Interest"),
            TransactionType::PrincipalPayment => write!(f, "Principal Payment"),
            TransactionType::DepositLiquidation => write!(f, "Deposit Liquidation"),
        }
    }
}

/// A single cash flow or trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub tx_type: TransactionType,
    pub account_id: Uuid,
    /// The asset traded, or the cash asset credited/debited.
    pub asset_id: Uuid,
    /// Settlement cash asset (buys, sells, interest) or transfer target.
    #[serde(default)]
    pub cash_asset_id: Option<Uuid>,
    pub date: DateTime<Utc>,
    /// Units for trades, money for cash flows. Always positive.
    pub amount: f64,
    /// Unit price for trades, 1 for cash flows.
    pub rate: f64,
    #[serde(default)]
    pub fee: f64,
    pub currency: String,
    #[serde(default)]
    pub description: String,
    /// Average net buy price of the lots consumed by a sell.
    #[serde(default)]
    pub buy_price: Option<f64>,
    /// Average gross buy price of the lots consumed by a sell.
    #[serde(default)]
    pub gross_buy_price: Option<f64>,
    #[serde(default)]
    pub withholding_tax: f64,
}

impl Transaction {
    pub fn new(
        tx_type: TransactionType,
        account_id: Uuid,
        asset_id: Uuid,
        date: DateTime<Utc>,
        amount: f64,
        rate: f64,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tx_type,
            account_id,
            asset_id,
            cash_asset_id: None,
            date,
            amount,
            rate,
            fee: 0.0,
            currency: currency.into().to_uppercase(),
            description: String::new(),
            buy_price: None,
            gross_buy_price: None,
            withholding_tax: 0.0,
        }
    }

    /// A plain cash movement on `cash_asset_id` at rate 1.
    pub fn cash(
        tx_type: TransactionType,
        account_id: Uuid,
        cash_asset_id: Uuid,
        date: DateTime<Utc>,
        amount: f64,
        currency: impl Into<String>,
    ) -> Self {
        Self::new(tx_type, account_id, cash_asset_id, date, amount, 1.0, currency)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_cash_asset(mut self, cash_asset_id: Uuid) -> Self {
        self.cash_asset_id = Some(cash_asset_id);
        self
    }

    pub fn with_fee(mut self, fee: f64) -> Self {
        self.fee = fee;
        self
    }

    /// `amount * rate`, before fees.
    pub fn value(&self) -> f64 {
        fix_rounding_error(self.amount * self.rate)
    }
}
