use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::asset_type::AssetType;
use super::holding::Region;

/// Aggregated valuation of all accounts in the base currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioTotals {
    pub as_of_date: NaiveDate,
    pub base_currency: String,

    /// Sum of positive asset values.
    pub assets_value: f64,

    /// Sum of non-positive values (negative cash balances and debts). Never positive.
    pub liabilities_value: f64,

    /// `assets_value + liabilities_value`
    pub net_worth: f64,

    /// Positive values per original currency, in base currency.
    pub currencies_total_value: BTreeMap<String, f64>,

    /// Totals per broad asset type. The debt entry holds `liabilities_value`.
    pub asset_type_totals: BTreeMap<AssetType, f64>,

    /// Unrealized P/L per broad asset type, base currency.
    pub asset_type_profit_loss: BTreeMap<AssetType, f64>,

    /// Tradeable exposure per region.
    pub region_totals: BTreeMap<Region, f64>,

    /// `|liabilities| / assets`, 0 without assets.
    pub debt_ratio: f64,

    /// `net_worth * withdrawal_rate`
    pub safe_withdrawal_amount: f64,

    /// Credit still available against assets at the configured loan-to-value ratio.
    pub available_credit: f64,
}

impl PortfolioTotals {
    pub fn total_for(&self, asset_type: AssetType) -> f64 {
        self.asset_type_totals.get(&asset_type).copied().unwrap_or(0.0)
    }

    pub fn total_profit_loss(&self) -> f64 {
        self.asset_type_profit_loss.values().sum()
    }
}

/// Buy (positive) or sell (negative) needed to reach a target allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebalancingStep {
    pub asset_type: AssetType,
    pub target_fraction: f64,
    pub actual_value: f64,
    pub desired_value: f64,
    pub delta: f64,
}

/// Realized gain of one sell, or of all sells of one asset when grouped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapitalGain {
    pub asset_id: Uuid,
    pub description: String,
    pub currency: String,
    pub amount: f64,
    pub buy_price: f64,
    pub gross_buy_price: f64,
    pub sell_price: f64,
    pub profit_loss: f64,
    /// Explicit fees plus the gross-vs-net buy price spread.
    pub fees: f64,
    pub net_profit_loss: f64,
    /// Number of sells folded into this entry.
    pub transactions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapitalGainsReport {
    pub tax_year: i32,
    pub base_currency: String,
    pub gains: Vec<CapitalGain>,
    /// Base currency.
    pub total_profit_loss: f64,
    pub total_fees: f64,
    pub net_profit_loss: f64,
}

/// Internal rate of return over a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrrReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    /// Annualized rate.
    pub irr: f64,
    /// Some cash flow was in a foreign currency and was taken at face value.
    pub inaccurate_irr: bool,
    pub cash_flows: usize,
}
