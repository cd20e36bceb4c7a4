use serde::{Deserialize, Serialize};

use super::asset_type::AssetType;
use crate::errors::CoreError;

/// Target share of the portfolio for one asset type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationTarget {
    pub asset_type: AssetType,
    /// Fraction of total assets in `[0, 1]`.
    pub fraction: f64,
}

/// User-configurable portfolio settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortfolioConfig {
    /// Currency all totals are reported in (e.g., "PLN", "USD", "EUR").
    pub base_currency: String,

    /// Desired allocation used for rebalancing.
    pub target_allocation: Vec<AllocationTarget>,

    /// Annual withdrawal rate for the safe-withdrawal figure (0.04 = 4%).
    pub withdrawal_rate: f64,

    /// Share of assets a lender would accept as collateral.
    pub loan_to_value_ratio: f64,

    /// Quotes and forex rates younger than this are served from cache.
    pub quote_cache_timeout_secs: u64,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            base_currency: "USD".to_string(),
            target_allocation: Vec::new(),
            withdrawal_rate: 0.04,
            loan_to_value_ratio: 0.5,
            quote_cache_timeout_secs: 3600,
        }
    }
}

impl PortfolioConfig {
    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let mut config: PortfolioConfig = serde_json::from_str(json)?;
        config.base_currency = config.base_currency.to_uppercase();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.base_currency.len() != 3 || !self.base_currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CoreError::ValidationError(format!(
                "Base currency '{}' is not a 3-letter ISO code",
                self.base_currency
            )));
        }
        if let Some(bad) = self
            .target_allocation
            .iter()
            .find(|t| !(0.0..=1.0).contains(&t.fraction))
        {
            return Err(CoreError::ValidationError(format!(
                "Target allocation for {} must be within [0, 1], got {}",
                bad.asset_type, bad.fraction
            )));
        }
        let total: f64 = self.target_allocation.iter().map(|t| t.fraction).sum();
        if total > 1.0 + 1e-9 {
            return Err(CoreError::ValidationError(format!(
                "Target allocation sums to {total}, more than 100%"
            )));
        }
        if !(0.0..=1.0).contains(&self.withdrawal_rate) {
            return Err(CoreError::ValidationError(format!(
                "Withdrawal rate must be within [0, 1], got {}",
                self.withdrawal_rate
            )));
        }
        if !(0.0..=1.0).contains(&self.loan_to_value_ratio) {
            return Err(CoreError::ValidationError(format!(
                "Loan-to-value ratio must be within [0, 1], got {}",
                self.loan_to_value_ratio
            )));
        }
        if self.quote_cache_timeout_secs == 0 {
            return Err(CoreError::ValidationError(
                "Quote cache timeout must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn target_for(&self, asset_type: AssetType) -> Option<f64> {
        self.target_allocation
            .iter()
            .find(|t| t.asset_type == asset_type)
            .map(|t| t.fraction)
    }
}
