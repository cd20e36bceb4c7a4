use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

use crate::errors::CoreError;
use crate::models::account::Account;
use crate::models::analytics::{PortfolioTotals, RebalancingStep};
use crate::models::asset_type::AssetType;
use crate::models::quote::ForexRates;
use crate::models::settings::PortfolioConfig;
use crate::util::floating::{fix_rounding_error, is_positive, is_zero, safe_ratio};

/// Aggregates every account into base-currency totals.
///
/// Pure computation over an explicit [`ForexRates`] value: a currency
/// without a rate fails the whole pass instead of being taken at 1:1.
pub struct ValuationService;

impl ValuationService {
    pub fn new() -> Self {
        Self
    }

    /// Every currency appearing across all assets.
    pub fn required_currencies(&self, accounts: &[Account]) -> BTreeSet<String> {
        accounts
            .iter()
            .flat_map(|a| a.assets.iter())
            .map(|a| a.currency.to_uppercase())
            .collect()
    }

    pub fn compute_totals(
        &self,
        accounts: &[Account],
        rates: &ForexRates,
        config: &PortfolioConfig,
        as_of: NaiveDate,
    ) -> Result<PortfolioTotals, CoreError> {
        let mut assets_value = 0.0;
        let mut liabilities_value = 0.0;
        let mut currencies_total_value: BTreeMap<String, f64> = BTreeMap::new();
        let mut asset_type_totals: BTreeMap<AssetType, f64> = BTreeMap::new();
        let mut asset_type_profit_loss: BTreeMap<AssetType, f64> = BTreeMap::new();
        let mut region_totals = BTreeMap::new();

        for asset in accounts.iter().flat_map(|a| a.assets.iter()) {
            let value = rates.to_base(asset.current_value(as_of), &asset.currency)?;
            let broad = asset.asset_type.broad_type();

            if !is_positive(value) {
                // Negative cash balances land here too: they are debt.
                liabilities_value += value;
                continue;
            }

            assets_value += value;
            *currencies_total_value.entry(asset.currency.clone()).or_default() += value;
            *asset_type_totals.entry(broad).or_default() += value;

            if let Some(holding) = asset.holding() {
                let cost = rates.to_base(asset.amount * holding.buy_price, &asset.currency)?;
                *asset_type_profit_loss.entry(broad).or_default() += value - cost;
                for weight in holding.region_weights() {
                    *region_totals.entry(weight.region).or_default() += value * weight.weight;
                }
            }
        }

        fix_all(&mut currencies_total_value);
        fix_all(&mut asset_type_totals);
        fix_all(&mut asset_type_profit_loss);
        fix_all(&mut region_totals);

        let assets_value = fix_rounding_error(assets_value);
        let liabilities_value = fix_rounding_error(liabilities_value);
        // Debt is replaced, not summed: it is the union of debt assets and
        // negative cash balances.
        asset_type_totals.insert(AssetType::DEBT, liabilities_value);

        let net_worth = fix_rounding_error(assets_value + liabilities_value);
        let debt_ratio = safe_ratio(liabilities_value.abs(), assets_value);
        let safe_withdrawal_amount = fix_rounding_error(net_worth.max(0.0) * config.withdrawal_rate);
        let available_credit = fix_rounding_error(
            (assets_value * config.loan_to_value_ratio - liabilities_value.abs()).max(0.0),
        );

        Ok(PortfolioTotals {
            as_of_date: as_of,
            base_currency: rates.base_currency.clone(),
            assets_value,
            liabilities_value,
            net_worth,
            currencies_total_value,
            asset_type_totals,
            asset_type_profit_loss,
            region_totals,
            debt_ratio,
            safe_withdrawal_amount,
            available_credit,
        })
    }

    /// Buys (positive delta) and sells (negative) needed to reach the
    /// configured allocation, biggest sells first. Cash-like and debt types
    /// are not rebalanced by trading and are left out.
    pub fn rebalancing_steps(
        &self,
        totals: &PortfolioTotals,
        config: &PortfolioConfig,
    ) -> Vec<RebalancingStep> {
        let mut steps: Vec<RebalancingStep> = config
            .target_allocation
            .iter()
            .filter(|t| !t.asset_type.is_cash_like() && t.asset_type.broad_type() != AssetType::DEBT)
            .filter_map(|t| {
                let broad = t.asset_type.broad_type();
                let actual_value = totals.total_for(broad);
                let desired_value = fix_rounding_error(t.fraction * totals.assets_value);
                let delta = fix_rounding_error(desired_value - actual_value);
                (!is_zero(delta)).then_some(RebalancingStep {
                    asset_type: broad,
                    target_fraction: t.fraction,
                    actual_value,
                    desired_value,
                    delta,
                })
            })
            .collect();
        steps.sort_by(|a, b| a.delta.total_cmp(&b.delta));
        steps
    }
}

fn fix_all<K>(map: &mut BTreeMap<K, f64>) {
    map.values_mut().for_each(|v| *v = fix_rounding_error(*v));
}

impl Default for ValuationService {
    fn default() -> Self {
        Self::new()
    }
}
