use chrono::NaiveDate;

use crate::errors::CoreError;
use crate::models::account::Account;
use crate::models::asset::Asset;
use crate::models::quote::ForexRates;
use crate::models::view_asset::{ViewAsset, ViewSource};
use crate::util::floating::{fix_rounding_error, safe_ratio};

/// Builds per-row valuations for the asset lists.
///
/// A tradeable asset with several open positions becomes a parent row with
/// one child per position; the parent only ever holds the sum of its
/// children. With a single position the row is valued from that position.
pub struct ViewAssetService;

impl ViewAssetService {
    pub fn new() -> Self {
        Self
    }

    /// Append the row(s) for `asset` to `list`. Tradeable assets without an
    /// open position are skipped.
    pub fn add_view_asset(&self, asset: &Asset, account: &Account, list: &mut Vec<ViewAsset>) {
        if !asset.is_tradeable() {
            list.push(ViewAsset::new(asset, account, ViewSource::Asset));
            return;
        }
        match asset.positions() {
            [] => {}
            [single] => list.push(ViewAsset::new(
                asset,
                account,
                ViewSource::Position(single.clone()),
            )),
            positions => {
                let children = positions
                    .iter()
                    .map(|p| ViewAsset::new(asset, account, ViewSource::Position(p.clone())))
                    .collect();
                list.push(ViewAsset::new(asset, account, ViewSource::Children(children)));
            }
        }
    }

    /// Build and value rows for every asset accepted by `filter`.
    pub fn build_view_assets<F>(
        &self,
        accounts: &[Account],
        rates: &ForexRates,
        as_of: NaiveDate,
        filter: F,
    ) -> Result<Vec<ViewAsset>, CoreError>
    where
        F: Fn(&Asset) -> bool,
    {
        let mut list = Vec::new();
        for account in accounts {
            for asset in account.assets.iter().filter(|a| filter(a)) {
                self.add_view_asset(asset, account, &mut list);
            }
        }
        for view in &mut list {
            self.update_view_asset_data(view, rates, as_of)?;
        }
        Ok(list)
    }

    /// Recompute the valuation fields of a row (and its children).
    pub fn update_view_asset_data(
        &self,
        view: &mut ViewAsset,
        rates: &ForexRates,
        as_of: NaiveDate,
    ) -> Result<(), CoreError> {
        let (initial, current) = match &mut view.source {
            ViewSource::Children(children) => {
                let mut initial = 0.0;
                let mut current = 0.0;
                let mut initial_base = 0.0;
                let mut current_base = 0.0;
                for child in children.iter_mut() {
                    self.update_view_asset_data(child, rates, as_of)?;
                    initial += child.initial_value;
                    current += child.current_value;
                    initial_base += child.initial_value_base_currency;
                    current_base += child.current_value_base_currency;
                }
                view.initial_value_base_currency = fix_rounding_error(initial_base);
                view.current_value_base_currency = fix_rounding_error(current_base);
                view.initial_value = fix_rounding_error(initial);
                view.current_value = fix_rounding_error(current);
                Self::derive_profit_loss(view);
                return Ok(());
            }
            ViewSource::Position(position) => {
                let current_price = view.asset.holding().map(|h| h.current_price).unwrap_or(0.0);
                let accrued = view.asset.accrued_interest(as_of) * position.amount;
                (
                    position.amount * position.buy_price,
                    position.amount * current_price + accrued,
                )
            }
            ViewSource::Asset => {
                let value = view.asset.current_value(as_of);
                (value, value)
            }
        };

        let rate = rates.rate(&view.asset.currency)?;
        view.initial_value = fix_rounding_error(initial);
        view.current_value = fix_rounding_error(current);
        view.initial_value_base_currency = fix_rounding_error(view.initial_value * rate);
        view.current_value_base_currency = fix_rounding_error(view.current_value * rate);
        Self::derive_profit_loss(view);
        Ok(())
    }

    fn derive_profit_loss(view: &mut ViewAsset) {
        view.profit_loss = fix_rounding_error(view.current_value - view.initial_value);
        view.profit_loss_percent = safe_ratio(view.profit_loss, view.initial_value);
    }
}

impl Default for ViewAssetService {
    fn default() -> Self {
        Self::new()
    }
}
