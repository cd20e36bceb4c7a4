use chrono::Datelike;

use crate::errors::CoreError;
use crate::models::account::Account;
use crate::models::analytics::{CapitalGain, CapitalGainsReport};
use crate::models::quote::ForexRates;
use crate::models::transaction::{Transaction, TransactionType};
use crate::util::floating::{fix_rounding_error, safe_ratio};

/// Realized gains from sells within a tax (calendar) year.
pub struct CapitalGainsService;

impl CapitalGainsService {
    pub fn new() -> Self {
        Self
    }

    /// Gain of a single sell transaction, in the transaction's currency.
    pub fn gain_for(&self, tx: &Transaction, accounts: &[Account]) -> CapitalGain {
        let buy_price = tx.buy_price.unwrap_or(0.0);
        let gross_buy_price = tx.gross_buy_price.unwrap_or(buy_price);
        let profit_loss = fix_rounding_error((tx.rate - buy_price) * tx.amount);
        // The gross-vs-net buy spread is a fee paid on the way in.
        let fees = fix_rounding_error(tx.fee + (gross_buy_price - buy_price) * tx.amount);
        let description = accounts
            .iter()
            .find(|a| a.id == tx.account_id)
            .and_then(|a| a.asset(tx.asset_id))
            .map(|a| a.description.clone())
            .unwrap_or_else(|| tx.description.clone());

        CapitalGain {
            asset_id: tx.asset_id,
            description,
            currency: tx.currency.clone(),
            amount: tx.amount,
            buy_price,
            gross_buy_price,
            sell_price: tx.rate,
            profit_loss,
            fees,
            net_profit_loss: fix_rounding_error(profit_loss - fees),
            transactions: 1,
        }
    }

    /// Fold `next` into `acc`, keeping prices as amount-weighted averages.
    fn merge(acc: &mut CapitalGain, next: &CapitalGain) {
        let (old_amount, new_amount) = (acc.amount, next.amount);
        let total = old_amount + new_amount;
        let weighted = |old: f64, new: f64| {
            fix_rounding_error(safe_ratio(old_amount * old + new_amount * new, total))
        };
        acc.buy_price = weighted(acc.buy_price, next.buy_price);
        acc.gross_buy_price = weighted(acc.gross_buy_price, next.gross_buy_price);
        acc.sell_price = weighted(acc.sell_price, next.sell_price);
        acc.amount = fix_rounding_error(total);
        acc.profit_loss = fix_rounding_error(acc.profit_loss + next.profit_loss);
        acc.fees = fix_rounding_error(acc.fees + next.fees);
        acc.net_profit_loss = fix_rounding_error(acc.profit_loss - acc.fees);
        acc.transactions += next.transactions;
    }

    /// Report for `tax_year`. With `group_by_asset`, sells of the same asset
    /// are folded into one entry. Totals are converted with `rates`.
    pub fn capital_gains(
        &self,
        transactions: &[Transaction],
        accounts: &[Account],
        tax_year: i32,
        group_by_asset: bool,
        rates: &ForexRates,
    ) -> Result<CapitalGainsReport, CoreError> {
        let mut sells: Vec<&Transaction> = transactions
            .iter()
            .filter(|t| t.tx_type == TransactionType::Sell && t.date.year() == tax_year)
            .collect();
        sells.sort_by_key(|t| t.date);

        let mut gains: Vec<CapitalGain> = Vec::new();
        let mut total_profit_loss = 0.0;
        let mut total_fees = 0.0;

        for tx in sells {
            let gain = self.gain_for(tx, accounts);
            let rate = rates.rate(&gain.currency)?;
            total_profit_loss += gain.profit_loss * rate;
            total_fees += gain.fees * rate;

            let existing = if group_by_asset {
                gains.iter_mut().find(|g| g.asset_id == gain.asset_id)
            } else {
                None
            };
            match existing {
                Some(acc) => Self::merge(acc, &gain),
                None => gains.push(gain),
            }
        }

        let total_profit_loss = fix_rounding_error(total_profit_loss);
        let total_fees = fix_rounding_error(total_fees);
        Ok(CapitalGainsReport {
            tax_year,
            base_currency: rates.base_currency.clone(),
            gains,
            total_profit_loss,
            total_fees,
            net_profit_loss: fix_rounding_error(total_profit_loss - total_fees),
        })
    }
}

impl Default for CapitalGainsService {
    fn default() -> Self {
        Self::new()
    }
}
