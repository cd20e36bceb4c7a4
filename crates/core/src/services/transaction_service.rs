use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::account::{resolve_cash_asset, Account};
use crate::models::asset::{Asset, AssetDetails};
use crate::models::asset_type::{is_of_strict_type, AssetType};
use crate::models::holding::Position;
use crate::models::transaction::{Transaction, TransactionType};
use crate::storage::traits::{PortfolioStore, StoreOp};
use crate::util::floating::{fix_rounding_error, is_positive, is_zero, safe_ratio};

/// Applies transactions to account balances and positions.
///
/// [`apply`](Self::apply) works on an in-memory account list and returns
/// the store ops that persist the result; callers that batch several
/// changes into one commit (periodic checks) append their own ops to it.
pub struct TransactionService;

impl TransactionService {
    pub fn new() -> Self {
        Self
    }

    /// Load, apply and commit `tx` in one atomic write. Returns the
    /// transaction as recorded (sells carry their consumed buy prices).
    pub async fn execute(
        &self,
        store: &dyn PortfolioStore,
        tx: Transaction,
    ) -> Result<Transaction, CoreError> {
        let mut accounts = store.get_accounts().await?;
        let (recorded, ops) = self.apply(&mut accounts, tx)?;
        store.commit(ops).await?;
        tracing::info!(tx_id = %recorded.id, tx_type = %recorded.tx_type, amount = recorded.amount, "transaction executed");
        Ok(recorded)
    }

    /// Apply `tx` to `accounts`. Either every balance change lands or,
    /// on error, `accounts` is left untouched.
    pub fn apply(
        &self,
        accounts: &mut [Account],
        tx: Transaction,
    ) -> Result<(Transaction, Vec<StoreOp>), CoreError> {
        validate(&tx)?;
        let slot = accounts
            .iter_mut()
            .find(|a| a.id == tx.account_id)
            .ok_or(CoreError::AccountNotFound(tx.account_id))?;
        if slot.asset(tx.asset_id).is_none() {
            return Err(CoreError::AssetNotFound(tx.asset_id));
        }

        let mut account = slot.clone();
        let mut tx = tx;
        let mut touched: Vec<Uuid> = vec![tx.asset_id];
        let mut deleted: Vec<Uuid> = Vec::new();

        match tx.tx_type {
            TransactionType::CreditCash => {
                let asset = cash_target(&mut account, tx.asset_id)?;
                asset.amount = fix_rounding_error(asset.amount + tx.value());
            }
            TransactionType::DebitCash => {
                let asset = cash_target(&mut account, tx.asset_id)?;
                debit(asset, tx.value())?;
            }
            TransactionType::Transfer => {
                let target_id = tx.cash_asset_id.ok_or_else(|| {
                    CoreError::ValidationError("transfer needs a target cash asset".to_string())
                })?;
                if target_id == tx.asset_id {
                    return Err(CoreError::ValidationError(
                        "transfer source and target are the same asset".to_string(),
                    ));
                }
                let source_currency = cash_target(&mut account, tx.asset_id)?.currency.clone();
                let target = cash_target(&mut account, target_id)?;
                if target.currency != source_currency {
                    return Err(CoreError::ValidationError(format!(
                        "cannot transfer {source_currency} into a {} asset",
                        target.currency
                    )));
                }
                target.amount = fix_rounding_error(target.amount + tx.value());
                debit(cash_target(&mut account, tx.asset_id)?, tx.value() + tx.fee)?;
                touched.push(target_id);
            }
            TransactionType::Buy => {
                let cash_id = settlement_cash(&account, &tx);
                let asset = tradeable_target(&mut account, tx.asset_id)?;
                let gross = safe_ratio(tx.value() + tx.fee, tx.amount);
                asset.add_position(Position::new(
                    tx.amount,
                    tx.rate,
                    fix_rounding_error(gross),
                    tx.date.date_naive(),
                ));
                if let Some(cash_id) = cash_id {
                    let cash = cash_target(&mut account, cash_id)?;
                    debit(cash, tx.value() + tx.fee)?;
                    tx.cash_asset_id = Some(cash_id);
                    touched.push(cash_id);
                } else {
                    tracing::debug!(asset_id = %tx.asset_id, "buy without a settlement cash asset");
                }
            }
            TransactionType::Sell => {
                let cash_id = settlement_cash(&account, &tx);
                let asset = tradeable_target(&mut account, tx.asset_id)?;
                let (buy_price, gross_buy_price) = consume_fifo(asset, tx.amount)?;
                tx.buy_price = Some(buy_price);
                tx.gross_buy_price = Some(gross_buy_price);
                if is_zero(asset.amount) {
                    deleted.push(asset.id);
                }
                if let Some(cash_id) = cash_id {
                    let cash = cash_target(&mut account, cash_id)?;
                    cash.amount = fix_rounding_error(cash.amount + tx.value() - tx.fee);
                    tx.cash_asset_id = Some(cash_id);
                    touched.push(cash_id);
                }
            }
            TransactionType::Interest
            | TransactionType::PrincipalPayment
            | TransactionType::DepositLiquidation => {
                let cash_id = settlement_cash(&account, &tx).ok_or_else(|| {
                    CoreError::ValidationError(format!(
                        "{} needs a cash asset to settle into",
                        tx.tx_type
                    ))
                })?;
                let cash = cash_target(&mut account, cash_id)?;
                cash.amount = fix_rounding_error(cash.amount + tx.value() - tx.fee);
                tx.cash_asset_id = Some(cash_id);
                touched.push(cash_id);
                if tx.tx_type == TransactionType::DepositLiquidation {
                    deleted.push(tx.asset_id);
                }
            }
        }

        account.assets.retain(|a| !deleted.contains(&a.id));
        let mut ops = Vec::with_capacity(touched.len() + 1);
        for id in touched {
            if deleted.contains(&id) {
                continue;
            }
            if let Some(asset) = account.asset(id) {
                ops.push(StoreOp::PutAsset {
                    account_id: account.id,
                    asset: asset.clone(),
                });
            }
        }
        for id in &deleted {
            ops.push(StoreOp::DeleteAsset {
                account_id: account.id,
                asset_id: *id,
            });
        }
        ops.push(StoreOp::AddTransaction(tx.clone()));

        *slot = account;
        Ok((tx, ops))
    }
}

impl Default for TransactionService {
    fn default() -> Self {
        Self::new()
    }
}

fn validate(tx: &Transaction) -> Result<(), CoreError> {
    if !tx.amount.is_finite() || !is_positive(tx.amount) {
        return Err(CoreError::ValidationError(format!(
            "transaction amount must be positive, got {}",
            tx.amount
        )));
    }
    if !tx.rate.is_finite() || tx.rate < 0.0 {
        return Err(CoreError::ValidationError(format!(
            "transaction rate must be non-negative, got {}",
            tx.rate
        )));
    }
    if !tx.fee.is_finite() || tx.fee < 0.0 {
        return Err(CoreError::ValidationError(format!(
            "transaction fee must be non-negative, got {}",
            tx.fee
        )));
    }
    Ok(())
}

/// Explicit settlement asset on the transaction, else the account's
/// resolved cash asset for the traded asset.
fn settlement_cash(account: &Account, tx: &Transaction) -> Option<Uuid> {
    if let Some(id) = tx.cash_asset_id {
        return Some(id);
    }
    account
        .asset(tx.asset_id)
        .and_then(|asset| resolve_cash_asset(account, asset))
}

/// An asset that holds a plain balance: cash, debt or a deposit.
fn cash_target(account: &mut Account, asset_id: Uuid) -> Result<&mut Asset, CoreError> {
    let asset = account
        .asset_mut(asset_id)
        .ok_or(CoreError::AssetNotFound(asset_id))?;
    if !matches!(asset.details, AssetDetails::Basic | AssetDetails::Deposit(_)) {
        return Err(CoreError::ValidationError(format!(
            "{} is not a cash asset",
            asset.description
        )));
    }
    Ok(asset)
}

fn tradeable_target(account: &mut Account, asset_id: Uuid) -> Result<&mut Asset, CoreError> {
    let asset = account
        .asset_mut(asset_id)
        .ok_or(CoreError::AssetNotFound(asset_id))?;
    if !asset.is_tradeable() {
        return Err(CoreError::ValidationError(format!(
            "{} cannot be bought or sold",
            asset.description
        )));
    }
    Ok(asset)
}

/// Debit `value`; cash balances may not go negative, debt may grow.
fn debit(asset: &mut Asset, value: f64) -> Result<(), CoreError> {
    let next = fix_rounding_error(asset.amount - value);
    if next < 0.0 && is_of_strict_type(asset.asset_type, AssetType::CASH) {
        return Err(CoreError::InsufficientBalance {
            asset: asset.description.clone(),
            available: asset.amount,
            requested: fix_rounding_error(value),
        });
    }
    asset.amount = next;
    Ok(())
}

/// Remove `amount` units oldest-lot first and return the average net and
/// gross buy prices of the units removed.
fn consume_fifo(asset: &mut Asset, amount: f64) -> Result<(f64, f64), CoreError> {
    if fix_rounding_error(asset.amount - amount) < 0.0 {
        return Err(CoreError::InsufficientBalance {
            asset: asset.description.clone(),
            available: asset.amount,
            requested: amount,
        });
    }
    let Some(holding) = asset.holding_mut() else {
        return Err(CoreError::ValidationError(format!(
            "{} has no positions",
            asset.description
        )));
    };

    let mut remaining = amount;
    let mut cost = 0.0;
    let mut gross_cost = 0.0;
    for position in holding.positions.iter_mut() {
        if !is_positive(remaining) {
            break;
        }
        let taken = position.amount.min(remaining);
        cost += taken * position.buy_price;
        gross_cost += taken * position.gross_buy_price;
        position.amount = fix_rounding_error(position.amount - taken);
        remaining = fix_rounding_error(remaining - taken);
    }
    holding.positions.retain(|p| is_positive(p.amount));
    asset.calculate_average_position_values();

    Ok((
        fix_rounding_error(safe_ratio(cost, amount)),
        fix_rounding_error(safe_ratio(gross_cost, amount)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::holding::Holding;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn fifo_consumes_oldest_lot_first() {
        let mut holding = Holding::new("ACME");
        holding.positions = vec![
            Position::new(10.0, 100.0, 101.0, d(2024, 1, 1)),
            Position::new(10.0, 120.0, 121.0, d(2024, 2, 1)),
        ];
        let mut asset = Asset::tradeable(AssetType::STOCK, "Acme", "USD", holding);

        let (buy, gross) = consume_fifo(&mut asset, 15.0).unwrap();
        assert!((buy - (10.0 * 100.0 + 5.0 * 120.0) / 15.0).abs() < 1e-6);
        assert!((gross - (10.0 * 101.0 + 5.0 * 121.0) / 15.0).abs() < 1e-6);
        assert_eq!(asset.amount, 5.0);
        assert_eq!(asset.positions().len(), 1);
        assert_eq!(asset.positions()[0].buy_price, 120.0);
    }

    #[test]
    fn rejects_non_positive_amount() {
        let tx = Transaction::new(
            TransactionType::Buy,
            Uuid::new_v4(),
            Uuid::new_v4(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            0.0,
            1.0,
            "USD",
        );
        assert!(matches!(validate(&tx), Err(CoreError::ValidationError(_))));
    }
}
