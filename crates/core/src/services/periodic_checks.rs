use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::notification_service::NotificationSink;
use super::projection_service::{
    bond_event, consume_bond_event, deposit_interest_event, deposit_liquidation_event,
    next_due_bond_event, MAX_SCHEDULE_ITERATIONS,
};
use super::transaction_service::TransactionService;
use crate::errors::CoreError;
use crate::models::account::{resolve_cash_asset, Account};
use crate::models::asset::Asset;
use crate::models::notification::{Notification, NotificationKind};
use crate::models::projection::ProjectedEvent;
use crate::models::recurring::RecurringTransaction;
use crate::models::transaction::Transaction;
use crate::storage::traits::{PortfolioStore, StoreOp};
use crate::util::clock::Clock;
use crate::util::dates::is_on_or_before_day;
use crate::util::floating::{fix_rounding_error, is_positive};

/// What one periodic check did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckReport {
    /// Transactions applied to balances.
    pub executed: usize,
    /// Events waiting on the user.
    pub pending: usize,
    /// Recurring transactions switched off after a failure.
    pub disabled: usize,
    /// Assets or schedules that could not be processed this run.
    pub errors: Vec<String>,
}

/// Executes everything that has come due: deposit maturities, bond and
/// P2P coupons and principal, and user recurring transactions.
///
/// Each event lands in one store commit together with the schedule
/// change that consumes it, so a second run right after the first finds
/// nothing left to do.
pub struct PeriodicChecksService {
    store: Arc<dyn PortfolioStore>,
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    transactions: TransactionService,
    running: Mutex<()>,
}

/// One event's worth of store ops plus the notifications it raised.
struct Batch {
    ops: Vec<StoreOp>,
    notifications: Vec<Notification>,
    executed: usize,
    pending: usize,
}

impl Batch {
    fn new() -> Self {
        Self {
            ops: Vec::new(),
            notifications: Vec::new(),
            executed: 0,
            pending: 0,
        }
    }

    fn done(&mut self, tx: &Transaction, now: DateTime<Utc>) {
        self.notifications.push(
            Notification::new(
                NotificationKind::TransactionDone,
                now,
                format!(
                    "{}: {} {:.2} {}",
                    tx.description, tx.tx_type, tx.value(), tx.currency
                ),
            )
            .with_transaction(tx.clone()),
        );
        self.executed += 1;
    }

    fn pending(&mut self, message: String, tx: Transaction, now: DateTime<Utc>) {
        self.notifications.push(
            Notification::new(NotificationKind::PendingTransaction, now, message)
                .with_transaction(tx),
        );
        self.pending += 1;
    }
}

impl PeriodicChecksService {
    pub fn new(
        store: Arc<dyn PortfolioStore>,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            sink,
            clock,
            transactions: TransactionService::new(),
            running: Mutex::new(()),
        }
    }

    /// Run every due check. Overlapping calls are serialized.
    pub async fn run(&self) -> Result<CheckReport, CoreError> {
        let _guard = self.running.lock().await;
        let now = self.clock.now();
        let today = now.date_naive();
        tracing::info!(%today, "running periodic checks");

        let mut accounts = self.store.get_accounts().await?;
        let mut report = CheckReport::default();

        self.check_deposits(&mut accounts, now, &mut report).await?;
        self.check_bonds(&mut accounts, now, &mut report).await?;
        self.check_recurring(&mut accounts, now, &mut report).await?;

        tracing::info!(
            executed = report.executed,
            pending = report.pending,
            disabled = report.disabled,
            errors = report.errors.len(),
            "periodic checks finished"
        );
        Ok(report)
    }

    async fn commit(&self, batch: Batch, report: &mut CheckReport) -> Result<(), CoreError> {
        let mut ops = batch.ops;
        ops.extend(
            batch
                .notifications
                .iter()
                .cloned()
                .map(StoreOp::AddNotification),
        );
        self.store.commit(ops).await?;
        report.executed += batch.executed;
        report.pending += batch.pending;
        for notification in &batch.notifications {
            self.sink.notify(notification);
        }
        Ok(())
    }

    // ── Deposits ────────────────────────────────────────────────────

    async fn check_deposits(
        &self,
        accounts: &mut [Account],
        now: DateTime<Utc>,
        report: &mut CheckReport,
    ) -> Result<(), CoreError> {
        let today = now.date_naive();
        for (account_id, asset_id) in due_assets(accounts, |a| {
            a.deposit_terms().is_some_and(|t| t.is_matured(today))
        }) {
            let mut iterations = 0;
            loop {
                let Some(asset) = find_asset(accounts, account_id, asset_id) else {
                    break;
                };
                if asset.pending_delete || !asset.deposit_terms().is_some_and(|t| t.is_matured(today)) {
                    break;
                }
                iterations += 1;
                if iterations > MAX_SCHEDULE_ITERATIONS {
                    report.errors.push(
                        CoreError::ScheduleLimitExceeded {
                            asset: asset.description.clone(),
                            iterations: MAX_SCHEDULE_ITERATIONS,
                        }
                        .to_string(),
                    );
                    break;
                }

                let Some(index) = accounts.iter().position(|a| a.id == account_id) else {
                    break;
                };
                let mut working = [accounts[index].clone()];
                match self.deposit_maturity(&mut working, account_id, asset_id, now) {
                    Ok(batch) => {
                        self.commit(batch, report).await?;
                        let [account] = working;
                        accounts[index] = account;
                    }
                    Err(e) => {
                        tracing::error!(%asset_id, error = %e, "deposit maturity failed");
                        report.errors.push(e.to_string());
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Handle one maturity: capitalize and renew, pay interest and renew,
    /// or pay interest and liquidate.
    fn deposit_maturity(
        &self,
        accounts: &mut [Account],
        account_id: Uuid,
        asset_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Batch, CoreError> {
        let mut batch = Batch::new();
        let account = accounts
            .iter()
            .find(|a| a.id == account_id)
            .ok_or(CoreError::AccountNotFound(account_id))?;
        let asset = account
            .asset(asset_id)
            .ok_or(CoreError::AssetNotFound(asset_id))?
            .clone();
        let terms = asset
            .deposit_terms()
            .cloned()
            .ok_or(CoreError::AssetNotFound(asset_id))?;
        if terms.auto_renew && terms.period() <= 0 {
            return Err(CoreError::ValidationError(format!(
                "{} cannot renew: maturity {} is not after creation {}",
                asset.description, terms.maturity_date, terms.creation_date
            )));
        }
        let cash_id = resolve_cash_asset(account, &asset);
        let interest = deposit_interest_event(account_id, &asset);

        if terms.auto_renew && terms.capitalize {
            let slot = asset_mut(accounts, account_id, asset_id)?;
            let payable = slot.deposit_payable_interest();
            slot.amount = fix_rounding_error(slot.amount + payable);
            if let Some(t) = slot.deposit_terms_mut() {
                t.renew();
            }
            batch.ops.push(StoreOp::PutAsset {
                account_id,
                asset: slot.clone(),
            });
            if let Some(event) = interest.filter(|e| is_positive(e.amount)) {
                let tx = event
                    .to_transaction(None, now)
                    .with_description(format!("{} capitalized interest", asset.description));
                batch.ops.push(StoreOp::AddTransaction(tx.clone()));
                batch.done(&tx, now);
            }
            return Ok(batch);
        }

        let Some(cash_id) = cash_id else {
            let message = format!("{} matured but has no unambiguous cash asset", asset.description);
            let slot = asset_mut(accounts, account_id, asset_id)?;
            let events = if terms.auto_renew {
                if let Some(t) = slot.deposit_terms_mut() {
                    t.renew();
                }
                vec![interest]
            } else {
                // Parked until the user books the payout.
                slot.pending_delete = true;
                vec![deposit_liquidation_event(account_id, &asset), interest]
            };
            batch.ops.push(StoreOp::PutAsset {
                account_id,
                asset: slot.clone(),
            });
            for event in events.into_iter().flatten().filter(|e| is_positive(e.amount)) {
                batch.pending(message.clone(), event.to_transaction(None, now), now);
            }
            return Ok(batch);
        };

        if let Some(event) = interest.filter(|e| is_positive(e.amount)) {
            self.execute_event(accounts, &event, cash_id, now, &mut batch)?;
        }

        if terms.auto_renew {
            let slot = asset_mut(accounts, account_id, asset_id)?;
            if let Some(t) = slot.deposit_terms_mut() {
                t.renew();
            }
            batch.ops.push(StoreOp::PutAsset {
                account_id,
                asset: slot.clone(),
            });
        } else if let Some(event) =
            deposit_liquidation_event(account_id, &asset).filter(|e| is_positive(e.amount))
        {
            self.execute_event(accounts, &event, cash_id, now, &mut batch)?;
        } else {
            if let Some(account) = accounts.iter_mut().find(|a| a.id == account_id) {
                account.assets.retain(|a| a.id != asset_id);
            }
            batch.ops.push(StoreOp::DeleteAsset {
                account_id,
                asset_id,
            });
        }
        Ok(batch)
    }

    fn execute_event(
        &self,
        accounts: &mut [Account],
        event: &ProjectedEvent,
        cash_id: Uuid,
        now: DateTime<Utc>,
        batch: &mut Batch,
    ) -> Result<(), CoreError> {
        let tx = event.to_transaction(Some(cash_id), now);
        let (recorded, ops) = self.transactions.apply(accounts, tx)?;
        batch.ops.extend(ops);
        batch.done(&recorded, now);
        tracing::info!(asset_id = %event.asset_id, tx_type = %event.tx_type, amount = event.amount, "scheduled event executed");
        Ok(())
    }

    // ── Bonds and P2P loans ─────────────────────────────────────────

    async fn check_bonds(
        &self,
        accounts: &mut [Account],
        now: DateTime<Utc>,
        report: &mut CheckReport,
    ) -> Result<(), CoreError> {
        let today = now.date_naive();
        for (account_id, asset_id) in due_assets(accounts, |a| is_bond_due(a, today)) {
            let mut iterations = 0;
            while let Some(asset) = find_asset(accounts, account_id, asset_id) {
                if asset.pending_delete || !is_bond_due(asset, today) {
                    break;
                }
                iterations += 1;
                if iterations > MAX_SCHEDULE_ITERATIONS {
                    report.errors.push(
                        CoreError::ScheduleLimitExceeded {
                            asset: asset.description.clone(),
                            iterations: MAX_SCHEDULE_ITERATIONS,
                        }
                        .to_string(),
                    );
                    break;
                }

                let Some(index) = accounts.iter().position(|a| a.id == account_id) else {
                    break;
                };
                let mut working = [accounts[index].clone()];
                match self.bond_payment(&mut working, account_id, asset_id, now) {
                    Ok(batch) => {
                        self.commit(batch, report).await?;
                        let [account] = working;
                        accounts[index] = account;
                    }
                    Err(e) => {
                        tracing::error!(%asset_id, error = %e, "bond payment failed");
                        report.errors.push(e.to_string());
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Consume the earliest due coupon or principal event.
    fn bond_payment(
        &self,
        accounts: &mut [Account],
        account_id: Uuid,
        asset_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Batch, CoreError> {
        let mut batch = Batch::new();
        let (event, projected, cash_id) = {
            let account = accounts
                .iter()
                .find(|a| a.id == account_id)
                .ok_or(CoreError::AccountNotFound(account_id))?;
            let asset = account
                .asset(asset_id)
                .ok_or(CoreError::AssetNotFound(asset_id))?;
            let event = next_due_bond_event(asset, now.date_naive())
                .ok_or(CoreError::AssetNotFound(asset_id))?;
            let projected = bond_event(account_id, asset, &event);
            (event, projected, resolve_cash_asset(account, asset))
        };

        consume_bond_event(asset_mut(accounts, account_id, asset_id)?, &event);

        if is_positive(projected.amount) {
            match cash_id {
                Some(cash_id) => {
                    self.execute_event(accounts, &projected, cash_id, now, &mut batch)?
                }
                None => batch.pending(
                    format!("{} has no unambiguous cash asset", projected.description),
                    projected.to_transaction(None, now),
                    now,
                ),
            }
        }

        let slot = asset_mut(accounts, account_id, asset_id)?;
        let repaid = slot.bond_terms().is_some_and(|t| t.is_fully_repaid());
        if repaid {
            tracing::info!(%asset_id, "bond fully repaid, removing");
            if let Some(account) = accounts.iter_mut().find(|a| a.id == account_id) {
                account.assets.retain(|a| a.id != asset_id);
            }
            batch.ops.push(StoreOp::DeleteAsset {
                account_id,
                asset_id,
            });
        } else {
            batch.ops.push(StoreOp::PutAsset {
                account_id,
                asset: slot.clone(),
            });
        }
        Ok(batch)
    }

    // ── Recurring transactions ──────────────────────────────────────

    async fn check_recurring(
        &self,
        accounts: &mut [Account],
        now: DateTime<Utc>,
        report: &mut CheckReport,
    ) -> Result<(), CoreError> {
        let recurring = self.store.get_recurring_transactions().await?;
        for mut rt in recurring.into_iter().filter(|rt| !rt.inactive) {
            let mut iterations = 0;
            // The advanced date can still be in the past, so keep going
            // until the schedule is caught up.
            while is_recurring_due(&rt, now) {
                iterations += 1;
                if iterations > MAX_SCHEDULE_ITERATIONS {
                    report.errors.push(
                        CoreError::ScheduleLimitExceeded {
                            asset: rt.tx.description.clone(),
                            iterations: MAX_SCHEDULE_ITERATIONS,
                        }
                        .to_string(),
                    );
                    break;
                }

                let mut batch = Batch::new();
                let mut occurrence = rt.tx.clone();
                occurrence.id = Uuid::new_v4();

                if rt.auto_approve {
                    // `apply` leaves the accounts untouched when it fails.
                    match self.transactions.apply(accounts, occurrence) {
                        Ok((recorded, ops)) => {
                            batch.ops.extend(ops);
                            batch.done(&recorded, now);
                            self.finish_occurrence(&mut rt, batch, report).await?;
                        }
                        Err(e) => {
                            self.disable(&mut rt, &e, now, report).await?;
                            break;
                        }
                    }
                } else {
                    batch.pending(
                        format!("{} is due and waiting for approval", rt.tx.description),
                        occurrence,
                        now,
                    );
                    self.finish_occurrence(&mut rt, batch, report).await?;
                }
            }
        }
        Ok(())
    }

    /// Advance the schedule (or delete it when exhausted) in the same commit
    /// as the occurrence it consumed.
    async fn finish_occurrence(
        &self,
        rt: &mut RecurringTransaction,
        mut batch: Batch,
        report: &mut CheckReport,
    ) -> Result<(), CoreError> {
        let recurring_id = rt.id;
        for notification in &mut batch.notifications {
            notification.recurring_id = Some(recurring_id);
        }
        if rt.advance() {
            batch.ops.push(StoreOp::PutRecurring(rt.clone()));
        } else {
            tracing::debug!(%recurring_id, "recurring transaction exhausted");
            batch.ops.push(StoreOp::DeleteRecurring(recurring_id));
            // Nothing left to recheck.
            rt.inactive = true;
        }
        self.commit(batch, report).await
    }

    async fn disable(
        &self,
        rt: &mut RecurringTransaction,
        error: &CoreError,
        now: DateTime<Utc>,
        report: &mut CheckReport,
    ) -> Result<(), CoreError> {
        tracing::error!(recurring_id = %rt.id, error = %error, "recurring transaction failed, disabling");
        rt.inactive = true;
        let notification = Notification::new(
            NotificationKind::RecurringDisabled,
            now,
            format!("{} was disabled: {error}", rt.tx.description),
        )
        .with_transaction(rt.tx.clone())
        .with_recurring(rt.id);
        let mut batch = Batch::new();
        batch.ops.push(StoreOp::PutRecurring(rt.clone()));
        batch.notifications.push(notification);
        self.commit(batch, report).await?;
        report.disabled += 1;
        report.errors.push(error.to_string());
        Ok(())
    }
}

fn is_bond_due(asset: &Asset, today: NaiveDate) -> bool {
    next_due_bond_event(asset, today).is_some()
}

fn is_recurring_due(rt: &RecurringTransaction, now: DateTime<Utc>) -> bool {
    !rt.inactive && is_on_or_before_day(rt.tx.date, now)
}

/// `(account_id, asset_id)` of every live asset matching `due`.
fn due_assets(accounts: &[Account], due: impl Fn(&Asset) -> bool) -> Vec<(Uuid, Uuid)> {
    let mut ids = Vec::new();
    for account in accounts {
        for asset in &account.assets {
            if !asset.pending_delete && due(asset) {
                ids.push((account.id, asset.id));
            }
        }
    }
    ids
}

fn find_asset(accounts: &[Account], account_id: Uuid, asset_id: Uuid) -> Option<&Asset> {
    accounts
        .iter()
        .find(|a| a.id == account_id)
        .and_then(|a| a.asset(asset_id))
}

fn asset_mut(accounts: &mut [Account], account_id: Uuid, asset_id: Uuid) -> Result<&mut Asset, CoreError> {
    accounts
        .iter_mut()
        .find(|a| a.id == account_id)
        .ok_or(CoreError::AccountNotFound(account_id))?
        .asset_mut(asset_id)
        .ok_or(CoreError::AssetNotFound(asset_id))
}
