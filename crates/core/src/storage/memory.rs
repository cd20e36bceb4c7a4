//! In-memory store, used by tests and as the engine's default backend.

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex};

use crate::errors::CoreError;
use crate::models::account::Account;
use crate::models::history::PortfolioHistory;
use crate::models::notification::Notification;
use crate::models::recurring::RecurringTransaction;
use crate::models::settings::PortfolioConfig;
use crate::models::transaction::Transaction;

use super::snapshot::PortfolioSnapshot;
use super::traits::{ChangeOrigin, PortfolioStore, StoreChange, StoreOp};

const CHANGE_CHANNEL_CAPACITY: usize = 256;

pub struct MemoryStore {
    state: Mutex<PortfolioSnapshot>,
    changes: broadcast::Sender<StoreChange>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::from_snapshot(PortfolioSnapshot::default())
    }

    pub fn from_snapshot(snapshot: PortfolioSnapshot) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(snapshot),
            changes,
        }
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, CoreError> {
        Ok(Self::from_snapshot(PortfolioSnapshot::from_bytes(data)?))
    }

    pub async fn snapshot(&self) -> PortfolioSnapshot {
        self.state.lock().await.clone()
    }

    pub async fn to_bytes(&self) -> Result<Vec<u8>, CoreError> {
        self.state.lock().await.to_bytes()
    }

    /// Replace the whole state, e.g. after loading from disk.
    pub async fn restore(&self, snapshot: PortfolioSnapshot) {
        *self.state.lock().await = snapshot;
    }

    /// Apply ops that arrived from another device.
    pub async fn commit_remote(&self, ops: Vec<StoreOp>) -> Result<(), CoreError> {
        self.apply(ops, ChangeOrigin::Remote).await
    }

    async fn apply(&self, ops: Vec<StoreOp>, origin: ChangeOrigin) -> Result<(), CoreError> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        for op in &ops {
            apply_op(&mut next, op)?;
        }
        *state = next;
        drop(state);

        for op in &ops {
            // No subscribers is fine.
            let _ = self.changes.send(op.change(origin));
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_op(state: &mut PortfolioSnapshot, op: &StoreOp) -> Result<(), CoreError> {
    match op {
        StoreOp::PutAccount(account) => {
            match state.accounts.iter_mut().find(|a| a.id == account.id) {
                Some(slot) => *slot = account.clone(),
                None => state.accounts.push(account.clone()),
            }
        }
        StoreOp::DeleteAccount(id) => {
            let idx = state
                .accounts
                .iter()
                .position(|a| a.id == *id)
                .ok_or(CoreError::AccountNotFound(*id))?;
            state.accounts.remove(idx);
        }
        StoreOp::PutAsset { account_id, asset } => {
            let account = account_mut(state, *account_id)?;
            match account.assets.iter_mut().find(|a| a.id == asset.id) {
                Some(slot) => *slot = asset.clone(),
                None => account.assets.push(asset.clone()),
            }
        }
        StoreOp::DeleteAsset {
            account_id,
            asset_id,
        } => {
            let account = account_mut(state, *account_id)?;
            let idx = account
                .assets
                .iter()
                .position(|a| a.id == *asset_id)
                .ok_or(CoreError::AssetNotFound(*asset_id))?;
            account.assets.remove(idx);
        }
        StoreOp::AddTransaction(tx) => state.transactions.push(tx.clone()),
        StoreOp::DeleteTransaction(id) => {
            let idx = state
                .transactions
                .iter()
                .position(|t| t.id == *id)
                .ok_or(CoreError::TransactionNotFound(*id))?;
            state.transactions.remove(idx);
        }
        StoreOp::PutRecurring(rt) => {
            match state.recurring_transactions.iter_mut().find(|r| r.id == rt.id) {
                Some(slot) => *slot = rt.clone(),
                None => state.recurring_transactions.push(rt.clone()),
            }
        }
        StoreOp::DeleteRecurring(id) => {
            let idx = state
                .recurring_transactions
                .iter()
                .position(|r| r.id == *id)
                .ok_or(CoreError::RecurringTransactionNotFound(*id))?;
            state.recurring_transactions.remove(idx);
        }
        StoreOp::AddNotification(n) => state.notifications.push(n.clone()),
        StoreOp::DeleteNotification(id) => state.notifications.retain(|n| n.id != *id),
        StoreOp::PutConfig(config) => state.config = config.clone(),
        StoreOp::PutHistoryEntry(entry) => state.history.record(entry.clone()),
    }
    Ok(())
}

fn account_mut(state: &mut PortfolioSnapshot, id: uuid::Uuid) -> Result<&mut Account, CoreError> {
    state
        .accounts
        .iter_mut()
        .find(|a| a.id == id)
        .ok_or(CoreError::AccountNotFound(id))
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl PortfolioStore for MemoryStore {
    async fn get_accounts(&self) -> Result<Vec<Account>, CoreError> {
        Ok(self.state.lock().await.accounts.clone())
    }

    async fn get_transactions(&self) -> Result<Vec<Transaction>, CoreError> {
        Ok(self.state.lock().await.transactions.clone())
    }

    async fn get_recurring_transactions(&self) -> Result<Vec<RecurringTransaction>, CoreError> {
        Ok(self.state.lock().await.recurring_transactions.clone())
    }

    async fn get_notifications(&self) -> Result<Vec<Notification>, CoreError> {
        Ok(self.state.lock().await.notifications.clone())
    }

    async fn get_config(&self) -> Result<PortfolioConfig, CoreError> {
        Ok(self.state.lock().await.config.clone())
    }

    async fn get_history(&self) -> Result<PortfolioHistory, CoreError> {
        Ok(self.state.lock().await.history.clone())
    }

    async fn commit(&self, ops: Vec<StoreOp>) -> Result<(), CoreError> {
        self.apply(ops, ChangeOrigin::Local).await
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}
