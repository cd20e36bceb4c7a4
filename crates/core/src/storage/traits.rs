use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::account::Account;
use crate::models::asset::Asset;
use crate::models::history::{PortfolioHistory, PortfolioHistoryEntry};
use crate::models::notification::Notification;
use crate::models::recurring::RecurringTransaction;
use crate::models::settings::PortfolioConfig;
use crate::models::transaction::Transaction;

/// A single mutation. A `Vec<StoreOp>` is committed all-or-nothing, which is
/// how a balance update and the transaction that caused it land together.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    PutAccount(Account),
    DeleteAccount(Uuid),
    /// Insert or replace an asset inside an existing account.
    PutAsset { account_id: Uuid, asset: Asset },
    DeleteAsset { account_id: Uuid, asset_id: Uuid },
    AddTransaction(Transaction),
    DeleteTransaction(Uuid),
    PutRecurring(RecurringTransaction),
    DeleteRecurring(Uuid),
    AddNotification(Notification),
    DeleteNotification(Uuid),
    PutConfig(PortfolioConfig),
    PutHistoryEntry(PortfolioHistoryEntry),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Account,
    Asset,
    Transaction,
    RecurringTransaction,
    Notification,
    Config,
    History,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// Made by this process.
    Local,
    /// Pulled in by sync from another device.
    Remote,
}

/// Emitted on the change stream after every committed mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreChange {
    pub entity: EntityKind,
    pub id: Option<Uuid>,
    pub deleted: bool,
    pub origin: ChangeOrigin,
}

impl StoreOp {
    pub fn change(&self, origin: ChangeOrigin) -> StoreChange {
        let (entity, id, deleted) = match self {
            StoreOp::PutAccount(a) => (EntityKind::Account, Some(a.id), false),
            StoreOp::DeleteAccount(id) => (EntityKind::Account, Some(*id), true),
            StoreOp::PutAsset { asset, .. } => (EntityKind::Asset, Some(asset.id), false),
            StoreOp::DeleteAsset { asset_id, .. } => (EntityKind::Asset, Some(*asset_id), true),
            StoreOp::AddTransaction(tx) => (EntityKind::Transaction, Some(tx.id), false),
            StoreOp::DeleteTransaction(id) => (EntityKind::Transaction, Some(*id), true),
            StoreOp::PutRecurring(rt) => (EntityKind::RecurringTransaction, Some(rt.id), false),
            StoreOp::DeleteRecurring(id) => (EntityKind::RecurringTransaction, Some(*id), true),
            StoreOp::AddNotification(n) => (EntityKind::Notification, Some(n.id), false),
            StoreOp::DeleteNotification(id) => (EntityKind::Notification, Some(*id), true),
            StoreOp::PutConfig(_) => (EntityKind::Config, None, false),
            StoreOp::PutHistoryEntry(_) => (EntityKind::History, None, false),
        };
        StoreChange {
            entity,
            id,
            deleted,
            origin,
        }
    }
}

/// Persistence collaborator: typed reads, atomic batched writes and a
/// change-notification stream.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait PortfolioStore: Send + Sync {
    async fn get_accounts(&self) -> Result<Vec<Account>, CoreError>;

    async fn get_transactions(&self) -> Result<Vec<Transaction>, CoreError>;

    async fn get_recurring_transactions(&self) -> Result<Vec<RecurringTransaction>, CoreError>;

    async fn get_notifications(&self) -> Result<Vec<Notification>, CoreError>;

    async fn get_config(&self) -> Result<PortfolioConfig, CoreError>;

    async fn get_history(&self) -> Result<PortfolioHistory, CoreError>;

    /// Apply every op or none of them.
    async fn commit(&self, ops: Vec<StoreOp>) -> Result<(), CoreError>;

    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;

    // ── Lookups by id ───────────────────────────────────────────────

    async fn get_account(&self, id: Uuid) -> Result<Account, CoreError> {
        self.get_accounts()
            .await?
            .into_iter()
            .find(|a| a.id == id)
            .ok_or(CoreError::AccountNotFound(id))
    }

    async fn get_asset(&self, account_id: Uuid, asset_id: Uuid) -> Result<Asset, CoreError> {
        self.get_account(account_id)
            .await?
            .assets
            .into_iter()
            .find(|a| a.id == asset_id)
            .ok_or(CoreError::AssetNotFound(asset_id))
    }

    async fn get_transaction(&self, id: Uuid) -> Result<Transaction, CoreError> {
        self.get_transactions()
            .await?
            .into_iter()
            .find(|t| t.id == id)
            .ok_or(CoreError::TransactionNotFound(id))
    }

    async fn get_recurring_transaction(&self, id: Uuid) -> Result<RecurringTransaction, CoreError> {
        self.get_recurring_transactions()
            .await?
            .into_iter()
            .find(|t| t.id == id)
            .ok_or(CoreError::RecurringTransactionNotFound(id))
    }

    // ── Single-op conveniences ──────────────────────────────────────

    async fn put_account(&self, account: Account) -> Result<(), CoreError> {
        self.commit(vec![StoreOp::PutAccount(account)]).await
    }

    async fn put_asset(&self, account_id: Uuid, asset: Asset) -> Result<(), CoreError> {
        self.commit(vec![StoreOp::PutAsset { account_id, asset }]).await
    }

    async fn add_transaction(&self, tx: Transaction) -> Result<(), CoreError> {
        self.commit(vec![StoreOp::AddTransaction(tx)]).await
    }

    async fn put_recurring_transaction(&self, rt: RecurringTransaction) -> Result<(), CoreError> {
        self.commit(vec![StoreOp::PutRecurring(rt)]).await
    }

    async fn add_notification(&self, notification: Notification) -> Result<(), CoreError> {
        self.commit(vec![StoreOp::AddNotification(notification)]).await
    }

    async fn put_config(&self, config: PortfolioConfig) -> Result<(), CoreError> {
        self.commit(vec![StoreOp::PutConfig(config)]).await
    }
}
