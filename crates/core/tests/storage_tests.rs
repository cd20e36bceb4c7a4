// ═══════════════════════════════════════════════════════════════════
// Storage Tests: snapshot format, MemoryStore commits, change stream
// ═══════════════════════════════════════════════════════════════════

use chrono::{NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use portfolio_tracker_core::errors::CoreError;
use portfolio_tracker_core::models::account::Account;
use portfolio_tracker_core::models::asset::Asset;
use portfolio_tracker_core::models::history::PortfolioHistoryEntry;
use portfolio_tracker_core::models::notification::{Notification, NotificationKind};
use portfolio_tracker_core::models::recurring::{RecurrenceType, RecurringTransaction};
use portfolio_tracker_core::models::settings::PortfolioConfig;
use portfolio_tracker_core::models::transaction::{Transaction, TransactionType};
use portfolio_tracker_core::storage::memory::MemoryStore;
use portfolio_tracker_core::storage::snapshot::{PortfolioSnapshot, CURRENT_VERSION, HEADER_SIZE, MAGIC};
use portfolio_tracker_core::storage::traits::{ChangeOrigin, EntityKind, PortfolioStore, StoreOp};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn sample_snapshot() -> PortfolioSnapshot {
    let cash = Asset::cash("Checking", "EUR", 1234.56);
    let account = Account::with_assets("Bank", vec![cash.clone(), Asset::debt("Mortgage", "EUR", 90_000.0)]);
    let tx = Transaction::cash(
        TransactionType::CreditCash,
        account.id,
        cash.id,
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap(),
        250.0,
        "EUR",
    );
    let rt = RecurringTransaction::new(tx.clone(), RecurrenceType::Monthly).auto_approved();
    let notification = Notification::new(NotificationKind::TransactionDone, tx.date, "Salary").with_transaction(tx.clone());
    let mut snapshot = PortfolioSnapshot {
        accounts: vec![account],
        transactions: vec![tx],
        recurring_transactions: vec![rt],
        notifications: vec![notification],
        config: PortfolioConfig {
            base_currency: "EUR".into(),
            ..PortfolioConfig::default()
        },
        ..PortfolioSnapshot::default()
    };
    snapshot.history.record(PortfolioHistoryEntry {
        date: d(2024, 5, 1),
        total_value: 1234.56,
        total_profit_loss: 0.0,
        by_type: Vec::new(),
    });
    snapshot
}

// ═══════════════════════════════════════════════════════════════════
// Snapshot format
// ═══════════════════════════════════════════════════════════════════

mod snapshot_format {
    use super::*;

    #[test]
    fn roundtrip_preserves_everything() {
        let snapshot = sample_snapshot();
        let bytes = snapshot.to_bytes().unwrap();
        assert_eq!(PortfolioSnapshot::from_bytes(&bytes).unwrap(), snapshot);
    }

    #[test]
    fn header_layout() {
        let bytes = PortfolioSnapshot::default().to_bytes().unwrap();
        assert_eq!(&bytes[0..4], MAGIC);
        assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), CURRENT_VERSION);
        let payload_len = u64::from_le_bytes(bytes[6..HEADER_SIZE].try_into().unwrap()) as usize;
        assert_eq!(bytes.len(), HEADER_SIZE + payload_len);
    }

    #[test]
    fn equal_state_encodes_identically() {
        let snapshot = sample_snapshot();
        assert_eq!(snapshot.to_bytes().unwrap(), snapshot.clone().to_bytes().unwrap());
    }

    #[test]
    fn too_short_rejected() {
        let result = PortfolioSnapshot::from_bytes(b"PFTK");
        assert!(matches!(result, Err(CoreError::InvalidFileFormat(_))));
    }

    #[test]
    fn wrong_magic_rejected() {
        let mut bytes = PortfolioSnapshot::default().to_bytes().unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            PortfolioSnapshot::from_bytes(&bytes),
            Err(CoreError::InvalidFileFormat(_))
        ));
    }

    #[test]
    fn future_version_rejected() {
        let mut bytes = PortfolioSnapshot::default().to_bytes().unwrap();
        bytes[4..6].copy_from_slice(&(CURRENT_VERSION + 1).to_le_bytes());
        assert!(matches!(
            PortfolioSnapshot::from_bytes(&bytes),
            Err(CoreError::UnsupportedVersion(v)) if v == CURRENT_VERSION + 1
        ));
    }

    #[test]
    fn truncated_payload_rejected() {
        let bytes = sample_snapshot().to_bytes().unwrap();
        let cut = &bytes[..bytes.len() - 5];
        assert!(matches!(
            PortfolioSnapshot::from_bytes(cut),
            Err(CoreError::InvalidFileFormat(_))
        ));
    }

    #[test]
    fn garbage_payload_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&CURRENT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&3u64.to_le_bytes());
        bytes.extend_from_slice(&[0xFF, 0xFF, 0xFF]);
        assert!(matches!(
            PortfolioSnapshot::from_bytes(&bytes),
            Err(CoreError::Deserialization(_))
        ));
    }
}

// ═══════════════════════════════════════════════════════════════════
// MemoryStore
// ═══════════════════════════════════════════════════════════════════

mod memory_store {
    use super::*;

    #[tokio::test]
    async fn reads_back_snapshot() {
        let snapshot = sample_snapshot();
        let store = MemoryStore::from_snapshot(snapshot.clone());
        assert_eq!(store.get_accounts().await.unwrap(), snapshot.accounts);
        assert_eq!(store.get_transactions().await.unwrap(), snapshot.transactions);
        assert_eq!(store.get_config().await.unwrap().base_currency, "EUR");
        assert_eq!(store.get_history().await.unwrap().len(), 1);
        assert_eq!(store.snapshot().await, snapshot);
    }

    #[tokio::test]
    async fn bytes_roundtrip_through_store() {
        let store = MemoryStore::from_snapshot(sample_snapshot());
        let bytes = store.to_bytes().await.unwrap();
        let reloaded = MemoryStore::from_bytes(&bytes).unwrap();
        assert_eq!(reloaded.snapshot().await, store.snapshot().await);
    }

    #[tokio::test]
    async fn lookups_by_id() {
        let snapshot = sample_snapshot();
        let account = snapshot.accounts[0].clone();
        let store = MemoryStore::from_snapshot(snapshot);

        assert_eq!(store.get_account(account.id).await.unwrap(), account);
        let asset = store.get_asset(account.id, account.assets[0].id).await.unwrap();
        assert_eq!(asset.description, "Checking");

        let missing = Uuid::new_v4();
        assert!(matches!(store.get_account(missing).await, Err(CoreError::AccountNotFound(_))));
        assert!(matches!(store.get_asset(account.id, missing).await, Err(CoreError::AssetNotFound(_))));
        assert!(matches!(store.get_transaction(missing).await, Err(CoreError::TransactionNotFound(_))));
        assert!(matches!(
            store.get_recurring_transaction(missing).await,
            Err(CoreError::RecurringTransactionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn put_replaces_existing() {
        let store = MemoryStore::new();
        let mut account = Account::new("Bank");
        store.put_account(account.clone()).await.unwrap();
        account.description = "Renamed".into();
        store.put_account(account.clone()).await.unwrap();

        let accounts = store.get_accounts().await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].description, "Renamed");
    }

    #[tokio::test]
    async fn failed_commit_applies_nothing() {
        let store = MemoryStore::from_snapshot(sample_snapshot());
        let before = store.to_bytes().await.unwrap();
        let account_id = store.get_accounts().await.unwrap()[0].id;

        let result = store
            .commit(vec![
                StoreOp::PutAsset {
                    account_id,
                    asset: Asset::cash("Savings", "EUR", 1.0),
                },
                StoreOp::DeleteAsset {
                    account_id,
                    asset_id: Uuid::new_v4(),
                },
            ])
            .await;

        assert!(matches!(result, Err(CoreError::AssetNotFound(_))));
        assert_eq!(store.to_bytes().await.unwrap(), before);
    }

    #[tokio::test]
    async fn asset_in_unknown_account_rejected() {
        let store = MemoryStore::new();
        let result = store.put_asset(Uuid::new_v4(), Asset::cash("Cash", "USD", 1.0)).await;
        assert!(matches!(result, Err(CoreError::AccountNotFound(_))));
    }

    #[tokio::test]
    async fn history_entry_replaces_same_day() {
        let store = MemoryStore::new();
        for total in [1.0, 2.0] {
            store
                .commit(vec![StoreOp::PutHistoryEntry(PortfolioHistoryEntry {
                    date: d(2024, 5, 1),
                    total_value: total,
                    total_profit_loss: 0.0,
                    by_type: Vec::new(),
                })])
                .await
                .unwrap();
        }
        let history = store.get_history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history.get(d(2024, 5, 1)).unwrap().total_value, 2.0);
    }

    #[tokio::test]
    async fn deleting_unknown_notification_is_fine() {
        let store = MemoryStore::from_snapshot(sample_snapshot());
        store.commit(vec![StoreOp::DeleteNotification(Uuid::new_v4())]).await.unwrap();
        assert_eq!(store.get_notifications().await.unwrap().len(), 1);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Change stream
// ═══════════════════════════════════════════════════════════════════

mod change_stream {
    use super::*;

    #[tokio::test]
    async fn local_commit_emits_one_change_per_op() {
        let store = MemoryStore::new();
        let mut changes = store.subscribe();
        let account = Account::new("Bank");
        let account_id = account.id;

        store
            .commit(vec![
                StoreOp::PutAccount(account),
                StoreOp::PutConfig(PortfolioConfig::default()),
            ])
            .await
            .unwrap();

        let first = changes.recv().await.unwrap();
        assert_eq!(first.entity, EntityKind::Account);
        assert_eq!(first.id, Some(account_id));
        assert!(!first.deleted);
        assert_eq!(first.origin, ChangeOrigin::Local);

        let second = changes.recv().await.unwrap();
        assert_eq!(second.entity, EntityKind::Config);
        assert_eq!(second.id, None);
    }

    #[tokio::test]
    async fn remote_commit_is_tagged() {
        let store = MemoryStore::from_snapshot(sample_snapshot());
        let tx_id = store.get_transactions().await.unwrap()[0].id;
        let mut changes = store.subscribe();

        store.commit_remote(vec![StoreOp::DeleteTransaction(tx_id)]).await.unwrap();

        let change = changes.recv().await.unwrap();
        assert_eq!(change.entity, EntityKind::Transaction);
        assert!(change.deleted);
        assert_eq!(change.origin, ChangeOrigin::Remote);
        assert!(store.get_transactions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_commit_emits_nothing() {
        let store = MemoryStore::new();
        let mut changes = store.subscribe();
        let result = store.commit(vec![StoreOp::DeleteAccount(Uuid::new_v4())]).await;
        assert!(result.is_err());
        assert!(changes.try_recv().is_err());
    }
}
