use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::models::account::Account;
use crate::models::history::PortfolioHistory;
use crate::models::notification::Notification;
use crate::models::recurring::RecurringTransaction;
use crate::models::settings::PortfolioConfig;
use crate::models::transaction::Transaction;

/// Magic bytes identifying a portfolio snapshot.
pub const MAGIC: &[u8; 4] = b"PFTK";

/// Current snapshot format version.
pub const CURRENT_VERSION: u16 = 1;

/// magic(4) + version(2) + payload_len(8)
pub const HEADER_SIZE: usize = 14;

/// Everything the store holds. Collections are `Vec`s so that encoding is
/// deterministic and two snapshots of equal state are byte-identical.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub accounts: Vec<Account>,
    pub transactions: Vec<Transaction>,
    pub recurring_transactions: Vec<RecurringTransaction>,
    pub notifications: Vec<Notification>,
    pub config: PortfolioConfig,
    pub history: PortfolioHistory,
}

impl PortfolioSnapshot {
    /// Encode as bytes.
    ///
    /// Layout:
    /// ```text
    /// [PFTK: 4B] [version: 2B LE] [payload_len: 8B LE] [bincode payload]
    /// ```
    pub fn to_bytes(&self) -> Result<Vec<u8>, CoreError> {
        let payload = bincode::serialize(self)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize snapshot: {e}")))?;
        let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&CURRENT_VERSION.to_le_bytes());
        buf.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        buf.extend_from_slice(&payload);
        Ok(buf)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, CoreError> {
        if data.len() < HEADER_SIZE {
            return Err(CoreError::InvalidFileFormat(
                "Data too small to be a snapshot".into(),
            ));
        }
        if &data[0..4] != MAGIC {
            return Err(CoreError::InvalidFileFormat(
                "Invalid magic bytes, not a portfolio snapshot".into(),
            ));
        }
        let version = u16::from_le_bytes([data[4], data[5]]);
        if version == 0 || version > CURRENT_VERSION {
            return Err(CoreError::UnsupportedVersion(version));
        }
        let payload_len = u64::from_le_bytes(data[6..HEADER_SIZE].try_into().map_err(|_| {
            CoreError::InvalidFileFormat("Failed to read payload length".into())
        })?) as usize;
        let end = HEADER_SIZE
            .checked_add(payload_len)
            .ok_or_else(|| CoreError::InvalidFileFormat("Payload length overflow".into()))?;
        if data.len() < end {
            return Err(CoreError::InvalidFileFormat(format!(
                "Snapshot truncated: expected {payload_len} payload bytes, got {}",
                data.len() - HEADER_SIZE
            )));
        }
        bincode::deserialize(&data[HEADER_SIZE..end])
            .map_err(|e| CoreError::Deserialization(format!("Failed to deserialize snapshot: {e}")))
    }
}
