use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::asset_type::AssetType;

/// Value and unrealized P/L of one broad asset type on a day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeSnapshot {
    pub asset_type: AssetType,
    pub value: f64,
    pub profit_loss: f64,
}

/// Portfolio totals for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioHistoryEntry {
    pub date: NaiveDate,
    pub total_value: f64,
    pub total_profit_loss: f64,
    pub by_type: Vec<TypeSnapshot>,
}

/// Daily portfolio history, at most one entry per day.
///
/// Entries stay sorted by date so lookups and inserts are binary searches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioHistory {
    pub entries: Vec<PortfolioHistoryEntry>,
}

impl PortfolioHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, replacing an existing one for the same day.
    pub fn record(&mut self, entry: PortfolioHistoryEntry) {
        match self.entries.binary_search_by_key(&entry.date, |e| e.date) {
            Ok(idx) => self.entries[idx] = entry,
            Err(idx) => self.entries.insert(idx, entry),
        }
    }

    pub fn get(&self, date: NaiveDate) -> Option<&PortfolioHistoryEntry> {
        self.entries
            .binary_search_by_key(&date, |e| e.date)
            .ok()
            .map(|idx| &self.entries[idx])
    }

    /// Entries within `[from, to]`.
    pub fn range(&self, from: NaiveDate, to: NaiveDate) -> &[PortfolioHistoryEntry] {
        let start = self
            .entries
            .binary_search_by_key(&from, |e| e.date)
            .unwrap_or_else(|pos| pos);
        let end = self
            .entries
            .binary_search_by_key(&to, |e| e.date)
            .map(|pos| pos + 1)
            .unwrap_or_else(|pos| pos);
        if start >= end {
            return &[];
        }
        &self.entries[start..end]
    }

    /// Latest entry on or before `date`.
    pub fn latest_on_or_before(&self, date: NaiveDate) -> Option<&PortfolioHistoryEntry> {
        let idx = match self.entries.binary_search_by_key(&date, |e| e.date) {
            Ok(idx) => idx,
            Err(0) => return None,
            Err(pos) => pos - 1,
        };
        self.entries.get(idx)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
