use crate::errors::CoreError;
use crate::models::analytics::PortfolioTotals;
use crate::models::history::{PortfolioHistoryEntry, TypeSnapshot};
use crate::storage::traits::{PortfolioStore, StoreOp};

/// Stores one portfolio snapshot per day.
pub struct HistoryService;

impl HistoryService {
    pub fn new() -> Self {
        Self
    }

    pub fn entry_for(&self, totals: &PortfolioTotals) -> PortfolioHistoryEntry {
        let by_type = totals
            .asset_type_totals
            .iter()
            .map(|(asset_type, value)| TypeSnapshot {
                asset_type: *asset_type,
                value: *value,
                profit_loss: totals
                    .asset_type_profit_loss
                    .get(asset_type)
                    .copied()
                    .unwrap_or(0.0),
            })
            .collect();
        PortfolioHistoryEntry {
            date: totals.as_of_date,
            total_value: totals.net_worth,
            total_profit_loss: totals.total_profit_loss(),
            by_type,
        }
    }

    /// Persist the entry for `totals.as_of_date`, replacing any earlier
    /// entry for that day.
    pub async fn record_today(
        &self,
        store: &dyn PortfolioStore,
        totals: &PortfolioTotals,
    ) -> Result<PortfolioHistoryEntry, CoreError> {
        let entry = self.entry_for(totals);
        store
            .commit(vec![StoreOp::PutHistoryEntry(entry.clone())])
            .await?;
        tracing::debug!(date = %entry.date, total_value = entry.total_value, "history entry recorded");
        Ok(entry)
    }
}

impl Default for HistoryService {
    fn default() -> Self {
        Self::new()
    }
}
