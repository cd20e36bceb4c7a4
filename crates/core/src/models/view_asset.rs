use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::account::Account;
use super::asset::Asset;
use super::holding::Position;

/// What a view row is valued from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ViewSource {
    /// Non-tradeable asset valued as a whole.
    Asset,
    /// Tradeable asset with exactly this one open position.
    Position(Position),
    /// One child row per open position; this row holds their sums.
    Children(Vec<ViewAsset>),
}

/// Valuation row for one asset in one account. Rebuilt on every pass,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewAsset {
    pub account_id: Uuid,
    pub account_description: String,
    /// Snapshot of the asset this row was built from.
    pub asset: Asset,
    pub source: ViewSource,
    pub initial_value: f64,
    pub current_value: f64,
    pub initial_value_base_currency: f64,
    pub current_value_base_currency: f64,
    pub profit_loss: f64,
    /// Fraction, 0 when there is no initial value.
    pub profit_loss_percent: f64,
}

impl ViewAsset {
    pub fn new(asset: &Asset, account: &Account, source: ViewSource) -> Self {
        Self {
            account_id: account.id,
            account_description: account.description.clone(),
            asset: asset.clone(),
            source,
            initial_value: 0.0,
            current_value: 0.0,
            initial_value_base_currency: 0.0,
            current_value_base_currency: 0.0,
            profit_loss: 0.0,
            profit_loss_percent: 0.0,
        }
    }

    pub fn asset_id(&self) -> Uuid {
        self.asset.id
    }

    pub fn position(&self) -> Option<&Position> {
        match &self.source {
            ViewSource::Position(p) => Some(p),
            _ => None,
        }
    }

    pub fn children(&self) -> &[ViewAsset] {
        match &self.source {
            ViewSource::Children(children) => children,
            _ => &[],
        }
    }

    pub fn profit_loss_base_currency(&self) -> f64 {
        self.current_value_base_currency - self.initial_value_base_currency
    }
}
