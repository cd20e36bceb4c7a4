use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::asset::Asset;
use super::asset_type::{is_of_strict_type, AssetType};

/// A brokerage, bank or wallet grouping assets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub description: String,
    pub assets: Vec<Asset>,
}

impl Account {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            assets: Vec::new(),
        }
    }

    pub fn with_assets(description: impl Into<String>, assets: Vec<Asset>) -> Self {
        Self {
            assets,
            ..Self::new(description)
        }
    }

    pub fn asset(&self, asset_id: Uuid) -> Option<&Asset> {
        self.assets.iter().find(|a| a.id == asset_id)
    }

    pub fn asset_mut(&mut self, asset_id: Uuid) -> Option<&mut Asset> {
        self.assets.iter_mut().find(|a| a.id == asset_id)
    }

    /// Cash assets held in `currency`.
    pub fn cash_assets_in(&self, currency: &str) -> Vec<&Asset> {
        self.assets
            .iter()
            .filter(|a| is_of_strict_type(a.asset_type, AssetType::CASH))
            .filter(|a| a.currency.eq_ignore_ascii_case(currency))
            .collect()
    }
}

/// Find the cash asset that settles cash flows of `asset`.
///
/// An explicit `cash_asset_id` wins. Otherwise the account must hold exactly
/// one cash asset in the asset's currency; zero or several is ambiguous and
/// yields `None`.
pub fn resolve_cash_asset(account: &Account, asset: &Asset) -> Option<Uuid> {
    if let Some(id) = asset.cash_asset_id {
        if account.asset(id).is_some() {
            return Some(id);
        }
    }
    match account.cash_assets_in(&asset.currency).as_slice() {
        [only] => Some(only.id),
        _ => None,
    }
}
