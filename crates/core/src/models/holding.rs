use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::util::floating::{fix_rounding_error, safe_ratio};

/// Geographic bucket used for allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Region {
    NorthAmerica,
    Europe,
    AsiaPacific,
    EmergingMarkets,
    Global,
    Unspecified,
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Region::NorthAmerica => write!(f, "North America"),
            Region::Europe => write!(f, "Europe"),
            Region::AsiaPacific => write!(f, "Asia-Pacific"),
            Region::EmergingMarkets => write!(f, "Emerging Markets"),
            Region::Global => write!(f, "Global"),
            Region::Unspecified => write!(f, "Unspecified"),
        }
    }
}

/// Share of an instrument's exposure attributed to one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionWeight {
    pub region: Region,
    /// Fraction in `[0, 1]`.
    pub weight: f64,
}

/// One open lot of a tradeable asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: Uuid,
    pub amount: f64,
    /// Net unit price (excluding fees).
    pub buy_price: f64,
    /// Unit price including fees and spread.
    pub gross_buy_price: f64,
    pub buy_date: NaiveDate,
}

impl Position {
    pub fn new(amount: f64, buy_price: f64, gross_buy_price: f64, buy_date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            amount,
            buy_price,
            gross_buy_price,
            buy_date,
        }
    }
}

/// Position-level state shared by every tradeable instrument.
///
/// `buy_price` and `gross_buy_price` are derived from `positions` by
/// [`Holding::recalculate`]; they are never set independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    /// Quote symbol (ticker, ISIN, ...).
    pub symbol: String,
    pub positions: Vec<Position>,
    pub buy_price: f64,
    pub gross_buy_price: f64,
    /// Latest unit price in the asset's currency.
    pub current_price: f64,
    #[serde(default)]
    pub region: Option<Region>,
    #[serde(default)]
    pub custom_regions: Vec<RegionWeight>,
}

impl Holding {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into().to_uppercase(),
            positions: Vec::new(),
            buy_price: 0.0,
            gross_buy_price: 0.0,
            current_price: 0.0,
            region: None,
            custom_regions: Vec::new(),
        }
    }

    /// Recompute the weighted-average buy prices and return the total amount.
    pub fn recalculate(&mut self) -> f64 {
        let mut amount = 0.0;
        let mut cost = 0.0;
        let mut gross_cost = 0.0;
        for position in &self.positions {
            amount += position.amount;
            cost += position.amount * position.buy_price;
            gross_cost += position.amount * position.gross_buy_price;
        }
        let amount = fix_rounding_error(amount);
        self.buy_price = fix_rounding_error(safe_ratio(cost, amount));
        self.gross_buy_price = fix_rounding_error(safe_ratio(gross_cost, amount));
        amount
    }

    /// Region exposure weights: the custom split when given, else the single
    /// region at full weight, else `Unspecified`.
    pub fn region_weights(&self) -> Vec<RegionWeight> {
        if !self.custom_regions.is_empty() {
            return self.custom_regions.clone();
        }
        vec![RegionWeight {
            region: self.region.unwrap_or(Region::Unspecified),
            weight: 1.0,
        }]
    }

    pub fn position(&self, position_id: Uuid) -> Option<&Position> {
        self.positions.iter().find(|p| p.id == position_id)
    }
}
