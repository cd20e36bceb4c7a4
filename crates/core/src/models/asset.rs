use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::asset_type::AssetType;
use super::bond::BondTerms;
use super::deposit::DepositTerms;
use super::holding::{Holding, Position};
use crate::util::floating::fix_rounding_error;

/// Type-specific state of an asset. Valuation and accrual dispatch on this
/// instead of an inheritance chain; the bond variant reuses the tradeable
/// computation and adds accrued interest on top.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AssetDetails {
    /// Cash, debt and anything else valued at its nominal balance.
    Basic,
    Deposit(DepositTerms),
    Tradeable(Holding),
    Bond { holding: Holding, terms: BondTerms },
}

/// A tracked asset inside an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: Uuid,
    /// Unit count for tradeable assets, balance otherwise.
    pub amount: f64,
    /// ISO 4217 code, uppercased.
    pub currency: String,
    pub description: String,
    pub asset_type: AssetType,
    /// Settlement account for buys, sells and interest.
    #[serde(default)]
    pub cash_asset_id: Option<Uuid>,
    /// Soft-delete marker while the asset waits for a cash asset to be resolved.
    #[serde(default)]
    pub pending_delete: bool,
    pub details: AssetDetails,
}

impl Asset {
    fn with_details(
        asset_type: AssetType,
        description: impl Into<String>,
        currency: impl Into<String>,
        amount: f64,
        details: AssetDetails,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            amount,
            currency: currency.into().to_uppercase(),
            description: description.into(),
            asset_type,
            cash_asset_id: None,
            pending_delete: false,
            details,
        }
    }

    pub fn cash(description: impl Into<String>, currency: impl Into<String>, amount: f64) -> Self {
        Self::with_details(AssetType::CASH, description, currency, amount, AssetDetails::Basic)
    }

    /// Debt balances are stored negative.
    pub fn debt(description: impl Into<String>, currency: impl Into<String>, amount: f64) -> Self {
        Self::with_details(
            AssetType::DEBT,
            description,
            currency,
            -amount.abs(),
            AssetDetails::Basic,
        )
    }

    pub fn deposit(
        description: impl Into<String>,
        currency: impl Into<String>,
        amount: f64,
        terms: DepositTerms,
    ) -> Self {
        Self::with_details(
            AssetType::DEPOSIT,
            description,
            currency,
            amount,
            AssetDetails::Deposit(terms),
        )
    }

    pub fn tradeable(
        asset_type: AssetType,
        description: impl Into<String>,
        currency: impl Into<String>,
        holding: Holding,
    ) -> Self {
        let mut asset = Self::with_details(
            asset_type,
            description,
            currency,
            0.0,
            AssetDetails::Tradeable(holding),
        );
        asset.calculate_average_position_values();
        asset
    }

    /// A bond or P2P loan.
    pub fn bond(
        asset_type: AssetType,
        description: impl Into<String>,
        currency: impl Into<String>,
        holding: Holding,
        terms: BondTerms,
    ) -> Self {
        let mut asset = Self::with_details(
            asset_type,
            description,
            currency,
            0.0,
            AssetDetails::Bond { holding, terms },
        );
        asset.calculate_average_position_values();
        asset
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn holding(&self) -> Option<&Holding> {
        match &self.details {
            AssetDetails::Tradeable(holding) | AssetDetails::Bond { holding, .. } => Some(holding),
            _ => None,
        }
    }

    pub fn holding_mut(&mut self) -> Option<&mut Holding> {
        match &mut self.details {
            AssetDetails::Tradeable(holding) | AssetDetails::Bond { holding, .. } => Some(holding),
            _ => None,
        }
    }

    pub fn bond_terms(&self) -> Option<&BondTerms> {
        match &self.details {
            AssetDetails::Bond { terms, .. } => Some(terms),
            _ => None,
        }
    }

    pub fn bond_terms_mut(&mut self) -> Option<&mut BondTerms> {
        match &mut self.details {
            AssetDetails::Bond { terms, .. } => Some(terms),
            _ => None,
        }
    }

    pub fn deposit_terms(&self) -> Option<&DepositTerms> {
        match &self.details {
            AssetDetails::Deposit(terms) => Some(terms),
            _ => None,
        }
    }

    pub fn deposit_terms_mut(&mut self) -> Option<&mut DepositTerms> {
        match &mut self.details {
            AssetDetails::Deposit(terms) => Some(terms),
            _ => None,
        }
    }

    pub fn is_tradeable(&self) -> bool {
        self.holding().is_some()
    }

    pub fn positions(&self) -> &[Position] {
        self.holding().map(|h| h.positions.as_slice()).unwrap_or(&[])
    }

    // ── Positions ───────────────────────────────────────────────────

    /// Re-derive `amount`, `buy_price` and `gross_buy_price` from the
    /// positions. Must run after every position mutation.
    pub fn calculate_average_position_values(&mut self) {
        let amount = match &mut self.details {
            AssetDetails::Tradeable(holding) | AssetDetails::Bond { holding, .. } => {
                holding.recalculate()
            }
            _ => return,
        };
        self.amount = amount;
    }

    pub fn add_position(&mut self, position: Position) {
        if let Some(holding) = self.holding_mut() {
            holding.positions.push(position);
            holding.positions.sort_by_key(|p| p.buy_date);
        }
        self.calculate_average_position_values();
    }

    pub fn remove_position(&mut self, position_id: Uuid) -> Option<Position> {
        let holding = self.holding_mut()?;
        let idx = holding.positions.iter().position(|p| p.id == position_id)?;
        let removed = holding.positions.remove(idx);
        self.calculate_average_position_values();
        Some(removed)
    }

    pub fn update_position(&mut self, position: Position) -> bool {
        let Some(holding) = self.holding_mut() else {
            return false;
        };
        let Some(slot) = holding.positions.iter_mut().find(|p| p.id == position.id) else {
            return false;
        };
        *slot = position;
        holding.positions.sort_by_key(|p| p.buy_date);
        self.calculate_average_position_values();
        true
    }

    // ── Valuation ───────────────────────────────────────────────────

    /// Value in the asset's own currency.
    pub fn current_value(&self, as_of: NaiveDate) -> f64 {
        match &self.details {
            AssetDetails::Basic | AssetDetails::Deposit(_) => self.amount,
            AssetDetails::Tradeable(holding) => self.market_value(holding),
            AssetDetails::Bond { holding, .. } => fix_rounding_error(
                self.market_value(holding) + self.full_accrued_interest(as_of),
            ),
        }
    }

    fn market_value(&self, holding: &Holding) -> f64 {
        fix_rounding_error(self.amount * holding.current_price)
    }

    /// Per-unit interest accrued since the previous coupon (bonds only).
    pub fn accrued_interest(&self, as_of: NaiveDate) -> f64 {
        self.bond_terms()
            .map(|terms| terms.accrued_interest(as_of))
            .unwrap_or(0.0)
    }

    /// Units held on `date`: positions bought strictly before it. On the
    /// maturity date every position counts, including ones bought that day.
    pub fn amount_at_date(&self, date: NaiveDate) -> f64 {
        if self.bond_terms().is_some_and(|t| t.maturity_date == date) {
            return self.amount;
        }
        fix_rounding_error(
            self.positions()
                .iter()
                .filter(|p| p.buy_date < date)
                .map(|p| p.amount)
                .sum(),
        )
    }

    /// Coupon owed for all units held on `date`.
    pub fn full_interest_at_date(&self, date: NaiveDate) -> f64 {
        fix_rounding_error(self.accrued_interest(date) * self.amount_at_date(date))
    }

    pub fn payable_interest_at_date(&self, date: NaiveDate) -> f64 {
        let full = self.full_interest_at_date(date);
        self.bond_terms().map(|t| t.payable(full)).unwrap_or(full)
    }

    pub fn withholding_tax_at_date(&self, date: NaiveDate) -> f64 {
        let full = self.full_interest_at_date(date);
        self.bond_terms().map(|t| t.withholding(full)).unwrap_or(0.0)
    }

    /// Interest accrued up to `as_of`, for the units that will receive the
    /// next payment.
    pub fn full_accrued_interest(&self, as_of: NaiveDate) -> f64 {
        let Some(terms) = self.bond_terms() else {
            return 0.0;
        };
        let payment_date = terms.next_interest_date().unwrap_or(terms.maturity_date);
        fix_rounding_error(terms.accrued_interest(as_of) * self.amount_at_date(payment_date))
    }

    // ── Deposits ────────────────────────────────────────────────────

    pub fn deposit_full_interest(&self) -> f64 {
        self.deposit_terms()
            .map(|t| t.full_interest(self.amount))
            .unwrap_or(0.0)
    }

    pub fn deposit_payable_interest(&self) -> f64 {
        self.deposit_terms()
            .map(|t| t.payable_interest(self.amount))
            .unwrap_or(0.0)
    }

    pub fn deposit_withholding_tax(&self) -> f64 {
        self.deposit_terms()
            .map(|t| t.withholding_tax(self.amount))
            .unwrap_or(0.0)
    }
}
