use chrono::NaiveDate;
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::account::Account;
use crate::models::asset::Asset;
use crate::models::bond::PrincipalPayment;
use crate::models::projection::ProjectedEvent;
use crate::models::recurring::RecurringTransaction;
use crate::models::transaction::TransactionType;
use crate::util::floating::fix_rounding_error;

/// Upper bound on events walked for one asset or recurring schedule.
pub const MAX_SCHEDULE_ITERATIONS: usize = 10_000;

/// The next cash event of a bond or P2P loan.
#[derive(Debug, Clone, PartialEq)]
pub enum BondEvent {
    Coupon(NaiveDate),
    Principal(PrincipalPayment),
}

impl BondEvent {
    pub fn date(&self) -> NaiveDate {
        match self {
            BondEvent::Coupon(date) => *date,
            BondEvent::Principal(payment) => payment.date,
        }
    }
}

/// The bond event the periodic check should execute on `today`: a due
/// coupon first, so it accrues on the principal outstanding before any
/// repayment, then a due principal payment.
pub fn next_due_bond_event(asset: &Asset, today: NaiveDate) -> Option<BondEvent> {
    let terms = asset.bond_terms()?;
    if let Some(coupon) = terms.next_interest_date().filter(|c| *c <= today) {
        return Some(BondEvent::Coupon(coupon));
    }
    terms
        .next_principal_payment()
        .filter(|p| p.date <= today)
        .map(BondEvent::Principal)
}

/// Cash flow for `event`, computed against the asset's current terms.
pub fn bond_event(account_id: Uuid, asset: &Asset, event: &BondEvent) -> ProjectedEvent {
    match event {
        BondEvent::Coupon(date) => ProjectedEvent {
            date: *date,
            tx_type: TransactionType::Interest,
            account_id,
            asset_id: asset.id,
            description: format!("{} coupon", asset.description),
            amount: asset.payable_interest_at_date(*date),
            rate: 1.0,
            currency: asset.currency.clone(),
            withholding_tax: asset.withholding_tax_at_date(*date),
            recurring_id: None,
        },
        BondEvent::Principal(payment) => ProjectedEvent {
            date: payment.date,
            tx_type: TransactionType::PrincipalPayment,
            account_id,
            asset_id: asset.id,
            description: format!("{} principal", asset.description),
            amount: fix_rounding_error(payment.amount * asset.amount_at_date(payment.date)),
            rate: 1.0,
            currency: asset.currency.clone(),
            withholding_tax: 0.0,
            recurring_id: None,
        },
    }
}

/// Pop `event` from the asset's schedule.
pub fn consume_bond_event(asset: &mut Asset, event: &BondEvent) {
    let Some(terms) = asset.bond_terms_mut() else {
        return;
    };
    match event {
        BondEvent::Coupon(_) => {
            terms.consume_interest_payment();
        }
        BondEvent::Principal(payment) => terms.consume_principal_payment(payment),
    }
}

pub fn deposit_interest_event(account_id: Uuid, asset: &Asset) -> Option<ProjectedEvent> {
    let terms = asset.deposit_terms()?;
    Some(ProjectedEvent {
        date: terms.maturity_date,
        tx_type: TransactionType::Interest,
        account_id,
        asset_id: asset.id,
        description: format!("{} interest", asset.description),
        amount: asset.deposit_payable_interest(),
        rate: 1.0,
        currency: asset.currency.clone(),
        withholding_tax: asset.deposit_withholding_tax(),
        recurring_id: None,
    })
}

pub fn deposit_liquidation_event(account_id: Uuid, asset: &Asset) -> Option<ProjectedEvent> {
    let terms = asset.deposit_terms()?;
    Some(ProjectedEvent {
        date: terms.maturity_date,
        tx_type: TransactionType::DepositLiquidation,
        account_id,
        asset_id: asset.id,
        description: format!("{} liquidation", asset.description),
        amount: asset.amount,
        rate: 1.0,
        currency: asset.currency.clone(),
        withholding_tax: 0.0,
        recurring_id: None,
    })
}

/// Derives future cash flows from asset terms and recurring templates
/// without touching the stored entities.
pub struct ProjectionService;

impl ProjectionService {
    pub fn new() -> Self {
        Self
    }

    /// Every remaining coupon and principal event of a bond or P2P loan, up
    /// to `until` when given. Works on a copy of the asset.
    ///
    /// Each round pays the next coupon, then the next principal payment if
    /// it is dated before the coupon that follows.
    pub fn bond_events(
        &self,
        account_id: Uuid,
        asset: &Asset,
        until: Option<NaiveDate>,
    ) -> Result<Vec<ProjectedEvent>, CoreError> {
        let mut bond = asset.clone();
        let mut events = Vec::new();
        let emit = |bond: &mut Asset, event: BondEvent, events: &mut Vec<ProjectedEvent>| {
            let projected = bond_event(account_id, bond, &event);
            if until.map_or(true, |u| projected.date <= u) {
                events.push(projected);
            }
            consume_bond_event(bond, &event);
        };

        for _ in 0..MAX_SCHEDULE_ITERATIONS {
            let Some(terms) = bond.bond_terms() else {
                return Ok(events);
            };
            let coupon = terms.next_interest_date();
            let principal = terms.next_principal_payment();
            // Both schedules are date ordered, so nothing further can fall
            // inside the window.
            if let Some(u) = until {
                let past = |date: Option<NaiveDate>| date.map_or(true, |d| d > u);
                if past(coupon) && past(principal.as_ref().map(|p| p.date)) {
                    return Ok(events);
                }
            }

            // The coupon is paid on the principal outstanding before this
            // round's repayment.
            let mut progressed = false;
            if let Some(date) = coupon {
                emit(&mut bond, BondEvent::Coupon(date), &mut events);
                progressed = true;
            }

            let Some(terms) = bond.bond_terms() else {
                return Ok(events);
            };
            let next_coupon = terms.next_interest_date();
            if let Some(payment) = terms.next_principal_payment() {
                if next_coupon.map_or(true, |c| payment.date < c) {
                    emit(&mut bond, BondEvent::Principal(payment), &mut events);
                    progressed = true;
                }
            }

            if !progressed {
                return Ok(events);
            }
        }
        Err(CoreError::ScheduleLimitExceeded {
            asset: asset.description.clone(),
            iterations: MAX_SCHEDULE_ITERATIONS,
        })
    }

    /// Events at the deposit's maturity: interest only when it renews and
    /// pays out, nothing when it renews and capitalizes, liquidation then
    /// interest when it does not renew.
    pub fn deposit_events(&self, account_id: Uuid, asset: &Asset) -> Vec<ProjectedEvent> {
        let Some(terms) = asset.deposit_terms() else {
            return Vec::new();
        };
        match (terms.auto_renew, terms.capitalize) {
            (true, true) => Vec::new(),
            (true, false) => deposit_interest_event(account_id, asset).into_iter().collect(),
            (false, _) => deposit_liquidation_event(account_id, asset)
                .into_iter()
                .chain(deposit_interest_event(account_id, asset))
                .collect(),
        }
    }

    /// Occurrences of a recurring template up to and including `until`.
    pub fn recurring_occurrences(
        &self,
        rt: &RecurringTransaction,
        until: NaiveDate,
    ) -> Result<Vec<ProjectedEvent>, CoreError> {
        if rt.inactive {
            return Ok(Vec::new());
        }
        let mut schedule = rt.clone();
        let mut events = Vec::new();
        while schedule.tx.date.date_naive() <= until {
            if events.len() >= MAX_SCHEDULE_ITERATIONS {
                return Err(CoreError::ScheduleLimitExceeded {
                    asset: rt.tx.description.clone(),
                    iterations: MAX_SCHEDULE_ITERATIONS,
                });
            }
            let tx = &schedule.tx;
            events.push(ProjectedEvent {
                date: tx.date.date_naive(),
                tx_type: tx.tx_type,
                account_id: tx.account_id,
                asset_id: tx.asset_id,
                description: tx.description.clone(),
                amount: tx.amount,
                rate: tx.rate,
                currency: tx.currency.clone(),
                withholding_tax: tx.withholding_tax,
                recurring_id: Some(rt.id),
            });
            if !schedule.advance() {
                break;
            }
        }
        Ok(events)
    }

    /// Everything scheduled up to `until` across all accounts and recurring
    /// templates, sorted by date.
    pub fn upcoming(
        &self,
        accounts: &[Account],
        recurring: &[RecurringTransaction],
        until: NaiveDate,
    ) -> Result<Vec<ProjectedEvent>, CoreError> {
        let mut events = Vec::new();
        for account in accounts {
            for asset in &account.assets {
                if asset.pending_delete {
                    continue;
                }
                if asset.bond_terms().is_some() {
                    events.extend(self.bond_events(account.id, asset, Some(until))?);
                } else if asset
                    .deposit_terms()
                    .is_some_and(|t| t.maturity_date <= until)
                {
                    events.extend(self.deposit_events(account.id, asset));
                }
            }
        }
        for rt in recurring {
            events.extend(self.recurring_occurrences(rt, until)?);
        }
        events.sort_by_key(|e| e.date);
        Ok(events)
    }
}

impl Default for ProjectionService {
    fn default() -> Self {
        Self::new()
    }
}
