// ═══════════════════════════════════════════════════════════════════
// Model Tests: AssetType taxonomy, positions, bond & deposit interest,
// recurrence stepping, history, config
// ═══════════════════════════════════════════════════════════════════

use chrono::{NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use portfolio_tracker_core::errors::CoreError;
use portfolio_tracker_core::models::account::{resolve_cash_asset, Account};
use portfolio_tracker_core::models::asset::Asset;
use portfolio_tracker_core::models::asset_type::{
    is_of_any_strict_type, is_of_related_type, is_of_strict_type, AssetType,
};
use portfolio_tracker_core::models::bond::{BondTerms, InterestPayment, PrincipalPayment};
use portfolio_tracker_core::models::deposit::DepositTerms;
use portfolio_tracker_core::models::history::{PortfolioHistory, PortfolioHistoryEntry};
use portfolio_tracker_core::models::holding::{Holding, Position, Region, RegionWeight};
use portfolio_tracker_core::models::quote::ForexRates;
use portfolio_tracker_core::models::recurring::{RecurrenceType, RecurringTransaction};
use portfolio_tracker_core::models::settings::{AllocationTarget, PortfolioConfig};
use portfolio_tracker_core::models::transaction::{Transaction, TransactionType};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn close(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() < tol
}

fn stock(positions: Vec<Position>) -> Asset {
    let mut holding = Holding::new("acme");
    holding.positions = positions;
    holding.current_price = 150.0;
    Asset::tradeable(AssetType::STOCK, "Acme Corp", "usd", holding)
}

fn bond_terms() -> BondTerms {
    BondTerms {
        coupon_rate: 0.04,
        maturity_date: d(2025, 1, 1),
        principal_amount: 1000.0,
        interest_payment_schedule: vec![
            InterestPayment { date: d(2023, 7, 1), coupon_rate: None },
            InterestPayment { date: d(2024, 1, 1), coupon_rate: Some(0.05) },
        ],
        previous_interest_payment_date: d(2023, 1, 1),
        principal_payment_schedule: Vec::new(),
        payments_per_year: 2,
        withhold_interest_tax: false,
        interest_tax_rate: 0.0,
    }
}

fn deposit_terms() -> DepositTerms {
    DepositTerms {
        interest_rate: 0.05,
        auto_renew: false,
        capitalize: false,
        creation_date: d(2020, 1, 1),
        maturity_date: d(2021, 1, 1),
        withhold_interest_tax: false,
        interest_tax_rate: 0.0,
    }
}

// ═══════════════════════════════════════════════════════════════════
// AssetType taxonomy
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_bond_etf_is_related_to_bond_and_stock() {
    assert!(is_of_related_type(AssetType::BOND_ETF, AssetType::BOND));
    assert!(is_of_related_type(AssetType::BOND_ETF, AssetType::STOCK));
    assert!(is_of_related_type(AssetType::BOND_ETF, AssetType::ETF));
    assert!(!is_of_related_type(AssetType::BOND_ETF, AssetType::FUND));
}

#[test]
fn test_strict_type_does_not_match_hybrids() {
    assert!(!is_of_strict_type(AssetType::BOND_ETF, AssetType::BOND));
    assert!(!is_of_strict_type(AssetType::BOND_ETF, AssetType::STOCK));
    assert!(is_of_strict_type(AssetType::BOND_ETF, AssetType::BOND_ETF));
    assert!(is_of_any_strict_type(
        AssetType::STOCK_ETF,
        &[AssetType::STOCK, AssetType::STOCK_ETF]
    ));
}

#[test]
fn test_empty_mask_is_never_related() {
    assert!(!is_of_related_type(AssetType::STOCK, AssetType(0)));
}

#[test]
fn test_composites_are_unions_of_primitives() {
    assert_eq!(
        AssetType::BOND_ETF,
        AssetType::STOCK | AssetType::ETF | AssetType::BOND
    );
    assert_eq!(AssetType::BOND_ETF & AssetType::BOND, AssetType::BOND);
}

#[test]
fn test_broad_type_collapses_wrappers() {
    assert_eq!(AssetType::BOND_ETF.broad_type(), AssetType::BOND);
    assert_eq!(AssetType::BOND_FUND.broad_type(), AssetType::BOND);
    assert_eq!(AssetType::COMMODITY_ETF.broad_type(), AssetType::COMMODITY);
    assert_eq!(AssetType::REAL_ESTATE_ETF.broad_type(), AssetType::REAL_ESTATE);
    assert_eq!(AssetType::STOCK_ETF.broad_type(), AssetType::STOCK);
    assert_eq!(AssetType::STOCK_FUND.broad_type(), AssetType::STOCK);
    assert_eq!(AssetType::ETF.broad_type(), AssetType::STOCK);
    for t in AssetType::BROAD_TYPES {
        assert_eq!(t.broad_type(), t, "{t} should be its own broad type");
    }
}

#[test]
fn test_type_capabilities() {
    assert!(AssetType::CASH.is_cash_like());
    assert!(AssetType::DEPOSIT.is_cash_like());
    assert!(!AssetType::BOND.is_cash_like());
    assert!(!AssetType::CASH.is_tradeable());
    assert!(!AssetType::DEBT.is_tradeable());
    assert!(AssetType::BOND_ETF.is_tradeable());
    assert!(AssetType::BOND.has_interest_schedule());
    assert!(AssetType::P2P.has_interest_schedule());
    assert!(!AssetType::BOND_ETF.has_interest_schedule());
}

#[test]
fn test_asset_type_serializes_as_bits() {
    let json = serde_json::to_string(&AssetType::BOND_ETF).unwrap();
    assert_eq!(json, (8 | 16 | 4).to_string());
    let back: AssetType = serde_json::from_str(&json).unwrap();
    assert_eq!(back, AssetType::BOND_ETF);
}

// ═══════════════════════════════════════════════════════════════════
// Positions
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_aggregates_follow_positions() {
    let mut asset = stock(vec![
        Position::new(10.0, 100.0, 101.0, d(2024, 1, 1)),
        Position::new(30.0, 120.0, 122.0, d(2024, 2, 1)),
    ]);
    assert_eq!(asset.amount, 40.0);
    let holding = asset.holding().unwrap();
    assert!(close(holding.buy_price, (1000.0 + 3600.0) / 40.0, 1e-9));
    assert!(close(holding.gross_buy_price, (1010.0 + 3660.0) / 40.0, 1e-9));

    let extra = Position::new(20.0, 90.0, 90.0, d(2023, 12, 1));
    let extra_id = extra.id;
    asset.add_position(extra);
    assert_eq!(asset.amount, 60.0);
    // Kept sorted by buy date.
    assert_eq!(asset.positions()[0].id, extra_id);

    let mut updated = asset.positions()[0].clone();
    updated.amount = 5.0;
    assert!(asset.update_position(updated));
    assert_eq!(asset.amount, 45.0);

    asset.remove_position(extra_id).unwrap();
    assert_eq!(asset.amount, 40.0);
}

#[test]
fn test_no_positions_means_zero_prices() {
    let asset = stock(Vec::new());
    assert_eq!(asset.amount, 0.0);
    assert_eq!(asset.holding().unwrap().buy_price, 0.0);
    assert_eq!(asset.holding().unwrap().gross_buy_price, 0.0);
}

#[test]
fn test_update_unknown_position_is_rejected() {
    let mut asset = stock(vec![Position::new(1.0, 1.0, 1.0, d(2024, 1, 1))]);
    assert!(!asset.update_position(Position::new(2.0, 1.0, 1.0, d(2024, 1, 1))));
    assert_eq!(asset.amount, 1.0);
}

#[test]
fn test_tradeable_value_uses_current_price() {
    let asset = stock(vec![Position::new(10.0, 100.0, 100.0, d(2024, 1, 1))]);
    assert_eq!(asset.current_value(d(2024, 6, 1)), 1500.0);
}

#[test]
fn test_region_weights_default_and_custom() {
    let mut holding = Holding::new("world");
    assert_eq!(holding.region_weights()[0].region, Region::Unspecified);
    holding.region = Some(Region::Europe);
    assert_eq!(holding.region_weights()[0].region, Region::Europe);
    holding.custom_regions = vec![
        RegionWeight { region: Region::NorthAmerica, weight: 0.6 },
        RegionWeight { region: Region::Europe, weight: 0.4 },
    ];
    assert_eq!(holding.region_weights().len(), 2);
}

// ═══════════════════════════════════════════════════════════════════
// Basic assets & cash resolution
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_debt_is_stored_negative() {
    let debt = Asset::debt("Mortgage", "usd", 5000.0);
    assert_eq!(debt.amount, -5000.0);
    assert_eq!(debt.currency, "USD");
    assert_eq!(debt.current_value(d(2024, 1, 1)), -5000.0);
}

#[test]
fn test_resolve_cash_asset_unique_in_currency() {
    let cash = Asset::cash("Checking", "USD", 100.0);
    let cash_id = cash.id;
    let eur = Asset::cash("Euro", "EUR", 100.0);
    let deposit = Asset::deposit("CD", "USD", 1000.0, deposit_terms());
    let account = Account::with_assets("Bank", vec![cash, eur, deposit.clone()]);
    assert_eq!(resolve_cash_asset(&account, &deposit), Some(cash_id));
}

#[test]
fn test_resolve_cash_asset_ambiguous() {
    let deposit = Asset::deposit("CD", "USD", 1000.0, deposit_terms());
    let account = Account::with_assets(
        "Bank",
        vec![
            Asset::cash("A", "USD", 1.0),
            Asset::cash("B", "USD", 1.0),
            deposit.clone(),
        ],
    );
    assert_eq!(resolve_cash_asset(&account, &deposit), None);

    let empty = Account::with_assets("Bank", vec![deposit.clone()]);
    assert_eq!(resolve_cash_asset(&empty, &deposit), None);
}

#[test]
fn test_resolve_cash_asset_explicit_wins() {
    let a = Asset::cash("A", "USD", 1.0);
    let b = Asset::cash("B", "USD", 1.0);
    let b_id = b.id;
    let mut deposit = Asset::deposit("CD", "USD", 1000.0, deposit_terms());
    deposit.cash_asset_id = Some(b_id);
    let account = Account::with_assets("Bank", vec![a, b, deposit.clone()]);
    assert_eq!(resolve_cash_asset(&account, &deposit), Some(b_id));
}

// ═══════════════════════════════════════════════════════════════════
// Deposits
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_deposit_interest_leap_year() {
    let deposit = Asset::deposit("CD", "USD", 1000.0, deposit_terms());
    assert_eq!(deposit.deposit_terms().unwrap().period(), 366);
    assert!(close(deposit.deposit_full_interest(), 366.0 / 365.0 * 0.05 * 1000.0, 1e-6));
    assert!(close(deposit.deposit_full_interest(), 50.14, 0.01));
}

#[test]
fn test_deposit_withholding_tax() {
    let mut terms = deposit_terms();
    terms.withhold_interest_tax = true;
    terms.interest_tax_rate = 0.19;
    let deposit = Asset::deposit("CD", "USD", 1000.0, terms);
    let full = deposit.deposit_full_interest();
    assert!(close(deposit.deposit_payable_interest(), full * 0.81, 1e-6));
    assert!(close(deposit.deposit_withholding_tax(), full * 0.19, 1e-6));
}

#[test]
fn test_deposit_without_tax_pays_full_interest() {
    let deposit = Asset::deposit("CD", "USD", 1000.0, deposit_terms());
    assert_eq!(deposit.deposit_payable_interest(), deposit.deposit_full_interest());
    assert_eq!(deposit.deposit_withholding_tax(), 0.0);
}

#[test]
fn test_deposit_renew_keeps_period() {
    let mut terms = deposit_terms();
    let period = terms.period();
    terms.renew();
    assert_eq!(terms.creation_date, d(2021, 1, 1));
    assert_eq!(terms.maturity_date, d(2021, 1, 1) + chrono::Duration::days(period));
    assert!(terms.is_matured(d(2022, 1, 2)));
    assert!(!terms.is_matured(d(2021, 6, 1)));
}

// ═══════════════════════════════════════════════════════════════════
// Bonds
// ═══════════════════════════════════════════════════════════════════

fn bond_asset(terms: BondTerms) -> Asset {
    let mut holding = Holding::new("BOND23");
    holding.positions = vec![Position::new(1000.0, 1.0, 1.0, d(2022, 1, 1))];
    holding.current_price = 1000.0;
    Asset::bond(AssetType::BOND, "Gov bond", "USD", holding, terms)
}

#[test]
fn test_bond_accrued_interest_actual_365() {
    let bond = bond_asset(bond_terms());
    let per_unit = bond.accrued_interest(d(2023, 7, 1));
    assert!(close(per_unit, 181.0 / 365.0 * 0.04 * 1000.0, 1e-6));
    assert!(close(per_unit, 19.83, 0.01));
    assert!(close(
        bond.full_accrued_interest(d(2023, 7, 1)),
        per_unit * 1000.0,
        1e-4
    ));
}

#[test]
fn test_bond_accrual_is_zero_before_previous_coupon() {
    let bond = bond_asset(bond_terms());
    assert_eq!(bond.accrued_interest(d(2022, 12, 1)), 0.0);
}

#[test]
fn test_bond_value_adds_accrued_interest() {
    let bond = bond_asset(bond_terms());
    let day = d(2023, 4, 1);
    let expected = 1000.0 * 1000.0 + bond.full_accrued_interest(day);
    assert!(close(bond.current_value(day), expected, 1e-4));
}

#[test]
fn test_bond_coupon_override_applies_to_its_period() {
    let mut terms = bond_terms();
    terms.consume_interest_payment();
    assert_eq!(terms.previous_interest_payment_date, d(2023, 7, 1));
    assert_eq!(terms.coupon_rate_for_next_period(), 0.05);
    let accrued = terms.accrued_interest(d(2024, 1, 1));
    assert!(close(accrued, 184.0 / 365.0 * 0.05 * 1000.0, 1e-6));
}

#[test]
fn test_amount_at_date_excludes_same_day_purchases() {
    let mut terms = bond_terms();
    terms.maturity_date = d(2024, 1, 1);
    let mut bond = bond_asset(terms);
    bond.add_position(Position::new(10.0, 1.0, 1.0, d(2023, 7, 1)));
    assert_eq!(bond.amount_at_date(d(2023, 7, 1)), 1000.0);
    assert_eq!(bond.amount_at_date(d(2023, 7, 2)), 1010.0);

    // On maturity every unit counts, even one bought that day.
    bond.add_position(Position::new(5.0, 1.0, 1.0, d(2024, 1, 1)));
    assert_eq!(bond.amount_at_date(d(2024, 1, 1)), 1015.0);
}

#[test]
fn test_bond_payable_interest_with_tax() {
    let mut terms = bond_terms();
    terms.withhold_interest_tax = true;
    terms.interest_tax_rate = 0.19;
    let bond = bond_asset(terms);
    let day = d(2023, 7, 1);
    let full = bond.full_interest_at_date(day);
    assert!(close(bond.payable_interest_at_date(day), full * 0.81, 1e-4));
    assert!(close(bond.withholding_tax_at_date(day), full * 0.19, 1e-4));
}

#[test]
fn test_principal_schedule_then_redemption() {
    let mut terms = bond_terms();
    terms.principal_payment_schedule = vec![PrincipalPayment { date: d(2024, 1, 1), amount: 400.0 }];
    let first = terms.next_principal_payment().unwrap();
    assert_eq!(first.amount, 400.0);
    terms.consume_principal_payment(&first);
    assert_eq!(terms.principal_amount, 600.0);

    let redemption = terms.next_principal_payment().unwrap();
    assert_eq!(redemption.date, d(2025, 1, 1));
    assert_eq!(redemption.amount, 600.0);
    terms.consume_principal_payment(&redemption);
    assert!(terms.is_fully_repaid());
    assert!(terms.next_principal_payment().is_none());
}

// ═══════════════════════════════════════════════════════════════════
// Recurrence
// ═══════════════════════════════════════════════════════════════════

fn template(day: NaiveDate) -> Transaction {
    Transaction::cash(
        TransactionType::CreditCash,
        Uuid::new_v4(),
        Uuid::new_v4(),
        Utc.from_utc_datetime(&day.and_hms_opt(9, 0, 0).unwrap()),
        100.0,
        "USD",
    )
}

#[test]
fn test_monthly_recurrence_clamps_to_month_end() {
    let rt = RecurringTransaction::new(template(d(2024, 1, 31)), RecurrenceType::Monthly);
    let next = rt.next_occurrence(rt.tx.date).unwrap();
    assert_eq!(next.date_naive(), d(2024, 2, 29));
}

#[test]
fn test_after_given_days_uses_period() {
    let rt = RecurringTransaction::new(template(d(2024, 1, 1)), RecurrenceType::AfterGivenDays)
        .with_period(10);
    assert_eq!(rt.next_occurrence(rt.tx.date).unwrap().date_naive(), d(2024, 1, 11));
}

#[test]
fn test_never_is_a_single_occurrence() {
    let mut rt = RecurringTransaction::new(template(d(2024, 1, 1)), RecurrenceType::Never);
    assert!(rt.is_last_occurrence());
    assert!(!rt.advance());
}

#[test]
fn test_finite_schedule_counts_down() {
    let mut rt = RecurringTransaction::new(template(d(2024, 1, 1)), RecurrenceType::Weekly)
        .with_transactions_left(3);
    assert!(rt.advance());
    assert_eq!(rt.transactions_left, 2);
    assert_eq!(rt.tx.date.date_naive(), d(2024, 1, 8));
    assert!(rt.advance());
    assert_eq!(rt.transactions_left, 1);
    assert!(!rt.advance());
}

#[test]
fn test_unlimited_schedule_keeps_zero() {
    let mut rt = RecurringTransaction::new(template(d(2024, 1, 1)), RecurrenceType::Yearly);
    assert!(rt.advance());
    assert_eq!(rt.transactions_left, 0);
    assert_eq!(rt.tx.date.date_naive(), d(2025, 1, 1));
}

// ═══════════════════════════════════════════════════════════════════
// Forex rates
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_missing_rate_is_an_error_not_one_to_one() {
    let rates = ForexRates::new("usd").with_rate("EUR", 1.1);
    assert_eq!(rates.rate("USD").unwrap(), 1.0);
    assert_eq!(rates.rate("eur").unwrap(), 1.1);
    match rates.rate("GBP") {
        Err(CoreError::MissingForexRate { currency }) => assert_eq!(currency, "GBP"),
        other => panic!("expected MissingForexRate, got {other:?}"),
    }
}

// ═══════════════════════════════════════════════════════════════════
// History
// ═══════════════════════════════════════════════════════════════════

fn entry(date: NaiveDate, total: f64) -> PortfolioHistoryEntry {
    PortfolioHistoryEntry {
        date,
        total_value: total,
        total_profit_loss: 0.0,
        by_type: Vec::new(),
    }
}

#[test]
fn test_history_replaces_same_day_and_stays_sorted() {
    let mut history = PortfolioHistory::new();
    history.record(entry(d(2024, 1, 3), 3.0));
    history.record(entry(d(2024, 1, 1), 1.0));
    history.record(entry(d(2024, 1, 2), 2.0));
    history.record(entry(d(2024, 1, 2), 20.0));

    assert_eq!(history.len(), 3);
    let dates: Vec<_> = history.entries.iter().map(|e| e.date).collect();
    assert_eq!(dates, vec![d(2024, 1, 1), d(2024, 1, 2), d(2024, 1, 3)]);
    assert_eq!(history.get(d(2024, 1, 2)).unwrap().total_value, 20.0);
    assert_eq!(history.range(d(2024, 1, 2), d(2024, 1, 3)).len(), 2);
    assert_eq!(
        history.latest_on_or_before(d(2024, 2, 1)).unwrap().date,
        d(2024, 1, 3)
    );
    assert!(history.latest_on_or_before(d(2023, 12, 31)).is_none());
}

// ═══════════════════════════════════════════════════════════════════
// Config
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_config_defaults_from_empty_json() {
    let config = PortfolioConfig::from_json("{}").unwrap();
    assert_eq!(config, PortfolioConfig::default());
}

#[test]
fn test_config_uppercases_currency() {
    let config = PortfolioConfig::from_json(r#"{"base_currency": "pln"}"#).unwrap();
    assert_eq!(config.base_currency, "PLN");
}

#[test]
fn test_config_rejects_overallocation() {
    let config = PortfolioConfig {
        target_allocation: vec![
            AllocationTarget { asset_type: AssetType::STOCK, fraction: 0.7 },
            AllocationTarget { asset_type: AssetType::BOND, fraction: 0.4 },
        ],
        ..PortfolioConfig::default()
    };
    assert!(matches!(config.validate(), Err(CoreError::ValidationError(_))));
}

#[test]
fn test_config_rejects_bad_json() {
    assert!(matches!(
        PortfolioConfig::from_json("not json"),
        Err(CoreError::Deserialization(_))
    ));
}
