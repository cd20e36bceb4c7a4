use chrono::NaiveDate;

use crate::errors::CoreError;
use crate::models::analytics::IrrReport;
use crate::models::transaction::{Transaction, TransactionType};

const MAX_ITERATIONS: usize = 100;
const TOLERANCE: f64 = 1e-10;
const INITIAL_GUESS: f64 = 0.1;

/// A dated, signed cash flow from the investor's point of view.
#[derive(Debug, Clone, PartialEq)]
pub struct CashFlow {
    pub date: NaiveDate,
    pub amount: f64,
}

/// Money-weighted return of the portfolio over a window.
pub struct IrrService;

impl IrrService {
    pub fn new() -> Self {
        Self
    }

    /// Cash flows for `[from, to]`: the starting value and every cash
    /// credit go in as negative flows, debits and the ending value come out
    /// as positive ones.
    pub fn cash_flows(
        &self,
        transactions: &[Transaction],
        start_value: f64,
        end_value: f64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Vec<CashFlow> {
        let mut flows = vec![CashFlow {
            date: from,
            amount: -start_value,
        }];
        let mut external: Vec<CashFlow> = transactions
            .iter()
            .filter(|t| {
                let day = t.date.date_naive();
                day > from && day <= to
            })
            .filter_map(|t| match t.tx_type {
                TransactionType::CreditCash => Some(CashFlow {
                    date: t.date.date_naive(),
                    amount: -t.value(),
                }),
                TransactionType::DebitCash => Some(CashFlow {
                    date: t.date.date_naive(),
                    amount: t.value(),
                }),
                _ => None,
            })
            .collect();
        external.sort_by_key(|f| f.date);
        flows.extend(external);
        flows.push(CashFlow {
            date: to,
            amount: end_value,
        });
        flows
    }

    pub fn irr(
        &self,
        transactions: &[Transaction],
        start_value: f64,
        end_value: f64,
        from: NaiveDate,
        to: NaiveDate,
        base_currency: &str,
    ) -> Result<IrrReport, CoreError> {
        if from >= to {
            return Err(CoreError::ValidationError(format!(
                "IRR window start ({from}) must be before its end ({to})"
            )));
        }
        // Flows are summed at face value: a foreign-currency credit is not
        // converted at its historical rate.
        let inaccurate_irr = transactions.iter().any(|t| {
            let day = t.date.date_naive();
            matches!(t.tx_type, TransactionType::CreditCash | TransactionType::DebitCash)
                && day > from
                && day <= to
                && !t.currency.eq_ignore_ascii_case(base_currency)
        });
        let flows = self.cash_flows(transactions, start_value, end_value, from, to);
        let irr = xirr(&flows)?;
        Ok(IrrReport {
            from,
            to,
            irr,
            inaccurate_irr,
            cash_flows: flows.len(),
        })
    }
}

impl Default for IrrService {
    fn default() -> Self {
        Self::new()
    }
}

/// Annualized rate `r` with `Σ CF_i / (1 + r)^t_i = 0`, `t_i` in years
/// (Actual/365) from the first flow. Solved with Newton-Raphson.
pub fn xirr(flows: &[CashFlow]) -> Result<f64, CoreError> {
    let Some(first) = flows.first() else {
        return Ok(0.0);
    };
    if flows.iter().all(|f| f.amount == 0.0) {
        return Ok(0.0);
    }
    let series: Vec<(f64, f64)> = flows
        .iter()
        .map(|f| (f.amount, (f.date - first.date).num_days() as f64 / 365.0))
        .collect();

    let mut rate = INITIAL_GUESS;
    for _ in 0..MAX_ITERATIONS {
        let (npv, dnpv) = npv_and_derivative(&series, rate);
        if dnpv.abs() < TOLERANCE {
            break;
        }
        let next = rate - npv / dnpv;
        if (next - rate).abs() < TOLERANCE {
            return Ok(next);
        }
        // Keep the rate in a range where (1 + r)^t stays defined.
        rate = next.clamp(-0.99, 10.0);
    }
    Err(CoreError::NoConvergence {
        iterations: MAX_ITERATIONS,
    })
}

fn npv_and_derivative(series: &[(f64, f64)], rate: f64) -> (f64, f64) {
    let mut npv = 0.0;
    let mut dnpv = 0.0;
    for (cf, years) in series {
        let discount = (1.0 + rate).powf(*years);
        npv += cf / discount;
        dnpv -= years * cf / (discount * (1.0 + rate));
    }
    (npv, dnpv)
}
