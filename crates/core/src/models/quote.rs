use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::errors::CoreError;
use crate::util::floating::fix_rounding_error;

/// Latest price of a tradeable instrument as returned by a quote provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetQuote {
    pub symbol: String,
    pub price: f64,
    pub currency: String,
    /// Price is a percentage of principal (bond convention).
    #[serde(default)]
    pub percent_price: bool,
}

/// Exchange rate for a pair symbol such as `EURUSD` (1 EUR in USD).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForexRate {
    pub symbol: String,
    pub price: f64,
}

/// Pair symbol for converting `from` into `to`.
pub fn forex_pair(from: &str, to: &str) -> String {
    format!("{}{}", from.to_uppercase(), to.to_uppercase())
}

/// Rates into one base currency, fetched for a single valuation pass.
///
/// Passed explicitly to every conversion so unrelated views never share
/// mutable rate state. A currency missing from the map is an error, never
/// an implicit 1:1.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ForexRates {
    pub base_currency: String,
    rates: HashMap<String, f64>,
}

impl ForexRates {
    pub fn new(base_currency: impl Into<String>) -> Self {
        Self {
            base_currency: base_currency.into().to_uppercase(),
            rates: HashMap::new(),
        }
    }

    /// Rate converting one unit of `currency` into the base currency.
    pub fn insert(&mut self, currency: &str, rate: f64) {
        self.rates.insert(currency.to_uppercase(), rate);
    }

    pub fn with_rate(mut self, currency: &str, rate: f64) -> Self {
        self.insert(currency, rate);
        self
    }

    pub fn contains(&self, currency: &str) -> bool {
        currency.eq_ignore_ascii_case(&self.base_currency)
            || self.rates.contains_key(&currency.to_uppercase())
    }

    pub fn rate(&self, currency: &str) -> Result<f64, CoreError> {
        if currency.eq_ignore_ascii_case(&self.base_currency) {
            return Ok(1.0);
        }
        self.rates
            .get(&currency.to_uppercase())
            .copied()
            .ok_or_else(|| CoreError::MissingForexRate {
                currency: currency.to_uppercase(),
            })
    }

    pub fn to_base(&self, amount: f64, currency: &str) -> Result<f64, CoreError> {
        Ok(fix_rounding_error(amount * self.rate(currency)?))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedRate {
    pub rate: f64,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedQuote {
    pub quote: AssetQuote,
    pub fetched_at: DateTime<Utc>,
}

/// Timestamped cache of quotes and forex rates.
///
/// Entries past the timeout are not served as fresh, but expired forex
/// rates are kept as a fallback for when the provider is unreachable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuoteCache {
    pub forex: HashMap<String, CachedRate>,
    pub quotes: HashMap<String, CachedQuote>,
}

impl QuoteCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_fresh(fetched_at: DateTime<Utc>, now: DateTime<Utc>, timeout_secs: u64) -> bool {
        now - fetched_at < Duration::seconds(timeout_secs as i64)
    }

    pub fn fresh_rate(&self, pair: &str, now: DateTime<Utc>, timeout_secs: u64) -> Option<f64> {
        self.forex
            .get(pair)
            .filter(|c| Self::is_fresh(c.fetched_at, now, timeout_secs))
            .map(|c| c.rate)
    }

    /// Cached rate regardless of age.
    pub fn any_rate(&self, pair: &str) -> Option<f64> {
        self.forex.get(pair).map(|c| c.rate)
    }

    pub fn set_rate(&mut self, pair: &str, rate: f64, now: DateTime<Utc>) {
        self.forex.insert(
            pair.to_uppercase(),
            CachedRate {
                rate,
                fetched_at: now,
            },
        );
    }

    pub fn fresh_quote(
        &self,
        symbol: &str,
        now: DateTime<Utc>,
        timeout_secs: u64,
    ) -> Option<&AssetQuote> {
        self.quotes
            .get(&symbol.to_uppercase())
            .filter(|c| Self::is_fresh(c.fetched_at, now, timeout_secs))
            .map(|c| &c.quote)
    }

    pub fn set_quote(&mut self, quote: AssetQuote, now: DateTime<Utc>) {
        self.quotes.insert(
            quote.symbol.to_uppercase(),
            CachedQuote {
                quote,
                fetched_at: now,
            },
        );
    }

    pub fn clear(&mut self) {
        self.forex.clear();
        self.quotes.clear();
    }
}
