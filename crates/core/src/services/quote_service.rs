use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::errors::CoreError;
use crate::models::account::Account;
use crate::models::asset_type::AssetType;
use crate::models::quote::{forex_pair, AssetQuote, ForexRate, ForexRates, QuoteCache};
use crate::providers::registry::QuoteProviderRegistry;
use crate::util::floating::fix_rounding_error;

/// Outcome of a quote refresh over all accounts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuoteRefresh {
    /// Assets whose current price changed.
    pub updated: usize,
    /// Symbols that no provider could quote.
    pub unquoted: Vec<String>,
}

/// Fetches quotes and forex rates from the provider registry with a
/// timestamped cache in front.
///
/// Cache strategy:
/// - Entries younger than the timeout are served without a network call.
/// - Missing or expired pairs are fetched in one batch per provider.
/// - When every provider fails, expired forex rates are used as a fallback
///   so valuation keeps working offline.
pub struct QuoteService {
    registry: QuoteProviderRegistry,
}

impl QuoteService {
    pub fn new(registry: QuoteProviderRegistry) -> Self {
        Self { registry }
    }

    pub fn has_provider_for(&self, asset_type: AssetType) -> bool {
        !self.registry.get_providers_for(asset_type).is_empty()
    }

    /// Rates converting each of `currencies` into `base_currency`.
    pub async fn forex_rates(
        &self,
        cache: &mut QuoteCache,
        currencies: &BTreeSet<String>,
        base_currency: &str,
        now: DateTime<Utc>,
        timeout_secs: u64,
    ) -> Result<ForexRates, CoreError> {
        let mut rates = ForexRates::new(base_currency);
        let mut missing = Vec::new();

        for currency in currencies {
            if currency.eq_ignore_ascii_case(base_currency) {
                continue;
            }
            let pair = forex_pair(currency, base_currency);
            match cache.fresh_rate(&pair, now, timeout_secs) {
                Some(rate) => rates.insert(currency, rate),
                None => missing.push((currency.as_str(), pair)),
            }
        }
        if missing.is_empty() {
            return Ok(rates);
        }

        let pairs: Vec<String> = missing.iter().map(|(_, pair)| pair.clone()).collect();
        match self.fetch_forex(&pairs).await {
            Ok(fetched) => {
                for rate in fetched {
                    cache.set_rate(&rate.symbol, rate.price, now);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, pairs = missing.len(), "forex fetch failed, using cached rates");
            }
        }

        for (currency, pair) in &missing {
            match cache.any_rate(pair) {
                Some(rate) => rates.insert(currency, rate),
                None => {
                    return Err(CoreError::MissingForexRate {
                        currency: currency.to_uppercase(),
                    })
                }
            }
        }
        Ok(rates)
    }

    /// Try forex providers in registration order.
    async fn fetch_forex(&self, pairs: &[String]) -> Result<Vec<ForexRate>, CoreError> {
        let providers = self.registry.forex_providers();
        if providers.is_empty() {
            return Err(CoreError::NoProvider("forex".to_string()));
        }

        let mut last_error = None;
        for provider in &providers {
            match provider.get_forex_rates(pairs).await {
                Ok(rates) => {
                    let (valid, invalid): (Vec<_>, Vec<_>) = rates
                        .into_iter()
                        .partition(|r| r.price.is_finite() && r.price > 0.0);
                    for r in &invalid {
                        tracing::warn!(provider = provider.name(), pair = %r.symbol, price = r.price, "discarding invalid forex rate");
                    }
                    return Ok(valid);
                }
                Err(e) => {
                    tracing::debug!(provider = provider.name(), error = %e, "forex provider failed");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| CoreError::NoProvider("forex".to_string())))
    }

    /// Update `current_price` on every tradeable asset that has a provider.
    ///
    /// Quotes flagged as percent prices are converted to a unit price using
    /// the bond's outstanding principal. A quote in a different currency
    /// than the asset is ignored.
    pub async fn refresh_asset_quotes(
        &self,
        cache: &mut QuoteCache,
        accounts: &mut [Account],
        now: DateTime<Utc>,
        timeout_secs: u64,
    ) -> Result<QuoteRefresh, CoreError> {
        let mut by_type: BTreeMap<AssetType, BTreeSet<String>> = BTreeMap::new();
        for asset in accounts.iter().flat_map(|a| a.assets.iter()) {
            if let Some(holding) = asset.holding() {
                if !holding.symbol.is_empty() && self.has_provider_for(asset.asset_type) {
                    by_type
                        .entry(asset.asset_type)
                        .or_default()
                        .insert(holding.symbol.clone());
                }
            }
        }

        let mut refresh = QuoteRefresh::default();
        for (asset_type, symbols) in by_type {
            let stale: Vec<String> = symbols
                .iter()
                .filter(|s| cache.fresh_quote(s, now, timeout_secs).is_none())
                .cloned()
                .collect();
            if stale.is_empty() {
                continue;
            }
            match self.fetch_quotes(&stale, asset_type).await {
                Ok(quotes) => {
                    for quote in quotes {
                        cache.set_quote(quote, now);
                    }
                }
                Err(e) => {
                    tracing::warn!(asset_type = %asset_type, error = %e, "quote fetch failed");
                }
            }
            refresh.unquoted.extend(
                stale
                    .into_iter()
                    .filter(|s| cache.fresh_quote(s, now, timeout_secs).is_none()),
            );
        }

        for asset in accounts.iter_mut().flat_map(|a| a.assets.iter_mut()) {
            let Some(symbol) = asset.holding().map(|h| h.symbol.clone()) else {
                continue;
            };
            let Some(quote) = cache.fresh_quote(&symbol, now, timeout_secs).cloned() else {
                continue;
            };
            if !quote.currency.is_empty() && !quote.currency.eq_ignore_ascii_case(&asset.currency) {
                tracing::warn!(%symbol, quote_currency = %quote.currency, asset_currency = %asset.currency, "quote currency mismatch, skipping");
                continue;
            }
            let price = unit_price(&quote, asset.bond_terms().map(|t| t.principal_amount));
            if let Some(holding) = asset.holding_mut() {
                if holding.current_price != price {
                    holding.current_price = price;
                    refresh.updated += 1;
                }
            }
        }

        tracing::info!(updated = refresh.updated, unquoted = refresh.unquoted.len(), "quotes refreshed");
        Ok(refresh)
    }

    async fn fetch_quotes(
        &self,
        symbols: &[String],
        asset_type: AssetType,
    ) -> Result<Vec<AssetQuote>, CoreError> {
        let providers = self.registry.get_providers_for(asset_type);
        if providers.is_empty() {
            return Err(CoreError::NoProvider(asset_type.to_string()));
        }

        let mut last_error = None;
        for provider in &providers {
            match provider.get_asset_quotes(symbols, asset_type).await {
                Ok(quotes) => {
                    return Ok(quotes
                        .into_iter()
                        .filter(|q| q.price.is_finite() && q.price >= 0.0)
                        .collect())
                }
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error.unwrap_or_else(|| CoreError::NoProvider(asset_type.to_string())))
    }
}

/// Price of one unit. Percent prices are relative to `principal`.
pub fn unit_price(quote: &AssetQuote, principal: Option<f64>) -> f64 {
    match (quote.percent_price, principal) {
        (true, Some(principal)) => fix_rounding_error(quote.price / 100.0 * principal),
        _ => quote.price,
    }
}
