use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
#[cfg(not(target_arch = "wasm32"))]
use std::time::Duration;

use crate::errors::CoreError;
use crate::models::asset_type::AssetType;
use crate::models::quote::{AssetQuote, ForexRate};
use super::traits::QuoteProvider;

const BASE_URL: &str = "https://api.frankfurter.dev/v1";

/// Frankfurter API provider for fiat exchange rates.
///
/// - **Free**: No API key, no rate limits, open-source.
/// - **Source**: European Central Bank (ECB) data.
/// - **Endpoint**: `/latest?base=EUR&symbols=USD,PLN`
///
/// Pairs sharing a base currency are fetched in one request.
pub struct FrankfurterProvider {
    client: Client,
    base_url: String,
}

impl FrankfurterProvider {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    /// Point the provider at another host (mirrors, tests).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let builder = Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder.timeout(Duration::from_secs(30));
        Self {
            client: builder.build().unwrap_or_else(|_| Client::new()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Split `EURUSD` into (`EUR`, `USD`).
    fn split_pair(pair: &str) -> Result<(String, String), CoreError> {
        let pair = pair.to_uppercase();
        if pair.len() != 6 || !pair.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CoreError::ValidationError(format!(
                "Invalid forex pair '{pair}', expected e.g. EURUSD"
            )));
        }
        Ok((pair[..3].to_string(), pair[3..].to_string()))
    }
}

impl Default for FrankfurterProvider {
    fn default() -> Self {
        Self::new()
    }
}

// ── Frankfurter API response types ──────────────────────────────────

#[derive(Deserialize)]
struct RatesResponse {
    rates: HashMap<String, f64>,
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl QuoteProvider for FrankfurterProvider {
    fn name(&self) -> &str {
        "Frankfurter"
    }

    fn supported_asset_types(&self) -> Vec<AssetType> {
        Vec::new()
    }

    fn supports_forex(&self) -> bool {
        true
    }

    async fn get_asset_quotes(
        &self,
        _symbols: &[String],
        asset_type: AssetType,
    ) -> Result<Vec<AssetQuote>, CoreError> {
        Err(CoreError::NoProvider(asset_type.to_string()))
    }

    async fn get_forex_rates(&self, pairs: &[String]) -> Result<Vec<ForexRate>, CoreError> {
        let mut by_base: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut rates = Vec::new();

        for pair in pairs {
            let (base, target) = Self::split_pair(pair)?;
            // Same currency → rate is 1.0
            if base == target {
                rates.push(ForexRate {
                    symbol: format!("{base}{target}"),
                    price: 1.0,
                });
                continue;
            }
            let targets = by_base.entry(base).or_default();
            if !targets.contains(&target) {
                targets.push(target);
            }
        }

        for (base, targets) in by_base {
            let url = format!(
                "{}/latest?base={base}&symbols={}",
                self.base_url,
                targets.join(",")
            );

            let resp: RatesResponse = self
                .client
                .get(&url)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await
                .map_err(|e| CoreError::Api {
                    provider: "Frankfurter".into(),
                    message: format!("Failed to parse rates for base {base}: {e}"),
                })?;

            for target in targets {
                let price = resp.rates.get(&target).copied().ok_or_else(|| CoreError::Api {
                    provider: "Frankfurter".into(),
                    message: format!("No rate found for {base} → {target}"),
                })?;
                rates.push(ForexRate {
                    symbol: format!("{base}{target}"),
                    price,
                });
            }
        }

        Ok(rates)
    }
}
