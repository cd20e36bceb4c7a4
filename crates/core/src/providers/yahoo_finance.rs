use async_trait::async_trait;

use crate::errors::CoreError;
use crate::models::asset_type::AssetType;
use crate::models::quote::{AssetQuote, ForexRate};
use super::traits::QuoteProvider;

/// Yahoo Finance API provider for listed instruments.
///
/// - **Free**: No API key required.
/// - **Coverage**: Global equities, ETFs, funds.
///
/// Prices come in the listing currency, which the latest-quote endpoint
/// does not report; quotes leave `currency` empty and the asset's own
/// currency applies.
///
/// **Note**: Not WASM-compatible (uses native reqwest/tokio).
pub struct YahooFinanceProvider {
    connector: yahoo_finance_api::YahooConnector,
}

impl YahooFinanceProvider {
    pub fn new() -> Result<Self, CoreError> {
        let connector = yahoo_finance_api::YahooConnector::new()
            .map_err(|e| CoreError::Api {
                provider: "Yahoo Finance".into(),
                message: format!("Failed to create connector: {e}"),
            })?;
        Ok(Self { connector })
    }

    async fn latest_close(&self, symbol: &str) -> Result<f64, CoreError> {
        let resp = self
            .connector
            .get_latest_quotes(symbol, "1d")
            .await
            .map_err(|e| CoreError::Api {
                provider: "Yahoo Finance".into(),
                message: format!("Failed to fetch latest quote for {symbol}: {e}"),
            })?;

        let quote = resp.last_quote().map_err(|e| CoreError::Api {
            provider: "Yahoo Finance".into(),
            message: format!("No quote data for {symbol}: {e}"),
        })?;

        Ok(quote.close)
    }
}

#[async_trait]
impl QuoteProvider for YahooFinanceProvider {
    fn name(&self) -> &str {
        "Yahoo Finance"
    }

    fn supported_asset_types(&self) -> Vec<AssetType> {
        vec![
            AssetType::STOCK,
            AssetType::STOCK_ETF,
            AssetType::BOND_ETF,
            AssetType::COMMODITY_ETF,
            AssetType::REAL_ESTATE_ETF,
            AssetType::STOCK_FUND,
            AssetType::BOND_FUND,
            AssetType::CRYPTO,
        ]
    }

    fn supports_forex(&self) -> bool {
        false
    }

    async fn get_asset_quotes(
        &self,
        symbols: &[String],
        _asset_type: AssetType,
    ) -> Result<Vec<AssetQuote>, CoreError> {
        let mut quotes = Vec::with_capacity(symbols.len());
        let mut last_error = None;
        for symbol in symbols {
            match self.latest_close(symbol).await {
                Ok(price) => quotes.push(AssetQuote {
                    symbol: symbol.to_uppercase(),
                    price,
                    currency: String::new(),
                    percent_price: false,
                }),
                Err(e) => {
                    tracing::debug!(symbol = %symbol, error = %e, "yahoo quote unavailable");
                    last_error = Some(e);
                }
            }
        }
        // Unknown symbols are skipped, but a batch with no hits is a failure.
        match (quotes.is_empty(), last_error) {
            (true, Some(e)) => Err(e),
            _ => Ok(quotes),
        }
    }

    async fn get_forex_rates(&self, _pairs: &[String]) -> Result<Vec<ForexRate>, CoreError> {
        Err(CoreError::NoProvider("forex".into()))
    }
}
