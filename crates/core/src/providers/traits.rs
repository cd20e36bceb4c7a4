use async_trait::async_trait;

use crate::errors::CoreError;
use crate::models::asset_type::AssetType;
use crate::models::quote::{AssetQuote, ForexRate};

/// Trait abstraction for all quote sources.
///
/// Each API (Frankfurter, Yahoo Finance, ...) implements this trait. A
/// provider serves asset quotes, forex rates, or both; the unsupported half
/// returns `CoreError::NoProvider`.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait QuoteProvider: Send + Sync {
    /// Human-readable name of this provider (for logs/errors).
    fn name(&self) -> &str;

    /// Asset types this provider can quote.
    fn supported_asset_types(&self) -> Vec<AssetType>;

    /// Whether this provider serves exchange rates.
    fn supports_forex(&self) -> bool;

    /// Latest quotes for `symbols`, all of the same asset type. Symbols the
    /// provider does not know are left out of the result.
    async fn get_asset_quotes(
        &self,
        symbols: &[String],
        asset_type: AssetType,
    ) -> Result<Vec<AssetQuote>, CoreError>;

    /// Latest rates for pair symbols such as `EURUSD`.
    async fn get_forex_rates(&self, pairs: &[String]) -> Result<Vec<ForexRate>, CoreError>;
}
