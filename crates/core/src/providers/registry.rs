use crate::models::asset_type::AssetType;

use super::frankfurter::FrankfurterProvider;
use super::traits::QuoteProvider;
#[cfg(not(target_arch = "wasm32"))]
use super::yahoo_finance::YahooFinanceProvider;

/// Registry of all available quote providers.
///
/// Routes requests by asset type (or to forex-capable providers), in
/// registration order so earlier providers take priority and later ones
/// serve as fallbacks.
pub struct QuoteProviderRegistry {
    providers: Vec<Box<dyn QuoteProvider>>,
}

impl QuoteProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Create a registry with the default providers pre-configured.
    pub fn new_with_defaults() -> Self {
        let mut registry = Self::new();

        // Frankfurter: forex, no API key needed
        registry.register(Box::new(FrankfurterProvider::new()));

        // Yahoo Finance: stocks, ETFs, funds; not available on WASM
        #[cfg(not(target_arch = "wasm32"))]
        {
            if let Ok(yahoo) = YahooFinanceProvider::new() {
                registry.register(Box::new(yahoo));
            }
        }

        registry
    }

    /// Register a new quote provider.
    pub fn register(&mut self, provider: Box<dyn QuoteProvider>) {
        self.providers.push(provider);
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// All providers quoting `asset_type`, in priority order.
    pub fn get_providers_for(&self, asset_type: AssetType) -> Vec<&dyn QuoteProvider> {
        self.providers
            .iter()
            .filter(|p| p.supported_asset_types().contains(&asset_type))
            .map(|p| p.as_ref())
            .collect()
    }

    /// All providers serving exchange rates, in priority order.
    pub fn forex_providers(&self) -> Vec<&dyn QuoteProvider> {
        self.providers
            .iter()
            .filter(|p| p.supports_forex())
            .map(|p| p.as_ref())
            .collect()
    }
}

impl Default for QuoteProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
