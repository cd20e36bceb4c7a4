pub mod errors;
pub mod models;
pub mod providers;
pub mod services;
pub mod storage;
pub mod util;

use std::sync::Arc;

use chrono::NaiveDate;

use errors::CoreError;
use models::{
    analytics::{CapitalGainsReport, IrrReport, PortfolioTotals, RebalancingStep},
    asset::Asset,
    asset_type::{is_of_related_type, AssetType},
    history::PortfolioHistoryEntry,
    projection::ProjectedEvent,
    quote::{ForexRates, QuoteCache},
    settings::PortfolioConfig,
    transaction::Transaction,
    view_asset::ViewAsset,
};
use providers::registry::QuoteProviderRegistry;
use services::{
    capital_gains_service::CapitalGainsService,
    history_service::HistoryService,
    irr_service::IrrService,
    notification_service::{LogSink, NotificationSink},
    periodic_checks::{CheckReport, PeriodicChecksService},
    projection_service::ProjectionService,
    quote_service::{QuoteRefresh, QuoteService},
    scheduler::{PeriodicScheduler, SchedulerConfig},
    transaction_service::TransactionService,
    valuation_service::ValuationService,
    view_asset_service::ViewAssetService,
};
use storage::{
    memory::MemoryStore,
    traits::{PortfolioStore, StoreOp},
};
use util::clock::{Clock, SystemClock};

/// Main entry point for the portfolio tracker core library.
/// Holds the store handle, the quote cache and all services that read or
/// mutate the portfolio.
#[must_use]
pub struct PortfolioTracker {
    store: Arc<dyn PortfolioStore>,
    clock: Arc<dyn Clock>,
    quote_cache: QuoteCache,
    quote_service: QuoteService,
    valuation_service: ValuationService,
    view_asset_service: ViewAssetService,
    capital_gains_service: CapitalGainsService,
    irr_service: IrrService,
    projection_service: ProjectionService,
    transaction_service: TransactionService,
    history_service: HistoryService,
    checks: Arc<PeriodicChecksService>,
}

impl std::fmt::Debug for PortfolioTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortfolioTracker")
            .field("cached_rates", &self.quote_cache.forex.len())
            .field("cached_quotes", &self.quote_cache.quotes.len())
            .finish()
    }
}

impl PortfolioTracker {
    pub fn new(
        store: Arc<dyn PortfolioStore>,
        registry: QuoteProviderRegistry,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let checks = Arc::new(PeriodicChecksService::new(
            store.clone(),
            sink,
            clock.clone(),
        ));
        Self {
            store,
            clock,
            quote_cache: QuoteCache::new(),
            quote_service: QuoteService::new(registry),
            valuation_service: ValuationService::new(),
            view_asset_service: ViewAssetService::new(),
            capital_gains_service: CapitalGainsService::new(),
            irr_service: IrrService::new(),
            projection_service: ProjectionService::new(),
            transaction_service: TransactionService::new(),
            history_service: HistoryService::new(),
            checks,
        }
    }

    /// An empty in-memory portfolio with the default providers, logging
    /// notifications and the system clock.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryStore::new()),
            QuoteProviderRegistry::new_with_defaults(),
            Arc::new(LogSink),
            Arc::new(SystemClock),
        )
    }

    pub fn store(&self) -> &Arc<dyn PortfolioStore> {
        &self.store
    }

    pub fn quote_cache(&self) -> &QuoteCache {
        &self.quote_cache
    }

    pub fn clear_quote_cache(&mut self) {
        self.quote_cache.clear();
    }

    pub async fn config(&self) -> Result<PortfolioConfig, CoreError> {
        self.store.get_config().await
    }

    pub async fn set_config(&self, config: PortfolioConfig) -> Result<(), CoreError> {
        config.validate()?;
        self.store.put_config(config).await
    }

    // ── Quotes ──────────────────────────────────────────────────────

    /// Rates into the base currency for every currency held.
    pub async fn forex_rates(&mut self) -> Result<ForexRates, CoreError> {
        let accounts = self.store.get_accounts().await?;
        let config = self.store.get_config().await?;
        let currencies = self.valuation_service.required_currencies(&accounts);
        self.quote_service
            .forex_rates(
                &mut self.quote_cache,
                &currencies,
                &config.base_currency,
                self.clock.now(),
                config.quote_cache_timeout_secs,
            )
            .await
    }

    /// Fetch current prices and persist every asset whose price changed.
    pub async fn refresh_quotes(&mut self) -> Result<QuoteRefresh, CoreError> {
        let before = self.store.get_accounts().await?;
        let config = self.store.get_config().await?;
        let mut accounts = before.clone();
        let refresh = self
            .quote_service
            .refresh_asset_quotes(
                &mut self.quote_cache,
                &mut accounts,
                self.clock.now(),
                config.quote_cache_timeout_secs,
            )
            .await?;

        let mut ops = Vec::new();
        for (old, new) in before.iter().zip(&accounts) {
            for (old_asset, asset) in old.assets.iter().zip(&new.assets) {
                if old_asset != asset {
                    ops.push(StoreOp::PutAsset {
                        account_id: new.id,
                        asset: asset.clone(),
                    });
                }
            }
        }
        if !ops.is_empty() {
            self.store.commit(ops).await?;
        }
        Ok(refresh)
    }

    // ── Valuation ───────────────────────────────────────────────────

    pub async fn totals(&mut self) -> Result<PortfolioTotals, CoreError> {
        let rates = self.forex_rates().await?;
        let accounts = self.store.get_accounts().await?;
        let config = self.store.get_config().await?;
        self.valuation_service
            .compute_totals(&accounts, &rates, &config, self.clock.today())
    }

    /// Valued rows for every asset related to `asset_type`, or all assets.
    pub async fn view_assets(
        &mut self,
        asset_type: Option<AssetType>,
    ) -> Result<Vec<ViewAsset>, CoreError> {
        let rates = self.forex_rates().await?;
        let accounts = self.store.get_accounts().await?;
        self.view_asset_service.build_view_assets(
            &accounts,
            &rates,
            self.clock.today(),
            |asset: &Asset| asset_type.map_or(true, |t| is_of_related_type(asset.asset_type, t)),
        )
    }

    pub async fn rebalancing(&mut self) -> Result<Vec<RebalancingStep>, CoreError> {
        let totals = self.totals().await?;
        let config = self.store.get_config().await?;
        Ok(self.valuation_service.rebalancing_steps(&totals, &config))
    }

    pub async fn capital_gains(
        &mut self,
        tax_year: i32,
        group_by_asset: bool,
    ) -> Result<CapitalGainsReport, CoreError> {
        let rates = self.forex_rates().await?;
        let accounts = self.store.get_accounts().await?;
        let transactions = self.store.get_transactions().await?;
        self.capital_gains_service.capital_gains(
            &transactions,
            &accounts,
            tax_year,
            group_by_asset,
            &rates,
        )
    }

    /// Money-weighted return between two days. Portfolio values come from
    /// the recorded history; a window ending today uses the live totals.
    pub async fn irr(&mut self, from: NaiveDate, to: NaiveDate) -> Result<IrrReport, CoreError> {
        let history = self.store.get_history().await?;
        let start_value = history
            .latest_on_or_before(from)
            .map(|e| e.total_value)
            .unwrap_or(0.0);
        let end_value = if to >= self.clock.today() {
            self.totals().await?.net_worth
        } else {
            history
                .latest_on_or_before(to)
                .map(|e| e.total_value)
                .unwrap_or(0.0)
        };
        let config = self.store.get_config().await?;
        let transactions = self.store.get_transactions().await?;
        self.irr_service.irr(
            &transactions,
            start_value,
            end_value,
            from,
            to,
            &config.base_currency,
        )
    }

    /// Store today's totals in the daily history.
    pub async fn record_history(&mut self) -> Result<PortfolioHistoryEntry, CoreError> {
        let totals = self.totals().await?;
        self.history_service
            .record_today(self.store.as_ref(), &totals)
            .await
    }

    // ── Transactions & schedules ────────────────────────────────────

    pub async fn execute_transaction(&self, tx: Transaction) -> Result<Transaction, CoreError> {
        self.transaction_service
            .execute(self.store.as_ref(), tx)
            .await
    }

    /// Bond, deposit and recurring events scheduled up to `until`.
    pub async fn upcoming(&self, until: NaiveDate) -> Result<Vec<ProjectedEvent>, CoreError> {
        let accounts = self.store.get_accounts().await?;
        let recurring = self.store.get_recurring_transactions().await?;
        self.projection_service.upcoming(&accounts, &recurring, until)
    }

    pub async fn run_periodic_checks(&self) -> Result<CheckReport, CoreError> {
        self.checks.run().await
    }

    /// A scheduler driving the periodic checks; call `spawn` to start it.
    pub fn scheduler(&self, config: SchedulerConfig) -> PeriodicScheduler {
        PeriodicScheduler::new(self.checks.clone(), config)
    }
}
