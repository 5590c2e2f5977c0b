//! One-shot aggregation orchestrator: refresh the timeframe windows, run
//! every indicator, compose both scores, and assemble the report.

use crate::application::cache::TimeframeCache;
use crate::application::composer::{Composer, RawSignal};
use crate::application::indicators::{
    Indicator, IndicatorContext, bottom_indicators, top_indicators,
};
use crate::application::source_chain::DataSourceChain;
use crate::config::Config;
use crate::domain::errors::ConfigError;
use crate::domain::market::Timeframe;
use crate::domain::ports::{MetricProvider, QuoteProvider};
use crate::domain::report::{MarketContext, Report, SignalClass};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct Aggregator {
    config: Arc<Config>,
    cache: Arc<TimeframeCache>,
    chain: Arc<DataSourceChain>,
    metrics: HashMap<String, Arc<dyn MetricProvider>>,
}

impl Aggregator {
    pub fn new(
        config: Arc<Config>,
        cache: Arc<TimeframeCache>,
        chain: Arc<DataSourceChain>,
        metrics: HashMap<String, Arc<dyn MetricProvider>>,
    ) -> Self {
        Self {
            config,
            cache,
            chain,
            metrics,
        }
    }

    /// Run one full aggregation. Only configuration problems abort; every
    /// data problem degrades to Unavailable and a failure record.
    pub async fn run(&self) -> Result<Report, ConfigError> {
        self.config.validate()?;
        let started_at = Utc::now();
        let clock = Instant::now();
        self.chain.reset_demotions();

        // Warm every window up front, coarsest first, so indicators read a
        // consistent snapshot and never trigger their own refreshes.
        let mut refreshed_live = false;
        for timeframe in Timeframe::all() {
            let (_, refreshed) = self
                .cache
                .dataset(&self.chain, &self.config.symbol, timeframe)
                .await;
            refreshed_live |= refreshed;
        }

        let ctx = IndicatorContext::new(
            Arc::clone(&self.config),
            Arc::clone(&self.cache),
            Arc::clone(&self.chain),
            self.metrics.clone(),
        );

        let bottom_signals = Self::collect_signals(&ctx, bottom_indicators()).await;
        let top_signals = Self::collect_signals(&ctx, top_indicators()).await;

        let bottom = Composer::new(&self.config, SignalClass::Bottom).compose(&bottom_signals)?;
        let top = Composer::new(&self.config, SignalClass::Top).compose(&top_signals)?;

        let market_context = self.market_context().await;

        let mut failures = self.chain.drain_failures();
        failures.extend(ctx.drain_failures());

        let finished_at = Utc::now();
        let report = Report {
            bottom,
            top,
            market_context,
            failures,
            started_at,
            finished_at,
            duration_ms: clock.elapsed().as_millis() as u64,
            refreshed_live,
        };
        info!(
            bottom = ?report.bottom.composite,
            top = ?report.top.composite,
            duration_ms = report.duration_ms,
            failures = report.failures.len(),
            refreshed_live,
            "aggregation finished"
        );
        Ok(report)
    }

    /// Run one class of indicators. An indicator that yields no raw value
    /// is logged and recorded, never dropped silently.
    async fn collect_signals(
        ctx: &IndicatorContext,
        indicators: Vec<Box<dyn Indicator>>,
    ) -> Vec<RawSignal> {
        let mut signals = Vec::with_capacity(indicators.len());
        for indicator in indicators {
            let raw = indicator.compute_raw(ctx).await;
            match raw {
                Some(value) => debug!(indicator = indicator.name(), value, "indicator computed"),
                None => {
                    warn!(indicator = indicator.name(), "indicator unavailable");
                    ctx.record_unavailable(indicator.name());
                }
            }
            signals.push(RawSignal::new(indicator.name(), raw));
        }
        signals
    }

    async fn market_context(&self) -> MarketContext {
        let symbol = self.config.symbol.clone();
        let (price, provenance) = self.chain.current_price(&symbol).await;

        let daily = self.cache.peek(&symbol, Timeframe::Daily);
        let (daily_price_stats, daily_volume_stats) = match &daily {
            Some(ds) => (ds.price_stats(30), ds.volume_stats(30)),
            None => (None, None),
        };

        MarketContext {
            symbol,
            current_price: Some(price),
            price_source: Some(provenance.source),
            daily_price_stats,
            daily_volume_stats,
        }
    }
}

/// Convenience wiring for one run: build the cache and chain from the
/// config and the given collaborators, then run once.
pub async fn run_aggregation(
    config: Config,
    providers: Vec<Arc<dyn QuoteProvider>>,
    metrics: HashMap<String, Arc<dyn MetricProvider>>,
) -> Result<Report, ConfigError> {
    let chain = Arc::new(DataSourceChain::new(providers, &config));
    let cache = Arc::new(TimeframeCache::new(config.cache_ttl));
    let aggregator = Aggregator::new(Arc::new(config), cache, chain, metrics);
    aggregator.run().await
}
