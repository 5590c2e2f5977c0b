//! Ordered fallback over quote providers.
//!
//! The chain walks its providers in priority order, retrying each a bounded
//! number of times, and falls back to labeled synthetic data when every
//! provider fails. Provider errors never escape the chain; they are recorded
//! as failure records and the chain moves on.

use crate::config::{Config, ProviderSettings};
use crate::domain::market::{Candle, Provenance, Timeframe};
use crate::domain::ports::QuoteProvider;
use crate::domain::report::FailureRecord;
use chrono::Utc;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Price the synthetic generator anchors on when no real quote has ever
/// been seen in this process.
const SYNTHETIC_ANCHOR_PRICE: f64 = 115_000.0;

/// Per-bar volatility of the synthetic random walk.
const SYNTHETIC_VOLATILITY: f64 = 0.02;

struct ChainState {
    /// Last call instant per provider, for rate-limit spacing.
    last_call: HashMap<String, Instant>,
    /// Providers that exhausted their retries during the current run.
    demoted: HashSet<String>,
    failures: Vec<FailureRecord>,
    /// Most recent real price, used to anchor synthetic fallback data.
    last_known_price: Option<f64>,
}

/// Fallback chain over every configured quote provider.
pub struct DataSourceChain {
    providers: Vec<Arc<dyn QuoteProvider>>,
    settings: HashMap<String, ProviderSettings>,
    state: Mutex<ChainState>,
}

impl DataSourceChain {
    pub fn new(providers: Vec<Arc<dyn QuoteProvider>>, config: &Config) -> Self {
        let settings = providers
            .iter()
            .map(|p| (p.name().to_string(), config.provider_settings(p.name())))
            .collect();
        Self {
            providers,
            settings,
            state: Mutex::new(ChainState {
                last_call: HashMap::new(),
                demoted: HashSet::new(),
                failures: Vec::new(),
                last_known_price: None,
            }),
        }
    }

    /// Clear intra-run demotions. Called once at the start of each
    /// aggregation run so a provider that was down last run gets another
    /// chance.
    pub fn reset_demotions(&self) {
        self.state.lock().unwrap().demoted.clear();
    }

    /// Failures absorbed since the last drain, in occurrence order.
    pub fn drain_failures(&self) -> Vec<FailureRecord> {
        std::mem::take(&mut self.state.lock().unwrap().failures)
    }

    /// Current price via the chain, falling back to a synthetic quote
    /// derived from the last known real price.
    pub async fn current_price(&self, symbol: &str) -> (f64, Provenance) {
        for provider in &self.providers {
            let name = provider.name().to_string();
            if self.is_demoted(&name) {
                continue;
            }
            let retries = self.settings_for(&name).max_retries;
            for attempt in 0..=retries {
                self.respect_rate_limit(&name).await;
                match provider.current_price(symbol).await {
                    Ok(price) if price > 0.0 => {
                        self.note_price(price);
                        debug!(provider = %name, price, "current price fetched");
                        return (price, Provenance::real(&name));
                    }
                    Ok(price) => {
                        self.record_failure(&name, format!("non-positive price {price}"));
                        break;
                    }
                    Err(e) => {
                        warn!(provider = %name, attempt, error = %e, "price fetch failed");
                        if attempt == retries {
                            self.record_failure(&name, e.to_string());
                            self.demote(&name);
                        }
                    }
                }
            }
        }

        let price = self.synthetic_price();
        warn!(symbol, price, "all providers failed, using synthetic price");
        (price, Provenance::synthetic())
    }

    /// Historical bars via the chain, oldest first. Synthetic fallback is a
    /// random walk anchored on the last known real price.
    pub async fn historical_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        lookback: usize,
    ) -> (Vec<Candle>, Provenance) {
        for provider in &self.providers {
            let name = provider.name().to_string();
            if self.is_demoted(&name) {
                continue;
            }
            let retries = self.settings_for(&name).max_retries;
            for attempt in 0..=retries {
                self.respect_rate_limit(&name).await;
                match provider.historical_bars(symbol, timeframe, lookback).await {
                    Ok(bars) if !bars.is_empty() => {
                        if let Some(last) = bars.last() {
                            self.note_price(last.close);
                        }
                        debug!(
                            provider = %name,
                            %timeframe,
                            bars = bars.len(),
                            "historical bars fetched"
                        );
                        return (bars, Provenance::real(&name));
                    }
                    Ok(_) => {
                        self.record_failure(
                            &name,
                            format!("empty history for {symbol} {timeframe}"),
                        );
                        break;
                    }
                    Err(e) => {
                        warn!(provider = %name, %timeframe, attempt, error = %e, "history fetch failed");
                        if attempt == retries {
                            self.record_failure(&name, e.to_string());
                            self.demote(&name);
                        }
                    }
                }
            }
        }

        warn!(symbol, %timeframe, "all providers failed, generating synthetic bars");
        let bars = self.synthetic_bars(timeframe, lookback);
        (bars, Provenance::synthetic())
    }

    fn settings_for(&self, name: &str) -> ProviderSettings {
        self.settings.get(name).copied().unwrap_or_default()
    }

    fn is_demoted(&self, name: &str) -> bool {
        self.state.lock().unwrap().demoted.contains(name)
    }

    fn demote(&self, name: &str) {
        self.state.lock().unwrap().demoted.insert(name.to_string());
    }

    fn note_price(&self, price: f64) {
        self.state.lock().unwrap().last_known_price = Some(price);
    }

    fn record_failure(&self, source: &str, reason: String) {
        self.state
            .lock()
            .unwrap()
            .failures
            .push(FailureRecord::new(source, reason));
    }

    /// Sleep out the remainder of the provider's rate-limit window, then
    /// stamp the call. The lock is never held across the sleep.
    async fn respect_rate_limit(&self, name: &str) {
        let rate_limit = self.settings_for(name).rate_limit;
        let wait = {
            let state = self.state.lock().unwrap();
            state
                .last_call
                .get(name)
                .map(|last| rate_limit.saturating_sub(last.elapsed()))
                .unwrap_or(Duration::ZERO)
        };
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        self.state
            .lock()
            .unwrap()
            .last_call
            .insert(name.to_string(), Instant::now());
    }

    fn anchor_price(&self) -> f64 {
        self.state
            .lock()
            .unwrap()
            .last_known_price
            .unwrap_or(SYNTHETIC_ANCHOR_PRICE)
    }

    fn synthetic_price(&self) -> f64 {
        let anchor = self.anchor_price();
        let mut rng = rand::rng();
        anchor * (1.0 + rng.random_range(-0.005..0.005))
    }

    /// Random-walk bars ending now, spaced at the timeframe's bar duration
    /// and drifting back to the anchor price.
    fn synthetic_bars(&self, timeframe: Timeframe, lookback: usize) -> Vec<Candle> {
        let anchor = self.anchor_price();
        let mut rng = rand::rng();
        let now = Utc::now().timestamp();
        let step = timeframe.bar_seconds();

        let mut bars = Vec::with_capacity(lookback);
        let mut price = anchor * (1.0 - SYNTHETIC_VOLATILITY * (lookback as f64).sqrt() * 0.1);
        for i in 0..lookback {
            let drift = (anchor - price) / anchor * 0.05;
            let shock = rng.random_range(-SYNTHETIC_VOLATILITY..SYNTHETIC_VOLATILITY);
            let open = price;
            price *= 1.0 + drift + shock;
            let close = price;
            let high = open.max(close) * (1.0 + rng.random_range(0.0..0.01));
            let low = open.min(close) * (1.0 - rng.random_range(0.0..0.01));
            bars.push(Candle {
                open,
                high,
                low,
                close,
                volume: rng.random_range(500_000_000.0..2_000_000_000.0),
                timestamp: now - step * (lookback as i64 - 1 - i as i64),
            });
        }
        bars
    }
}
