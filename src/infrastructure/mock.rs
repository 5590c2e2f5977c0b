//! Deterministic in-process providers for tests and offline runs.

use crate::domain::market::{Candle, Timeframe};
use crate::domain::ports::{MetricProvider, QuoteProvider};
use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Scriptable quote provider with call counters.
pub struct MockQuoteProvider {
    name: String,
    price: f64,
    failing: AtomicBool,
    history_limit: Option<usize>,
    price_calls: AtomicUsize,
    history_calls: AtomicUsize,
}

impl MockQuoteProvider {
    pub fn healthy(name: impl Into<String>, price: f64) -> Self {
        Self {
            name: name.into(),
            price,
            failing: AtomicBool::new(false),
            history_limit: None,
            price_calls: AtomicUsize::new(0),
            history_calls: AtomicUsize::new(0),
        }
    }

    /// Cap the bars returned regardless of the requested lookback, for
    /// exercising thin-history paths.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }

    pub fn failing(name: impl Into<String>) -> Self {
        let provider = Self::healthy(name, 0.0);
        provider.failing.store(true, Ordering::SeqCst);
        provider
    }

    pub fn fail_from_now_on(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn recover(&self) {
        self.failing.store(false, Ordering::SeqCst);
    }

    pub fn price_calls(&self) -> usize {
        self.price_calls.load(Ordering::SeqCst)
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    /// Deterministic wavy bars around the configured price, oldest first.
    pub fn bars(&self, timeframe: Timeframe, lookback: usize) -> Vec<Candle> {
        let now = Utc::now().timestamp();
        let step = timeframe.bar_seconds();
        (0..lookback)
            .map(|i| {
                let phase = i as f64 * 0.21;
                let close = self.price * (1.0 + phase.sin() * 0.03);
                let open = self.price * (1.0 + (phase - 0.21).sin() * 0.03);
                Candle {
                    open,
                    high: open.max(close) * 1.01,
                    low: open.min(close) * 0.99,
                    close,
                    volume: 1_000.0 * (1.0 + (phase * 1.7).cos().abs()),
                    timestamp: now - step * (lookback as i64 - 1 - i as i64),
                }
            })
            .collect()
    }
}

#[async_trait]
impl QuoteProvider for MockQuoteProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn current_price(&self, _symbol: &str) -> Result<f64> {
        self.price_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            bail!("mock provider {} is down", self.name);
        }
        Ok(self.price)
    }

    async fn historical_bars(
        &self,
        _symbol: &str,
        timeframe: Timeframe,
        lookback: usize,
    ) -> Result<Vec<Candle>> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            bail!("mock provider {} is down", self.name);
        }
        let lookback = self.history_limit.map_or(lookback, |cap| cap.min(lookback));
        Ok(self.bars(timeframe, lookback))
    }
}

/// Metric feed that always returns the same value, or always fails.
pub struct StaticMetricProvider {
    name: String,
    value: Option<f64>,
}

impl StaticMetricProvider {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value: Some(value),
        }
    }

    pub fn failing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }
}

#[async_trait]
impl MetricProvider for StaticMetricProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<f64> {
        match self.value {
            Some(v) => Ok(v),
            None => bail!("mock metric {} is down", self.name),
        }
    }
}
