//! Indicator contract and the registry of both signal classes.
//!
//! Every indicator implements the same narrow trait: given read access to
//! the cached timeframe datasets and the auxiliary metric feeds, produce a
//! raw value or report Unavailable (None). Indicators never perform their
//! own normalization and never abort the run.

pub mod bottom;
pub mod top;

use crate::application::cache::TimeframeCache;
use crate::application::source_chain::DataSourceChain;
use crate::config::Config;
use crate::domain::market::{Timeframe, TimeframeDataset};
use crate::domain::ports::MetricProvider;
use crate::domain::report::{FailureRecord, SignalClass};
use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Read-only view an indicator gets for one aggregation run.
pub struct IndicatorContext {
    pub config: Arc<Config>,
    pub cache: Arc<TimeframeCache>,
    pub chain: Arc<DataSourceChain>,
    /// Auxiliary metric feeds keyed by metric name ("nupl", "cvdd", ...).
    pub metrics: HashMap<String, Arc<dyn MetricProvider>>,
    failures: Mutex<Vec<FailureRecord>>,
}

impl IndicatorContext {
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
            failures: Mutex::new(Vec::new()),
        }
    }

    /// The dataset for one timeframe of the configured symbol, served from
    /// cache or refreshed through the chain.
    pub async fn dataset(&self, timeframe: Timeframe) -> Arc<TimeframeDataset> {
        let (dataset, _) = self
            .cache
            .dataset(&self.chain, &self.config.symbol, timeframe)
            .await;
        dataset
    }

    /// Fetch an auxiliary metric. A missing or failing feed yields None and
    /// a failure record, never an error.
    pub async fn metric(&self, key: &str) -> Option<f64> {
        let provider = match self.metrics.get(key) {
            Some(p) => p,
            None => {
                warn!(metric = key, "no metric feed configured");
                self.failures
                    .lock()
                    .unwrap()
                    .push(FailureRecord::new(key, "no metric feed configured"));
                return None;
            }
        };
        match provider.fetch().await {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(metric = key, provider = provider.name(), error = %e, "metric fetch failed");
                self.failures
                    .lock()
                    .unwrap()
                    .push(FailureRecord::new(provider.name(), e.to_string()));
                None
            }
        }
    }

    /// Record an indicator that produced no raw value, so the report keeps
    /// the reason alongside the Unavailable entry.
    pub fn record_unavailable(&self, indicator: &str) {
        self.failures.lock().unwrap().push(FailureRecord::new(
            indicator,
            "no raw value: input window too short or required feed missing",
        ));
    }

    pub fn drain_failures(&self) -> Vec<FailureRecord> {
        std::mem::take(&mut self.failures.lock().unwrap())
    }
}

#[async_trait]
pub trait Indicator: Send + Sync {
    /// Stable name, matching the weight and bound tables.
    fn name(&self) -> &'static str;

    fn class(&self) -> SignalClass;

    /// Raw value on the indicator's native scale, or None when the inputs
    /// are unavailable or insufficient.
    async fn compute_raw(&self, ctx: &IndicatorContext) -> Option<f64>;
}

pub fn bottom_indicators() -> Vec<Box<dyn Indicator>> {
    vec![
        Box::new(bottom::CvddTerminalRelative),
        Box::new(bottom::TimedBottomScore),
        Box::new(bottom::TwoDayVolumeBurst),
        Box::new(bottom::CmVixFix),
        Box::new(bottom::GaussianChannel),
        Box::new(bottom::ThreeDayMmd),
        Box::new(bottom::HashRibbons),
        Box::new(bottom::WeeklyWavefront),
        Box::new(bottom::SuperTrendReversal),
        Box::new(bottom::PiCycleLow),
        Box::new(bottom::PuellMultiple),
    ]
}

pub fn top_indicators() -> Vec<Box<dyn Indicator>> {
    vec![
        Box::new(top::CvddTerminalRelative),
        Box::new(top::Nupl),
        Box::new(top::TransactionCost),
        Box::new(top::FundingRates),
        Box::new(top::Bbwp),
        Box::new(top::WaveTrendOscillator),
        Box::new(top::ThreeDayVolume),
        Box::new(top::MomentumMarketDiagnostic),
        Box::new(top::PiCycleTop),
        Box::new(top::TimedTopScore),
    ]
}

/// Rolling simple moving average with an expanding warmup window, aligned
/// to the input.
pub(crate) fn rolling_sma(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    for i in 0..values.len() {
        sum += values[i];
        if i >= period {
            sum -= values[i - period];
        }
        let len = (i + 1).min(period);
        out.push(sum / len as f64);
    }
    out
}

/// Stochastic position of the last value inside the window's min-max range,
/// in [0, 1]. None when the range is flat.
pub(crate) fn stochastic_position(values: &[f64], period: usize) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let start = values.len().saturating_sub(period);
    let window = &values[start..];
    let min = window.iter().cloned().fold(f64::MAX, f64::min);
    let max = window.iter().cloned().fold(f64::MIN, f64::max);
    if max <= min {
        return None;
    }
    Some((values[values.len() - 1] - min) / (max - min))
}

/// Session weight anchored on the 08:00 and 20:00 UTC bar rollovers: full
/// weight at an anchor, linearly decaying to `floor` six hours away.
pub(crate) fn session_time_weight(now: DateTime<Utc>, floor: f64) -> f64 {
    let minutes = (now.hour() * 60 + now.minute()) as i64;
    let dist = [8 * 60_i64, 20 * 60]
        .iter()
        .map(|anchor| {
            let d = (minutes - anchor).abs();
            d.min(1440 - d)
        })
        .min()
        .unwrap_or(0);
    (1.0 - dist as f64 / 360.0 * 0.5).max(floor)
}

#[cfg(test)]
pub(crate) mod testutil {
    use crate::domain::market::{Candle, Provenance, Timeframe, TimeframeDataset};

    /// Dataset from closes with proportional highs/lows and cyclic volume.
    pub fn dataset(timeframe: Timeframe, closes: &[f64]) -> TimeframeDataset {
        let step = timeframe.bar_seconds();
        let candles: Vec<Candle> = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Candle {
                open: c * 0.999,
                high: c * 1.015,
                low: c * 0.985,
                close: c,
                volume: 1_000.0 * (1.0 + (i % 5) as f64 * 0.3),
                timestamp: step * (i as i64 + 1),
            })
            .collect();
        TimeframeDataset::new("BTCUSD", timeframe, candles, Provenance::real("test"))
    }

    /// Dataset with explicit per-bar volumes.
    pub fn dataset_with_volumes(
        timeframe: Timeframe,
        closes: &[f64],
        volumes: &[f64],
    ) -> TimeframeDataset {
        assert_eq!(closes.len(), volumes.len());
        let step = timeframe.bar_seconds();
        let candles: Vec<Candle> = closes
            .iter()
            .zip(volumes)
            .enumerate()
            .map(|(i, (&c, &v))| Candle {
                open: c * 0.999,
                high: c * 1.015,
                low: c * 0.985,
                close: c,
                volume: v,
                timestamp: step * (i as i64 + 1),
            })
            .collect();
        TimeframeDataset::new("BTCUSD", timeframe, candles, Provenance::real("test"))
    }

    /// A gently rising window of `n` bars starting at `base`.
    pub fn uptrend(timeframe: Timeframe, n: usize, base: f64) -> TimeframeDataset {
        let closes: Vec<f64> = (0..n).map(|i| base * (1.0 + 0.002 * i as f64)).collect();
        dataset(timeframe, &closes)
    }

    /// A declining window of `n` bars starting at `base`.
    pub fn downtrend(timeframe: Timeframe, n: usize, base: f64) -> TimeframeDataset {
        let closes: Vec<f64> = (0..n).map(|i| base * (1.0 - 0.002 * i as f64)).collect();
        dataset(timeframe, &closes)
    }
}
