use super::candle::Candle;
use super::series;
use super::timeframe::Timeframe;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which data source satisfied a fetch. Synthetic fallback data is always
/// labeled so downstream consumers can tell it apart from real quotes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub source: String,
    pub synthetic: bool,
}

impl Provenance {
    pub fn real(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            synthetic: false,
        }
    }

    pub fn synthetic() -> Self {
        Self {
            source: "synthetic".to_string(),
            synthetic: true,
        }
    }
}

/// Names of the derived series kept alongside each bar window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeriesKind {
    Rsi,
    MacdLine,
    MacdSignal,
    MacdHistogram,
    StochK,
    StochD,
    BbUpper,
    BbMiddle,
    BbLower,
    BbWidth,
    Supertrend,
    SupertrendDir,
    Atr,
    VolumeSma,
    VolumeRatio,
}

/// Rolling volume statistics over the most recent `periods` bars.
#[derive(Debug, Clone, Serialize)]
pub struct VolumeStats {
    pub current: f64,
    pub mean: f64,
    pub std: f64,
    pub z_score: f64,
    pub percentile: f64,
}

/// Rolling price statistics over the most recent `periods` bars.
#[derive(Debug, Clone, Serialize)]
pub struct PriceStats {
    pub current: f64,
    pub mean: f64,
    pub std: f64,
    pub high: f64,
    pub low: f64,
    pub change_pct: f64,
}

/// One (symbol, timeframe) snapshot: the bar window, every derived series
/// aligned to it, and fetch provenance. Replaced wholesale on refresh.
#[derive(Debug, Clone)]
pub struct TimeframeDataset {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub candles: Vec<Candle>,
    pub series: HashMap<SeriesKind, Vec<f64>>,
    pub refreshed_at: DateTime<Utc>,
    pub provenance: Provenance,
}

impl TimeframeDataset {
    /// Build a dataset, computing all derived series over the full window.
    pub fn new(
        symbol: impl Into<String>,
        timeframe: Timeframe,
        candles: Vec<Candle>,
        provenance: Provenance,
    ) -> Self {
        let series = series::compute_derived(&candles);
        Self {
            symbol: symbol.into(),
            timeframe,
            candles,
            series,
            refreshed_at: Utc::now(),
            provenance,
        }
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// Close `lookback` bars back from the latest (0 = latest bar).
    pub fn close(&self, lookback: usize) -> Option<f64> {
        let n = self.candles.len();
        if lookback >= n {
            return None;
        }
        Some(self.candles[n - 1 - lookback].close)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.volume).collect()
    }

    /// Derived-series value `lookback` bars back from the latest.
    pub fn series_value(&self, kind: SeriesKind, lookback: usize) -> Option<f64> {
        let s = self.series.get(&kind)?;
        let n = s.len();
        if lookback >= n {
            return None;
        }
        Some(s[n - 1 - lookback])
    }

    pub fn series_slice(&self, kind: SeriesKind) -> Option<&[f64]> {
        self.series.get(&kind).map(|s| s.as_slice())
    }

    /// Last `count` values of a derived series (fewer during warmup).
    pub fn series_tail(&self, kind: SeriesKind, count: usize) -> Option<Vec<f64>> {
        let s = self.series.get(&kind)?;
        let start = s.len().saturating_sub(count);
        Some(s[start..].to_vec())
    }

    /// Rate of change over `periods` bars, in percent.
    pub fn momentum(&self, periods: usize) -> Option<f64> {
        let current = self.close(0)?;
        let past = self.close(periods)?;
        if past == 0.0 {
            return None;
        }
        Some((current - past) / past * 100.0)
    }

    pub fn volume_stats(&self, periods: usize) -> Option<VolumeStats> {
        let volumes = self.volumes();
        let current = *volumes.last()?;
        let start = volumes.len().saturating_sub(periods);
        let recent = &volumes[start..];
        let mean = series::mean(recent)?;
        let std = series::std_dev(recent)?;
        if std == 0.0 {
            return None;
        }
        let below = recent.iter().filter(|v| current > **v).count();
        Some(VolumeStats {
            current,
            mean,
            std,
            z_score: (current - mean) / std,
            percentile: below as f64 / recent.len() as f64 * 100.0,
        })
    }

    pub fn price_stats(&self, periods: usize) -> Option<PriceStats> {
        if self.candles.is_empty() {
            return None;
        }
        let start = self.candles.len().saturating_sub(periods);
        let recent = &self.candles[start..];
        let closes: Vec<f64> = recent.iter().map(|c| c.close).collect();
        let current = *closes.last()?;
        let first = *closes.first()?;
        if first == 0.0 {
            return None;
        }
        Some(PriceStats {
            current,
            mean: series::mean(&closes)?,
            std: series::std_dev(&closes)?,
            high: recent.iter().map(|c| c.high).fold(f64::MIN, f64::max),
            low: recent.iter().map(|c| c.low).fold(f64::MAX, f64::min),
            change_pct: (current - first) / first * 100.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(closes: &[f64]) -> TimeframeDataset {
        let candles: Vec<Candle> = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Candle {
                open: c,
                high: c * 1.02,
                low: c * 0.98,
                close: c,
                volume: 1000.0 * (1.0 + (i % 3) as f64),
                timestamp: 86_400 * (i as i64 + 1),
            })
            .collect();
        TimeframeDataset::new("BTCUSD", Timeframe::Daily, candles, Provenance::real("test"))
    }

    #[test]
    fn close_lookback() {
        let ds = dataset(&[1.0, 2.0, 3.0]);
        assert_eq!(ds.close(0), Some(3.0));
        assert_eq!(ds.close(2), Some(1.0));
        assert_eq!(ds.close(3), None);
    }

    #[test]
    fn momentum_over_window() {
        let ds = dataset(&[100.0, 100.0, 110.0]);
        let m = ds.momentum(2).unwrap();
        assert!((m - 10.0).abs() < 1e-9);
    }

    #[test]
    fn series_match_bar_count() {
        let ds = dataset(&[100.0, 101.0, 102.0, 103.0]);
        for values in ds.series.values() {
            assert_eq!(values.len(), ds.len());
        }
    }

    #[test]
    fn volume_stats_z_score() {
        let ds = dataset(&[100.0; 30]);
        let stats = ds.volume_stats(20).unwrap();
        assert!(stats.std > 0.0);
        assert!((stats.z_score).is_finite());
    }
}
