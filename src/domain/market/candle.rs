use serde::{Deserialize, Serialize};

/// One OHLCV bar. Timestamps are unix seconds (UTC).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub timestamp: i64,
}

impl Candle {
    /// Typical price used by channel-style indicators.
    pub fn hl2(&self) -> f64 {
        (self.high + self.low) / 2.0
    }
}

/// Checks the bar-sequence invariant: strictly increasing timestamps.
pub fn timestamps_strictly_increasing(candles: &[Candle]) -> bool {
    candles.windows(2).all(|w| w[0].timestamp < w[1].timestamp)
}
