use crate::domain::market::{Candle, Timeframe};
use anyhow::Result;
use async_trait::async_trait;

/// A single upstream quote source. Implementations own the network details;
/// the data source chain owns ordering, retries and fallback.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Stable name recorded in provenance and failure records.
    fn name(&self) -> &str;

    async fn current_price(&self, symbol: &str) -> Result<f64>;

    /// Historical bars, oldest first, strictly increasing timestamps.
    async fn historical_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        lookback: usize,
    ) -> Result<Vec<Candle>>;
}

/// Minimal contract for auxiliary metric feeds (funding rate, on-chain
/// metrics, fees). Supplied by external collaborators; an indicator whose
/// provider is absent or failing reports Unavailable.
#[async_trait]
pub trait MetricProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self) -> Result<f64>;
}
