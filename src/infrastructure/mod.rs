pub mod alphavantage;
pub mod coingecko;
pub mod finnhub;
pub mod funding;
pub mod http_client_factory;
pub mod mempool_fee;
pub mod mock;
pub mod onchain;

use crate::domain::errors::ProviderError;
use crate::domain::market::{Candle, Timeframe};
use reqwest::StatusCode;

/// Map a non-success HTTP status to the provider error taxonomy. 429 is
/// kept distinct so the chain's logs show throttling rather than a generic
/// upstream failure.
pub(crate) fn check_status(provider: &str, status: StatusCode) -> Result<(), ProviderError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ProviderError::RateLimited {
            provider: provider.to_string(),
        });
    }
    if !status.is_success() {
        return Err(ProviderError::Http {
            reason: format!("{provider} returned status {status}"),
        });
    }
    Ok(())
}

/// Roll daily bars up into coarser bars, bucketing from the newest bar so
/// the latest coarse bar always ends on the latest daily bar.
pub(crate) fn aggregate_daily(daily: &[Candle], timeframe: Timeframe) -> Vec<Candle> {
    let size = timeframe.bar_days() as usize;
    if size <= 1 || daily.is_empty() {
        return daily.to_vec();
    }

    let mut out = Vec::with_capacity(daily.len() / size + 1);
    let mut end = daily.len();
    while end > 0 {
        let start = end.saturating_sub(size);
        let chunk = &daily[start..end];
        out.push(Candle {
            open: chunk[0].open,
            high: chunk.iter().map(|c| c.high).fold(f64::MIN, f64::max),
            low: chunk.iter().map(|c| c.low).fold(f64::MAX, f64::min),
            close: chunk[chunk.len() - 1].close,
            volume: chunk.iter().map(|c| c.volume).sum(),
            timestamp: chunk[chunk.len() - 1].timestamp,
        });
        end = start;
    }
    out.reverse();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn daily(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| Candle {
                open: 100.0 + i as f64,
                high: 101.0 + i as f64,
                low: 99.0 + i as f64,
                close: 100.5 + i as f64,
                volume: 10.0,
                timestamp: 86_400 * (i as i64 + 1),
            })
            .collect()
    }

    #[test]
    fn aggregation_buckets_from_newest() {
        let bars = daily(7);
        let coarse = aggregate_daily(&bars, Timeframe::ThreeDay);
        assert_eq!(coarse.len(), 3);
        // newest bucket holds the last three daily bars
        let last = coarse.last().unwrap();
        assert_eq!(last.timestamp, bars[6].timestamp);
        assert_eq!(last.close, bars[6].close);
        assert_eq!(last.open, bars[4].open);
        assert_eq!(last.volume, 30.0);
        // oldest bucket is the single leftover bar
        assert_eq!(coarse[0].open, bars[0].open);
    }

    #[test]
    fn daily_passthrough() {
        let bars = daily(5);
        assert_eq!(aggregate_daily(&bars, Timeframe::Daily), bars);
    }

    #[test]
    fn timestamps_stay_increasing() {
        let bars = daily(20);
        let coarse = aggregate_daily(&bars, Timeframe::Weekly);
        assert!(crate::domain::market::candle::timestamps_strictly_increasing(&coarse));
    }

    #[test]
    fn status_check_classifies_throttling() {
        assert!(check_status("finnhub", StatusCode::OK).is_ok());
        assert!(matches!(
            check_status("finnhub", StatusCode::TOO_MANY_REQUESTS),
            Err(ProviderError::RateLimited { .. })
        ));
        assert!(matches!(
            check_status("finnhub", StatusCode::INTERNAL_SERVER_ERROR),
            Err(ProviderError::Http { .. })
        ));
    }

    #[test]
    fn provider_errors_downcast_through_anyhow() {
        let err: anyhow::Error = ProviderError::RateLimited {
            provider: "coingecko".to_string(),
        }
        .into();
        assert!(err.downcast_ref::<ProviderError>().is_some());
    }
}
