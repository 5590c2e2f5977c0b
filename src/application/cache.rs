//! TTL cache of per-timeframe datasets.
//!
//! Each (symbol, timeframe) key holds one immutable dataset snapshot that
//! is replaced atomically on refresh. Readers either see the old snapshot
//! or the new one, never a half-built window. A per-key refresh guard keeps
//! concurrent requests for the same stale key from fetching twice.

use crate::application::source_chain::DataSourceChain;
use crate::domain::market::{Timeframe, TimeframeDataset};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

type CacheKey = (String, Timeframe);

/// Status of one cached entry, for the report's cache summary.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EntryStatus {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub age_secs: i64,
    pub fresh: bool,
    pub synthetic: bool,
    pub bars: usize,
}

pub struct TimeframeCache {
    ttl: Duration,
    entries: RwLock<HashMap<CacheKey, Arc<TimeframeDataset>>>,
    /// One refresh guard per key so a stale entry is fetched exactly once.
    refresh_guards: std::sync::Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
}

impl TimeframeCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
            refresh_guards: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// The dataset for (symbol, timeframe), refreshed via the chain when the
    /// entry is missing or older than the TTL. Returns the dataset and
    /// whether a live refresh happened.
    pub async fn dataset(
        &self,
        chain: &DataSourceChain,
        symbol: &str,
        timeframe: Timeframe,
    ) -> (Arc<TimeframeDataset>, bool) {
        let key = (symbol.to_string(), timeframe);

        if let Some(fresh) = self.fresh_entry(&key) {
            debug!(symbol, %timeframe, "cache hit");
            return (fresh, false);
        }

        let guard = self.guard_for(&key);
        let _held = guard.lock().await;

        // Another task may have refreshed while this one waited on the guard.
        if let Some(fresh) = self.fresh_entry(&key) {
            return (fresh, false);
        }

        let lookback = timeframe.default_lookback();
        let (bars, provenance) = chain.historical_bars(symbol, timeframe, lookback).await;
        let dataset = Arc::new(TimeframeDataset::new(symbol, timeframe, bars, provenance));
        info!(
            symbol,
            %timeframe,
            bars = dataset.len(),
            source = %dataset.provenance.source,
            "cache refreshed"
        );
        self.entries
            .write()
            .unwrap()
            .insert(key, Arc::clone(&dataset));
        (dataset, true)
    }

    /// Peek without refreshing. Returns stale entries too.
    pub fn peek(&self, symbol: &str, timeframe: Timeframe) -> Option<Arc<TimeframeDataset>> {
        self.entries
            .read()
            .unwrap()
            .get(&(symbol.to_string(), timeframe))
            .cloned()
    }

    /// Drop entries for the symbol: one timeframe, or all of them.
    pub fn invalidate(&self, symbol: &str, timeframe: Option<Timeframe>) {
        let mut entries = self.entries.write().unwrap();
        match timeframe {
            Some(tf) => {
                entries.remove(&(symbol.to_string(), tf));
            }
            None => {
                entries.retain(|(s, _), _| s != symbol);
            }
        }
    }

    /// Per-entry status snapshot.
    pub fn status(&self) -> Vec<EntryStatus> {
        let now = Utc::now();
        let entries = self.entries.read().unwrap();
        let mut out: Vec<EntryStatus> = entries
            .values()
            .map(|ds| {
                let age = (now - ds.refreshed_at).num_seconds();
                EntryStatus {
                    symbol: ds.symbol.clone(),
                    timeframe: ds.timeframe,
                    age_secs: age,
                    fresh: age >= 0 && (age as u64) < self.ttl.as_secs(),
                    synthetic: ds.provenance.synthetic,
                    bars: ds.len(),
                }
            })
            .collect();
        out.sort_by_key(|s| (s.symbol.clone(), s.timeframe.code()));
        out
    }

    fn fresh_entry(&self, key: &CacheKey) -> Option<Arc<TimeframeDataset>> {
        let entries = self.entries.read().unwrap();
        let ds = entries.get(key)?;
        let age = Utc::now() - ds.refreshed_at;
        if age.to_std().map(|a| a < self.ttl).unwrap_or(false) {
            Some(Arc::clone(ds))
        } else {
            None
        }
    }

    fn guard_for(&self, key: &CacheKey) -> Arc<Mutex<()>> {
        let mut guards = self.refresh_guards.lock().unwrap();
        Arc::clone(guards.entry(key.clone()).or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::domain::ports::QuoteProvider;
    use crate::infrastructure::mock::MockQuoteProvider;

    fn chain(provider: Arc<MockQuoteProvider>) -> DataSourceChain {
        DataSourceChain::new(
            vec![provider as Arc<dyn QuoteProvider>],
            &Config::defaults(),
        )
    }

    #[tokio::test]
    async fn second_read_within_ttl_hits_cache() {
        let provider = Arc::new(MockQuoteProvider::healthy("mock", 100.0));
        let chain = chain(provider.clone());
        let cache = TimeframeCache::new(Duration::from_secs(3600));

        let (_, refreshed) = cache.dataset(&chain, "BTCUSD", Timeframe::Daily).await;
        assert!(refreshed);
        let (_, refreshed) = cache.dataset(&chain, "BTCUSD", Timeframe::Daily).await;
        assert!(!refreshed);
        assert_eq!(provider.history_calls(), 1);
    }

    #[tokio::test]
    async fn zero_ttl_always_refreshes() {
        let provider = Arc::new(MockQuoteProvider::healthy("mock", 100.0));
        let chain = chain(provider.clone());
        let cache = TimeframeCache::new(Duration::ZERO);

        cache.dataset(&chain, "BTCUSD", Timeframe::Daily).await;
        cache.dataset(&chain, "BTCUSD", Timeframe::Daily).await;
        assert_eq!(provider.history_calls(), 2);
    }

    #[tokio::test]
    async fn invalidate_single_timeframe() {
        let provider = Arc::new(MockQuoteProvider::healthy("mock", 100.0));
        let chain = chain(provider.clone());
        let cache = TimeframeCache::new(Duration::from_secs(3600));

        cache.dataset(&chain, "BTCUSD", Timeframe::Daily).await;
        cache.dataset(&chain, "BTCUSD", Timeframe::Weekly).await;
        cache.invalidate("BTCUSD", Some(Timeframe::Daily));

        assert!(cache.peek("BTCUSD", Timeframe::Daily).is_none());
        assert!(cache.peek("BTCUSD", Timeframe::Weekly).is_some());
    }

    #[tokio::test]
    async fn invalidate_all_timeframes_for_symbol() {
        let provider = Arc::new(MockQuoteProvider::healthy("mock", 100.0));
        let chain = chain(provider.clone());
        let cache = TimeframeCache::new(Duration::from_secs(3600));

        cache.dataset(&chain, "BTCUSD", Timeframe::Daily).await;
        cache.dataset(&chain, "BTCUSD", Timeframe::Monthly).await;
        cache.invalidate("BTCUSD", None);

        assert!(cache.status().is_empty());
    }

    #[tokio::test]
    async fn concurrent_requests_refresh_once() {
        let provider = Arc::new(MockQuoteProvider::healthy("mock", 100.0));
        let chain = Arc::new(chain(provider.clone()));
        let cache = Arc::new(TimeframeCache::new(Duration::from_secs(3600)));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let chain = Arc::clone(&chain);
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                cache.dataset(&chain, "BTCUSD", Timeframe::Daily).await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(provider.history_calls(), 1);
    }

    #[tokio::test]
    async fn status_reports_provenance() {
        let provider: Arc<MockQuoteProvider> = Arc::new(MockQuoteProvider::failing("mock"));
        let chain = DataSourceChain::new(
            vec![Arc::clone(&provider) as Arc<dyn QuoteProvider>],
            &Config::defaults(),
        );
        let cache = TimeframeCache::new(Duration::from_secs(3600));

        cache.dataset(&chain, "BTCUSD", Timeframe::Daily).await;
        let status = cache.status();
        assert_eq!(status.len(), 1);
        assert!(status[0].synthetic);
        assert!(status[0].fresh);
    }
}
