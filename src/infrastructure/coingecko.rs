use crate::domain::errors::ProviderError;
use crate::domain::market::{Candle, Timeframe};
use crate::domain::ports::QuoteProvider;
use crate::infrastructure::{aggregate_daily, check_status};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

const FREE_BASE_URL: &str = "https://api.coingecko.com/api/v3";
const PRO_BASE_URL: &str = "https://pro-api.coingecko.com/api/v3";

/// CoinGecko quote source. With an API key it runs against the pro
/// endpoint, otherwise the free tier.
pub struct CoinGeckoProvider {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: Option<String>,
    name: String,
}

impl CoinGeckoProvider {
    pub fn new(client: ClientWithMiddleware, api_key: Option<String>) -> Self {
        let (base_url, name) = match &api_key {
            Some(_) => (PRO_BASE_URL.to_string(), "coingecko_pro".to_string()),
            None => (FREE_BASE_URL.to_string(), "coingecko".to_string()),
        };
        Self {
            client,
            base_url,
            api_key,
            name,
        }
    }

    fn coin_id(symbol: &str) -> &'static str {
        match symbol.to_uppercase().as_str() {
            "BTCUSD" | "BTCUSDT" | "BTC" | "XBTUSD" => "bitcoin",
            "ETHUSD" | "ETHUSDT" | "ETH" => "ethereum",
            _ => "bitcoin",
        }
    }

    fn key_params(&self) -> Vec<(&'static str, String)> {
        match &self.api_key {
            Some(key) => vec![("x_cg_pro_api_key", key.clone())],
            None => Vec::new(),
        }
    }
}

#[derive(Deserialize)]
struct MarketChart {
    /// [timestamp_ms, value] pairs
    prices: Vec<[f64; 2]>,
    total_volumes: Vec<[f64; 2]>,
}

#[async_trait]
impl QuoteProvider for CoinGeckoProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn current_price(&self, symbol: &str) -> Result<f64> {
        let coin = Self::coin_id(symbol);
        let url = format!("{}/simple/price", self.base_url);
        let mut params = self.key_params();
        params.push(("ids", coin.to_string()));
        params.push(("vs_currencies", "usd".to_string()));

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .context("CoinGecko price request failed")?;
        check_status(&self.name, response.status())?;

        let body: HashMap<String, HashMap<String, f64>> = response
            .json()
            .await
            .context("Failed to parse CoinGecko price response")?;
        body.get(coin)
            .and_then(|quotes| quotes.get("usd"))
            .copied()
            .ok_or_else(|| {
                ProviderError::BadResponse {
                    provider: self.name.clone(),
                    reason: format!("no usd quote for {coin}"),
                }
                .into()
            })
    }

    async fn historical_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        lookback: usize,
    ) -> Result<Vec<Candle>> {
        let coin = Self::coin_id(symbol);
        let days = (lookback * timeframe.bar_days() as usize).min(2_000);
        let url = format!("{}/coins/{}/market_chart", self.base_url, coin);
        let mut params = self.key_params();
        params.push(("vs_currency", "usd".to_string()));
        params.push(("days", days.to_string()));
        params.push(("interval", "daily".to_string()));

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .context("CoinGecko market_chart request failed")?;
        check_status(&self.name, response.status())?;
        let chart: MarketChart = response
            .json()
            .await
            .context("Failed to parse CoinGecko market_chart response")?;
        if chart.prices.is_empty() {
            return Err(ProviderError::EmptyHistory {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
            }
            .into());
        }

        // market_chart is a price polyline, not OHLC. Reconstruct daily bars
        // with open = previous close; the range is approximated from the two
        // endpoints.
        let volumes: HashMap<i64, f64> = chart
            .total_volumes
            .iter()
            .map(|[ts, v]| ((*ts as i64) / 1000 / 86_400, *v))
            .collect();

        let mut daily = Vec::with_capacity(chart.prices.len());
        let mut prev_close: Option<f64> = None;
        for [ts_ms, price] in &chart.prices {
            let timestamp = (*ts_ms as i64) / 1000;
            let open = prev_close.unwrap_or(*price);
            let volume = volumes.get(&(timestamp / 86_400)).copied().unwrap_or(0.0);
            daily.push(Candle {
                open,
                high: open.max(*price),
                low: open.min(*price),
                close: *price,
                volume,
                timestamp,
            });
            prev_close = Some(*price);
        }
        daily.dedup_by_key(|c| c.timestamp / 86_400);

        let mut bars = aggregate_daily(&daily, timeframe);
        if bars.len() > lookback {
            bars.drain(..bars.len() - lookback);
        }
        debug!(provider = %self.name, %timeframe, bars = bars.len(), "history assembled");
        Ok(bars)
    }
}
