use crate::domain::errors::ProviderError;
use crate::domain::market::{Candle, Timeframe};
use crate::domain::ports::QuoteProvider;
use crate::infrastructure::{aggregate_daily, check_status};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;

const BASE_URL: &str = "https://finnhub.io/api/v1";

/// Finnhub quote source, used as the last real provider in the chain.
pub struct FinnhubProvider {
    client: ClientWithMiddleware,
    api_key: String,
}

impl FinnhubProvider {
    pub fn new(client: ClientWithMiddleware, api_key: String) -> Self {
        Self { client, api_key }
    }

    /// Finnhub crypto symbols are exchange-prefixed.
    fn exchange_symbol(symbol: &str) -> String {
        let upper = symbol.to_uppercase();
        let pair = if upper.ends_with("USDT") {
            upper
        } else if let Some(base) = upper.strip_suffix("USD") {
            format!("{base}USDT")
        } else {
            format!("{upper}USDT")
        };
        format!("BINANCE:{pair}")
    }
}

#[derive(Deserialize)]
struct Quote {
    /// current price
    c: f64,
}

#[derive(Deserialize)]
struct CandleResponse {
    s: String,
    #[serde(default)]
    t: Vec<i64>,
    #[serde(default)]
    o: Vec<f64>,
    #[serde(default)]
    h: Vec<f64>,
    #[serde(default)]
    l: Vec<f64>,
    #[serde(default)]
    c: Vec<f64>,
    #[serde(default)]
    v: Vec<f64>,
}

#[async_trait]
impl QuoteProvider for FinnhubProvider {
    fn name(&self) -> &str {
        "finnhub"
    }

    async fn current_price(&self, symbol: &str) -> Result<f64> {
        let response = self
            .client
            .get(format!("{BASE_URL}/quote"))
            .query(&[
                ("symbol", Self::exchange_symbol(symbol)),
                ("token", self.api_key.clone()),
            ])
            .send()
            .await
            .context("Finnhub quote request failed")?;
        check_status(self.name(), response.status())?;
        let quote: Quote = response
            .json()
            .await
            .context("Failed to parse Finnhub quote response")?;
        if quote.c <= 0.0 {
            return Err(ProviderError::BadResponse {
                provider: self.name().to_string(),
                reason: format!("zero quote for {symbol}"),
            }
            .into());
        }
        Ok(quote.c)
    }

    async fn historical_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        lookback: usize,
    ) -> Result<Vec<Candle>> {
        let now = Utc::now().timestamp();
        let from = now - (lookback as i64) * timeframe.bar_seconds();
        let response = self
            .client
            .get(format!("{BASE_URL}/crypto/candle"))
            .query(&[
                ("symbol", Self::exchange_symbol(symbol)),
                ("resolution", "D".to_string()),
                ("from", from.to_string()),
                ("to", now.to_string()),
                ("token", self.api_key.clone()),
            ])
            .send()
            .await
            .context("Finnhub candle request failed")?;
        check_status(self.name(), response.status())?;
        let body: CandleResponse = response
            .json()
            .await
            .context("Failed to parse Finnhub candle response")?;
        if body.s != "ok" || body.t.is_empty() {
            return Err(ProviderError::EmptyHistory {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
            }
            .into());
        }

        let n = body.t.len();
        if [body.o.len(), body.h.len(), body.l.len(), body.c.len(), body.v.len()]
            .iter()
            .any(|len| *len != n)
        {
            return Err(ProviderError::BadResponse {
                provider: self.name().to_string(),
                reason: format!("candle arrays are misaligned for {symbol}"),
            }
            .into());
        }

        let daily: Vec<Candle> = (0..n)
            .map(|i| Candle {
                open: body.o[i],
                high: body.h[i],
                low: body.l[i],
                close: body.c[i],
                volume: body.v[i],
                timestamp: body.t[i],
            })
            .collect();

        let mut bars = aggregate_daily(&daily, timeframe);
        if bars.len() > lookback {
            bars.drain(..bars.len() - lookback);
        }
        Ok(bars)
    }
}
