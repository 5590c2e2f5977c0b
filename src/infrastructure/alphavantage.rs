use crate::domain::errors::ProviderError;
use crate::domain::market::{Candle, Timeframe};
use crate::domain::ports::QuoteProvider;
use crate::infrastructure::{aggregate_daily, check_status};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use std::collections::HashMap;

const BASE_URL: &str = "https://www.alphavantage.co/query";

/// Alpha Vantage quote source. The free tier is heavily rate limited, so
/// this sits late in the fallback order.
pub struct AlphaVantageProvider {
    client: ClientWithMiddleware,
    api_key: String,
}

impl AlphaVantageProvider {
    pub fn new(client: ClientWithMiddleware, api_key: String) -> Self {
        Self { client, api_key }
    }

    /// "BTCUSD" -> ("BTC", "USD")
    fn split_symbol(symbol: &str) -> (String, String) {
        let upper = symbol.to_uppercase();
        if let Some(base) = upper.strip_suffix("USDT") {
            return (base.to_string(), "USD".to_string());
        }
        if let Some(base) = upper.strip_suffix("USD") {
            return (base.to_string(), "USD".to_string());
        }
        (upper, "USD".to_string())
    }
}

#[derive(Deserialize)]
struct ExchangeRateEnvelope {
    #[serde(rename = "Realtime Currency Exchange Rate")]
    rate: Option<ExchangeRate>,
}

#[derive(Deserialize)]
struct ExchangeRate {
    #[serde(rename = "5. Exchange Rate")]
    exchange_rate: String,
}

#[derive(Deserialize)]
struct DailySeriesEnvelope {
    #[serde(rename = "Time Series (Digital Currency Daily)")]
    series: Option<HashMap<String, DailyBar>>,
}

#[derive(Deserialize)]
struct DailyBar {
    #[serde(rename = "1. open")]
    open: String,
    #[serde(rename = "2. high")]
    high: String,
    #[serde(rename = "3. low")]
    low: String,
    #[serde(rename = "4. close")]
    close: String,
    #[serde(rename = "5. volume")]
    volume: String,
}

#[async_trait]
impl QuoteProvider for AlphaVantageProvider {
    fn name(&self) -> &str {
        "alphavantage"
    }

    async fn current_price(&self, symbol: &str) -> Result<f64> {
        let (base, quote) = Self::split_symbol(symbol);
        let response = self
            .client
            .get(BASE_URL)
            .query(&[
                ("function", "CURRENCY_EXCHANGE_RATE"),
                ("from_currency", &base),
                ("to_currency", &quote),
                ("apikey", &self.api_key),
            ])
            .send()
            .await
            .context("Alpha Vantage exchange rate request failed")?;
        check_status(self.name(), response.status())?;

        let envelope: ExchangeRateEnvelope = response
            .json()
            .await
            .context("Failed to parse Alpha Vantage exchange rate response")?;
        // the free tier reports throttling as a 200 with the payload dropped
        let rate = envelope.rate.ok_or_else(|| ProviderError::RateLimited {
            provider: self.name().to_string(),
        })?;
        rate.exchange_rate
            .parse::<f64>()
            .context("Alpha Vantage exchange rate is not a number")
    }

    async fn historical_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        lookback: usize,
    ) -> Result<Vec<Candle>> {
        let (base, quote) = Self::split_symbol(symbol);
        let response = self
            .client
            .get(BASE_URL)
            .query(&[
                ("function", "DIGITAL_CURRENCY_DAILY"),
                ("symbol", &base),
                ("market", &quote),
                ("outputsize", &"full".to_string()),
                ("apikey", &self.api_key),
            ])
            .send()
            .await
            .context("Alpha Vantage daily series request failed")?;
        check_status(self.name(), response.status())?;

        let envelope: DailySeriesEnvelope = response
            .json()
            .await
            .context("Failed to parse Alpha Vantage daily series response")?;
        let series = envelope.series.ok_or_else(|| ProviderError::RateLimited {
            provider: self.name().to_string(),
        })?;

        let mut daily: Vec<Candle> = Vec::with_capacity(series.len());
        for (date, bar) in &series {
            let day = NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .with_context(|| format!("Bad date in Alpha Vantage series: {date}"))?;
            let timestamp = day
                .and_hms_opt(0, 0, 0)
                .context("Invalid midnight timestamp")?
                .and_utc()
                .timestamp();
            daily.push(Candle {
                open: bar.open.parse().context("Bad open in daily series")?,
                high: bar.high.parse().context("Bad high in daily series")?,
                low: bar.low.parse().context("Bad low in daily series")?,
                close: bar.close.parse().context("Bad close in daily series")?,
                volume: bar.volume.parse().context("Bad volume in daily series")?,
                timestamp,
            });
        }
        if daily.is_empty() {
            return Err(ProviderError::EmptyHistory {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
            }
            .into());
        }
        daily.sort_by_key(|c| c.timestamp);

        let mut bars = aggregate_daily(&daily, timeframe);
        if bars.len() > lookback {
            bars.drain(..bars.len() - lookback);
        }
        Ok(bars)
    }
}
