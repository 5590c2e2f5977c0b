//! Perpetual funding rate feeds for the major venues. Each feed returns
//! the current rate as a decimal fraction per funding interval.

use crate::domain::ports::MetricProvider;
use crate::infrastructure::check_status;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;

pub struct BinanceFunding {
    client: ClientWithMiddleware,
}

impl BinanceFunding {
    pub fn new(client: ClientWithMiddleware) -> Self {
        Self { client }
    }
}

#[derive(Deserialize)]
struct BinancePremiumIndex {
    #[serde(rename = "lastFundingRate")]
    last_funding_rate: String,
}

#[async_trait]
impl MetricProvider for BinanceFunding {
    fn name(&self) -> &str {
        "funding_binance"
    }

    async fn fetch(&self) -> Result<f64> {
        let response = self
            .client
            .get("https://fapi.binance.com/fapi/v1/premiumIndex")
            .query(&[("symbol", "BTCUSDT")])
            .send()
            .await
            .context("Binance premium index request failed")?;
        check_status(self.name(), response.status())?;
        let index: BinancePremiumIndex = response
            .json()
            .await
            .context("Failed to parse Binance premium index")?;
        index
            .last_funding_rate
            .parse::<f64>()
            .context("Binance funding rate is not a number")
    }
}

pub struct BybitFunding {
    client: ClientWithMiddleware,
}

impl BybitFunding {
    pub fn new(client: ClientWithMiddleware) -> Self {
        Self { client }
    }
}

#[derive(Deserialize)]
struct BybitEnvelope {
    result: BybitResult,
}

#[derive(Deserialize)]
struct BybitResult {
    list: Vec<BybitTicker>,
}

#[derive(Deserialize)]
struct BybitTicker {
    #[serde(rename = "fundingRate")]
    funding_rate: String,
}

#[async_trait]
impl MetricProvider for BybitFunding {
    fn name(&self) -> &str {
        "funding_bybit"
    }

    async fn fetch(&self) -> Result<f64> {
        let response = self
            .client
            .get("https://api.bybit.com/v5/market/tickers")
            .query(&[("category", "linear"), ("symbol", "BTCUSDT")])
            .send()
            .await
            .context("Bybit tickers request failed")?;
        check_status(self.name(), response.status())?;
        let envelope: BybitEnvelope = response
            .json()
            .await
            .context("Failed to parse Bybit tickers response")?;
        let ticker = envelope
            .result
            .list
            .first()
            .context("Bybit returned an empty ticker list")?;
        ticker
            .funding_rate
            .parse::<f64>()
            .context("Bybit funding rate is not a number")
    }
}

pub struct OkxFunding {
    client: ClientWithMiddleware,
}

impl OkxFunding {
    pub fn new(client: ClientWithMiddleware) -> Self {
        Self { client }
    }
}

#[derive(Deserialize)]
struct OkxEnvelope {
    data: Vec<OkxFundingRate>,
}

#[derive(Deserialize)]
struct OkxFundingRate {
    #[serde(rename = "fundingRate")]
    funding_rate: String,
}

#[async_trait]
impl MetricProvider for OkxFunding {
    fn name(&self) -> &str {
        "funding_okx"
    }

    async fn fetch(&self) -> Result<f64> {
        let response = self
            .client
            .get("https://www.okx.com/api/v5/public/funding-rate")
            .query(&[("instId", "BTC-USDT-SWAP")])
            .send()
            .await
            .context("OKX funding rate request failed")?;
        check_status(self.name(), response.status())?;
        let envelope: OkxEnvelope = response
            .json()
            .await
            .context("Failed to parse OKX funding rate response")?;
        let entry = envelope
            .data
            .first()
            .context("OKX returned no funding rate entries")?;
        entry
            .funding_rate
            .parse::<f64>()
            .context("OKX funding rate is not a number")
    }
}
