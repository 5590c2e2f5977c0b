//! On-chain valuation feeds backed by bitcoin-data.com.

use crate::domain::errors::ProviderError;
use crate::domain::ports::MetricProvider;
use crate::infrastructure::check_status;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;

const BASE_URL: &str = "https://bitcoin-data.com/v1";

#[derive(Deserialize)]
struct NuplPoint {
    nupl: String,
}

/// Net Unrealized Profit/Loss, in percent.
pub struct NuplProvider {
    client: ClientWithMiddleware,
}

impl NuplProvider {
    pub fn new(client: ClientWithMiddleware) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MetricProvider for NuplProvider {
    fn name(&self) -> &str {
        "nupl"
    }

    async fn fetch(&self) -> Result<f64> {
        let response = self
            .client
            .get(format!("{BASE_URL}/nupl/last"))
            .send()
            .await
            .context("NUPL request failed")?;
        check_status(self.name(), response.status())?;
        let point: NuplPoint = response
            .json()
            .await
            .context("Failed to parse NUPL response")?;
        let value = point
            .nupl
            .parse::<f64>()
            .context("NUPL value is not a number")?;
        // the feed reports a fraction; the indicator works in percent
        Ok(value * 100.0)
    }
}

#[derive(Deserialize)]
struct CvddPoint {
    cvdd: String,
}

#[derive(Deserialize)]
struct TerminalPricePoint {
    #[serde(rename = "terminalPrice")]
    terminal_price: String,
}

#[derive(Deserialize)]
struct BtcPricePoint {
    #[serde(rename = "btcPrice")]
    btc_price: String,
}

/// Price position between the CVDD floor and the terminal price ceiling,
/// clamped to 0..1.
pub struct CvddTerminalProvider {
    client: ClientWithMiddleware,
}

impl CvddTerminalProvider {
    pub fn new(client: ClientWithMiddleware) -> Self {
        Self { client }
    }

    async fn fetch_field<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(format!("{BASE_URL}/{path}"))
            .send()
            .await
            .with_context(|| format!("Request for {path} failed"))?;
        check_status(self.name(), response.status())?;
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse {path} response"))
    }
}

#[async_trait]
impl MetricProvider for CvddTerminalProvider {
    fn name(&self) -> &str {
        "cvdd"
    }

    async fn fetch(&self) -> Result<f64> {
        let cvdd: CvddPoint = self.fetch_field("cvdd/last").await?;
        let terminal: TerminalPricePoint = self.fetch_field("terminal-price/last").await?;
        let price: BtcPricePoint = self.fetch_field("btc-price/last").await?;

        let floor = cvdd.cvdd.parse::<f64>().context("CVDD is not a number")?;
        let ceiling = terminal
            .terminal_price
            .parse::<f64>()
            .context("Terminal price is not a number")?;
        let spot = price
            .btc_price
            .parse::<f64>()
            .context("BTC price is not a number")?;

        if ceiling <= floor {
            return Err(ProviderError::BadResponse {
                provider: self.name().to_string(),
                reason: format!("terminal price {ceiling} is not above the CVDD floor {floor}"),
            }
            .into());
        }
        Ok(((spot - floor) / (ceiling - floor)).clamp(0.0, 1.0))
    }
}
