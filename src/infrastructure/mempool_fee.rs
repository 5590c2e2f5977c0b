use crate::domain::ports::MetricProvider;
use crate::infrastructure::check_status;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;

const BASE_URL: &str = "https://mempool.space/api/v1";

/// Typical transaction vsize used to turn a sat/vB fee rate into a fee.
const TYPICAL_TX_VSIZE: f64 = 140.0;

/// Median-priority on-chain fee for a typical transaction, in USD, built
/// from mempool.space's recommended fee rate and its USD price feed.
pub struct MempoolFeeProvider {
    client: ClientWithMiddleware,
}

impl MempoolFeeProvider {
    pub fn new(client: ClientWithMiddleware) -> Self {
        Self { client }
    }
}

#[derive(Deserialize)]
struct RecommendedFees {
    #[serde(rename = "halfHourFee")]
    half_hour_fee: f64,
}

#[derive(Deserialize)]
struct Prices {
    #[serde(rename = "USD")]
    usd: f64,
}

#[async_trait]
impl MetricProvider for MempoolFeeProvider {
    fn name(&self) -> &str {
        "mempool_fees"
    }

    async fn fetch(&self) -> Result<f64> {
        let fees_response = self
            .client
            .get(format!("{BASE_URL}/fees/recommended"))
            .send()
            .await
            .context("mempool.space fee request failed")?;
        check_status(self.name(), fees_response.status())?;
        let fees: RecommendedFees = fees_response
            .json()
            .await
            .context("Failed to parse mempool.space fees")?;

        let price_response = self
            .client
            .get(format!("{BASE_URL}/prices"))
            .send()
            .await
            .context("mempool.space price request failed")?;
        check_status(self.name(), price_response.status())?;
        let prices: Prices = price_response
            .json()
            .await
            .context("Failed to parse mempool.space prices")?;

        let fee_sats = fees.half_hour_fee * TYPICAL_TX_VSIZE;
        Ok(fee_sats / 100_000_000.0 * prices.usd)
    }
}
