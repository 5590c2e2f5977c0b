use anyhow::{Context, Result};
use clap::Parser;
use cyclesense::application::aggregator::run_aggregation;
use cyclesense::config::Config;
use cyclesense::domain::ports::{MetricProvider, QuoteProvider};
use cyclesense::domain::report::SignalClass;
use cyclesense::infrastructure::alphavantage::AlphaVantageProvider;
use cyclesense::infrastructure::coingecko::CoinGeckoProvider;
use cyclesense::infrastructure::finnhub::FinnhubProvider;
use cyclesense::infrastructure::funding::{BinanceFunding, BybitFunding, OkxFunding};
use cyclesense::infrastructure::http_client_factory::HttpClientFactory;
use cyclesense::infrastructure::mempool_fee::MempoolFeeProvider;
use cyclesense::infrastructure::onchain::{CvddTerminalProvider, NuplProvider};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cyclesense", about = "Composite bottom/top signal scores from raw market data")]
struct Cli {
    /// Symbol to aggregate
    #[arg(long)]
    symbol: Option<String>,

    /// Cache TTL in minutes (overrides CACHE_TTL_MINUTES)
    #[arg(long)]
    ttl_minutes: Option<u64>,

    /// Path to a TOML file overriding weight and bound tables
    #[arg(long)]
    tables: Option<String>,

    /// Pretty-print the report JSON
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env_with_tables(cli.tables.as_deref().map(Path::new))
        .context("Failed to load configuration")?;
    if let Some(symbol) = cli.symbol {
        config.symbol = symbol;
    }
    if let Some(minutes) = cli.ttl_minutes {
        config.cache_ttl = Duration::from_secs(minutes * 60);
    }

    let client = HttpClientFactory::create_client;
    let mut providers: Vec<Arc<dyn QuoteProvider>> = vec![Arc::new(CoinGeckoProvider::new(
        client(),
        config.coingecko_api_key.clone(),
    ))];
    if let Some(key) = config.alpha_vantage_api_key.clone() {
        providers.push(Arc::new(AlphaVantageProvider::new(client(), key)));
    }
    if let Some(key) = config.finnhub_api_key.clone() {
        providers.push(Arc::new(FinnhubProvider::new(client(), key)));
    }

    let mut metrics: HashMap<String, Arc<dyn MetricProvider>> = HashMap::new();
    metrics.insert("nupl".into(), Arc::new(NuplProvider::new(client())));
    metrics.insert("cvdd".into(), Arc::new(CvddTerminalProvider::new(client())));
    metrics.insert("fees".into(), Arc::new(MempoolFeeProvider::new(client())));
    metrics.insert(
        "funding_binance".into(),
        Arc::new(BinanceFunding::new(client())),
    );
    metrics.insert("funding_bybit".into(), Arc::new(BybitFunding::new(client())));
    metrics.insert("funding_okx".into(), Arc::new(OkxFunding::new(client())));

    info!(symbol = %config.symbol, providers = providers.len(), "starting aggregation");
    let report = run_aggregation(config, providers, metrics).await?;

    info!(
        composite = ?report.bottom.composite,
        confidence = report.bottom.confidence,
        "bottom: {} - {}",
        report.bottom.interpretation.label(),
        report.bottom.interpretation.describe(SignalClass::Bottom),
    );
    info!(
        composite = ?report.top.composite,
        confidence = report.top.confidence,
        "top: {} - {}",
        report.top.interpretation.label(),
        report.top.interpretation.describe(SignalClass::Top),
    );

    let json = if cli.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{json}");
    Ok(())
}
