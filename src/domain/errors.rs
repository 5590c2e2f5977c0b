use thiserror::Error;

/// Errors that abort an aggregation run before it starts.
///
/// Everything else in the pipeline degrades to an Unavailable value;
/// only a broken configuration is allowed to fail the run outright.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Degenerate bounds for {indicator}: lower == upper == {value}")]
    DegenerateBounds { indicator: String, value: f64 },

    #[error("Negative weight for {indicator}: {weight}")]
    NegativeWeight { indicator: String, weight: f64 },

    #[error("Unknown indicator in config: {name}")]
    UnknownIndicator { name: String },

    #[error("Failed to read config file {path}: {reason}")]
    FileRead { path: String, reason: String },

    #[error("Failed to parse config file {path}: {reason}")]
    FileParse { path: String, reason: String },

    #[error("Invalid setting {key}: {reason}")]
    InvalidSetting { key: String, reason: String },
}

/// Errors internal to the data source chain.
///
/// These are retried a bounded number of times per provider and then
/// absorbed: the chain moves on to the next provider and records the
/// failure, so a `ProviderError` never surfaces past the chain.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {reason}")]
    Http { reason: String },

    #[error("Unexpected response from {provider}: {reason}")]
    BadResponse { provider: String, reason: String },

    #[error("Rate limited by {provider}")]
    RateLimited { provider: String },

    #[error("No bars returned for {symbol} {timeframe}")]
    EmptyHistory { symbol: String, timeframe: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_formatting() {
        let err = ConfigError::DegenerateBounds {
            indicator: "nupl".to_string(),
            value: 1.5,
        };
        let msg = err.to_string();
        assert!(msg.contains("nupl"));
        assert!(msg.contains("1.5"));
    }

    #[test]
    fn provider_error_formatting() {
        let err = ProviderError::EmptyHistory {
            symbol: "BTCUSD".to_string(),
            timeframe: "D".to_string(),
        };
        assert!(err.to_string().contains("BTCUSD"));
    }

    #[test]
    fn provider_variants_carry_no_error_chain() {
        use std::error::Error;

        let bad = ProviderError::BadResponse {
            provider: "coingecko".to_string(),
            reason: "no usd quote".to_string(),
        };
        assert!(bad.to_string().contains("coingecko"));
        assert!(bad.source().is_none());

        let limited = ProviderError::RateLimited {
            provider: "alphavantage".to_string(),
        };
        assert!(limited.to_string().contains("alphavantage"));
        assert!(limited.source().is_none());
    }
}
