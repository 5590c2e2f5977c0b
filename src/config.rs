use crate::domain::errors::ConfigError;
use crate::domain::report::SignalClass;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Normalization bounds for one indicator's raw value. When `invert` is
/// set a larger raw value means a weaker signal for the indicator's class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
    #[serde(default)]
    pub invert: bool,
}

impl Bounds {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self {
            lower,
            upper,
            invert: false,
        }
    }

    pub fn inverted(lower: f64, upper: f64) -> Self {
        Self {
            lower,
            upper,
            invert: true,
        }
    }
}

/// Per-provider chain settings.
#[derive(Debug, Clone, Copy)]
pub struct ProviderSettings {
    /// Minimum spacing between calls to this provider.
    pub rate_limit: Duration,
    /// Retries before the provider is marked failed for the request.
    pub max_retries: u32,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        // providers without an explicit entry are not throttled
        Self {
            rate_limit: Duration::ZERO,
            max_retries: 1,
        }
    }
}

/// Weight and bound tables for both indicator classes. This is the shape
/// of the optional TOML override files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalTables {
    #[serde(default)]
    pub bottom_weights: HashMap<String, f64>,
    #[serde(default)]
    pub top_weights: HashMap<String, f64>,
    #[serde(default)]
    pub bottom_bounds: HashMap<String, Bounds>,
    #[serde(default)]
    pub top_bounds: HashMap<String, Bounds>,
}

/// Immutable configuration for one aggregation run.
#[derive(Debug, Clone)]
pub struct Config {
    pub symbol: String,
    pub cache_ttl: Duration,
    pub coingecko_api_key: Option<String>,
    pub alpha_vantage_api_key: Option<String>,
    pub finnhub_api_key: Option<String>,
    pub provider_settings: HashMap<String, ProviderSettings>,
    pub tables: SignalTables,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_env_with_tables(None)
    }

    /// Like `from_env`, with an explicit tables file taking precedence over
    /// the SIGNAL_TABLES_FILE variable.
    pub fn from_env_with_tables(tables_file: Option<&Path>) -> Result<Self> {
        let symbol = env::var("SYMBOL").unwrap_or_else(|_| "BTCUSD".to_string());

        let ttl_minutes = env::var("CACHE_TTL_MINUTES")
            .unwrap_or_else(|_| "60".to_string())
            .parse::<u64>()
            .context("Failed to parse CACHE_TTL_MINUTES")?;

        let retries = env::var("PROVIDER_RETRIES")
            .unwrap_or_else(|_| "1".to_string())
            .parse::<u32>()
            .context("Failed to parse PROVIDER_RETRIES")?;

        let mut provider_settings = HashMap::new();
        // Alpha Vantage free tier allows 5 calls/min.
        for (name, delay_ms) in [
            ("coingecko", 1_000u64),
            ("coingecko_pro", 500),
            ("alphavantage", 12_000),
            ("finnhub", 1_000),
        ] {
            provider_settings.insert(
                name.to_string(),
                ProviderSettings {
                    rate_limit: Duration::from_millis(delay_ms),
                    max_retries: retries,
                },
            );
        }

        let mut tables = default_tables();
        let tables_path = tables_file
            .map(Path::to_path_buf)
            .or_else(|| env::var("SIGNAL_TABLES_FILE").ok().map(PathBuf::from));
        if let Some(path) = tables_path {
            tables = load_tables(&path, tables)?;
        }

        let config = Self {
            symbol,
            cache_ttl: Duration::from_secs(ttl_minutes * 60),
            coingecko_api_key: env::var("COINGECKO_PRO_API_KEY").ok(),
            alpha_vantage_api_key: env::var("ALPHA_VANTAGE_API_KEY").ok(),
            finnhub_api_key: env::var("FINNHUB_API_KEY").ok(),
            provider_settings,
            tables,
        };
        config.validate()?;
        Ok(config)
    }

    /// Defaults only, no environment. Used by tests and embedders.
    pub fn defaults() -> Self {
        Self {
            symbol: "BTCUSD".to_string(),
            cache_ttl: Duration::from_secs(60 * 60),
            coingecko_api_key: None,
            alpha_vantage_api_key: None,
            finnhub_api_key: None,
            provider_settings: HashMap::new(),
            tables: default_tables(),
        }
    }

    pub fn provider_settings(&self, name: &str) -> ProviderSettings {
        self.provider_settings
            .get(name)
            .copied()
            .unwrap_or_default()
    }

    pub fn weight(&self, class: SignalClass, indicator: &str) -> Option<f64> {
        match class {
            SignalClass::Bottom => self.tables.bottom_weights.get(indicator).copied(),
            SignalClass::Top => self.tables.top_weights.get(indicator).copied(),
        }
    }

    pub fn bounds(&self, class: SignalClass, indicator: &str) -> Option<Bounds> {
        match class {
            SignalClass::Bottom => self.tables.bottom_bounds.get(indicator).copied(),
            SignalClass::Top => self.tables.top_bounds.get(indicator).copied(),
        }
    }

    /// Total configured weight for a class (denominator of the confidence
    /// ratio).
    pub fn configured_weight(&self, class: SignalClass) -> f64 {
        match class {
            SignalClass::Bottom => self.tables.bottom_weights.values().sum(),
            SignalClass::Top => self.tables.top_weights.values().sum(),
        }
    }

    /// Reject malformed weight/bound tables before a run starts. This is
    /// the only error class allowed to abort an aggregation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, weight) in self
            .tables
            .bottom_weights
            .iter()
            .chain(self.tables.top_weights.iter())
        {
            if *weight < 0.0 {
                return Err(ConfigError::NegativeWeight {
                    indicator: name.clone(),
                    weight: *weight,
                });
            }
        }
        for (name, bounds) in self
            .tables
            .bottom_bounds
            .iter()
            .chain(self.tables.top_bounds.iter())
        {
            if bounds.lower == bounds.upper {
                return Err(ConfigError::DegenerateBounds {
                    indicator: name.clone(),
                    value: bounds.lower,
                });
            }
        }
        for name in self.tables.bottom_weights.keys() {
            if !self.tables.bottom_bounds.contains_key(name) {
                return Err(ConfigError::UnknownIndicator { name: name.clone() });
            }
        }
        for name in self.tables.top_weights.keys() {
            if !self.tables.top_bounds.contains_key(name) {
                return Err(ConfigError::UnknownIndicator { name: name.clone() });
            }
        }
        Ok(())
    }
}

/// Merge a TOML override file over the built-in tables. Only the entries
/// present in the file are replaced.
fn load_tables(path: &Path, mut base: SignalTables) -> Result<SignalTables, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let overrides: SignalTables = toml::from_str(&text).map_err(|e| ConfigError::FileParse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    base.bottom_weights.extend(overrides.bottom_weights);
    base.top_weights.extend(overrides.top_weights);
    base.bottom_bounds.extend(overrides.bottom_bounds);
    base.top_bounds.extend(overrides.top_bounds);
    Ok(base)
}

/// Built-in weight and bound tables for the 21 indicators.
///
/// Bound ranges follow each indicator's documented raw-value range
/// (NUPL in percent, funding in basis points, WaveTrend roughly -100..100,
/// BBWP a percentile). Inverted entries are indicators whose raw value
/// falls as the signal strengthens.
pub fn default_tables() -> SignalTables {
    let mut t = SignalTables::default();

    let bw = &mut t.bottom_weights;
    bw.insert("cvdd_terminal_relative".into(), 10.0);
    bw.insert("m_timed_bottom_score".into(), 8.0);
    bw.insert("2d_volume_burst".into(), 7.0);
    bw.insert("cm_vix_fix".into(), 8.0);
    bw.insert("gaussian_channel".into(), 9.0);
    bw.insert("3d_mmd".into(), 7.0);
    bw.insert("hash_ribbons".into(), 10.0);
    bw.insert("w_wavefront".into(), 9.0);
    bw.insert("supertrend".into(), 8.0);
    bw.insert("pi_cycle_low".into(), 12.0);
    bw.insert("puell_multiple".into(), 12.0);

    let tw = &mut t.top_weights;
    tw.insert("cvdd_terminal_relative".into(), 10.0);
    tw.insert("nupl".into(), 12.0);
    tw.insert("transaction_cost".into(), 6.0);
    tw.insert("funding_rates".into(), 10.0);
    tw.insert("bbwp".into(), 8.0);
    tw.insert("wavetrend_oscillator".into(), 9.0);
    tw.insert("3d_volume".into(), 7.0);
    tw.insert("mmd".into(), 8.0);
    tw.insert("pi_cycle".into(), 14.0);
    tw.insert("m_timed_top_score".into(), 8.0);

    let bb = &mut t.bottom_bounds;
    bb.insert("cvdd_terminal_relative".into(), Bounds::inverted(0.0, 1.0));
    bb.insert("m_timed_bottom_score".into(), Bounds::new(0.0, 1.0));
    bb.insert("2d_volume_burst".into(), Bounds::new(0.0, 4.0));
    bb.insert("cm_vix_fix".into(), Bounds::new(5.0, 35.0));
    bb.insert("gaussian_channel".into(), Bounds::inverted(-3.0, 1.0));
    bb.insert("3d_mmd".into(), Bounds::inverted(-5.0, 5.0));
    bb.insert("hash_ribbons".into(), Bounds::new(0.0, 1.0));
    bb.insert("w_wavefront".into(), Bounds::inverted(0.0, 1.0));
    bb.insert("supertrend".into(), Bounds::new(0.0, 1.0));
    bb.insert("pi_cycle_low".into(), Bounds::new(0.0, 1.0));
    bb.insert("puell_multiple".into(), Bounds::inverted(0.3, 4.0));

    let tb = &mut t.top_bounds;
    tb.insert("cvdd_terminal_relative".into(), Bounds::new(0.0, 1.0));
    tb.insert("nupl".into(), Bounds::new(-32.67, 66.8));
    tb.insert("transaction_cost".into(), Bounds::new(1.0, 60.0));
    tb.insert("funding_rates".into(), Bounds::new(-50.0, 150.0));
    tb.insert("bbwp".into(), Bounds::new(0.0, 100.0));
    tb.insert("wavetrend_oscillator".into(), Bounds::new(-100.0, 100.0));
    tb.insert("3d_volume".into(), Bounds::new(0.0, 4.0));
    tb.insert("mmd".into(), Bounds::new(0.0, 5.0));
    tb.insert("pi_cycle".into(), Bounds::new(0.0, 1.0));
    tb.insert("m_timed_top_score".into(), Bounds::new(0.0, 1.0));

    t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        Config::defaults().validate().unwrap();
    }

    #[test]
    fn default_tables_cover_all_indicators() {
        let t = default_tables();
        assert_eq!(t.bottom_weights.len(), 11);
        assert_eq!(t.top_weights.len(), 10);
        assert_eq!(t.bottom_bounds.len(), 11);
        assert_eq!(t.top_bounds.len(), 10);
    }

    #[test]
    fn degenerate_bounds_rejected() {
        let mut config = Config::defaults();
        config
            .tables
            .top_bounds
            .insert("nupl".into(), Bounds::new(1.0, 1.0));
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::DegenerateBounds { .. }));
    }

    #[test]
    fn negative_weight_rejected() {
        let mut config = Config::defaults();
        config.tables.bottom_weights.insert("supertrend".into(), -1.0);
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::NegativeWeight { .. }));
    }

    #[test]
    fn weight_without_bounds_rejected() {
        let mut config = Config::defaults();
        config.tables.top_weights.insert("mystery".into(), 5.0);
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownIndicator { .. }));
    }

    #[test]
    fn explicit_tables_path_overrides_defaults() {
        let dir = std::env::temp_dir().join("cyclesense_config_cli_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tables.toml");
        std::fs::write(&path, "[bottom_weights]\nsupertrend = 3.0\n").unwrap();

        let config = Config::from_env_with_tables(Some(&path)).unwrap();
        assert_eq!(config.tables.bottom_weights["supertrend"], 3.0);
        assert_eq!(config.tables.top_weights["nupl"], 12.0);
    }

    #[test]
    fn toml_overrides_merge() {
        let dir = std::env::temp_dir().join("cyclesense_config_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tables.toml");
        std::fs::write(
            &path,
            r#"
[top_weights]
nupl = 20.0

[top_bounds.nupl]
lower = -10.0
upper = 90.0
"#,
        )
        .unwrap();

        let merged = load_tables(&path, default_tables()).unwrap();
        assert_eq!(merged.top_weights["nupl"], 20.0);
        assert_eq!(merged.top_bounds["nupl"].lower, -10.0);
        // untouched entries survive the merge
        assert_eq!(merged.bottom_weights["pi_cycle_low"], 12.0);
    }
}
