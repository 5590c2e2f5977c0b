//! Weighted composition of normalized indicator values into one score.
//!
//! Unavailable indicators are excluded from both the numerator and the
//! denominator of the weighted average, so missing data never drags the
//! composite toward zero. The confidence ratio exposes how much of the
//! configured weight actually contributed.

use crate::application::normalizer;
use crate::config::Config;
use crate::domain::errors::ConfigError;
use crate::domain::report::{
    CompositeScore, IndicatorResult, Interpretation, ScoreStats, SignalClass,
};
use tracing::debug;

/// A raw indicator outcome handed to the composer: name plus the value
/// (None = Unavailable).
#[derive(Debug, Clone)]
pub struct RawSignal {
    pub name: String,
    pub raw: Option<f64>,
}

impl RawSignal {
    pub fn new(name: impl Into<String>, raw: Option<f64>) -> Self {
        Self {
            name: name.into(),
            raw,
        }
    }
}

pub struct Composer<'a> {
    config: &'a Config,
    class: SignalClass,
}

impl<'a> Composer<'a> {
    pub fn new(config: &'a Config, class: SignalClass) -> Self {
        Self { config, class }
    }

    /// Normalize, weight, and classify one class worth of raw signals.
    pub fn compose(&self, signals: &[RawSignal]) -> Result<CompositeScore, ConfigError> {
        let configured_weight = self.config.configured_weight(self.class);
        let mut indicators = Vec::with_capacity(signals.len());
        let mut unavailable = Vec::new();
        let mut weighted_sum = 0.0;
        let mut used_weight = 0.0;
        let mut normalized_values = Vec::new();

        for signal in signals {
            let weight = self
                .config
                .weight(self.class, &signal.name)
                .ok_or_else(|| ConfigError::UnknownIndicator {
                    name: signal.name.clone(),
                })?;
            let bounds = self
                .config
                .bounds(self.class, &signal.name)
                .ok_or_else(|| ConfigError::UnknownIndicator {
                    name: signal.name.clone(),
                })?;

            let (normalized, contribution) = match signal.raw {
                Some(raw) => {
                    let n = normalizer::normalize(raw, &signal.name, &bounds)?;
                    weighted_sum += n * weight;
                    used_weight += weight;
                    normalized_values.push(n);
                    (Some(n), Some(n * weight))
                }
                None => {
                    unavailable.push(signal.name.clone());
                    (None, None)
                }
            };

            indicators.push(IndicatorResult {
                name: signal.name.clone(),
                class: self.class,
                raw: signal.raw,
                normalized,
                weight,
                contribution,
            });
        }

        let composite = if used_weight > 0.0 {
            Some(weighted_sum / used_weight)
        } else {
            None
        };
        let interpretation = match composite {
            Some(c) => Interpretation::classify(c),
            None => Interpretation::InsufficientData,
        };
        let confidence = if configured_weight > 0.0 {
            used_weight / configured_weight
        } else {
            0.0
        };

        debug!(
            class = %self.class,
            composite = ?composite,
            confidence,
            unavailable = unavailable.len(),
            "composed score"
        );

        Ok(CompositeScore {
            class: self.class,
            composite,
            used_weight,
            configured_weight,
            confidence,
            interpretation,
            indicators,
            unavailable,
            stats: score_stats(&normalized_values),
        })
    }
}

fn score_stats(values: &[f64]) -> Option<ScoreStats> {
    if values.is_empty() {
        return None;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    Some(ScoreStats {
        mean,
        min: values.iter().cloned().fold(f64::MAX, f64::min),
        max: values.iter().cloned().fold(f64::MIN, f64::max),
        std: var.sqrt(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::defaults()
    }

    #[test]
    fn composite_is_weighted_average_of_available() {
        let config = config();
        let composer = Composer::new(&config, SignalClass::Top);
        // bbwp bounds 0..100, nupl bounds -32.67..66.8
        let signals = vec![
            RawSignal::new("bbwp", Some(50.0)),
            RawSignal::new("nupl", None),
        ];
        let score = composer.compose(&signals).unwrap();

        // only bbwp contributes, so the composite equals its normalized value
        assert!((score.composite.unwrap() - 0.5).abs() < 1e-9);
        assert_eq!(score.used_weight, 8.0);
        assert_eq!(score.unavailable, vec!["nupl".to_string()]);
    }

    #[test]
    fn unavailable_excluded_from_both_sums() {
        let config = config();
        let composer = Composer::new(&config, SignalClass::Top);
        let with_missing = composer
            .compose(&[
                RawSignal::new("bbwp", Some(80.0)),
                RawSignal::new("nupl", None),
            ])
            .unwrap();
        let without_missing = composer
            .compose(&[RawSignal::new("bbwp", Some(80.0))])
            .unwrap();

        assert_eq!(with_missing.composite, without_missing.composite);
        assert_eq!(with_missing.used_weight, without_missing.used_weight);
    }

    #[test]
    fn all_unavailable_is_insufficient_data() {
        let config = config();
        let composer = Composer::new(&config, SignalClass::Bottom);
        let score = composer
            .compose(&[
                RawSignal::new("pi_cycle_low", None),
                RawSignal::new("hash_ribbons", None),
            ])
            .unwrap();

        assert_eq!(score.composite, None);
        assert_eq!(score.interpretation, Interpretation::InsufficientData);
        assert_eq!(score.confidence, 0.0);
        assert!(score.stats.is_none());
    }

    #[test]
    fn confidence_is_used_over_configured() {
        let config = config();
        let composer = Composer::new(&config, SignalClass::Top);
        let score = composer
            .compose(&[RawSignal::new("bbwp", Some(10.0))])
            .unwrap();

        let expected = 8.0 / config.configured_weight(SignalClass::Top);
        assert!((score.confidence - expected).abs() < 1e-12);
    }

    #[test]
    fn unknown_indicator_is_config_error() {
        let config = config();
        let composer = Composer::new(&config, SignalClass::Top);
        let err = composer
            .compose(&[RawSignal::new("mystery", Some(1.0))])
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownIndicator { .. }));
    }

    #[test]
    fn weighted_average_identity() {
        let config = config();
        let composer = Composer::new(&config, SignalClass::Bottom);
        let signals = vec![
            RawSignal::new("pi_cycle_low", Some(0.9)),
            RawSignal::new("hash_ribbons", Some(0.3)),
            RawSignal::new("supertrend", Some(0.6)),
        ];
        let score = composer.compose(&signals).unwrap();

        let manual: f64 = score
            .indicators
            .iter()
            .filter_map(|i| i.contribution)
            .sum::<f64>()
            / score.used_weight;
        assert!((score.composite.unwrap() - manual).abs() < 1e-9);
    }
}
