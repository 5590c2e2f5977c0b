use crate::domain::market::dataset::{PriceStats, VolumeStats};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The two indicator classes the engine aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalClass {
    Bottom,
    Top,
}

impl fmt::Display for SignalClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalClass::Bottom => write!(f, "bottom"),
            SignalClass::Top => write!(f, "top"),
        }
    }
}

/// Human-readable strength bucket. Buckets are closed-open:
/// [0.8, 1.0] / [0.6, 0.8) / [0.4, 0.6) / [0.2, 0.4) / [0.0, 0.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interpretation {
    VeryStrong,
    Strong,
    Moderate,
    Weak,
    VeryWeak,
    InsufficientData,
}

impl Interpretation {
    pub fn classify(composite: f64) -> Self {
        if composite >= 0.8 {
            Interpretation::VeryStrong
        } else if composite >= 0.6 {
            Interpretation::Strong
        } else if composite >= 0.4 {
            Interpretation::Moderate
        } else if composite >= 0.2 {
            Interpretation::Weak
        } else {
            Interpretation::VeryWeak
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Interpretation::VeryStrong => "Very Strong",
            Interpretation::Strong => "Strong",
            Interpretation::Moderate => "Moderate",
            Interpretation::Weak => "Weak",
            Interpretation::VeryWeak => "Very Weak",
            Interpretation::InsufficientData => "insufficient data",
        }
    }

    pub fn describe(&self, class: SignalClass) -> &'static str {
        match (self, class) {
            (Interpretation::VeryStrong, SignalClass::Bottom) => {
                "Multiple indicators suggest high probability of market bottom"
            }
            (Interpretation::Strong, SignalClass::Bottom) => {
                "Several indicators suggest potential market bottom"
            }
            (Interpretation::Moderate, SignalClass::Bottom) => {
                "Mixed signals with some bottom indicators present"
            }
            (Interpretation::Weak, SignalClass::Bottom) => {
                "Few bottom indicators present, market may continue declining"
            }
            (Interpretation::VeryWeak, SignalClass::Bottom) => {
                "Bottom indicators not present, market likely to continue declining"
            }
            (Interpretation::VeryStrong, SignalClass::Top) => {
                "Multiple indicators suggest high probability of market top"
            }
            (Interpretation::Strong, SignalClass::Top) => {
                "Several indicators suggest elevated top risk"
            }
            (Interpretation::Moderate, SignalClass::Top) => {
                "Mixed signals with some top indicators present"
            }
            (Interpretation::Weak, SignalClass::Top) => {
                "Few top indicators present, uptrend may continue"
            }
            (Interpretation::VeryWeak, SignalClass::Top) => {
                "Top indicators not present, little distribution visible"
            }
            (Interpretation::InsufficientData, _) => {
                "Not enough usable indicators to form a composite score"
            }
        }
    }
}

/// One indicator's outcome in a single aggregation run.
///
/// `raw` is None when the indicator was Unavailable; None propagates into
/// `normalized` and `contribution`, and the composer excludes the indicator
/// from both sides of the weighted average.
#[derive(Debug, Clone, Serialize)]
pub struct IndicatorResult {
    pub name: String,
    pub class: SignalClass,
    pub raw: Option<f64>,
    pub normalized: Option<f64>,
    pub weight: f64,
    pub contribution: Option<f64>,
}

/// Spread of the available normalized values inside one composite.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std: f64,
}

/// Weighted composite for one class.
#[derive(Debug, Clone, Serialize)]
pub struct CompositeScore {
    pub class: SignalClass,
    /// None when every indicator was Unavailable.
    pub composite: Option<f64>,
    pub used_weight: f64,
    pub configured_weight: f64,
    /// used_weight / configured_weight — how much of the configured signal
    /// actually went into the composite.
    pub confidence: f64,
    pub interpretation: Interpretation,
    pub indicators: Vec<IndicatorResult>,
    pub unavailable: Vec<String>,
    pub stats: Option<ScoreStats>,
}

/// Lightweight market context attached to each report.
#[derive(Debug, Clone, Serialize)]
pub struct MarketContext {
    pub symbol: String,
    pub current_price: Option<f64>,
    pub price_source: Option<String>,
    pub daily_price_stats: Option<PriceStats>,
    pub daily_volume_stats: Option<VolumeStats>,
}

/// A failure that was absorbed somewhere in the pipeline. Absorbed never
/// means silent: every demoted provider error and unavailable indicator
/// ends up here as well as in the log.
#[derive(Debug, Clone, Serialize)]
pub struct FailureRecord {
    pub source: String,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

impl FailureRecord {
    pub fn new(source: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Everything one aggregation run produces. Handed unmodified to the
/// external persistence/export collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub bottom: CompositeScore,
    pub top: CompositeScore,
    pub market_context: MarketContext,
    pub failures: Vec<FailureRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// True when at least one timeframe needed a live refresh (as opposed
    /// to every dataset being served from cache).
    pub refreshed_live: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_boundaries_are_closed_open() {
        assert_eq!(Interpretation::classify(0.8), Interpretation::VeryStrong);
        assert_eq!(Interpretation::classify(0.7999999), Interpretation::Strong);
        assert_eq!(Interpretation::classify(0.6), Interpretation::Strong);
        assert_eq!(Interpretation::classify(0.4), Interpretation::Moderate);
        assert_eq!(Interpretation::classify(0.2), Interpretation::Weak);
        assert_eq!(Interpretation::classify(0.1999999), Interpretation::VeryWeak);
        assert_eq!(Interpretation::classify(0.0), Interpretation::VeryWeak);
        assert_eq!(Interpretation::classify(1.0), Interpretation::VeryStrong);
    }

    #[test]
    fn labels() {
        assert_eq!(Interpretation::VeryStrong.label(), "Very Strong");
        assert_eq!(Interpretation::InsufficientData.label(), "insufficient data");
    }
}
