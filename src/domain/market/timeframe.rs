use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Aggregation windows the indicator set reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    Monthly,
    Weekly,
    FiveDay,
    ThreeDay,
    Daily,
}

impl Timeframe {
    /// Short code used in config files and logs ("M", "W", "5D", "3D", "D").
    pub fn code(&self) -> &'static str {
        match self {
            Timeframe::Monthly => "M",
            Timeframe::Weekly => "W",
            Timeframe::FiveDay => "5D",
            Timeframe::ThreeDay => "3D",
            Timeframe::Daily => "D",
        }
    }

    /// Nominal bar duration in days.
    pub fn bar_days(&self) -> i64 {
        match self {
            Timeframe::Monthly => 30,
            Timeframe::Weekly => 7,
            Timeframe::FiveDay => 5,
            Timeframe::ThreeDay => 3,
            Timeframe::Daily => 1,
        }
    }

    pub fn bar_seconds(&self) -> i64 {
        self.bar_days() * 86_400
    }

    /// Default lookback window, in bars, fetched for this timeframe.
    ///
    /// 500 daily bars so the Pi Cycle Low 471-day MA has a full window;
    /// coarser timeframes need far fewer bars.
    pub fn default_lookback(&self) -> usize {
        match self {
            Timeframe::Monthly => 120,
            Timeframe::Weekly => 300,
            Timeframe::FiveDay => 300,
            Timeframe::ThreeDay => 300,
            Timeframe::Daily => 500,
        }
    }

    /// All timeframes the aggregation refreshes, coarsest first.
    pub fn all() -> [Timeframe; 5] {
        [
            Timeframe::Monthly,
            Timeframe::Weekly,
            Timeframe::FiveDay,
            Timeframe::ThreeDay,
            Timeframe::Daily,
        ]
    }
}

impl FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "M" | "MONTHLY" | "1M" => Ok(Timeframe::Monthly),
            "W" | "WEEKLY" | "1W" => Ok(Timeframe::Weekly),
            "5D" | "FIVEDAY" => Ok(Timeframe::FiveDay),
            "3D" | "THREEDAY" => Ok(Timeframe::ThreeDay),
            "D" | "DAILY" | "1D" => Ok(Timeframe::Daily),
            _ => Err(anyhow!(
                "Invalid timeframe: '{}'. Valid options: M, W, 5D, 3D, D",
                s
            )),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(Timeframe::Monthly.code(), "M");
        assert_eq!(Timeframe::FiveDay.code(), "5D");
        assert_eq!(Timeframe::Daily.code(), "D");
    }

    #[test]
    fn test_from_str() {
        assert_eq!(Timeframe::from_str("M").unwrap(), Timeframe::Monthly);
        assert_eq!(Timeframe::from_str("w").unwrap(), Timeframe::Weekly);
        assert_eq!(Timeframe::from_str("5d").unwrap(), Timeframe::FiveDay);
        assert_eq!(Timeframe::from_str("3D").unwrap(), Timeframe::ThreeDay);
        assert_eq!(Timeframe::from_str("daily").unwrap(), Timeframe::Daily);
        assert!(Timeframe::from_str("4h").is_err());
    }

    #[test]
    fn test_bar_seconds() {
        assert_eq!(Timeframe::Daily.bar_seconds(), 86_400);
        assert_eq!(Timeframe::ThreeDay.bar_seconds(), 3 * 86_400);
    }

    #[test]
    fn test_all_order() {
        let all = Timeframe::all();
        assert_eq!(all.len(), 5);
        assert_eq!(all[0], Timeframe::Monthly);
        assert_eq!(all[4], Timeframe::Daily);
    }
}
