//! Top-class indicators: each estimates how strongly current conditions
//! resemble a market top, on its own native scale.

use super::{Indicator, IndicatorContext, rolling_sma, session_time_weight};
use crate::domain::market::series;
use crate::domain::market::{SeriesKind, Timeframe, TimeframeDataset};
use crate::domain::report::SignalClass;
use async_trait::async_trait;
use chrono::Utc;

// ---------------------------------------------------------------------------
// cvdd_terminal_relative
// ---------------------------------------------------------------------------

/// Price position between the CVDD floor and the terminal ceiling, 0..1.
/// High values mean price sits near the historical blow-off ceiling.
pub struct CvddTerminalRelative;

#[async_trait]
impl Indicator for CvddTerminalRelative {
    fn name(&self) -> &'static str {
        "cvdd_terminal_relative"
    }

    fn class(&self) -> SignalClass {
        SignalClass::Top
    }

    async fn compute_raw(&self, ctx: &IndicatorContext) -> Option<f64> {
        ctx.metric("cvdd").await
    }
}

// ---------------------------------------------------------------------------
// nupl
// ---------------------------------------------------------------------------

/// Net Unrealized Profit/Loss, in percent. Euphoria readings above ~60%
/// have capped every cycle.
pub struct Nupl;

#[async_trait]
impl Indicator for Nupl {
    fn name(&self) -> &'static str {
        "nupl"
    }

    fn class(&self) -> SignalClass {
        SignalClass::Top
    }

    async fn compute_raw(&self, ctx: &IndicatorContext) -> Option<f64> {
        ctx.metric("nupl").await
    }
}

// ---------------------------------------------------------------------------
// transaction_cost
// ---------------------------------------------------------------------------

/// Median on-chain transaction fee in USD. Fee blowouts accompany
/// speculative manias.
pub struct TransactionCost;

#[async_trait]
impl Indicator for TransactionCost {
    fn name(&self) -> &'static str {
        "transaction_cost"
    }

    fn class(&self) -> SignalClass {
        SignalClass::Top
    }

    async fn compute_raw(&self, ctx: &IndicatorContext) -> Option<f64> {
        ctx.metric("fees").await
    }
}

// ---------------------------------------------------------------------------
// funding_rates
// ---------------------------------------------------------------------------

const FUNDING_FEEDS: [&str; 3] = ["funding_binance", "funding_bybit", "funding_okx"];

/// Mean perpetual funding rate across the major venues, in basis points.
/// Persistently positive funding means longs are crowded.
pub struct FundingRates;

#[async_trait]
impl Indicator for FundingRates {
    fn name(&self) -> &'static str {
        "funding_rates"
    }

    fn class(&self) -> SignalClass {
        SignalClass::Top
    }

    async fn compute_raw(&self, ctx: &IndicatorContext) -> Option<f64> {
        let mut rates = Vec::with_capacity(FUNDING_FEEDS.len());
        for feed in FUNDING_FEEDS {
            if let Some(rate) = ctx.metric(feed).await {
                rates.push(rate);
            }
        }
        if rates.is_empty() {
            return None;
        }
        let mean = rates.iter().sum::<f64>() / rates.len() as f64;
        Some(mean * 10_000.0)
    }
}

// ---------------------------------------------------------------------------
// bbwp
// ---------------------------------------------------------------------------

const BBWP_WINDOW: usize = 100;

/// Bollinger Band Width Percentile over the last 100 daily bars. An
/// expansion percentile above 80 inside an uptrend is amplified; the same
/// expansion in a downtrend is discounted.
pub struct Bbwp;

impl Bbwp {
    fn compute(ds: &TimeframeDataset) -> Option<f64> {
        let widths = ds.series_tail(SeriesKind::BbWidth, BBWP_WINDOW)?;
        if widths.len() < BBWP_WINDOW / 2 {
            return None;
        }
        let current = *widths.last()?;
        let below = widths.iter().filter(|w| current > **w).count();
        let mut percentile = below as f64 / widths.len() as f64 * 100.0;

        if percentile > 80.0 {
            let uptrend = ds.momentum(20).map(|m| m > 0.0).unwrap_or(false);
            percentile *= if uptrend { 1.2 } else { 0.8 };
        }
        Some(percentile.min(100.0))
    }
}

#[async_trait]
impl Indicator for Bbwp {
    fn name(&self) -> &'static str {
        "bbwp"
    }

    fn class(&self) -> SignalClass {
        SignalClass::Top
    }

    async fn compute_raw(&self, ctx: &IndicatorContext) -> Option<f64> {
        let ds = ctx.dataset(Timeframe::Daily).await;
        Self::compute(&ds)
    }
}

// ---------------------------------------------------------------------------
// wavetrend_oscillator
// ---------------------------------------------------------------------------

const WT_CHANNEL: usize = 10;
const WT_AVERAGE: usize = 21;

/// LazyBear WaveTrend channel index. Readings above +60 are overbought;
/// a bearish price/oscillator divergence amplifies the reading by 1.2.
pub struct WaveTrendOscillator;

impl WaveTrendOscillator {
    fn compute(ds: &TimeframeDataset) -> Option<f64> {
        let candles = &ds.candles;
        if candles.len() < WT_AVERAGE + WT_CHANNEL {
            return None;
        }
        let ap: Vec<f64> = candles
            .iter()
            .map(|c| (c.high + c.low + c.close) / 3.0)
            .collect();
        let esa = series::ema(&ap, WT_CHANNEL);
        let dev: Vec<f64> = ap
            .iter()
            .zip(&esa)
            .map(|(a, e)| (a - e).abs())
            .collect();
        let d = series::ema(&dev, WT_CHANNEL);
        let ci: Vec<f64> = ap
            .iter()
            .zip(&esa)
            .zip(&d)
            .map(|((a, e), dd)| if *dd > 0.0 { (a - e) / (0.015 * dd) } else { 0.0 })
            .collect();
        let tci = series::ema(&ci, WT_AVERAGE);

        let mut value = *tci.last()?;
        if value > 0.0 && Self::bearish_divergence(candles, &tci) {
            value *= 1.2;
        }
        Some(value)
    }

    /// Price printed a higher high over the last 14 bars while the
    /// oscillator printed a lower high.
    fn bearish_divergence(candles: &[crate::domain::market::Candle], tci: &[f64]) -> bool {
        let n = candles.len();
        if n < 28 {
            return false;
        }
        let high = |range: std::ops::Range<usize>| {
            candles[range].iter().map(|c| c.high).fold(f64::MIN, f64::max)
        };
        let peak = |s: &[f64]| s.iter().cloned().fold(f64::MIN, f64::max);

        let recent_price = high(n - 14..n);
        let prior_price = high(n - 28..n - 14);
        let recent_tci = peak(&tci[n - 14..]);
        let prior_tci = peak(&tci[n - 28..n - 14]);
        recent_price > prior_price && recent_tci < prior_tci
    }
}

#[async_trait]
impl Indicator for WaveTrendOscillator {
    fn name(&self) -> &'static str {
        "wavetrend_oscillator"
    }

    fn class(&self) -> SignalClass {
        SignalClass::Top
    }

    async fn compute_raw(&self, ctx: &IndicatorContext) -> Option<f64> {
        let ds = ctx.dataset(Timeframe::Daily).await;
        Self::compute(&ds)
    }
}

// ---------------------------------------------------------------------------
// 3d_volume
// ---------------------------------------------------------------------------

/// Multi-timeframe volume z-score, 3-day leading. High readings during an
/// extended uptrend are distribution candidates.
pub struct ThreeDayVolume;

impl ThreeDayVolume {
    fn compute(
        three_day: &TimeframeDataset,
        daily: &TimeframeDataset,
        weekly: &TimeframeDataset,
    ) -> Option<f64> {
        let z3 = three_day.volume_stats(20)?;
        let zd = daily.volume_stats(20)?;
        let zw = weekly.volume_stats(20)?;

        let mut combined = z3.z_score * 0.5 + zd.z_score * 0.3 + zw.z_score * 0.2;

        // Volume only carries top information when price has been running.
        let extended = daily.momentum(14).map(|m| m > 10.0).unwrap_or(false);
        if extended {
            combined *= 1.2;
        }
        if z3.percentile > 90.0 {
            combined *= 1.3;
        } else if z3.percentile > 75.0 {
            combined *= 1.1;
        }
        Some(combined.min(4.0))
    }
}

#[async_trait]
impl Indicator for ThreeDayVolume {
    fn name(&self) -> &'static str {
        "3d_volume"
    }

    fn class(&self) -> SignalClass {
        SignalClass::Top
    }

    async fn compute_raw(&self, ctx: &IndicatorContext) -> Option<f64> {
        let three_day = ctx.dataset(Timeframe::ThreeDay).await;
        let daily = ctx.dataset(Timeframe::Daily).await;
        let weekly = ctx.dataset(Timeframe::Weekly).await;
        Self::compute(&three_day, &daily, &weekly)
    }
}

// ---------------------------------------------------------------------------
// mmd
// ---------------------------------------------------------------------------

/// Momentum market diagnostic: breadth of price, volume and oscillator
/// momentum across daily, weekly and monthly windows, mapped onto a
/// 0.5..5.0 top-risk scale.
pub struct MomentumMarketDiagnostic;

impl MomentumMarketDiagnostic {
    fn breadth(ds: &TimeframeDataset, span: usize) -> Option<f64> {
        let price_mom = ds.momentum(span)?;

        let volumes = ds.volumes();
        let n = volumes.len();
        if n <= span || volumes[n - 1 - span] == 0.0 {
            return None;
        }
        let vol_mom =
            (volumes[n - 1] - volumes[n - 1 - span]) / volumes[n - 1 - span] * 100.0;

        let rsi = ds.series_value(SeriesKind::Rsi, 0)?;
        Some(price_mom * 0.5 + vol_mom * 0.2 + (rsi - 50.0) * 0.3)
    }

    fn map_to_scale(breadth: f64, divergence: f64) -> f64 {
        let adjusted = breadth * divergence;
        let normalized = (adjusted / 30.0).tanh();
        (0.5 + (normalized + 1.0) / 2.0 * 4.5).clamp(0.5, 5.0)
    }
}

#[async_trait]
impl Indicator for MomentumMarketDiagnostic {
    fn name(&self) -> &'static str {
        "mmd"
    }

    fn class(&self) -> SignalClass {
        SignalClass::Top
    }

    async fn compute_raw(&self, ctx: &IndicatorContext) -> Option<f64> {
        let daily = ctx.dataset(Timeframe::Daily).await;
        let weekly = ctx.dataset(Timeframe::Weekly).await;
        let monthly = ctx.dataset(Timeframe::Monthly).await;

        let bd = Self::breadth(&daily, 14)?;
        let bw = Self::breadth(&weekly, 8)?;
        let bm = Self::breadth(&monthly, 4)?;
        let combined = bd * 0.6 + bw * 0.3 + bm * 0.1;

        // Price up while the daily RSI rolls over is exhaustion, not strength.
        let divergence = match (daily.momentum(14), daily.series_tail(SeriesKind::Rsi, 5)) {
            (Some(m), Some(rsi)) if m > 0.0 && rsi.len() >= 5 && rsi[4] < rsi[0] => 1.3,
            (Some(m), _) if m < 0.0 => 0.8,
            _ => 1.0,
        };
        Some(Self::map_to_scale(combined, divergence))
    }
}

// ---------------------------------------------------------------------------
// pi_cycle
// ---------------------------------------------------------------------------

const PI_TOP_FAST: usize = 111;
const PI_TOP_SLOW: usize = 350;
const PI_TOP_SLOW_MULT: f64 = 2.0;
const PI_TOP_CROSS_WINDOW: usize = 30;

/// Pi Cycle Top: the 111-day MA reaching twice the 350-day MA has marked
/// every blow-off top. Scored 0..1 from the ratio, with a recent-cross
/// bonus.
pub struct PiCycleTop;

impl PiCycleTop {
    fn compute(ds: &TimeframeDataset) -> Option<f64> {
        let closes = ds.closes();
        if closes.len() < PI_TOP_SLOW {
            return None;
        }
        let fast = rolling_sma(&closes, PI_TOP_FAST);
        let slow: Vec<f64> = rolling_sma(&closes, PI_TOP_SLOW)
            .iter()
            .map(|v| v * PI_TOP_SLOW_MULT)
            .collect();
        let n = closes.len();
        if slow[n - 1] <= 0.0 {
            return None;
        }

        let ratio = fast[n - 1] / slow[n - 1];
        let mut score = ((ratio - 0.8) / 0.2).clamp(0.0, 1.0);

        for back in 0..PI_TOP_CROSS_WINDOW.min(n - 1) {
            let i = n - 1 - back;
            if fast[i - 1] <= slow[i - 1] && fast[i] > slow[i] {
                score = (score * 1.2).min(1.0);
                break;
            }
        }
        Some(score)
    }
}

#[async_trait]
impl Indicator for PiCycleTop {
    fn name(&self) -> &'static str {
        "pi_cycle"
    }

    fn class(&self) -> SignalClass {
        SignalClass::Top
    }

    async fn compute_raw(&self, ctx: &IndicatorContext) -> Option<f64> {
        let ds = ctx.dataset(Timeframe::Daily).await;
        Self::compute(&ds)
    }
}

// ---------------------------------------------------------------------------
// m_timed_top_score
// ---------------------------------------------------------------------------

/// Monthly-window distribution score, 0..1, weighted toward the
/// 08:00/20:00 UTC bar rollovers.
pub struct TimedTopScore;

impl TimedTopScore {
    fn compute(ds: &TimeframeDataset, time_weight: f64) -> Option<f64> {
        if ds.len() < 13 {
            return None;
        }
        let closes = ds.closes();
        let volumes = ds.volumes();
        let n = closes.len();

        // Rising price on falling volume is the distribution signature.
        let price_slope = series::linear_slope(&closes[n - 12..])?;
        let volume_slope = series::linear_slope(&volumes[n - 12..])?;
        let price_mean = series::mean(&closes[n - 12..])?;
        let volume_mean = series::mean(&volumes[n - 12..])?;
        let distribution = if price_mean > 0.0 && volume_mean > 0.0 {
            let p = price_slope / price_mean;
            let v = volume_slope / volume_mean;
            if p > 0.0 && v < 0.0 {
                (((p * 50.0).min(1.0) + (-v * 50.0).min(1.0)) / 2.0).clamp(0.0, 1.0)
            } else {
                0.0
            }
        } else {
            0.0
        };

        let exhaustion = (ds.momentum(3)? / 20.0).tanh().max(0.0);

        let rsi = ds.series_value(SeriesKind::Rsi, 0)?;
        let euphoria = ((rsi - 50.0) / 50.0).clamp(0.0, 1.0);

        let atr = ds.series_slice(SeriesKind::Atr)?;
        let recent = series::mean(&atr[atr.len().saturating_sub(3)..])?;
        let baseline = series::mean(atr)?;
        let volatility = if baseline > 0.0 {
            (recent / baseline / 2.0).min(1.0)
        } else {
            0.0
        };

        let score = distribution * 0.3 + exhaustion * 0.3 + euphoria * 0.25 + volatility * 0.15;
        Some((score * time_weight).clamp(0.0, 1.0))
    }
}

#[async_trait]
impl Indicator for TimedTopScore {
    fn name(&self) -> &'static str {
        "m_timed_top_score"
    }

    fn class(&self) -> SignalClass {
        SignalClass::Top
    }

    async fn compute_raw(&self, ctx: &IndicatorContext) -> Option<f64> {
        let ds = ctx.dataset(Timeframe::Monthly).await;
        let weight = session_time_weight(Utc::now(), 0.7);
        Self::compute(&ds, weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::indicators::testutil;

    #[test]
    fn bbwp_is_a_percentile() {
        let closes: Vec<f64> = (0..120)
            .map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0)
            .collect();
        let ds = testutil::dataset(Timeframe::Daily, &closes);
        let p = Bbwp::compute(&ds).unwrap();
        assert!((0.0..=100.0).contains(&p));
    }

    #[test]
    fn bbwp_high_after_expansion() {
        let mut closes: Vec<f64> = vec![100.0; 110];
        for i in 0..10 {
            closes.push(100.0 + (i as f64 + 1.0) * 4.0);
        }
        let ds = testutil::dataset(Timeframe::Daily, &closes);
        let p = Bbwp::compute(&ds).unwrap();
        assert!(p > 80.0, "got {p}");
    }

    #[test]
    fn wavetrend_positive_in_strong_uptrend() {
        let closes: Vec<f64> = (0..80).map(|i| 100.0 * 1.01_f64.powi(i)).collect();
        let ds = testutil::dataset(Timeframe::Daily, &closes);
        let wt = WaveTrendOscillator::compute(&ds).unwrap();
        assert!(wt > 0.0);
    }

    #[test]
    fn wavetrend_negative_in_downtrend() {
        let closes: Vec<f64> = (0..80).map(|i| 100.0 * 0.99_f64.powi(i)).collect();
        let ds = testutil::dataset(Timeframe::Daily, &closes);
        let wt = WaveTrendOscillator::compute(&ds).unwrap();
        assert!(wt < 0.0);
    }

    #[test]
    fn wavetrend_needs_enough_bars() {
        let ds = testutil::uptrend(Timeframe::Daily, 20, 100.0);
        assert!(WaveTrendOscillator::compute(&ds).is_none());
    }

    #[test]
    fn three_day_volume_capped() {
        let closes = vec![100.0; 40];
        let mut volumes = vec![1_000.0; 40];
        volumes[39] = 50_000.0;
        let spiky = testutil::dataset_with_volumes(Timeframe::ThreeDay, &closes, &volumes);
        let daily = testutil::dataset_with_volumes(Timeframe::Daily, &closes, &volumes);
        let weekly = testutil::dataset_with_volumes(Timeframe::Weekly, &closes, &volumes);
        let z = ThreeDayVolume::compute(&spiky, &daily, &weekly).unwrap();
        assert!(z <= 4.0);
        assert!(z > 1.0);
    }

    #[test]
    fn mmd_scale_is_bounded() {
        assert_eq!(MomentumMarketDiagnostic::map_to_scale(1_000.0, 1.3), 5.0);
        assert_eq!(MomentumMarketDiagnostic::map_to_scale(-1_000.0, 1.0), 0.5);
        let mid = MomentumMarketDiagnostic::map_to_scale(0.0, 1.0);
        assert!((mid - 2.75).abs() < 1e-9);
    }

    #[test]
    fn mmd_divergence_amplifies() {
        let base = MomentumMarketDiagnostic::map_to_scale(20.0, 1.0);
        let amplified = MomentumMarketDiagnostic::map_to_scale(20.0, 1.3);
        assert!(amplified > base);
    }

    #[test]
    fn pi_cycle_top_low_far_from_cross() {
        let ds = testutil::dataset(Timeframe::Daily, &vec![100.0; 400]);
        // flat prices: ma111 == 350ma, so fast/(2*slow) = 0.5, well under 0.8
        assert_eq!(PiCycleTop::compute(&ds).unwrap(), 0.0);
    }

    #[test]
    fn pi_cycle_top_rises_into_blowoff() {
        let mut closes: Vec<f64> = vec![100.0; 350];
        let mut price = 100.0;
        for _ in 0..150 {
            price *= 1.015;
            closes.push(price);
        }
        let ds = testutil::dataset(Timeframe::Daily, &closes);
        let score = PiCycleTop::compute(&ds).unwrap();
        assert!(score > 0.0);
        assert!(score <= 1.0);
    }

    #[test]
    fn timed_top_score_scales_with_time_weight() {
        let ds = testutil::uptrend(Timeframe::Monthly, 24, 100.0);
        let full = TimedTopScore::compute(&ds, 1.0).unwrap();
        let damped = TimedTopScore::compute(&ds, 0.7).unwrap();
        assert!(damped <= full);
        assert!((0.0..=1.0).contains(&full));
    }

    #[test]
    fn timed_top_score_needs_enough_bars() {
        let ds = testutil::uptrend(Timeframe::Monthly, 6, 100.0);
        assert!(TimedTopScore::compute(&ds, 1.0).is_none());
    }
}
