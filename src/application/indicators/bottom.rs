//! Bottom-class indicators: each estimates how strongly current conditions
//! resemble a market bottom, on its own native scale.

use super::{Indicator, IndicatorContext, rolling_sma, session_time_weight, stochastic_position};
use crate::domain::market::series;
use crate::domain::market::{SeriesKind, Timeframe, TimeframeDataset};
use crate::domain::report::SignalClass;
use async_trait::async_trait;
use chrono::Utc;
use statrs::distribution::{Continuous, Normal};

// ---------------------------------------------------------------------------
// cvdd_terminal_relative
// ---------------------------------------------------------------------------

/// Price position between the CVDD floor and the terminal ceiling, 0..1.
/// Low values mean price sits near the historical capitulation floor.
pub struct CvddTerminalRelative;

#[async_trait]
impl Indicator for CvddTerminalRelative {
    fn name(&self) -> &'static str {
        "cvdd_terminal_relative"
    }

    fn class(&self) -> SignalClass {
        SignalClass::Bottom
    }

    async fn compute_raw(&self, ctx: &IndicatorContext) -> Option<f64> {
        ctx.metric("cvdd").await
    }
}

// ---------------------------------------------------------------------------
// cm_vix_fix
// ---------------------------------------------------------------------------

const VIX_LOOKBACK: usize = 22;
const VIX_SMOOTH: usize = 3;

/// Williams Vix Fix: drawdown of the current low from the highest close of
/// the last 22 daily bars, in percent, smoothed over 3 bars. Spikes mark
/// capitulation.
pub struct CmVixFix;

impl CmVixFix {
    fn compute(ds: &TimeframeDataset) -> Option<f64> {
        let candles = &ds.candles;
        if candles.len() < VIX_LOOKBACK + VIX_SMOOTH {
            return None;
        }
        let mut wvf = Vec::with_capacity(candles.len());
        for i in 0..candles.len() {
            let start = i.saturating_sub(VIX_LOOKBACK - 1);
            let highest_close = candles[start..=i]
                .iter()
                .map(|c| c.close)
                .fold(f64::MIN, f64::max);
            if highest_close <= 0.0 {
                return None;
            }
            wvf.push((highest_close - candles[i].low) / highest_close * 100.0);
        }
        let tail = &wvf[wvf.len() - VIX_SMOOTH..];
        Some(tail.iter().sum::<f64>() / VIX_SMOOTH as f64)
    }
}

#[async_trait]
impl Indicator for CmVixFix {
    fn name(&self) -> &'static str {
        "cm_vix_fix"
    }

    fn class(&self) -> SignalClass {
        SignalClass::Bottom
    }

    async fn compute_raw(&self, ctx: &IndicatorContext) -> Option<f64> {
        let ds = ctx.dataset(Timeframe::Daily).await;
        Self::compute(&ds)
    }
}

// ---------------------------------------------------------------------------
// gaussian_channel
// ---------------------------------------------------------------------------

const GAUSSIAN_PERIOD: usize = 20;
const GAUSSIAN_SIGMA: f64 = 2.0;

/// Distance of the close below a Gaussian-kernel moving average, in units
/// of the rolling standard deviation. Deeply negative values mark
/// stretched-down conditions.
pub struct GaussianChannel;

impl GaussianChannel {
    fn compute(ds: &TimeframeDataset) -> Option<f64> {
        let closes = ds.closes();
        if closes.len() < GAUSSIAN_PERIOD {
            return None;
        }
        let window = &closes[closes.len() - GAUSSIAN_PERIOD..];

        let kernel = Normal::new(GAUSSIAN_PERIOD as f64 / 2.0, GAUSSIAN_SIGMA).ok()?;
        let weights: Vec<f64> = (0..GAUSSIAN_PERIOD).map(|j| kernel.pdf(j as f64)).collect();
        let weight_sum: f64 = weights.iter().sum();
        let gma: f64 = window
            .iter()
            .zip(&weights)
            .map(|(c, w)| c * w)
            .sum::<f64>()
            / weight_sum;

        let std = series::std_dev(window)?;
        if std == 0.0 {
            return None;
        }
        Some((window[GAUSSIAN_PERIOD - 1] - gma) / std)
    }
}

#[async_trait]
impl Indicator for GaussianChannel {
    fn name(&self) -> &'static str {
        "gaussian_channel"
    }

    fn class(&self) -> SignalClass {
        SignalClass::Bottom
    }

    async fn compute_raw(&self, ctx: &IndicatorContext) -> Option<f64> {
        let ds = ctx.dataset(Timeframe::Daily).await;
        Self::compute(&ds)
    }
}

// ---------------------------------------------------------------------------
// 3d_mmd
// ---------------------------------------------------------------------------

/// Multi-timeframe momentum z-score, 3-day leading. Strongly negative
/// values mark downside exhaustion; a volume surge on the 3-day window
/// amplifies the reading.
pub struct ThreeDayMmd;

impl ThreeDayMmd {
    fn momentum_z(ds: &TimeframeDataset, span: usize) -> Option<f64> {
        let closes = ds.closes();
        if closes.len() < span * 3 {
            return None;
        }
        let moms: Vec<f64> = (span..closes.len())
            .filter(|&i| closes[i - span] != 0.0)
            .map(|i| (closes[i] - closes[i - span]) / closes[i - span] * 100.0)
            .collect();
        let mean = series::mean(&moms)?;
        let std = series::std_dev(&moms)?;
        if std == 0.0 {
            return None;
        }
        Some((moms.last()? - mean) / std)
    }

    fn combine(z3: f64, zd: f64, zw: f64, volume_z: Option<f64>) -> f64 {
        let combined = z3 * 0.6 + zd * 0.3 + zw * 0.1;
        let boost = match volume_z {
            Some(z) if z > 0.0 => 1.0 + (z / 2.0).min(1.0) * 0.2,
            _ => 1.0,
        };
        combined * boost
    }
}

#[async_trait]
impl Indicator for ThreeDayMmd {
    fn name(&self) -> &'static str {
        "3d_mmd"
    }

    fn class(&self) -> SignalClass {
        SignalClass::Bottom
    }

    async fn compute_raw(&self, ctx: &IndicatorContext) -> Option<f64> {
        let three_day = ctx.dataset(Timeframe::ThreeDay).await;
        let daily = ctx.dataset(Timeframe::Daily).await;
        let weekly = ctx.dataset(Timeframe::Weekly).await;

        let z3 = Self::momentum_z(&three_day, 10)?;
        let zd = Self::momentum_z(&daily, 14)?;
        let zw = Self::momentum_z(&weekly, 4)?;
        let volume_z = three_day.volume_stats(20).map(|s| s.z_score);
        Some(Self::combine(z3, zd, zw, volume_z))
    }
}

// ---------------------------------------------------------------------------
// hash_ribbons
// ---------------------------------------------------------------------------

const RIBBON_FAST: usize = 30;
const RIBBON_SLOW: usize = 60;
const RIBBON_CROSS_WINDOW: usize = 14;

/// Ribbon compression and recovery on the 30/60 daily moving averages,
/// scored 0..1. Capitulation (fast well below slow) followed by an upward
/// cross is the classic bottom setup.
pub struct HashRibbons;

impl HashRibbons {
    fn compute(ds: &TimeframeDataset) -> Option<f64> {
        let closes = ds.closes();
        if closes.len() < RIBBON_SLOW + RIBBON_CROSS_WINDOW {
            return None;
        }
        let fast = rolling_sma(&closes, RIBBON_FAST);
        let slow = rolling_sma(&closes, RIBBON_SLOW);
        let n = closes.len();

        let ratio = fast[n - 1] / slow[n - 1];
        let ratio_score = ((1.0 - ratio) * 10.0).clamp(0.0, 1.0);

        let mut crossover = 0.0;
        for i in (n - RIBBON_CROSS_WINDOW)..n {
            if fast[i - 1] <= slow[i - 1] && fast[i] > slow[i] {
                crossover = 0.5;
            } else if fast[i - 1] >= slow[i - 1] && fast[i] < slow[i] {
                crossover = -0.5;
            }
        }

        let back = n - 8;
        let momentum = if fast[back] != 0.0 {
            (fast[n - 1] - fast[back]) / fast[back]
        } else {
            0.0
        };
        let momentum_score = (momentum * 10.0).tanh() * 0.5 + 0.5;

        let score = ratio_score * 0.4 + (crossover + 0.5) * 0.4 + momentum_score * 0.2;
        Some(score.clamp(0.0, 1.0))
    }
}

#[async_trait]
impl Indicator for HashRibbons {
    fn name(&self) -> &'static str {
        "hash_ribbons"
    }

    fn class(&self) -> SignalClass {
        SignalClass::Bottom
    }

    async fn compute_raw(&self, ctx: &IndicatorContext) -> Option<f64> {
        let ds = ctx.dataset(Timeframe::Daily).await;
        Self::compute(&ds)
    }
}

// ---------------------------------------------------------------------------
// w_wavefront
// ---------------------------------------------------------------------------

/// Composite weekly oscillator position, 0..1. Five equally weighted
/// components; a low reading across them marks washed-out conditions, so
/// the bounds invert this one.
pub struct WeeklyWavefront;

impl WeeklyWavefront {
    fn compute(weekly: &TimeframeDataset, monthly: &TimeframeDataset) -> Option<f64> {
        let mut components: Vec<f64> = Vec::with_capacity(5);

        if let Some(rsi_m) = monthly.series_slice(SeriesKind::Rsi) {
            if let Some(stoch_rsi) = stochastic_position(rsi_m, 14) {
                components.push(stoch_rsi);
            }
        }

        let rsi_w = weekly.series_slice(SeriesKind::Rsi)?;
        if rsi_w.len() >= 9 {
            let smoothed = series::ema(rsi_w, 9);
            components.push(smoothed.last()? / 100.0);
        }

        if let Some(hist) = weekly.series_tail(SeriesKind::MacdHistogram, 26) {
            let std = series::std_dev(&hist)?;
            if std > 0.0 {
                components.push((hist.last()? / std).tanh() * 0.5 + 0.5);
            }
        }

        if rsi_w.len() >= 13 {
            let tdi = series::ema(&series::ema(rsi_w, 13), 8);
            components.push(tdi.last()? / 100.0);
        }

        if let Some(ad) = Self::accumulation_change(weekly) {
            components.push((ad / 10.0).tanh() * 0.5 + 0.5);
        }

        if components.len() < 3 {
            return None;
        }
        Some(
            (components.iter().sum::<f64>() / components.len() as f64).clamp(0.0, 1.0),
        )
    }

    /// Change in the accumulation/distribution line over the last 4 bars,
    /// scaled by recent volume so the units are comparable across windows.
    fn accumulation_change(ds: &TimeframeDataset) -> Option<f64> {
        let candles = &ds.candles;
        if candles.len() < 5 {
            return None;
        }
        let mut line = Vec::with_capacity(candles.len());
        let mut acc = 0.0;
        for c in candles {
            let range = c.high - c.low;
            let mfm = if range > 0.0 {
                ((c.close - c.low) - (c.high - c.close)) / range
            } else {
                0.0
            };
            acc += mfm * c.volume;
            line.push(acc);
        }
        let n = line.len();
        let recent_volume = candles[n - 5..].iter().map(|c| c.volume).sum::<f64>() / 5.0;
        if recent_volume <= 0.0 {
            return None;
        }
        Some((line[n - 1] - line[n - 5]) / recent_volume)
    }
}

#[async_trait]
impl Indicator for WeeklyWavefront {
    fn name(&self) -> &'static str {
        "w_wavefront"
    }

    fn class(&self) -> SignalClass {
        SignalClass::Bottom
    }

    async fn compute_raw(&self, ctx: &IndicatorContext) -> Option<f64> {
        let weekly = ctx.dataset(Timeframe::Weekly).await;
        let monthly = ctx.dataset(Timeframe::Monthly).await;
        Self::compute(&weekly, &monthly)
    }
}

// ---------------------------------------------------------------------------
// supertrend
// ---------------------------------------------------------------------------

/// SuperTrend reversal score, 0..1. A fresh bearish-to-bullish flip with
/// price still near the trend line is the strongest reading.
pub struct SuperTrendReversal;

impl SuperTrendReversal {
    fn compute(ds: &TimeframeDataset) -> Option<f64> {
        let dir = ds.series_slice(SeriesKind::SupertrendDir)?;
        let line = ds.series_slice(SeriesKind::Supertrend)?;
        let close = ds.close(0)?;
        if dir.len() < 12 || close <= 0.0 {
            return None;
        }

        let current = *dir.last()?;
        let mut score: f64 = if current > 0.0 { 0.4 } else { 0.1 };

        let tail = &dir[dir.len() - 11..];
        let flips = tail.windows(2).filter(|w| w[0] != w[1]).count();
        if current > 0.0 && flips == 1 && tail[0] < 0.0 {
            score += 0.35;
        } else if flips >= 2 {
            score += 0.20;
        }

        let distance = (close - line.last()?).abs() / close;
        score += if distance <= 0.01 {
            0.25
        } else if distance <= 0.02 {
            0.20
        } else if distance <= 0.05 {
            0.10
        } else {
            0.0
        };

        Some(score.clamp(0.0, 1.0))
    }
}

#[async_trait]
impl Indicator for SuperTrendReversal {
    fn name(&self) -> &'static str {
        "supertrend"
    }

    fn class(&self) -> SignalClass {
        SignalClass::Bottom
    }

    async fn compute_raw(&self, ctx: &IndicatorContext) -> Option<f64> {
        let ds = ctx.dataset(Timeframe::Daily).await;
        Self::compute(&ds)
    }
}

// ---------------------------------------------------------------------------
// 2d_volume_burst
// ---------------------------------------------------------------------------

const BURST_WINDOW: usize = 2;
const BURST_HISTORY: usize = 20;

/// Z-score of the last two days of volume against the preceding 20-day
/// history. Capitulation bottoms print outsized volume.
pub struct TwoDayVolumeBurst;

impl TwoDayVolumeBurst {
    fn compute(ds: &TimeframeDataset) -> Option<f64> {
        let volumes = ds.volumes();
        if volumes.len() < BURST_WINDOW + BURST_HISTORY {
            return None;
        }
        let n = volumes.len();
        let recent = &volumes[n - BURST_WINDOW..];
        let history = &volumes[n - BURST_WINDOW - BURST_HISTORY..n - BURST_WINDOW];

        let recent_avg = series::mean(recent)?;
        let mean = series::mean(history)?;
        let std = series::std_dev(history)?;
        if std == 0.0 {
            return None;
        }
        Some((recent_avg - mean) / std)
    }
}

#[async_trait]
impl Indicator for TwoDayVolumeBurst {
    fn name(&self) -> &'static str {
        "2d_volume_burst"
    }

    fn class(&self) -> SignalClass {
        SignalClass::Bottom
    }

    async fn compute_raw(&self, ctx: &IndicatorContext) -> Option<f64> {
        let ds = ctx.dataset(Timeframe::Daily).await;
        Self::compute(&ds)
    }
}

// ---------------------------------------------------------------------------
// m_timed_bottom_score
// ---------------------------------------------------------------------------

/// Monthly-window bottom score, 0..1, weighted toward the 08:00/20:00 UTC
/// bar rollovers when the coarse windows actually close.
pub struct TimedBottomScore;

impl TimedBottomScore {
    fn compute(ds: &TimeframeDataset, time_weight: f64) -> Option<f64> {
        if ds.len() < 6 {
            return None;
        }

        let momentum = ds.momentum(3)?;
        let momentum_score = (-momentum / 20.0).tanh() * 0.5 + 0.5;

        let atr = ds.series_slice(SeriesKind::Atr)?;
        let n = atr.len();
        let recent = series::mean(&atr[n.saturating_sub(3)..])?;
        let baseline = series::mean(atr)?;
        let volatility_score = if baseline > 0.0 {
            (recent / baseline / 2.0).min(1.0)
        } else {
            0.0
        };

        let volume_score = ds
            .volume_stats(12)
            .map(|s| (s.z_score.max(0.0) / 3.0).min(1.0))
            .unwrap_or(0.0);

        let rsi = ds.series_value(SeriesKind::Rsi, 0)?;
        let oversold_score = ((50.0 - rsi) / 50.0).clamp(0.0, 1.0);

        let score = momentum_score * 0.35
            + volatility_score * 0.25
            + volume_score * 0.25
            + oversold_score * 0.15;
        Some((score * time_weight).clamp(0.0, 1.0))
    }
}

#[async_trait]
impl Indicator for TimedBottomScore {
    fn name(&self) -> &'static str {
        "m_timed_bottom_score"
    }

    fn class(&self) -> SignalClass {
        SignalClass::Bottom
    }

    async fn compute_raw(&self, ctx: &IndicatorContext) -> Option<f64> {
        let ds = ctx.dataset(Timeframe::Monthly).await;
        let weight = session_time_weight(Utc::now(), 0.5);
        Self::compute(&ds, weight)
    }
}

// ---------------------------------------------------------------------------
// pi_cycle_low
// ---------------------------------------------------------------------------

const PI_LOW_FAST: usize = 150;
const PI_LOW_FAST_MULT: f64 = 0.745;
const PI_LOW_SLOW: usize = 471;
const PI_LOW_CROSS_WINDOW: usize = 30;
const PI_LOW_FRESH_CROSS: usize = 10;

/// Pi Cycle Low: the 150-day MA scaled by 0.745 dipping under the 471-day
/// MA has marked every major cycle low. Scored 0..1 from crossover
/// recency, position, and proximity.
pub struct PiCycleLow;

impl PiCycleLow {
    fn compute(ds: &TimeframeDataset) -> Option<f64> {
        let closes = ds.closes();
        if closes.len() < PI_LOW_SLOW {
            return None;
        }
        let fast: Vec<f64> = rolling_sma(&closes, PI_LOW_FAST)
            .iter()
            .map(|v| v * PI_LOW_FAST_MULT)
            .collect();
        let slow = rolling_sma(&closes, PI_LOW_SLOW);
        let n = closes.len();

        let mut bars_since_cross = None;
        for back in 0..PI_LOW_CROSS_WINDOW.min(n - 1) {
            let i = n - 1 - back;
            if fast[i - 1] >= slow[i - 1] && fast[i] < slow[i] {
                bars_since_cross = Some(back);
                break;
            }
        }
        let crossover_score = if bars_since_cross.is_some() { 1.0 } else { 0.0 };

        let position_score = ((slow[n - 1] - fast[n - 1]) / slow[n - 1] * 20.0).clamp(0.0, 1.0);

        let separation = (fast[n - 1] - slow[n - 1]).abs() / slow[n - 1];
        let proximity_score = (1.0 - (separation * 10.0).min(1.0)).clamp(0.0, 1.0);

        let mut score = crossover_score * 0.4 + position_score * 0.3 + proximity_score * 0.3;
        if matches!(bars_since_cross, Some(b) if b <= PI_LOW_FRESH_CROSS) {
            score *= 1.2;
        }
        Some(score.clamp(0.0, 1.0))
    }
}

#[async_trait]
impl Indicator for PiCycleLow {
    fn name(&self) -> &'static str {
        "pi_cycle_low"
    }

    fn class(&self) -> SignalClass {
        SignalClass::Bottom
    }

    async fn compute_raw(&self, ctx: &IndicatorContext) -> Option<f64> {
        let ds = ctx.dataset(Timeframe::Daily).await;
        Self::compute(&ds)
    }
}

// ---------------------------------------------------------------------------
// puell_multiple
// ---------------------------------------------------------------------------

const BLOCKS_PER_DAY: f64 = 144.0;
const BLOCK_SUBSIDY: f64 = 3.125;
const PUELL_WINDOW: usize = 365;

/// Puell Multiple: daily miner issuance value against its one-year mean,
/// nudged by a short-vs-long volatility ratio. Readings well under 1 mark
/// miner capitulation; the bounds invert this one.
pub struct PuellMultiple;

impl PuellMultiple {
    fn compute(ds: &TimeframeDataset) -> Option<f64> {
        let closes = ds.closes();
        if closes.len() < PUELL_WINDOW {
            return None;
        }
        let issuance: Vec<f64> = closes
            .iter()
            .map(|c| c * BLOCKS_PER_DAY * BLOCK_SUBSIDY)
            .collect();
        let n = issuance.len();
        let yearly_mean = series::mean(&issuance[n - PUELL_WINDOW..])?;
        if yearly_mean <= 0.0 {
            return None;
        }
        let multiple = issuance[n - 1] / yearly_mean;

        let returns = series::pct_change(&closes);
        let rn = returns.len();
        let recent_vol = series::std_dev(&returns[rn.saturating_sub(30)..])?;
        let long_vol = series::std_dev(&returns)?;
        let vol_factor = if long_vol > 0.0 { recent_vol / long_vol } else { 1.0 };

        Some(multiple * (0.9 + 0.1 * vol_factor.min(2.0)))
    }
}

#[async_trait]
impl Indicator for PuellMultiple {
    fn name(&self) -> &'static str {
        "puell_multiple"
    }

    fn class(&self) -> SignalClass {
        SignalClass::Bottom
    }

    async fn compute_raw(&self, ctx: &IndicatorContext) -> Option<f64> {
        let ds = ctx.dataset(Timeframe::Daily).await;
        Self::compute(&ds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::indicators::testutil;

    #[test]
    fn vix_fix_spikes_on_crash() {
        let mut closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64 * 0.1).collect();
        closes.extend([95.0, 88.0, 80.0]);
        let crash = testutil::dataset(Timeframe::Daily, &closes);
        let calm = testutil::uptrend(Timeframe::Daily, 40, 100.0);

        let spiked = CmVixFix::compute(&crash).unwrap();
        let quiet = CmVixFix::compute(&calm).unwrap();
        assert!(spiked > quiet);
        assert!(spiked > 15.0);
    }

    #[test]
    fn vix_fix_needs_enough_bars() {
        let short = testutil::uptrend(Timeframe::Daily, 10, 100.0);
        assert!(CmVixFix::compute(&short).is_none());
    }

    #[test]
    fn gaussian_channel_negative_below_mean() {
        let mut closes: Vec<f64> = vec![100.0; 25];
        closes.extend([98.0, 95.0, 90.0]);
        let ds = testutil::dataset(Timeframe::Daily, &closes);
        let distance = GaussianChannel::compute(&ds).unwrap();
        assert!(distance < 0.0);
    }

    #[test]
    fn gaussian_channel_flat_series_is_unavailable() {
        let ds = testutil::dataset(Timeframe::Daily, &[100.0; 25]);
        assert!(GaussianChannel::compute(&ds).is_none());
    }

    #[test]
    fn mmd_boost_only_on_positive_volume_z() {
        let base = ThreeDayMmd::combine(-2.0, -1.0, -0.5, None);
        let boosted = ThreeDayMmd::combine(-2.0, -1.0, -0.5, Some(2.0));
        let ignored = ThreeDayMmd::combine(-2.0, -1.0, -0.5, Some(-2.0));
        assert!(boosted < base, "positive volume z should deepen the reading");
        assert_eq!(base, ignored);
    }

    #[test]
    fn hash_ribbons_scores_capitulation_higher() {
        let falling = testutil::downtrend(Timeframe::Daily, 120, 100.0);
        let rising = testutil::uptrend(Timeframe::Daily, 120, 100.0);
        let f = HashRibbons::compute(&falling).unwrap();
        let r = HashRibbons::compute(&rising).unwrap();
        assert!((0.0..=1.0).contains(&f));
        assert!((0.0..=1.0).contains(&r));
        assert!(f > r);
    }

    #[test]
    fn wavefront_is_bounded() {
        let weekly = testutil::downtrend(Timeframe::Weekly, 60, 100.0);
        let monthly = testutil::downtrend(Timeframe::Monthly, 30, 100.0);
        let v = WeeklyWavefront::compute(&weekly, &monthly).unwrap();
        assert!((0.0..=1.0).contains(&v));
    }

    #[test]
    fn supertrend_fresh_flip_beats_entrenched_downtrend() {
        // calm base, then a crash deep enough to cross the lower band
        let mut reversal: Vec<f64> = vec![100.0; 30];
        reversal.extend([85.0, 84.0, 83.0, 82.0]);
        // sharp recovery through the upper band, then a gentle drift up
        reversal.push(97.0);
        reversal.extend((1..=6).map(|k| 97.0 + k as f64 * 0.5));

        let mut grind: Vec<f64> = vec![100.0; 30];
        grind.push(85.0);
        grind.extend((0..15).map(|k| 84.0 - k as f64));

        let up = testutil::dataset(Timeframe::Daily, &reversal);
        let down = testutil::dataset(Timeframe::Daily, &grind);
        let bull = SuperTrendReversal::compute(&up).unwrap();
        let bear = SuperTrendReversal::compute(&down).unwrap();
        // fresh bearish-to-bullish flip scores the base plus the flip bonus
        assert!(bull >= 0.75, "got {bull}");
        assert!(bear <= 0.35, "got {bear}");
        assert!((0.0..=1.0).contains(&bull));
    }

    #[test]
    fn volume_burst_detects_surge() {
        let closes = vec![100.0; 30];
        // ordinary churn around 1000, then two capitulation days
        let mut volumes: Vec<f64> = (0..30).map(|i| 1_000.0 + (i % 4) as f64 * 50.0).collect();
        volumes[28] = 5_000.0;
        volumes[29] = 6_000.0;
        let ds = testutil::dataset_with_volumes(Timeframe::Daily, &closes, &volumes);
        let z = TwoDayVolumeBurst::compute(&ds).unwrap();
        assert!(z > 2.0, "got {z}");
    }

    #[test]
    fn volume_burst_flat_history_is_unavailable() {
        let closes = vec![100.0; 30];
        let volumes = vec![1_000.0; 30];
        let ds = testutil::dataset_with_volumes(Timeframe::Daily, &closes, &volumes);
        assert!(TwoDayVolumeBurst::compute(&ds).is_none());
    }

    #[test]
    fn timed_bottom_score_scales_with_time_weight() {
        let ds = testutil::downtrend(Timeframe::Monthly, 24, 100.0);
        let full = TimedBottomScore::compute(&ds, 1.0).unwrap();
        let half = TimedBottomScore::compute(&ds, 0.5).unwrap();
        assert!(half <= full);
        assert!((0.0..=1.0).contains(&full));
    }

    #[test]
    fn pi_cycle_low_needs_full_window() {
        let ds = testutil::uptrend(Timeframe::Daily, 200, 100.0);
        assert!(PiCycleLow::compute(&ds).is_none());
    }

    #[test]
    fn pi_cycle_low_bounded_on_long_window() {
        let ds = testutil::downtrend(Timeframe::Daily, 480, 100.0);
        let v = PiCycleLow::compute(&ds).unwrap();
        assert!((0.0..=1.0).contains(&v));
    }

    #[test]
    fn puell_multiple_near_one_on_flat_prices() {
        let closes: Vec<f64> = (0..400)
            .map(|i| 100.0 + (i as f64 * 0.7).sin())
            .collect();
        let ds = testutil::dataset(Timeframe::Daily, &closes);
        let m = PuellMultiple::compute(&ds).unwrap();
        assert!(m > 0.8 && m < 1.3, "got {m}");
    }

    #[test]
    fn puell_multiple_low_after_collapse() {
        let mut closes: Vec<f64> = vec![100.0; 360];
        closes.extend(vec![40.0; 40]);
        let ds = testutil::dataset(Timeframe::Daily, &closes);
        let m = PuellMultiple::compute(&ds).unwrap();
        assert!(m < 0.7, "got {m}");
    }
}
