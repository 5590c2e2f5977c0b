//! Derived technical series computed over a full bar window.
//!
//! Every series is the same length as the input candles and value `i`
//! depends only on bars `0..=i` (incremental computation), which keeps the
//! cached datasets self-consistent after an atomic refresh.

use super::candle::Candle;
use super::dataset::SeriesKind;
use std::collections::HashMap;
use ta::indicators::{
    AverageTrueRange, BollingerBands, MovingAverageConvergenceDivergence, RelativeStrengthIndex,
    SimpleMovingAverage,
};
use ta::{DataItem, Next};

pub const RSI_PERIOD: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;
pub const BB_PERIOD: usize = 20;
pub const BB_STD_DEV: f64 = 2.0;
pub const ATR_PERIOD: usize = 14;
pub const STOCH_K_PERIOD: usize = 14;
pub const STOCH_D_PERIOD: usize = 3;
pub const SUPERTREND_PERIOD: usize = 10;
pub const SUPERTREND_MULTIPLIER: f64 = 3.0;
pub const VOLUME_SMA_PERIOD: usize = 20;

/// Compute the full derived-series map for one bar window.
pub fn compute_derived(candles: &[Candle]) -> HashMap<SeriesKind, Vec<f64>> {
    let n = candles.len();
    let mut out = HashMap::new();
    if n == 0 {
        return out;
    }

    let mut rsi = RelativeStrengthIndex::new(RSI_PERIOD).expect("valid RSI period");
    let mut macd = MovingAverageConvergenceDivergence::new(MACD_FAST, MACD_SLOW, MACD_SIGNAL)
        .expect("valid MACD periods");
    let mut bb = BollingerBands::new(BB_PERIOD, BB_STD_DEV).expect("valid BB params");
    let mut atr = AverageTrueRange::new(ATR_PERIOD).expect("valid ATR period");
    let mut vol_sma = SimpleMovingAverage::new(VOLUME_SMA_PERIOD).expect("valid SMA period");

    let mut rsi_s = Vec::with_capacity(n);
    let mut macd_line = Vec::with_capacity(n);
    let mut macd_signal = Vec::with_capacity(n);
    let mut macd_hist = Vec::with_capacity(n);
    let mut bb_upper = Vec::with_capacity(n);
    let mut bb_middle = Vec::with_capacity(n);
    let mut bb_lower = Vec::with_capacity(n);
    let mut bb_width = Vec::with_capacity(n);
    let mut atr_s = Vec::with_capacity(n);
    let mut vol_sma_s = Vec::with_capacity(n);
    let mut vol_ratio = Vec::with_capacity(n);

    for c in candles {
        rsi_s.push(rsi.next(c.close));

        let m = macd.next(c.close);
        macd_line.push(m.macd);
        macd_signal.push(m.signal);
        macd_hist.push(m.histogram);

        let b = bb.next(c.close);
        bb_upper.push(b.upper);
        bb_middle.push(b.average);
        bb_lower.push(b.lower);
        bb_width.push(b.upper - b.lower);

        atr_s.push(atr.next(&data_item(c)));

        let vs = vol_sma.next(c.volume);
        vol_sma_s.push(vs);
        vol_ratio.push(if vs > 0.0 { c.volume / vs } else { 1.0 });
    }

    let (stoch_k, stoch_d) = stochastic(candles, STOCH_K_PERIOD, STOCH_D_PERIOD);
    let (supertrend, direction) =
        super_trend(candles, SUPERTREND_PERIOD, SUPERTREND_MULTIPLIER);

    out.insert(SeriesKind::Rsi, rsi_s);
    out.insert(SeriesKind::MacdLine, macd_line);
    out.insert(SeriesKind::MacdSignal, macd_signal);
    out.insert(SeriesKind::MacdHistogram, macd_hist);
    out.insert(SeriesKind::BbUpper, bb_upper);
    out.insert(SeriesKind::BbMiddle, bb_middle);
    out.insert(SeriesKind::BbLower, bb_lower);
    out.insert(SeriesKind::BbWidth, bb_width);
    out.insert(SeriesKind::Atr, atr_s);
    out.insert(SeriesKind::StochK, stoch_k);
    out.insert(SeriesKind::StochD, stoch_d);
    out.insert(SeriesKind::Supertrend, supertrend);
    out.insert(SeriesKind::SupertrendDir, direction);
    out.insert(SeriesKind::VolumeSma, vol_sma_s);
    out.insert(SeriesKind::VolumeRatio, vol_ratio);
    out
}

/// ta's DataItem rejects bars where low > min(open, close) etc., which can
/// happen on sloppy upstream data. Widen high/low to satisfy it.
fn data_item(c: &Candle) -> DataItem {
    let high = c.high.max(c.open).max(c.close).max(c.low);
    let low = c.low.min(c.open).min(c.close);
    DataItem::builder()
        .open(c.open)
        .high(high)
        .low(low)
        .close(c.close)
        .volume(c.volume.max(0.0))
        .build()
        .expect("widened bar is always valid")
}

/// Rolling %K / %D with an expanding window during warmup.
fn stochastic(candles: &[Candle], k_period: usize, d_period: usize) -> (Vec<f64>, Vec<f64>) {
    let n = candles.len();
    let mut k_s = Vec::with_capacity(n);
    let mut d_s = Vec::with_capacity(n);

    for i in 0..n {
        let start = i.saturating_sub(k_period - 1);
        let window = &candles[start..=i];
        let hh = window.iter().map(|c| c.high).fold(f64::MIN, f64::max);
        let ll = window.iter().map(|c| c.low).fold(f64::MAX, f64::min);
        let k = if hh > ll {
            100.0 * (candles[i].close - ll) / (hh - ll)
        } else {
            50.0
        };
        k_s.push(k);

        let d_start = k_s.len().saturating_sub(d_period);
        let d_window = &k_s[d_start..];
        d_s.push(d_window.iter().sum::<f64>() / d_window.len() as f64);
    }
    (k_s, d_s)
}

/// SuperTrend line and trend direction (+1 bullish, -1 bearish).
fn super_trend(candles: &[Candle], period: usize, multiplier: f64) -> (Vec<f64>, Vec<f64>) {
    let n = candles.len();
    let mut st = Vec::with_capacity(n);
    let mut dir = Vec::with_capacity(n);
    if n == 0 {
        return (st, dir);
    }

    let mut atr = AverageTrueRange::new(period).expect("valid ATR period");
    let mut upper = Vec::with_capacity(n);
    let mut lower = Vec::with_capacity(n);
    for c in candles {
        let a = atr.next(&data_item(c));
        upper.push(c.hl2() + multiplier * a);
        lower.push(c.hl2() - multiplier * a);
    }

    st.push(candles[0].hl2());
    dir.push(1.0);
    for i in 1..n {
        let close = candles[i].close;
        if close <= lower[i - 1] {
            st.push(upper[i]);
            dir.push(-1.0);
        } else if close >= upper[i - 1] {
            st.push(lower[i]);
            dir.push(1.0);
        } else {
            st.push(st[i - 1]);
            dir.push(dir[i - 1]);
        }
    }
    (st, dir)
}

/// Sample mean, or None on an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation, or None on an empty slice.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

/// Slope of the least-squares line through (0..n, values).
pub fn linear_slope(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let xs: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let mx = mean(&xs)?;
    let my = mean(values)?;
    let mut num = 0.0;
    let mut den = 0.0;
    for i in 0..n {
        num += (xs[i] - mx) * (values[i] - my);
        den += (xs[i] - mx).powi(2);
    }
    if den == 0.0 { None } else { Some(num / den) }
}

/// Exponential moving average of a slice with the pandas `span` convention
/// (alpha = 2 / (span + 1)), seeded on the first value.
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;
    for &v in values {
        let next = match prev {
            Some(p) => alpha * v + (1.0 - alpha) * p,
            None => v,
        };
        out.push(next);
        prev = Some(next);
    }
    out
}

/// Bar-over-bar percentage returns (length n-1).
pub fn pct_change(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}
