//! 日线技术指标：昨收、涨跌幅、RSI、ATR 与三条均线。
//!
//! 历史不足时窗口自动缩短，单个指标算不出来只会得到 None，不影响其他字段。
//! RSI 与 ATR 使用 Wilder 平滑（alpha = 1/length 的指数加权均值，调整权重，
//! 至少 `length` 个有效观测值）。

use crate::errors::Result;
use crate::models::report::DailySnapshot;
use crate::models::series::{DailySeries, CLOSE, HIGH, LOW};
use crate::services::fetcher::RetryingFetcher;
use crate::util::round_to;
use log::debug;

pub const RSI_LENGTH: usize = 14;
pub const ATR_LENGTH: usize = 14;
pub const MA_WINDOWS: [usize; 3] = [5, 20, 60];

#[derive(Clone)]
pub struct DailyIndicatorEngine {
    fetcher: RetryingFetcher,
}

impl DailyIndicatorEngine {
    pub fn new(fetcher: RetryingFetcher) -> Self {
        Self { fetcher }
    }

    /// 抓取日线并计算指标；日线为空时所有字段为 None，重试耗尽时返回错误
    pub async fn compute_indicators(&self, symbol: &str) -> Result<DailySnapshot> {
        let daily = self.fetcher.fetch_daily(symbol).await?;
        if daily.is_empty() {
            debug!("{}: empty daily series, indicators unavailable", symbol);
        }
        Ok(snapshot_from_series(&daily))
    }
}

/// RSI 回看长度：min(14, max(2, n-1))
pub fn rsi_length(n: usize) -> usize {
    RSI_LENGTH.min(n.saturating_sub(1).max(2))
}

/// ATR 回看长度：n >= 14 时为 14，否则 max(2, n-1)
pub fn atr_length(n: usize) -> usize {
    if n >= ATR_LENGTH {
        ATR_LENGTH
    } else {
        n.saturating_sub(1).max(2)
    }
}

pub fn snapshot_from_series(daily: &DailySeries) -> DailySnapshot {
    let Some(closes) = daily.column(CLOSE) else {
        return DailySnapshot::default();
    };
    let n = closes.len();
    if n == 0 {
        return DailySnapshot::default();
    }

    let last = closes[n - 1];
    let prior_close = if n >= 2 { closes[n - 2].and_then(|c| round_to(c, 2)) } else { None };
    let percent_change = match (last, prior_close) {
        (Some(last), Some(prior)) if prior != 0.0 => round_to((last - prior) / prior * 100.0, 2),
        _ => None,
    };

    let atr = match (daily.column(HIGH), daily.column(LOW)) {
        (Some(high), Some(low)) => atr(high, low, closes, atr_length(n)),
        _ => None,
    };

    DailySnapshot {
        prior_close,
        percent_change,
        rsi14: rsi(closes, rsi_length(n)).and_then(|v| round_to(v, 1)),
        atr: atr.and_then(|v| round_to(v, 2)),
        ma5: rolling_mean(closes, MA_WINDOWS[0]).and_then(|v| round_to(v, 2)),
        ma20: rolling_mean(closes, MA_WINDOWS[1]).and_then(|v| round_to(v, 2)),
        ma60: rolling_mean(closes, MA_WINDOWS[2]).and_then(|v| round_to(v, 2)),
    }
}

/// 最后一个位置的指数加权均值（调整权重），缺失值占位但不计入
pub fn wilder_mean(values: &[Option<f64>], length: usize) -> Option<f64> {
    if length == 0 {
        return None;
    }
    let decay = 1.0 - 1.0 / length as f64;
    let mut weight = 1.0;
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    let mut observed = 0;

    for value in values.iter().rev() {
        if let Some(v) = value {
            numerator += weight * v;
            denominator += weight;
            observed += 1;
        }
        weight *= decay;
    }

    if observed < length || denominator == 0.0 {
        return None;
    }
    let mean = numerator / denominator;
    mean.is_finite().then_some(mean)
}

pub fn rsi(closes: &[Option<f64>], length: usize) -> Option<f64> {
    let diffs: Vec<Option<f64>> = closes
        .windows(2)
        .map(|w| match (w[0], w[1]) {
            (Some(prev), Some(cur)) => Some(cur - prev),
            _ => None,
        })
        .collect();
    let gains: Vec<Option<f64>> = diffs.iter().map(|d| d.map(|d| d.max(0.0))).collect();
    let losses: Vec<Option<f64>> = diffs.iter().map(|d| d.map(|d| d.min(0.0).abs())).collect();

    let avg_gain = wilder_mean(&gains, length)?;
    let avg_loss = wilder_mean(&losses, length)?;
    let total = avg_gain + avg_loss;
    if total == 0.0 {
        return None;
    }
    Some(100.0 * avg_gain / total)
}

pub fn true_range(high: &[Option<f64>], low: &[Option<f64>], closes: &[Option<f64>]) -> Vec<Option<f64>> {
    let n = closes.len().min(high.len()).min(low.len());
    let mut ranges = vec![None; n];
    for i in 1..n {
        let candidates = [
            high[i].zip(low[i]).map(|(h, l)| (h - l).abs()),
            high[i].zip(closes[i - 1]).map(|(h, pc)| (h - pc).abs()),
            closes[i - 1].zip(low[i]).map(|(pc, l)| (pc - l).abs()),
        ];
        ranges[i] = candidates.into_iter().flatten().reduce(f64::max);
    }
    ranges
}

pub fn atr(high: &[Option<f64>], low: &[Option<f64>], closes: &[Option<f64>], length: usize) -> Option<f64> {
    wilder_mean(&true_range(high, low, closes), length)
}

/// 最近 `window` 个位置内有效值的均值，至少一个有效值
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Option<f64> {
    let start = values.len().saturating_sub(window);
    let observed: Vec<f64> = values[start..].iter().flatten().copied().collect();
    if observed.is_empty() {
        return None;
    }
    Some(observed.iter().sum::<f64>() / observed.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::series::Interval;
    use crate::testing::{daily_frame, test_config, ScriptedSource};
    use crate::util::normalize_frame;
    use std::sync::Arc;

    fn close(v: &[f64]) -> Vec<Option<f64>> {
        v.iter().copied().map(Some).collect()
    }

    #[test]
    fn test_lengths_adapt_to_short_history() {
        assert_eq!(rsi_length(3), 2);
        assert_eq!(rsi_length(1), 2);
        assert_eq!(rsi_length(60), 14);
        assert_eq!(atr_length(3), 2);
        assert_eq!(atr_length(13), 12);
        assert_eq!(atr_length(14), 14);
    }

    #[test]
    fn test_rsi_matches_hand_computed_value() {
        // 差分 +2, -1；alpha=1/2 调整权重：gain = 2*0.5/1.5, loss = 1/1.5
        let value = rsi(&close(&[10.0, 12.0, 11.0]), 2).unwrap();
        assert!((value - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_rsi_needs_length_observations() {
        assert_eq!(rsi(&close(&[10.0, 11.0]), 2), None);
        assert_eq!(rsi(&close(&[10.0, 10.0, 10.0]), 2), None);
    }

    #[test]
    fn test_rsi_all_gains_is_100() {
        let value = rsi(&close(&[1.0, 2.0, 3.0, 4.0]), 3).unwrap();
        assert!((value - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_true_range_uses_previous_close() {
        let tr = true_range(&close(&[11.0, 15.0]), &close(&[9.0, 14.0]), &close(&[10.0, 14.5]));
        assert_eq!(tr, vec![None, Some(5.0)]);
    }

    #[test]
    fn test_rolling_mean_accepts_partial_windows() {
        assert_eq!(rolling_mean(&close(&[1.0, 2.0, 3.0]), 60), Some(2.0));
        assert_eq!(rolling_mean(&close(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]), 5), Some(4.0));
        assert_eq!(rolling_mean(&[None, Some(4.0)], 5), Some(4.0));
        assert_eq!(rolling_mean(&[None], 5), None);
    }

    #[test]
    fn test_three_closes_produce_every_indicator() {
        let series = normalize_frame(daily_frame(&[
            (10.5, 9.5, 10.0),
            (12.5, 10.0, 12.0),
            (12.0, 10.5, 11.0),
        ]))
        .unwrap();
        let snapshot = snapshot_from_series(&series);

        assert_eq!(snapshot.prior_close, Some(12.0));
        assert_eq!(snapshot.percent_change, Some(-8.33));
        assert_eq!(snapshot.rsi14, Some(50.0));
        assert_eq!(snapshot.ma5, Some(11.0));
        assert_eq!(snapshot.ma20, Some(11.0));
        assert_eq!(snapshot.ma60, Some(11.0));
        // TR = [-, 2.5, 1.5]，alpha=1/2：(1.5 + 0.5*2.5) / 1.5
        assert_eq!(snapshot.atr, Some(1.83));
    }

    #[test]
    fn test_single_close_degrades_to_partial_snapshot() {
        let series = normalize_frame(daily_frame(&[(10.5, 9.5, 10.0)])).unwrap();
        let snapshot = snapshot_from_series(&series);
        assert_eq!(snapshot.prior_close, None);
        assert_eq!(snapshot.percent_change, None);
        assert_eq!(snapshot.rsi14, None);
        assert_eq!(snapshot.atr, None);
        assert_eq!(snapshot.ma5, Some(10.0));
    }

    #[test]
    fn test_zero_prior_close_has_no_percent_change() {
        let series = normalize_frame(daily_frame(&[(1.0, 0.0, 0.0), (1.0, 0.0, 1.0)])).unwrap();
        assert_eq!(snapshot_from_series(&series).percent_change, None);
    }

    #[tokio::test]
    async fn test_empty_daily_series_yields_all_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(ScriptedSource::new());
        let engine = DailyIndicatorEngine::new(RetryingFetcher::new(source.clone(), &test_config(dir.path())));

        let snapshot = engine.compute_indicators("FIG").await.unwrap();
        assert_eq!(snapshot, DailySnapshot::default());
        assert_eq!(source.calls("FIG", Interval::Day1), 1);
    }

    #[tokio::test]
    async fn test_exhausted_daily_retries_are_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(ScriptedSource::new());
        source.fail_times("NVDA", Interval::Day1, 3);
        let engine = DailyIndicatorEngine::new(RetryingFetcher::new(source, &test_config(dir.path())));

        assert!(engine.compute_indicators("NVDA").await.is_err());
    }
}
