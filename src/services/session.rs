use chrono::Timelike;

use crate::models::report::SessionPrices;
use crate::models::series::MinuteSeries;

/// 美东墙钟时间窗口（距午夜秒数），两端都包含
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionWindow {
    pub start: u32,
    pub end: u32,
}

const fn hm(hour: u32, minute: u32) -> u32 {
    hour * 3600 + minute * 60
}

pub const PRE_MARKET: SessionWindow = SessionWindow { start: hm(4, 0), end: hm(9, 29) };
pub const REGULAR: SessionWindow = SessionWindow { start: hm(9, 30), end: hm(16, 0) };
pub const POST_MARKET: SessionWindow = SessionWindow { start: hm(16, 0), end: hm(20, 0) };

impl SessionWindow {
    pub fn contains<T: Timelike>(&self, time: &T) -> bool {
        let secs = time.num_seconds_from_midnight();
        self.start <= secs && secs <= self.end
    }

    /// 窗口内最后一个非空收盘价
    pub fn last_close(&self, series: &MinuteSeries) -> Option<f64> {
        let closes = series.close()?;
        series
            .index()
            .iter()
            .zip(closes)
            .filter(|(t, _)| self.contains(*t))
            .filter_map(|(_, close)| *close)
            .filter(|close| close.is_finite())
            .last()
    }
}

/// 提取盘中收盘、盘前、盘后三个价格。没有 Close 列时全部为 None。
pub fn split_prices(series: &MinuteSeries) -> SessionPrices {
    SessionPrices {
        regular_close: REGULAR.last_close(series),
        pre_market: PRE_MARKET.last_close(series),
        post_market: POST_MARKET.last_close(series),
    }
}
