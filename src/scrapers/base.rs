use crate::errors::Result;
use crate::models::series::{Interval, RawFrame};
use async_trait::async_trait;

/// 单次行情请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesRequest {
    pub symbol: String,
    pub period: String,
    pub interval: Interval,
    pub include_prepost: bool,
    pub auto_adjust: bool,
}

impl SeriesRequest {
    /// 含盘前/盘后的分钟线请求
    pub fn minute(symbol: &str, period: &str, interval: Interval) -> Self {
        Self {
            symbol: symbol.to_string(),
            period: period.to_string(),
            interval,
            include_prepost: true,
            auto_adjust: false,
        }
    }

    pub fn daily(symbol: &str, period: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            period: period.to_string(),
            interval: Interval::Day1,
            include_prepost: false,
            auto_adjust: false,
        }
    }
}

/// Base trait for remote market data sources
#[async_trait]
pub trait MarketDataSource {
    /// Name used in logs
    fn source_name(&self) -> &'static str;

    /// Fetch one time-indexed table.
    /// An empty frame means the call succeeded but the source has no rows.
    async fn fetch_frame(&self, request: &SeriesRequest) -> Result<RawFrame>;
}
