use crate::cache::{CacheLookup, TimeSeriesCache};
use crate::models::series::{Interval, MinuteSeries};
use crate::services::fetcher::RetryingFetcher;
use log::{debug, info, warn};
use std::fmt;

/// 分钟线的实际来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesOrigin {
    Cache,
    Minute1,
    Minute5,
}

impl fmt::Display for SeriesOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SeriesOrigin::Cache => "cache",
            SeriesOrigin::Minute1 => "live 1m",
            SeriesOrigin::Minute5 => "live 5m",
        };
        f.write_str(label)
    }
}

/// 缓存 → 1 分钟线 → 5 分钟线，取第一个非空结果
#[derive(Clone)]
pub struct FallbackChain {
    cache: TimeSeriesCache,
    fetcher: RetryingFetcher,
}

impl FallbackChain {
    pub fn new(cache: TimeSeriesCache, fetcher: RetryingFetcher) -> Self {
        Self { cache, fetcher }
    }

    pub async fn resolve(&self, symbol: &str) -> Option<(MinuteSeries, SeriesOrigin)> {
        match self.cache.get(symbol) {
            CacheLookup::Hit(series) if !series.is_empty() => {
                return Some((series, SeriesOrigin::Cache));
            }
            lookup => debug!("{}: cache not usable ({:?})", symbol, CacheKind(&lookup)),
        }

        match self.fetcher.fetch_minute(symbol, Interval::Minute1).await {
            Ok(series) if !series.is_empty() => {
                self.cache.put(symbol, &series);
                return Some((series, SeriesOrigin::Minute1));
            }
            Ok(_) => info!("{}: no 1m data, trying 5m", symbol),
            Err(e) => warn!("{}: 1m fetch failed ({}), trying 5m", symbol, e),
        }

        // 5 分钟线不写入 1 分钟缓存
        match self.fetcher.fetch_minute(symbol, Interval::Minute5).await {
            Ok(series) if !series.is_empty() => Some((series, SeriesOrigin::Minute5)),
            Ok(_) => {
                warn!("{}: no minute data at any resolution", symbol);
                None
            }
            Err(e) => {
                warn!("{}: 5m fetch failed: {}", symbol, e);
                None
            }
        }
    }
}

// 日志里只打印缓存状态，不打印整段序列
struct CacheKind<'a>(&'a CacheLookup);

impl fmt::Debug for CacheKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            CacheLookup::Hit(_) => f.write_str("empty hit"),
            CacheLookup::Miss => f.write_str("miss"),
            CacheLookup::Stale(age) => write!(f, "stale, {:?} old", age),
            CacheLookup::Corrupt(reason) => write!(f, "corrupt: {}", reason),
        }
    }
}
