use crate::config::Config;
use crate::errors::{MonitorError, Result};
use crate::models::series::{Interval, TimeSeries};
use crate::scrapers::base::{MarketDataSource, SeriesRequest};
use crate::util::normalize_frame;
use log::{debug, warn};
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::strategy::FixedInterval;
use tokio_retry::RetryIf;

/// 带有限次重试的远程抓取。
///
/// 只有可重试错误（网络、解析）会触发重试；成功但为空的结果立即返回，
/// 由调用方决定下一步备援。
#[derive(Clone)]
pub struct RetryingFetcher {
    source: Arc<dyn MarketDataSource + Send + Sync>,
    attempts: usize,
    delay: Duration,
    jitter_max: Duration,
    minute_period: String,
    daily_period: String,
}

impl RetryingFetcher {
    pub fn new(source: Arc<dyn MarketDataSource + Send + Sync>, config: &Config) -> Self {
        Self {
            source,
            attempts: config.retry_attempts.max(1),
            delay: config.retry_delay,
            jitter_max: config.jitter_max,
            minute_period: config.minute_period.clone(),
            daily_period: config.daily_period.clone(),
        }
    }

    pub async fn fetch_minute(&self, symbol: &str, interval: Interval) -> Result<TimeSeries> {
        if interval == Interval::Minute1 {
            self.jitter().await;
        }
        let request = SeriesRequest::minute(symbol, &self.minute_period, interval);
        self.fetch_with_retry(&request).await
    }

    pub async fn fetch_daily(&self, symbol: &str) -> Result<TimeSeries> {
        let request = SeriesRequest::daily(symbol, &self.daily_period);
        self.fetch_with_retry(&request).await
    }

    // 随机错开首次请求，避免同时打到数据源
    async fn jitter(&self) {
        if self.jitter_max.is_zero() {
            return;
        }
        let wait = rand::thread_rng().gen_range(Duration::ZERO..self.jitter_max);
        debug!("Jitter {:?} before first minute download", wait);
        tokio::time::sleep(wait).await;
    }

    async fn fetch_with_retry(&self, request: &SeriesRequest) -> Result<TimeSeries> {
        let attempt = AtomicUsize::new(0);
        let counter = &attempt;
        let source = &self.source;

        // 首次尝试之外最多再重试 attempts - 1 次
        let strategy = FixedInterval::new(self.delay).take(self.attempts - 1);
        let outcome = RetryIf::spawn(
            strategy,
            move || async move {
                counter.fetch_add(1, Ordering::Relaxed);
                source.fetch_frame(request).await.and_then(normalize_frame)
            },
            |e: &MonitorError| {
                if !e.is_transient() {
                    return false;
                }
                warn!(
                    "{} ({}) attempt {}/{} failed: {}",
                    request.symbol,
                    request.interval,
                    attempt.load(Ordering::Relaxed),
                    self.attempts,
                    e
                );
                true
            },
        )
        .await;

        match outcome {
            Ok(series) => {
                if series.is_empty() {
                    debug!(
                        "{} ({}) returned no rows from {}",
                        request.symbol,
                        request.interval,
                        self.source.source_name()
                    );
                }
                Ok(series)
            }
            Err(e) if e.is_transient() => Err(MonitorError::RetriesExhausted {
                symbol: request.symbol.clone(),
                interval: request.interval.to_string(),
                attempts: attempt.load(Ordering::Relaxed),
                last: e.to_string(),
            }),
            Err(e) => Err(e),
        }
    }
}
