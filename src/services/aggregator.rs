use crate::cache::TimeSeriesCache;
use crate::config::Config;
use crate::errors::{MonitorError, Result};
use crate::models::report::{GatherReport, ReportRow};
use crate::scrapers::base::MarketDataSource;
use crate::services::fallback::FallbackChain;
use crate::services::fetcher::RetryingFetcher;
use crate::services::indicators::DailyIndicatorEngine;
use crate::services::session::split_prices;
use log::{info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};

/// 并发抓取所有标的，单个标的失败只记录在 `failed` 中，不影响其他标的
#[derive(Clone)]
pub struct ConcurrentAggregator {
    chain: FallbackChain,
    engine: DailyIndicatorEngine,
    max_workers: usize,
}

impl ConcurrentAggregator {
    pub fn new(config: &Config, source: Arc<dyn MarketDataSource + Send + Sync>) -> Self {
        let fetcher = RetryingFetcher::new(source, config);
        let cache = TimeSeriesCache::new(&config.cache_dir, config.cache_ttl);
        Self {
            chain: FallbackChain::new(cache, fetcher.clone()),
            engine: DailyIndicatorEngine::new(fetcher),
            max_workers: config.max_workers.max(1),
        }
    }

    pub async fn gather_all<S: AsRef<str>>(&self, symbols: &[S]) -> GatherReport {
        let permits = Arc::new(Semaphore::new(self.max_workers));
        let mut units = JoinSet::new();
        // 任务 id -> 标的，panic 时也能找回标的名
        let mut pending: HashMap<Id, String> = HashMap::new();
        let mut dispatched = HashSet::new();

        for symbol in symbols.iter().map(|s| s.as_ref().to_string()) {
            if !dispatched.insert(symbol.clone()) {
                continue;
            }
            let permits = permits.clone();
            let this = self.clone();
            let name = symbol.clone();
            let handle = units.spawn(async move {
                match permits.acquire_owned().await {
                    Ok(_permit) => this.process_symbol(&name).await,
                    Err(e) => Err(MonitorError::TaskError(e.to_string())),
                }
            });
            pending.insert(handle.id(), symbol);
        }

        let mut report = GatherReport::default();
        while let Some(joined) = units.join_next_with_id().await {
            let (id, outcome) = match joined {
                Ok((id, outcome)) => (id, outcome),
                Err(e) => (e.id(), Err(MonitorError::TaskError(e.to_string()))),
            };
            let symbol = match pending.remove(&id) {
                Some(symbol) => symbol,
                None => {
                    warn!("Finished task {} has no symbol", id);
                    continue;
                }
            };
            match outcome {
                Ok(row) => report.rows.push(row),
                Err(e) => {
                    warn!("{} failed: {}", symbol, e);
                    report.failed.insert(symbol);
                }
            }
        }

        info!(
            "Gathered {} rows, {} failed: {:?}",
            report.rows.len(),
            report.failed.len(),
            report.failed
        );
        report
    }

    async fn process_symbol(&self, symbol: &str) -> Result<ReportRow> {
        let (series, origin) = self
            .chain
            .resolve(symbol)
            .await
            .ok_or_else(|| MonitorError::DataError(format!("no minute data for {}", symbol)))?;
        info!("{}: {} minute rows from {}", symbol, series.len(), origin);

        let session = split_prices(&series);
        let daily = self.engine.compute_indicators(symbol).await?;
        Ok(ReportRow::new(symbol, session, daily))
    }
}
