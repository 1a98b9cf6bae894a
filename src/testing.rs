//! Scripted data source and frame builders shared by unit tests.

use crate::config::Config;
use crate::errors::{MonitorError, Result};
use crate::models::series::{Interval, RawFrame, RowKey, Stamp, CLOSE, HIGH, LOW, VOLUME};
use crate::scrapers::base::{MarketDataSource, SeriesRequest};
use async_trait::async_trait;
use chrono::{FixedOffset, TimeZone};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

type Key = (String, Interval);

fn key(symbol: &str, interval: Interval) -> Key {
    (symbol.to_string(), interval)
}

#[derive(Default)]
pub(crate) struct ScriptedSource {
    frames: Mutex<HashMap<Key, RawFrame>>,
    failures: Mutex<HashMap<Key, usize>>,
    calls: Mutex<HashMap<Key, usize>>,
    panics: Mutex<HashSet<String>>,
}

impl ScriptedSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set(&self, symbol: &str, interval: Interval, frame: RawFrame) {
        self.frames.lock().unwrap().insert(key(symbol, interval), frame);
    }

    /// 前 `times` 次调用返回可重试错误
    pub(crate) fn fail_times(&self, symbol: &str, interval: Interval, times: usize) {
        self.failures.lock().unwrap().insert(key(symbol, interval), times);
    }

    pub(crate) fn panic_on(&self, symbol: &str) {
        self.panics.lock().unwrap().insert(symbol.to_string());
    }

    pub(crate) fn calls(&self, symbol: &str, interval: Interval) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(&key(symbol, interval))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl MarketDataSource for ScriptedSource {
    fn source_name(&self) -> &'static str {
        "scripted"
    }

    async fn fetch_frame(&self, request: &SeriesRequest) -> Result<RawFrame> {
        let k = key(&request.symbol, request.interval);
        *self.calls.lock().unwrap().entry(k.clone()).or_insert(0) += 1;

        if self.panics.lock().unwrap().contains(&request.symbol) {
            panic!("scripted panic for {}", request.symbol);
        }

        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(left) = failures.get_mut(&k) {
                if *left > 0 {
                    *left -= 1;
                    return Err(MonitorError::SourceError(format!("{} unavailable", request.symbol)));
                }
            }
        }

        Ok(self.frames.lock().unwrap().get(&k).cloned().unwrap_or_default())
    }
}

pub(crate) fn test_config(cache_dir: &Path) -> Config {
    Config::new()
        .with_cache_dir(cache_dir)
        .with_retry(3, Duration::ZERO)
        .with_jitter_max(Duration::ZERO)
}

/// 以美东夏令时 (UTC-4) 墙钟时间构建的分钟线，只含 Close/Volume
pub(crate) fn minute_frame(bars: &[(u32, u32, f64)]) -> RawFrame {
    let edt = FixedOffset::west_opt(4 * 3600).unwrap();
    let mut frame = RawFrame {
        columns: vec![vec![CLOSE.to_string()], vec![VOLUME.to_string()]],
        data: vec![Vec::new(), Vec::new()],
        ..Default::default()
    };
    for &(h, m, close) in bars {
        let stamp = edt.with_ymd_and_hms(2025, 8, 1, h, m, 0).unwrap();
        frame.index.push(RowKey::flat(Stamp::Aware(stamp)));
        frame.data[0].push(Some(close));
        frame.data[1].push(Some(1000.0));
    }
    frame
}

/// 日线：每行 (high, low, close)，日期从 2025-06-02 起逐日递增
pub(crate) fn daily_frame(bars: &[(f64, f64, f64)]) -> RawFrame {
    let mut frame = RawFrame {
        columns: vec![vec![HIGH.to_string()], vec![LOW.to_string()], vec![CLOSE.to_string()]],
        data: vec![Vec::new(), Vec::new(), Vec::new()],
        ..Default::default()
    };
    let start = chrono::NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
    for (i, &(high, low, close)) in bars.iter().enumerate() {
        let day = start + chrono::Duration::days(i as i64);
        let stamp = day.and_hms_opt(4, 0, 0).unwrap();
        frame.index.push(RowKey::flat(Stamp::Naive(stamp)));
        frame.data[0].push(Some(high));
        frame.data[1].push(Some(low));
        frame.data[2].push(Some(close));
    }
    frame
}
