use crate::errors::{MonitorError, Result};
use crate::models::series::{RawFrame, RowKey, Stamp, ADJ_CLOSE, CLOSE, HIGH, LOW, OPEN, VOLUME};
use crate::scrapers::base::{MarketDataSource, SeriesRequest};
use async_trait::async_trait;
use chrono::DateTime;
use log::{debug, info};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Yahoo Finance v8 chart 接口
pub struct YahooChartSource {
    client: Client,
    base_url: String,
}

impl YahooChartSource {
    pub fn new() -> Result<Self> {
        Self::with_base_url(CHART_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Deserialize, Debug)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Deserialize, Debug)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Deserialize, Debug)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    // 无数据时 Yahoo 会省略 timestamp
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Deserialize, Debug)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
    adjclose: Option<Vec<AdjClose>>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct Quote {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

#[derive(Deserialize, Debug)]
struct AdjClose {
    adjclose: Vec<Option<f64>>,
}

/// 解析 chart 接口响应为原始表格。
///
/// `Not Found` 视为空结果，其他接口错误视为可重试的数据源错误。
pub fn parse_chart(symbol: &str, body: &str) -> Result<RawFrame> {
    let response: ChartResponse = serde_json::from_str(body)?;

    if let Some(err) = response.chart.error {
        if err.code.eq_ignore_ascii_case("Not Found") {
            debug!("{}: {}", symbol, err.description);
            return Ok(RawFrame::default());
        }
        return Err(MonitorError::SourceError(format!(
            "{}: {} ({})",
            symbol, err.description, err.code
        )));
    }

    let Some(result) = response.chart.result.and_then(|mut r| r.pop()) else {
        return Ok(RawFrame::default());
    };
    let timestamps = result.timestamp.unwrap_or_default();
    let Some(quote) = result.indicators.quote.into_iter().next() else {
        return Ok(RawFrame::default());
    };

    let mut frame = RawFrame::default();
    for ts in &timestamps {
        let instant = DateTime::from_timestamp(*ts, 0)
            .ok_or_else(|| MonitorError::DataError(format!("{}: bad timestamp {}", symbol, ts)))?;
        frame.index.push(RowKey::flat(Stamp::Aware(instant.fixed_offset())));
    }

    let rows = timestamps.len();
    // 各列长度对齐到索引长度，缺失补 None
    let mut push = |name: &str, mut values: Vec<Option<f64>>| {
        values.resize(rows, None);
        frame.columns.push(vec![name.to_string(), symbol.to_string()]);
        frame.data.push(values);
    };
    push(OPEN, quote.open);
    push(HIGH, quote.high);
    push(LOW, quote.low);
    push(CLOSE, quote.close);
    if let Some(adj) = result.indicators.adjclose.and_then(|a| a.into_iter().next()) {
        push(ADJ_CLOSE, adj.adjclose);
    }
    push(VOLUME, quote.volume);

    Ok(frame)
}

/// 按 Adj Close / Close 比例复权 OHLC，并去掉 Adj Close 列；没有 Adj Close 时原样返回
pub fn adjust_prices(mut frame: RawFrame) -> RawFrame {
    let label = |levels: &Vec<String>| levels.first().cloned().unwrap_or_default();
    let find = |frame: &RawFrame, name: &str| frame.columns.iter().position(|c| label(c) == name);

    let (Some(adj_pos), Some(close_pos)) = (find(&frame, ADJ_CLOSE), find(&frame, CLOSE)) else {
        return frame;
    };

    let ratios: Vec<Option<f64>> = frame.data[adj_pos]
        .iter()
        .zip(&frame.data[close_pos])
        .map(|(adj, close)| match (adj, close) {
            (Some(adj), Some(close)) if *close != 0.0 => Some(adj / close),
            _ => None,
        })
        .collect();

    for (levels, values) in frame.columns.iter().zip(frame.data.iter_mut()) {
        if ![OPEN, HIGH, LOW, CLOSE].contains(&label(levels).as_str()) {
            continue;
        }
        for (value, ratio) in values.iter_mut().zip(&ratios) {
            *value = match (*value, ratio) {
                (Some(v), Some(r)) => Some(v * r),
                _ => None,
            };
        }
    }

    frame.columns.remove(adj_pos);
    frame.data.remove(adj_pos);
    frame
}

#[async_trait]
impl MarketDataSource for YahooChartSource {
    fn source_name(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch_frame(&self, request: &SeriesRequest) -> Result<RawFrame> {
        debug!(
            "Requesting {} {} over {}",
            request.symbol, request.interval, request.period
        );

        let response = self
            .client
            .get(format!("{}/{}", self.base_url, request.symbol))
            .query(&[
                ("range", request.period.as_str()),
                ("interval", request.interval.as_str()),
                ("includePrePost", if request.include_prepost { "true" } else { "false" }),
                ("events", "div,splits"),
            ])
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        match parse_chart(&request.symbol, &text) {
            Ok(frame) if status.is_success() || frame.is_empty() => {
                info!(
                    "{}: {} rows of {} data",
                    request.symbol,
                    frame.index.len(),
                    request.interval
                );
                Ok(if request.auto_adjust { adjust_prices(frame) } else { frame })
            }
            Ok(_) | Err(_) if !status.is_success() => Err(MonitorError::SourceError(format!(
                "{}: HTTP status {}",
                request.symbol, status
            ))),
            other => other,
        }
    }
}
