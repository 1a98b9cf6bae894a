use std::cmp::Ordering;
use std::collections::BTreeSet;

/// 三个时段的最后价格
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SessionPrices {
    pub regular_close: Option<f64>,
    pub pre_market: Option<f64>,
    pub post_market: Option<f64>,
}

/// 日线技术指标快照，每个字段独立可空
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DailySnapshot {
    pub prior_close: Option<f64>,
    pub percent_change: Option<f64>,
    pub rsi14: Option<f64>,
    pub atr: Option<f64>,
    pub ma5: Option<f64>,
    pub ma20: Option<f64>,
    pub ma60: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub symbol: String,
    pub session: SessionPrices,
    pub daily: DailySnapshot,
    /// 由时段判断填充，之前为 None
    pub delta: Option<f64>,
}

impl ReportRow {
    pub fn new(symbol: &str, session: SessionPrices, daily: DailySnapshot) -> Self {
        Self {
            symbol: symbol.to_string(),
            session,
            daily,
            delta: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatherStatus {
    NoSymbols,
    Complete,
    Partial,
    TotalOutage,
}

/// 一次批量抓取的结果，`rows` 与 `failed` 的标的互不相交
#[derive(Debug, Clone, Default)]
pub struct GatherReport {
    pub rows: Vec<ReportRow>,
    pub failed: BTreeSet<String>,
}

impl GatherReport {
    pub fn status(&self) -> GatherStatus {
        match (self.rows.is_empty(), self.failed.is_empty()) {
            (true, true) => GatherStatus::NoSymbols,
            (true, false) => GatherStatus::TotalOutage,
            (false, true) => GatherStatus::Complete,
            (false, false) => GatherStatus::Partial,
        }
    }
}

/// 按 RSI 升序排列，缺失值排在最后
pub fn sort_by_rsi(rows: &mut [ReportRow]) {
    rows.sort_by(|a, b| match (a.daily.rsi14, b.daily.rsi14) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.symbol.cmp(&b.symbol),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(symbol: &str, rsi: Option<f64>) -> ReportRow {
        let daily = DailySnapshot {
            rsi14: rsi,
            ..Default::default()
        };
        ReportRow::new(symbol, SessionPrices::default(), daily)
    }

    #[test]
    fn test_sort_by_rsi_puts_missing_last() {
        let mut rows = vec![row("A", None), row("B", Some(70.0)), row("C", Some(30.5))];
        sort_by_rsi(&mut rows);
        let order: Vec<&str> = rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(order, vec!["C", "B", "A"]);
    }

    #[test]
    fn test_status_distinguishes_outage_from_partial() {
        let mut report = GatherReport::default();
        assert_eq!(report.status(), GatherStatus::NoSymbols);

        report.failed.insert("C".into());
        assert_eq!(report.status(), GatherStatus::TotalOutage);

        report.rows.push(row("A", Some(40.0)));
        assert_eq!(report.status(), GatherStatus::Partial);

        report.failed.clear();
        assert_eq!(report.status(), GatherStatus::Complete);
    }
}
