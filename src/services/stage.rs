use chrono::{DateTime, FixedOffset, Offset, Timelike, Utc};
use log::debug;

use crate::models::report::{ReportRow, SessionPrices};
use crate::util::round_to;

/// 参考时钟固定为 UTC+8
pub const REFERENCE_OFFSET_SECS: i32 = 8 * 3600;

pub const LABEL_CLOSE: &str = "Close";
pub const LABEL_PRE: &str = "Pre-Market";
pub const LABEL_POST: &str = "Post-Market";

/// 与收盘价对比的时段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// UTC+8 04:00-08:00，对应美东盘后
    PostMarket,
    /// UTC+8 16:00-21:30，对应美东盘前
    PreMarket,
    /// 其余时段沿用盘后对比，可能只是占位行为
    DefaultPostMarket,
}

impl Stage {
    pub fn for_hour(hour: f64) -> Stage {
        if (4.0..8.0).contains(&hour) {
            Stage::PostMarket
        } else if (16.0..21.5).contains(&hour) {
            Stage::PreMarket
        } else {
            Stage::DefaultPostMarket
        }
    }

    pub fn labels(&self) -> (&'static str, &'static str) {
        match self {
            Stage::PreMarket => (LABEL_CLOSE, LABEL_PRE),
            Stage::PostMarket | Stage::DefaultPostMarket => (LABEL_CLOSE, LABEL_POST),
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Stage::PostMarket => "Close vs Post-Market (UTC+8 04:00-08:00)",
            Stage::PreMarket => "Close vs Pre-Market (UTC+8 16:00-21:30)",
            Stage::DefaultPostMarket => "Close vs Post-Market",
        }
    }

    /// 返回 (A, B)
    pub fn pair(&self, session: &SessionPrices) -> (Option<f64>, Option<f64>) {
        match self {
            Stage::PreMarket => (session.regular_close, session.pre_market),
            Stage::PostMarket | Stage::DefaultPostMarket => (session.regular_close, session.post_market),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StageReport {
    pub rows: Vec<ReportRow>,
    pub stage: Stage,
    pub label_a: &'static str,
    pub label_b: &'static str,
    pub title: &'static str,
    pub reference_time: DateTime<FixedOffset>,
}

/// (B - A) / A * 100，保留两位；任一侧缺失或 A 为 0 时为 None
pub fn percent_delta(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) if a != 0.0 => round_to((b - a) / a * 100.0, 2),
        _ => None,
    }
}

pub fn reference_hour(reference: &DateTime<FixedOffset>) -> f64 {
    reference.hour() as f64 + reference.minute() as f64 / 60.0
}

pub fn classify(mut rows: Vec<ReportRow>, reference: DateTime<Utc>) -> StageReport {
    let offset = FixedOffset::east_opt(REFERENCE_OFFSET_SECS).unwrap_or_else(|| Utc.fix());
    let reference_time = reference.with_timezone(&offset);
    let stage = Stage::for_hour(reference_hour(&reference_time));
    if stage == Stage::DefaultPostMarket {
        debug!(
            "{} is outside both comparison windows, defaulting to post-market",
            reference_time.format("%H:%M")
        );
    }

    for row in rows.iter_mut() {
        let (a, b) = stage.pair(&row.session);
        row.delta = percent_delta(a, b);
    }

    let (label_a, label_b) = stage.labels();
    StageReport {
        rows,
        stage,
        label_a,
        label_b,
        title: stage.title(),
        reference_time,
    }
}
