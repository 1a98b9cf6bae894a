use chrono::{DateTime, FixedOffset, NaiveDateTime};
use chrono_tz::Tz;
use std::fmt;

pub const OPEN: &str = "Open";
pub const HIGH: &str = "High";
pub const LOW: &str = "Low";
pub const CLOSE: &str = "Close";
pub const ADJ_CLOSE: &str = "Adj Close";
pub const VOLUME: &str = "Volume";

/// K线周期
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    Minute1,
    Minute5,
    Day1,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Minute1 => "1m",
            Interval::Minute5 => "5m",
            Interval::Day1 => "1d",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 原始时间戳：可能不带时区，也可能带任意偏移
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stamp {
    Naive(NaiveDateTime),
    Aware(DateTime<FixedOffset>),
}

/// 原始行索引，多层索引时 `labels` 为外层，`stamp` 为最内层
#[derive(Debug, Clone, PartialEq)]
pub struct RowKey {
    pub labels: Vec<String>,
    pub stamp: Stamp,
}

impl RowKey {
    pub fn flat(stamp: Stamp) -> Self {
        Self { labels: Vec::new(), stamp }
    }
}

/// 数据源或缓存文件返回的未规整表格。
///
/// `columns[i]` 是第 i 列的多层列名（外层在前），`data[i]` 是该列的值，
/// 长度与 `index` 相同。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawFrame {
    pub index: Vec<RowKey>,
    pub columns: Vec<Vec<String>>,
    pub data: Vec<Vec<Option<f64>>>,
}

impl RawFrame {
    pub fn is_empty(&self) -> bool {
        self.index.is_empty() || self.columns.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// 规整后的时间序列：美东时区、按时间非递减、列名唯一
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimeSeries {
    index: Vec<DateTime<Tz>>,
    columns: Vec<Column>,
}

pub type MinuteSeries = TimeSeries;
pub type DailySeries = TimeSeries;

impl TimeSeries {
    /// 只能由规整流程构建，保证不变量成立
    pub(crate) fn from_parts(index: Vec<DateTime<Tz>>, columns: Vec<Column>) -> Self {
        Self { index, columns }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty() || self.columns.is_empty()
    }

    pub fn index(&self) -> &[DateTime<Tz>] {
        &self.index
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn close(&self) -> Option<&[Option<f64>]> {
        self.column(CLOSE)
    }
}
