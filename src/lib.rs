// 公开导出的模块，供外部使用
pub mod cache;
pub mod config;
pub mod errors;
pub mod models;
pub mod scrapers;
pub mod services;
pub mod util;

#[cfg(test)]
pub(crate) mod testing;

// 重新导出常用类型，方便使用
pub use cache::{CacheLookup, TimeSeriesCache};
pub use config::Config;
pub use errors::{MonitorError, Result};
pub use models::report::{DailySnapshot, GatherReport, GatherStatus, ReportRow, SessionPrices};
pub use models::series::{Interval, MinuteSeries, TimeSeries};
pub use services::aggregator::ConcurrentAggregator;
pub use services::stage::{classify, Stage, StageReport};
