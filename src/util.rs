use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::America::New_York;
use chrono_tz::Tz;
use log::debug;
use std::collections::HashSet;

use crate::errors::{MonitorError, Result};
use crate::models::series::{Column, RawFrame, Stamp, TimeSeries};

/// 交易时段所用的标准时区
pub const MARKET_TZ: Tz = New_York;

// 时间戳统一：无时区视为 UTC，有时区先转 UTC，最后都转美东
pub fn to_market_time(stamp: &Stamp) -> DateTime<Tz> {
    let utc = match stamp {
        Stamp::Naive(naive) => Utc.from_utc_datetime(naive),
        Stamp::Aware(aware) => aware.with_timezone(&Utc),
    };
    utc.with_timezone(&MARKET_TZ)
}

/// 将原始表格规整为 `TimeSeries`。
///
/// 缓存读取和在线抓取走同一条路径：
/// 1. 多层行索引只保留最内层（时间戳）
/// 2. 多层列名只保留最外层
/// 3. 重名列保留第一列
/// 4. 时间戳统一转换到美东时区
/// 5. 按时间稳定排序
pub fn normalize_frame(raw: RawFrame) -> Result<TimeSeries> {
    if raw.columns.len() != raw.data.len() {
        return Err(MonitorError::DataError(format!(
            "{} column labels but {} data columns",
            raw.columns.len(),
            raw.data.len()
        )));
    }
    let rows = raw.index.len();
    if let Some(bad) = raw.data.iter().position(|col| col.len() != rows) {
        return Err(MonitorError::DataError(format!(
            "column {} has {} values, index has {}",
            bad,
            raw.data[bad].len(),
            rows
        )));
    }

    let stamps: Vec<DateTime<Tz>> = raw.index.iter().map(|key| to_market_time(&key.stamp)).collect();

    let mut order: Vec<usize> = (0..rows).collect();
    order.sort_by_key(|&i| stamps[i]);
    let index: Vec<DateTime<Tz>> = order.iter().map(|&i| stamps[i]).collect();

    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    for (levels, values) in raw.columns.into_iter().zip(raw.data) {
        let name = levels.into_iter().next().unwrap_or_default();
        if !seen.insert(name.clone()) {
            debug!("Dropping duplicate column {}", name);
            continue;
        }
        columns.push(Column {
            name,
            values: order.iter().map(|&i| values[i]).collect(),
        });
    }

    Ok(TimeSeries::from_parts(index, columns))
}

/// 四舍六入五成双，与 numpy 的 round 行为一致；非有限值返回 None
pub fn round_to(value: f64, decimals: i32) -> Option<f64> {
    if !value.is_finite() {
        return None;
    }
    let factor = 10f64.powi(decimals);
    let rounded = (value * factor).round_ties_even() / factor;
    rounded.is_finite().then_some(rounded)
}

// Arrow数据转换工具
pub mod arrow_utils {
    use super::*;
    use arrow::compute::cast;
    use arrow::record_batch::RecordBatch;
    use arrow_array::{Array, ArrayRef, Float64Array, TimestampMillisecondArray};
    use arrow_ipc::reader::FileReader;
    use arrow_ipc::writer::FileWriter;
    use arrow_schema::{DataType, Field, Schema, TimeUnit};
    use crate::models::series::RowKey;
    use std::fs::File;
    use std::path::Path;
    use std::sync::Arc;

    pub const TIME_FIELD: &str = "Datetime";

    // 将时间序列转换为Arrow记录批次，时间戳以 UTC 毫秒存储
    pub fn series_to_record_batch(series: &TimeSeries) -> Result<RecordBatch> {
        let millis: Vec<i64> = series.index().iter().map(|t| t.timestamp_millis()).collect();
        let time_array = TimestampMillisecondArray::from(millis).with_timezone("UTC");

        let mut fields = vec![Field::new(
            TIME_FIELD,
            DataType::Timestamp(TimeUnit::Millisecond, Some("UTC".into())),
            false,
        )];
        let mut arrays: Vec<ArrayRef> = vec![Arc::new(time_array)];

        for column in series.columns() {
            fields.push(Field::new(&column.name, DataType::Float64, true));
            arrays.push(Arc::new(Float64Array::from(column.values.clone())));
        }

        RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
            .map_err(|e| MonitorError::ArrowError(e.to_string()))
    }

    // 将时间序列保存到Arrow文件
    pub fn save_series_to_arrow(series: &TimeSeries, path: &Path) -> Result<()> {
        let batch = series_to_record_batch(series)?;
        let file = File::create(path)?;

        let mut writer = FileWriter::try_new(file, &batch.schema())?;
        writer.write(&batch)?;
        writer.finish()?;

        Ok(())
    }

    /// 从Arrow文件读取原始表格，交由 `normalize_frame` 规整。
    ///
    /// 第一列必须是时间戳；带时区元数据的视为带时区时间，否则视为无时区时间。
    pub fn read_frame_from_arrow(path: &Path) -> Result<RawFrame> {
        let file = File::open(path)?;
        let reader = FileReader::try_new(file, None)?;

        let mut frame = RawFrame::default();
        let mut initialized = false;

        for batch in reader {
            let batch = batch?;
            let schema = batch.schema();
            if batch.num_columns() == 0 {
                return Err(MonitorError::ArrowError("Empty schema".to_string()));
            }

            let tz = match schema.field(0).data_type() {
                DataType::Timestamp(_, tz) => tz.clone(),
                other => {
                    return Err(MonitorError::ArrowError(format!(
                        "First column must be a timestamp, got {}",
                        other
                    )))
                }
            };
            let time_column = cast(
                batch.column(0),
                &DataType::Timestamp(TimeUnit::Millisecond, tz.clone()),
            )?;
            let time_array = time_column
                .as_any()
                .downcast_ref::<TimestampMillisecondArray>()
                .ok_or_else(|| MonitorError::ArrowError("Failed to downcast time column".to_string()))?;

            for i in 0..time_array.len() {
                if time_array.is_null(i) {
                    return Err(MonitorError::ArrowError(format!("Null timestamp at row {}", i)));
                }
                let instant = DateTime::from_timestamp_millis(time_array.value(i)).ok_or_else(|| {
                    MonitorError::ArrowError(format!("Timestamp out of range at row {}", i))
                })?;
                let stamp = if tz.is_some() {
                    Stamp::Aware(instant.fixed_offset())
                } else {
                    Stamp::Naive(instant.naive_utc())
                };
                frame.index.push(RowKey::flat(stamp));
            }

            for (pos, field) in schema.fields().iter().enumerate().skip(1) {
                let values = cast(batch.column(pos), &DataType::Float64)?;
                let values = values
                    .as_any()
                    .downcast_ref::<Float64Array>()
                    .ok_or_else(|| {
                        MonitorError::ArrowError(format!("Failed to downcast column {}", field.name()))
                    })?;

                if !initialized {
                    frame.columns.push(vec![field.name().clone()]);
                    frame.data.push(Vec::new());
                }
                let slot = frame.data.get_mut(pos - 1).ok_or_else(|| {
                    MonitorError::ArrowError("Batches disagree on column count".to_string())
                })?;
                slot.extend(values.iter());
            }
            initialized = true;
        }

        Ok(frame)
    }
}
