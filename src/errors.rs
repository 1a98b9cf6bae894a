use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Arrow error: {0}")]
    ArrowError(String),

    #[error("Source error: {0}")]
    SourceError(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("{symbol} ({interval}) failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        symbol: String,
        interval: String,
        attempts: usize,
        last: String,
    },

    #[error("Task error: {0}")]
    TaskError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl MonitorError {
    /// 网络/解析类错误可重试，其余视为确定性失败
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            MonitorError::RequestError(_) | MonitorError::JsonError(_) | MonitorError::SourceError(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;

impl From<arrow_schema::ArrowError> for MonitorError {
    fn from(e: arrow_schema::ArrowError) -> Self {
        MonitorError::ArrowError(e.to_string())
    }
}

// 用于从字符串创建错误
impl From<String> for MonitorError {
    fn from(s: String) -> Self {
        MonitorError::Unknown(s)
    }
}

// 用于从&str创建错误
impl From<&str> for MonitorError {
    fn from(s: &str) -> Self {
        MonitorError::Unknown(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(MonitorError::SourceError("HTTP 503".into()).is_transient());
        assert!(!MonitorError::DataError("no close".into()).is_transient());
        assert!(!MonitorError::RetriesExhausted {
            symbol: "NVDA".into(),
            interval: "1m".into(),
            attempts: 3,
            last: "timeout".into(),
        }
        .is_transient());
    }
}
