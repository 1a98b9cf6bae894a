use std::path::PathBuf;
use std::time::Duration;

/// 默认监控标的
pub const DEFAULT_SYMBOLS: &[&str] = &[
    "NVDA", "SOFI", "OSCR", "GRAB", "NBIS", "FIG",
    "CLS", "CRDO", "FI", "JCAP", "LULU", "PLTR",
    "PYPL", "SOUN", "UNH", "QQQ", "VOO",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub symbols: Vec<String>,
    pub max_workers: usize,    // 并发数保持较小，减少限流
    pub cache_dir: PathBuf,
    pub cache_ttl: Duration,
    pub retry_attempts: usize,
    pub retry_delay: Duration,
    pub jitter_max: Duration,
    pub minute_period: String,
    pub daily_period: String,
}

impl Config {
    pub fn new() -> Self {
        Self {
            symbols: DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            max_workers: 2,
            cache_dir: PathBuf::from("cache_arrow"),
            cache_ttl: Duration::from_secs(180),
            retry_attempts: 3,
            retry_delay: Duration::from_secs(2),
            jitter_max: Duration::from_millis(1200),
            minute_period: "1d".to_string(),
            daily_period: "60d".to_string(),
        }
    }

    pub fn with_symbols<S: AsRef<str>>(mut self, symbols: &[S]) -> Self {
        self.symbols = symbols.iter().map(|s| s.as_ref().to_string()).collect();
        self
    }

    pub fn with_max_workers(mut self, workers: usize) -> Self {
        // 至少一个 worker，否则任务永远拿不到许可
        self.max_workers = workers.max(1);
        self
    }

    pub fn with_cache_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.cache_dir = dir.into();
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_retry(mut self, attempts: usize, delay: Duration) -> Self {
        self.retry_attempts = attempts.max(1);
        self.retry_delay = delay;
        self
    }

    pub fn with_jitter_max(mut self, jitter: Duration) -> Self {
        self.jitter_max = jitter;
        self
    }

    pub fn with_daily_period(mut self, period: &str) -> Self {
        self.daily_period = period.to_string();
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
