use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::errors::Result;
use crate::models::series::TimeSeries;
use crate::util::{arrow_utils, normalize_frame};

/// 缓存读取结果，只有 `Hit` 可直接使用
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Hit(TimeSeries),
    Miss,
    Stale(Duration),
    Corrupt(String),
}

impl CacheLookup {
    pub fn into_series(self) -> Option<TimeSeries> {
        match self {
            CacheLookup::Hit(series) => Some(series),
            _ => None,
        }
    }
}

// 标的名转文件名：路径分隔符等字符按 %XX 转义，文件始终落在缓存目录内
fn file_stem(symbol: &str) -> String {
    let mut stem = String::with_capacity(symbol.len());
    for byte in symbol.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'-' | b'_' | b'^' | b'=' => {
                stem.push(byte as char)
            }
            _ => stem.push_str(&format!("%{:02X}", byte)),
        }
    }
    stem
}

/// 磁盘分钟线缓存，每个标的一个 Arrow 文件，按文件修改时间判断是否过期
#[derive(Debug, Clone)]
pub struct TimeSeriesCache {
    dir: PathBuf,
    ttl: Duration,
}

impl TimeSeriesCache {
    pub fn new<P: Into<PathBuf>>(dir: P, ttl: Duration) -> Self {
        let dir = dir.into();
        if let Err(e) = fs::create_dir_all(&dir) {
            warn!("Cannot create cache dir {}: {}", dir.display(), e);
        }
        Self { dir, ttl }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{}.arrow", file_stem(symbol)))
    }

    pub fn get(&self, symbol: &str) -> CacheLookup {
        let path = self.path_for(symbol);
        let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(_) => return CacheLookup::Miss,
        };

        // 修改时间在未来时按刚写入处理
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or_default();
        if age >= self.ttl {
            debug!("Cache for {} is stale ({:?} old)", symbol, age);
            return CacheLookup::Stale(age);
        }

        match arrow_utils::read_frame_from_arrow(&path).and_then(normalize_frame) {
            Ok(series) => {
                debug!("Cache hit for {} ({} rows)", symbol, series.len());
                CacheLookup::Hit(series)
            }
            Err(e) => {
                warn!("Ignoring unreadable cache file {}: {}", path.display(), e);
                CacheLookup::Corrupt(e.to_string())
            }
        }
    }

    /// 尽力写入：失败只记录日志，不影响调用方
    pub fn put(&self, symbol: &str, series: &TimeSeries) {
        match self.store(symbol, series) {
            Ok(()) => info!("Cached {} rows for {}", series.len(), symbol),
            Err(e) => warn!("Failed to cache {}: {}", symbol, e),
        }
    }

    // 先写临时文件再改名，读者不会看到写了一半的文件
    fn store(&self, symbol: &str, series: &TimeSeries) -> Result<()> {
        let path = self.path_for(symbol);
        let tmp = self.dir.join(format!(".{}.arrow.tmp", file_stem(symbol)));
        if let Err(e) = arrow_utils::save_series_to_arrow(series, &tmp) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::minute_frame;

    fn series() -> TimeSeries {
        normalize_frame(minute_frame(&[(9, 30, 100.0), (16, 0, 101.0)])).unwrap()
    }

    #[test]
    fn test_missing_file_is_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TimeSeriesCache::new(dir.path(), Duration::from_secs(180));
        assert_eq!(cache.get("NVDA"), CacheLookup::Miss);
    }

    #[test]
    fn test_put_then_get_is_hit() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TimeSeriesCache::new(dir.path(), Duration::from_secs(180));
        cache.put("NVDA", &series());
        assert_eq!(cache.get("NVDA"), CacheLookup::Hit(series()));
        assert!(!dir.path().join(".NVDA.arrow.tmp").exists());
    }

    #[test]
    fn test_entry_older_than_ttl_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TimeSeriesCache::new(dir.path(), Duration::ZERO);
        cache.put("NVDA", &series());
        assert!(matches!(cache.get("NVDA"), CacheLookup::Stale(_)));
    }

    #[test]
    fn test_garbage_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TimeSeriesCache::new(dir.path(), Duration::from_secs(180));
        fs::write(cache.path_for("NVDA"), b"not an arrow file").unwrap();
        assert!(matches!(cache.get("NVDA"), CacheLookup::Corrupt(_)));
        assert_eq!(cache.get("NVDA").into_series(), None);
    }

    #[test]
    fn test_put_into_unwritable_dir_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"file, not a directory").unwrap();
        let cache = TimeSeriesCache::new(blocker.join("cache"), Duration::from_secs(180));
        cache.put("NVDA", &series());
        assert_eq!(cache.get("NVDA"), CacheLookup::Miss);
    }

    #[test]
    fn test_symbols_with_separators_stay_inside_cache_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TimeSeriesCache::new(dir.path(), Duration::from_secs(180));

        assert_eq!(cache.path_for("BRK/B"), dir.path().join("BRK%2FB.arrow"));
        assert_eq!(cache.path_for("../x").parent(), Some(dir.path()));
        assert_eq!(cache.path_for("BRK.B"), dir.path().join("BRK.B.arrow"));

        cache.put("BRK/B", &series());
        assert_eq!(cache.get("BRK/B"), CacheLookup::Hit(series()));
        cache.put("../x", &series());
        assert!(!dir.path().parent().unwrap().join("x.arrow").exists());
        assert_eq!(cache.get("../x"), CacheLookup::Hit(series()));
    }
}
