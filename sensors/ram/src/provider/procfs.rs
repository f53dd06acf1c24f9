//! `/proc/meminfo` backed counters.
//!
//! Linux has no exact equivalent of the mach page categories, so the closest
//! fields stand in: `Active` for active, `Unevictable` for wired and `Zswap`
//! (the compressed pool) for compressed.

use crate::memory::{MemoryStatsProvider, PageCounts};
use sketchysensor_rs_core::SensorError;
use std::fs;
use std::path::PathBuf;

/// Fields of interest from `/proc/meminfo`, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MeminfoCounters {
    /// `MemTotal`
    pub mem_total: u64,
    /// `Active`
    pub active: u64,
    /// `Unevictable`
    pub unevictable: u64,
    /// `Zswap`, 0 on kernels without zswap accounting
    pub zswap: u64,
}

impl MeminfoCounters {
    /// Parse meminfo content. Missing fields are left at 0.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::Parse`] if a field of interest has a non-numeric value.
    pub fn parse(content: &str) -> Result<Self, SensorError> {
        let mut counters = Self::default();

        for line in content.lines() {
            let mut parts = line.split_whitespace();
            let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
                continue;
            };

            let slot = match key.trim_end_matches(':') {
                "MemTotal" => &mut counters.mem_total,
                "Active" => &mut counters.active,
                "Unevictable" => &mut counters.unevictable,
                "Zswap" => &mut counters.zswap,
                _ => continue,
            };

            let kb = value.parse::<u64>().map_err(|e| {
                SensorError::parse_with_source(format!("Failed to parse {} value", key), e)
            })?;
            *slot = kb.saturating_mul(1024);
        }

        Ok(counters)
    }

    /// Convert byte counters into pages of `page_size` bytes.
    #[must_use]
    pub fn to_pages(&self, page_size: u64) -> PageCounts {
        let page_size = page_size.max(1);
        PageCounts {
            active: self.active / page_size,
            wired: self.unevictable / page_size,
            compressed: self.zswap / page_size,
            page_size,
        }
    }
}

/// Provider reading a meminfo file.
#[derive(Debug, Clone)]
pub struct ProcMeminfo {
    path: PathBuf,
    page_size: u64,
}

impl ProcMeminfo {
    /// Path to the proc meminfo file.
    pub const PROC_MEMINFO_PATH: &'static str = "/proc/meminfo";

    /// Read from a specific file with a fixed page size (useful for testing).
    #[must_use]
    pub fn with_path(path: impl Into<PathBuf>, page_size: u64) -> Self {
        Self {
            path: path.into(),
            page_size,
        }
    }

    fn read(&self) -> Result<MeminfoCounters, SensorError> {
        let content = fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SensorError::unavailable(format!(
                "{} does not exist (not a Linux system?)",
                self.path.display()
            )),
            _ => SensorError::Io(e),
        })?;
        MeminfoCounters::parse(&content)
    }
}

impl MemoryStatsProvider for ProcMeminfo {
    fn total_memory(&self) -> Result<u64, SensorError> {
        Ok(self.read()?.mem_total)
    }

    fn page_counts(&self) -> Result<PageCounts, SensorError> {
        Ok(self.read()?.to_pages(self.page_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
MemTotal:       16384000 kB
MemFree:         4096000 kB
MemAvailable:   12288000 kB
Buffers:         1024000 kB
Cached:          2048000 kB
Active:          6000000 kB
Inactive:        3000000 kB
Active(anon):    4000000 kB
Active(file):    2000000 kB
Unevictable:       40000 kB
Zswap:            120000 kB
Zswapped:         400000 kB
"#;

    #[test]
    fn test_meminfo_parsing() {
        let counters = MeminfoCounters::parse(SAMPLE).unwrap();

        assert_eq!(counters.mem_total, 16_384_000 * 1024);
        assert_eq!(counters.active, 6_000_000 * 1024);
        assert_eq!(counters.unevictable, 40_000 * 1024);
        assert_eq!(counters.zswap, 120_000 * 1024);
    }

    #[test]
    fn test_meminfo_without_zswap() {
        let counters = MeminfoCounters::parse("MemTotal: 1024 kB\nActive: 512 kB\n").unwrap();
        assert_eq!(counters.zswap, 0);
        assert_eq!(counters.unevictable, 0);
        assert_eq!(counters.active, 512 * 1024);
    }

    #[test]
    fn test_meminfo_bad_value() {
        let err = MeminfoCounters::parse("MemTotal: lots kB\n").unwrap_err();
        assert!(matches!(err, SensorError::Parse { .. }));
    }

    #[test]
    fn test_to_pages() {
        let counters = MeminfoCounters::parse(SAMPLE).unwrap();
        let pages = counters.to_pages(4096);

        assert_eq!(pages.active, 6_000_000 / 4);
        assert_eq!(pages.wired, 40_000 / 4);
        assert_eq!(pages.compressed, 120_000 / 4);
        assert_eq!(pages.used_bytes(), (6_000_000 + 40_000 + 120_000) * 1024);
    }

    #[test]
    fn test_provider_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let provider = ProcMeminfo::with_path(file.path(), 4096);
        assert_eq!(provider.total_memory().unwrap(), 16_384_000 * 1024);
        assert_eq!(provider.page_counts().unwrap().active, 1_500_000);
    }

    #[test]
    fn test_provider_missing_file_is_unavailable() {
        let provider = ProcMeminfo::with_path("/nonexistent/meminfo", 4096);
        let err = provider.total_memory().unwrap_err();
        assert!(matches!(err, SensorError::Unavailable { .. }));
    }
}
