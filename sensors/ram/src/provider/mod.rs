//! Memory-stats providers for the supported platforms.

#[cfg(target_os = "macos")]
mod mach;
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
pub mod procfs;

#[cfg(target_os = "macos")]
pub use mach::MachHost;
pub use procfs::{MeminfoCounters, ProcMeminfo};

use crate::memory::{MemoryStatsProvider, PageCounts};
use sketchysensor_rs_core::SensorError;

/// The provider for the platform this binary was built for.
#[derive(Debug)]
pub struct SystemMemoryStats {
    #[cfg(target_os = "macos")]
    inner: MachHost,
    #[cfg(target_os = "linux")]
    inner: ProcMeminfo,
}

impl SystemMemoryStats {
    /// Open the platform provider.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::Unavailable`] on unsupported platforms, or an
    /// OS error if the page size cannot be determined.
    #[cfg(target_os = "macos")]
    pub fn new() -> Result<Self, SensorError> {
        Ok(Self {
            inner: MachHost::new()?,
        })
    }

    /// Open the platform provider.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::Unavailable`] on unsupported platforms, or an
    /// OS error if the page size cannot be determined.
    #[cfg(target_os = "linux")]
    pub fn new() -> Result<Self, SensorError> {
        Ok(Self {
            inner: ProcMeminfo::with_path(ProcMeminfo::PROC_MEMINFO_PATH, page_size()?),
        })
    }

    /// Open the platform provider.
    ///
    /// # Errors
    ///
    /// Always returns [`SensorError::Unavailable`] on this platform.
    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    pub fn new() -> Result<Self, SensorError> {
        Err(SensorError::unavailable(format!(
            "memory statistics are not supported on {}",
            std::env::consts::OS
        )))
    }
}

#[cfg(any(target_os = "macos", target_os = "linux"))]
impl MemoryStatsProvider for SystemMemoryStats {
    fn total_memory(&self) -> Result<u64, SensorError> {
        self.inner.total_memory()
    }

    fn page_counts(&self) -> Result<PageCounts, SensorError> {
        self.inner.page_counts()
    }
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
impl MemoryStatsProvider for SystemMemoryStats {
    fn total_memory(&self) -> Result<u64, SensorError> {
        Err(SensorError::unavailable("unsupported platform"))
    }

    fn page_counts(&self) -> Result<PageCounts, SensorError> {
        Err(SensorError::unavailable("unsupported platform"))
    }
}

/// System page size in bytes.
#[cfg(unix)]
pub(crate) fn page_size() -> Result<u64, SensorError> {
    // SAFETY: sysconf has no preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size <= 0 {
        let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(-1);
        return Err(SensorError::os("sysconf(_SC_PAGESIZE)", errno));
    }
    Ok(size as u64)
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;
    use crate::memory::MemorySampler;

    #[test]
    fn test_system_provider_reads_live_counters() {
        let provider = SystemMemoryStats::new().unwrap();
        let total = provider.total_memory().unwrap();
        assert!(total > 0);

        let mut sampler = MemorySampler::initialize(provider).unwrap();
        let snapshot = sampler.refresh().unwrap();
        assert!(snapshot.used_percentage <= 100);
        assert!(snapshot.total_gb > 0.0);
    }

    #[test]
    fn test_page_size_is_power_of_two() {
        let size = page_size().unwrap();
        assert!(size.is_power_of_two());
    }
}
