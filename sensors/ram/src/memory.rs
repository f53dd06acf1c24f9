//! Memory pressure sampling.
//!
//! "Used" memory here means active + wired + compressed pages. Inactive,
//! free and file-cache pages are left out because the kernel can reclaim them
//! at any time.

use sketchysensor_rs_core::{format, BarCommand, SensorError};

/// Raw page counters reported by a [`MemoryStatsProvider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageCounts {
    /// Pages in active use by running processes
    pub active: u64,
    /// Pages locked by the kernel
    pub wired: u64,
    /// Pages held by the memory compressor
    pub compressed: u64,
    /// Page size in bytes
    pub page_size: u64,
}

impl PageCounts {
    /// Bytes under memory pressure.
    #[must_use]
    pub const fn used_bytes(&self) -> u64 {
        self.active
            .saturating_add(self.wired)
            .saturating_add(self.compressed)
            .saturating_mul(self.page_size)
    }
}

/// Source of OS memory counters.
///
/// The real implementation is [`crate::SystemMemoryStats`]; tests substitute
/// fakes that return fixed values.
pub trait MemoryStatsProvider {
    /// Total installed physical memory in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS query fails.
    fn total_memory(&self) -> Result<u64, SensorError>;

    /// Current page counters.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS query fails.
    fn page_counts(&self) -> Result<PageCounts, SensorError>;
}

impl<P: MemoryStatsProvider + ?Sized> MemoryStatsProvider for &P {
    fn total_memory(&self) -> Result<u64, SensorError> {
        (**self).total_memory()
    }

    fn page_counts(&self) -> Result<PageCounts, SensorError> {
        (**self).page_counts()
    }
}

/// Derived memory figures for one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemorySnapshot {
    /// Total physical memory, fixed for the lifetime of the process
    pub total_bytes: u64,
    /// Active + wired + compressed bytes
    pub used_bytes: u64,
    /// `used_bytes / total_bytes`, truncated and clamped to 0..=100
    pub used_percentage: u8,
    /// Used memory in GiB
    pub used_gb: f64,
    /// Total memory in GiB
    pub total_gb: f64,
}

impl MemorySnapshot {
    /// Snapshot with a known total and nothing sampled yet.
    #[must_use]
    pub fn new(total_bytes: u64) -> Self {
        Self {
            total_bytes,
            used_bytes: 0,
            used_percentage: 0,
            used_gb: 0.0,
            total_gb: format::bytes_to_gib(total_bytes),
        }
    }

    /// Recompute the derived fields from a new used byte count.
    pub fn update(&mut self, used_bytes: u64) {
        self.used_bytes = used_bytes;
        self.used_percentage = used_percentage(used_bytes, self.total_bytes);
        self.used_gb = format::bytes_to_gib(used_bytes);
    }

    /// Variables exported with each trigger, in the order the bar scripts expect.
    #[must_use]
    pub fn trigger_vars(&self) -> [(&'static str, String); 3] {
        [
            ("used_percentage", self.used_percentage.to_string()),
            ("used_gb", format::two_decimals(self.used_gb)),
            ("total_gb", format::two_decimals(self.total_gb)),
        ]
    }

    /// Build the trigger command for `event`.
    #[must_use]
    pub fn trigger(&self, event: &str) -> BarCommand {
        self.trigger_vars()
            .into_iter()
            .fold(BarCommand::trigger(event), |cmd, (key, value)| {
                cmd.with_var(key, value)
            })
    }
}

/// Percentage of `total` taken by `used`, truncated toward zero.
///
/// Counter skew can make `used` exceed `total`; the result is clamped so it
/// never leaves 0..=100.
#[must_use]
pub fn used_percentage(used: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let raw = (used as f64 / total as f64 * 100.0) as i64;
    raw.clamp(0, 100) as u8
}

/// Owns a provider and the one snapshot it keeps refreshing.
#[derive(Debug)]
pub struct MemorySampler<P> {
    provider: P,
    snapshot: MemorySnapshot,
}

impl<P: MemoryStatsProvider> MemorySampler<P> {
    /// Query total memory once and build the sampler.
    ///
    /// # Errors
    ///
    /// Fails if the total cannot be queried or is reported as zero.
    pub fn initialize(provider: P) -> Result<Self, SensorError> {
        let total_bytes = provider.total_memory()?;
        if total_bytes == 0 {
            return Err(invalid_total());
        }
        tracing::debug!(total_bytes, "memory sampler initialised");

        Ok(Self {
            provider,
            snapshot: MemorySnapshot::new(total_bytes),
        })
    }

    /// Take a new sample.
    ///
    /// On error the previous snapshot is left untouched.
    ///
    /// # Errors
    ///
    /// Returns the provider's error if the page counters cannot be read.
    pub fn refresh(&mut self) -> Result<&MemorySnapshot, SensorError> {
        let pages = self.provider.page_counts()?;
        self.snapshot.update(pages.used_bytes());
        tracing::trace!(?pages, used_percentage = self.snapshot.used_percentage, "sampled");
        Ok(&self.snapshot)
    }

    /// The most recent snapshot.
    #[must_use]
    pub fn snapshot(&self) -> &MemorySnapshot {
        &self.snapshot
    }
}

/// Probe a provider once, the way `--check` does.
///
/// # Errors
///
/// Returns the first query that fails.
pub fn check_availability<P: MemoryStatsProvider>(provider: &P) -> Result<u64, SensorError> {
    let total = provider.total_memory()?;
    if total == 0 {
        return Err(invalid_total());
    }
    provider.page_counts()?;
    Ok(total)
}

fn invalid_total() -> SensorError {
    SensorError::unavailable("OS reported 0 bytes of physical memory")
}
