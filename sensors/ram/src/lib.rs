//! Memory pressure event provider for SketchyBar.
//!
//! This crate samples active, wired and compressed memory, derives a usage
//! percentage and gigabyte figures, and fires a SketchyBar event carrying
//! them at a fixed interval.
//!
//! # Examples
//!
//! ```rust,no_run
//! use sketchysensor_rs_ram::{MemorySampler, SystemMemoryStats};
//!
//! let mut sampler = MemorySampler::initialize(SystemMemoryStats::new()?)?;
//! let snapshot = sampler.refresh()?;
//! println!("{}% of {:.2} GiB", snapshot.used_percentage, snapshot.total_gb);
//! # Ok::<(), sketchysensor_rs_core::SensorError>(())
//! ```

pub mod memory;
pub mod provider;
pub mod reporter;

pub use memory::{check_availability, MemorySampler, MemorySnapshot, MemoryStatsProvider, PageCounts};
pub use provider::SystemMemoryStats;
pub use reporter::{parse_interval, Reporter};
