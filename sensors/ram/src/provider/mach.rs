//! macOS counters from `sysctl(hw.memsize)` and `host_statistics64`.

use crate::memory::{MemoryStatsProvider, PageCounts};
use sketchysensor_rs_core::SensorError;
use std::io;
use std::mem;

/// Provider backed by the mach host port.
#[derive(Debug)]
pub struct MachHost {
    port: libc::mach_port_t,
    page_size: u64,
}

impl MachHost {
    /// Acquire the host port and page size.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::Os`] if the page size cannot be determined.
    pub fn new() -> Result<Self, SensorError> {
        #[allow(deprecated)]
        // SAFETY: mach_host_self has no preconditions.
        let port = unsafe { libc::mach_host_self() };
        Ok(Self {
            port,
            page_size: super::page_size()?,
        })
    }
}

impl MemoryStatsProvider for MachHost {
    fn total_memory(&self) -> Result<u64, SensorError> {
        let mut mib = [libc::CTL_HW, libc::HW_MEMSIZE];
        let mut total: u64 = 0;
        let mut len = mem::size_of::<u64>();

        // SAFETY: `total` is a u64 and `len` holds its size, as hw.memsize expects.
        let ret = unsafe {
            libc::sysctl(
                mib.as_mut_ptr(),
                mib.len() as libc::c_uint,
                (&mut total as *mut u64).cast(),
                &mut len,
                std::ptr::null_mut(),
                0,
            )
        };
        if ret != 0 {
            let errno = io::Error::last_os_error().raw_os_error().unwrap_or(ret);
            return Err(SensorError::os("sysctl(hw.memsize)", errno));
        }
        Ok(total)
    }

    fn page_counts(&self) -> Result<PageCounts, SensorError> {
        let mut count = libc::HOST_VM_INFO64_COUNT;
        // SAFETY: vm_statistics64 is plain old data; all-zero is a valid value.
        let mut stats: libc::vm_statistics64 = unsafe { mem::zeroed() };

        // SAFETY: `count` describes the size of `stats` in natural_t units.
        let ret = unsafe {
            libc::host_statistics64(
                self.port,
                libc::HOST_VM_INFO64,
                (&mut stats as *mut libc::vm_statistics64).cast(),
                &mut count,
            )
        };
        if ret != libc::KERN_SUCCESS {
            return Err(SensorError::os("host_statistics64", ret));
        }

        Ok(PageCounts {
            active: u64::from(stats.active_count),
            wired: u64::from(stats.wire_count),
            compressed: u64::from(stats.compressor_page_count),
            page_size: self.page_size,
        })
    }
}
