//! # Memory Reporting
//!
//! Read-only diagnostics: the boot memory map listing and frame usage figures.

use crate::FRAME_SIZE;
use core::fmt;
use kernel_info::boot::MemoryRegion;
use kernel_info::memory::KernelImage;
use log::info;

/// A byte count rendered in the largest whole binary unit (KiB, MiB or GiB).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ByteSize(pub u64);

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const KIB: u64 = 1024;
        const MIB: u64 = KIB * 1024;
        const GIB: u64 = MIB * 1024;

        match self.0 {
            b if b >= GIB => write!(f, "{} GiB", b / GIB),
            b if b >= MIB => write!(f, "{} MiB", b / MIB),
            b => write!(f, "{} KiB", b / KIB),
        }
    }
}

/// Snapshot of the frame table.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MemoryUsage {
    pub total_frames: usize,
    /// Allocated or reserved frames.
    pub used_frames: usize,
    pub free_frames: usize,
    /// The reserved subset of `used_frames`.
    pub reserved_frames: usize,
}

impl MemoryUsage {
    #[must_use]
    pub const fn used_bytes(&self) -> ByteSize {
        ByteSize(self.used_frames as u64 * FRAME_SIZE as u64)
    }

    #[must_use]
    pub const fn free_bytes(&self) -> ByteSize {
        ByteSize(self.free_frames as u64 * FRAME_SIZE as u64)
    }
}

impl fmt::Display for MemoryUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{used}/{total} frames used ({used_bytes} used, {free_bytes} free, ",
            used = self.used_frames,
            total = self.total_frames,
            used_bytes = self.used_bytes(),
            free_bytes = self.free_bytes(),
        )?;
        write!(f, "{} frames reserved)", self.reserved_frames)
    }
}

/// Log the boot memory map, the kernel image and the total usable memory.
pub fn log_memory_map<I>(regions: I, kernel: &KernelImage, total_usable_bytes: u64)
where
    I: IntoIterator<Item = MemoryRegion>,
{
    info!("System memory map");
    let mut count = 0;
    for (i, region) in regions.into_iter().enumerate() {
        info!(
            "[{i}] {base:#x} -> {end:#x} ({kind}{ignored})",
            base = region.base.as_u64(),
            end = region.end(),
            kind = region.kind,
            ignored = if region.attributes.do_not_ignore() { "" } else { ", ACPI: ignore" },
        );
        count = i + 1;
    }
    info!(
        "[{count}] {start:#x} -> {end:#x} (KERNEL)",
        start = kernel.start.as_u64(),
        end = kernel.end.as_u64(),
    );
    info!("Total amount of usable memory: {}", ByteSize(total_usable_bytes));
}
