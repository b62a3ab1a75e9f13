//! # Memory Map Ingestion
//!
//! Reduces the boot memory map to the handful of numbers the frame table is
//! sized from.

use crate::FRAME_SIZE;
use crate::config::TableSizing;
use kernel_info::boot::MemoryRegion;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct MemoryMapSummary {
    /// Sum of the lengths of all usable regions.
    pub total_usable_bytes: u64,
    /// End address of the highest usable region.
    pub highest_usable_end: u64,
    /// Number of regions in the map, usable or not.
    pub region_count: usize,
}

impl MemoryMapSummary {
    /// Summarize the memory map.
    ///
    /// Takes any sequence of regions, so raw boot records can be decoded on
    /// the fly (`entries.iter().copied().map(MemoryRegion::from)`).
    #[must_use]
    pub fn from_regions<I>(regions: I) -> Self
    where
        I: IntoIterator<Item = MemoryRegion>,
    {
        regions.into_iter().fold(Self::default(), |mut summary, region| {
            summary.region_count += 1;
            if region.is_usable() {
                summary.total_usable_bytes =
                    summary.total_usable_bytes.saturating_add(region.length);
                summary.highest_usable_end = summary.highest_usable_end.max(region.end());
            }
            summary
        })
    }

    /// No memory map was supplied at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.region_count == 0
    }

    /// Number of frame table entries under the given sizing rule.
    ///
    /// Partial frames at the end are not counted.
    #[must_use]
    pub fn frame_count(&self, sizing: TableSizing) -> usize {
        let bytes = match sizing {
            TableSizing::UsableBytes => self.total_usable_bytes,
            TableSizing::HighestUsableAddress => self.highest_usable_end,
        };
        usize::try_from(bytes / FRAME_SIZE as u64).unwrap_or(usize::MAX)
    }
}
