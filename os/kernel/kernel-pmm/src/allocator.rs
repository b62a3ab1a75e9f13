//! # Physical Frame Allocator
//!
//! First-fit allocator for runs of 4 KiB frames over a [`FrameTable`].
//!
//! ## Bootstrapping
//!
//! The allocator runs before any heap exists, so its own table has to live in
//! the RAM it manages. [`FrameAllocator::init`] places the table in the first
//! usable RAM behind the kernel image and then reserves, through the same path
//! [`FrameAllocator::reserve`] uses:
//!
//! 1. low memory, from frame 0 up to the kernel image,
//! 2. the kernel image,
//! 3. the frame table itself,
//! 4. every frame the table covers that is not usable RAM, whether a
//!    firmware region or a hole in the map.
//!
//! A failure in steps 1 to 3 means the memory layout assumptions do not hold;
//! the caller has to halt.
//!
//! ## Errors
//!
//! Running out of frames is an ordinary outcome (`None`). Caller misuse is
//! logged and handled according to the configured [`MisusePolicy`].

use crate::FRAME_SIZE;
use crate::config::{FrameAllocatorConfig, MisusePolicy};
use crate::descriptor::FrameDescriptor;
use crate::error::{FreeError, InitError, InvariantViolation, ReserveError};
use crate::ingest::MemoryMapSummary;
use crate::phys_mapper::PhysMapper;
use crate::report::{self, MemoryUsage};
use crate::table::{FrameTable, MAX_TABLE_FRAMES, OutOfBounds};
use core::fmt;
use core::num::NonZeroUsize;
use core::ops::Range;
use kernel_info::boot::MemoryRegion;
use kernel_info::memory::KernelImage;
use kernel_memory_addresses::{PhysicalAddress, Size4K};
use log::{debug, error, info, trace, warn};

/// The physical page frame allocator.
pub struct FrameAllocator<'t, M: PhysMapper> {
    table: FrameTable<'t>,
    mapper: M,
    config: FrameAllocatorConfig,
    total_usable_bytes: u64,
}

impl<'t, M: PhysMapper> FrameAllocator<'t, M> {
    /// Build the allocator from the boot memory map.
    ///
    /// The regions are walked several times, so any cloneable iterator works;
    /// raw boot records can be passed as
    /// `entries.iter().copied().map(MemoryRegion::from)`.
    ///
    /// An empty memory map yields an allocator without frames.
    ///
    /// # Safety
    /// - `mapper` must cover every frame the table will describe.
    /// - Usable RAM outside the kernel image must not be in use by anything
    ///   else; the table is written into the first usable frames behind the
    ///   kernel image.
    /// - Must be called once; a second allocator over the same RAM hands out
    ///   the same frames twice.
    ///
    /// # Errors
    /// No usable RAM behind the kernel image holds the frame table, or a boot
    /// reservation (low memory, kernel image, frame table, firmware memory)
    /// failed.
    pub unsafe fn init<I>(
        regions: I,
        kernel: KernelImage,
        mapper: M,
        config: FrameAllocatorConfig,
    ) -> Result<Self, InitError>
    where
        I: IntoIterator<Item = MemoryRegion>,
        I::IntoIter: Clone,
    {
        let regions = regions.into_iter();
        let summary = MemoryMapSummary::from_regions(regions.clone());

        if summary.is_empty() {
            warn!("No memory map available; the frame allocator manages no memory");
            // SAFETY: An empty table never touches memory.
            return Ok(unsafe { Self::from_table(FrameTable::new(&mut []), mapper, config) });
        }

        report::log_memory_map(regions.clone(), &kernel, summary.total_usable_bytes);

        let frames = clamp_frames(summary.frame_count(config.sizing));

        let kernel_frames = frame_span(kernel.start, kernel.end);
        if kernel_frames.end > frames {
            return Err(InitError::Reservation {
                what: "kernel image",
                source: out_of_bounds(&kernel_frames, frames),
            });
        }

        // The table is written before it can reserve itself, so it must land
        // in usable RAM the table itself describes.
        let table_len = (frames * size_of::<FrameDescriptor>()).div_ceil(FRAME_SIZE);
        let table_start = place_table(regions.clone(), kernel_frames.end, table_len, frames)
            .ok_or(InitError::TablePlacement { frames })?;
        let table_frames = table_start..table_start + table_len;
        let table_base = FrameTable::address_of(table_start);

        debug!("Placing frame table for {frames} frames at {table_base} ({table_len} frames)");

        // SAFETY: The table frames lie in usable RAM inside the table's range
        // (checked above) and the caller guarantees the mapping covers them.
        let storage = unsafe {
            mapper.zero_frames(table_base, table_len);
            mapper.phys_to_slice_mut::<FrameDescriptor>(table_base, frames)
        };

        // SAFETY: Forwarded from the caller.
        let mut allocator = unsafe { Self::from_table(FrameTable::new(storage), mapper, config) };
        allocator.total_usable_bytes = summary.total_usable_bytes;

        if kernel_frames.start > 0 {
            allocator.reserve_for_boot("low memory", "low memory", 0..kernel_frames.start)?;
        }
        allocator.reserve_for_boot("kernel image", "kernel", kernel_frames)?;
        allocator.reserve_for_boot("frame table", "page frame table", table_frames)?;
        allocator.reserve_firmware_memory(regions)?;

        allocator.log_usage();
        Ok(allocator)
    }

    /// Wrap an already constructed table without any boot reservations.
    ///
    /// # Safety
    /// `mapper` must cover every frame `table` describes, and none of the
    /// frames marked free may be in use by anything else.
    pub unsafe fn from_table(
        table: FrameTable<'t>,
        mapper: M,
        config: FrameAllocatorConfig,
    ) -> Self {
        let total_usable_bytes = table.len() as u64 * FRAME_SIZE as u64;
        Self {
            table,
            mapper,
            config,
            total_usable_bytes,
        }
    }

    /// Permanently reserve `page_count` frames starting at the frame containing `base`.
    ///
    /// Reserved frames are never allocated and can never be freed. The
    /// `identifier` names the owner in diagnostics.
    ///
    /// # Errors
    /// The range is empty, leaves the table, or touches a frame that is
    /// already reserved or allocated. The table is left unchanged.
    ///
    /// # Panics
    /// On any error if the misuse policy is [`MisusePolicy::Halt`].
    pub fn reserve(
        &mut self,
        identifier: &str,
        base: PhysicalAddress,
        page_count: usize,
    ) -> Result<(), ReserveError> {
        let result = self
            .table
            .index_of(base)
            .map_err(out_of_bounds_error)
            .and_then(|start| {
                self.try_reserve(identifier, start..start.saturating_add(page_count))
            });

        result.map_err(|e| {
            let severe = matches!(e, ReserveError::OverlapsAllocation { .. });
            self.misuse(format_args!("reserve {identifier:?} at {base}"), e, severe)
        })
    }

    /// Allocate a single zero-filled frame, the lowest free one.
    #[must_use = "dropping the address leaks the frame"]
    pub fn allocate_one(&mut self) -> Option<PhysicalAddress> {
        self.allocate(1)
    }

    /// Allocate `count` physically contiguous zero-filled frames, first fit.
    ///
    /// Returns the address of the first frame, which is also the address to
    /// [`free`](Self::free) the whole run with.
    #[must_use = "dropping the address leaks the frames"]
    pub fn allocate_many(&mut self, count: NonZeroUsize) -> Option<PhysicalAddress> {
        match count.get() {
            1 => self.allocate_one(),
            n => self.allocate(n),
        }
    }

    /// Return the allocation whose first frame contains `address`.
    ///
    /// # Errors
    /// `address` is null, outside the table, reserved, free, or not the first
    /// frame of its allocation. The table is left unchanged.
    ///
    /// # Panics
    /// On any error if the misuse policy is [`MisusePolicy::Halt`].
    pub fn free(&mut self, address: PhysicalAddress) -> Result<(), FreeError> {
        match self.check_free(address) {
            Ok(index) => {
                let count = self.table.release(index);
                trace!("Freed {count} frame(s) at {address}");
                Ok(())
            }
            Err(e) => {
                let severe = matches!(e, FreeError::NullAddress);
                Err(self.misuse(format_args!("free {address}"), e, severe))
            }
        }
    }

    /// Number of frames that are used (`allocated == true`) or free.
    #[must_use]
    pub fn count_frames(&self, allocated: bool) -> usize {
        self.table.count(allocated)
    }

    #[must_use]
    pub fn usage(&self) -> MemoryUsage {
        let used_frames = self.table.count(true);
        MemoryUsage {
            total_frames: self.table.len(),
            used_frames,
            free_frames: self.table.len() - used_frames,
            reserved_frames: self.table.count_reserved(),
        }
    }

    pub fn log_usage(&self) {
        info!("Physical memory: {}", self.usage());
    }

    /// Sum of all usable region lengths reported at boot.
    #[must_use]
    pub const fn total_usable_bytes(&self) -> u64 {
        self.total_usable_bytes
    }

    #[must_use]
    pub const fn frame_count(&self) -> usize {
        self.table.len()
    }

    #[must_use]
    pub fn frame(&self, index: usize) -> Option<FrameDescriptor> {
        self.table.get(index)
    }

    #[must_use]
    pub const fn config(&self) -> &FrameAllocatorConfig {
        &self.config
    }

    /// Check the frame table's structural invariants.
    ///
    /// # Errors
    /// The first violation found.
    pub fn verify(&self) -> Result<(), InvariantViolation> {
        self.table.verify()
    }

    fn allocate(&mut self, count: usize) -> Option<PhysicalAddress> {
        let Some(index) = self.table.find_free_run(count) else {
            debug!("No run of {count} free frame(s) left");
            return None;
        };

        self.table.mark_allocated(index, count);
        let address = FrameTable::address_of(index);

        // SAFETY: The frames were free, so nobody else owns them, and the
        // mapper covers the whole table per the constructor's contract.
        unsafe { self.mapper.zero_frames(address, count) };

        trace!("Allocated {count} frame(s) at {address}");
        Some(address)
    }

    fn check_free(&self, address: PhysicalAddress) -> Result<usize, FreeError> {
        let (index, frame) = self.table.lookup(address).map_err(|e| {
            if address.is_null() {
                FreeError::NullAddress
            } else {
                FreeError::OutOfBounds {
                    index: e.index,
                    frames: e.frames,
                }
            }
        })?;

        // Frame 0 is a legitimate allocation when low memory is not reserved;
        // anything else at the null address is a caller bug.
        if address.is_null() && !frame.first_in_allocation() {
            return Err(FreeError::NullAddress);
        }
        if frame.reserved() {
            return Err(FreeError::Reserved { index });
        }
        if frame.is_free() {
            return Err(FreeError::NotAllocated { index });
        }
        if !frame.first_in_allocation() {
            return Err(FreeError::NotAllocationHead { index });
        }
        Ok(index)
    }

    /// Validate the whole range, then mark it reserved.
    fn try_reserve(&mut self, identifier: &str, range: Range<usize>) -> Result<(), ReserveError> {
        if range.is_empty() {
            return Err(ReserveError::EmptyRange);
        }
        self.table.check_range(&range).map_err(out_of_bounds_error)?;

        for (index, frame) in range.clone().zip(self.table.frames(range.clone())) {
            if frame.reserved() {
                return Err(ReserveError::AlreadyReserved { index });
            }
            if frame.used() {
                return Err(ReserveError::OverlapsAllocation { index });
            }
        }

        debug!(
            "Reserving {count} frame(s) at {base} for {identifier}",
            count = range.len(),
            base = FrameTable::address_of(range.start)
        );
        self.table.mark_reserved(range);
        Ok(())
    }

    fn reserve_for_boot(
        &mut self,
        what: &'static str,
        identifier: &str,
        range: Range<usize>,
    ) -> Result<(), InitError> {
        self.try_reserve(identifier, range)
            .map_err(|source| InitError::Reservation { what, source })
    }

    /// Reserve every table frame that is not general-purpose RAM: first the
    /// non-usable regions under their own names, then the frames no usable
    /// region covers at all.
    fn reserve_firmware_memory<I>(&mut self, regions: I) -> Result<(), InitError>
    where
        I: Iterator<Item = MemoryRegion> + Clone,
    {
        for region in regions.clone().filter(|r| !r.is_usable() && r.length > 0) {
            let span = frame_span(region.base, PhysicalAddress::new(region.end()));
            self.reserve_remaining("firmware region", region.kind.description(), span)?;
        }

        let usable = || regions.clone().filter(MemoryRegion::is_usable).map(|r| usable_frames(&r));
        let mut index = 0;
        while index < self.table.len() {
            if let Some(span) = usable().find(|span| span.contains(&index)) {
                index = span.end;
                continue;
            }
            let hole_end = usable()
                .map(|span| span.start)
                .filter(|&start| start > index)
                .min()
                .unwrap_or(usize::MAX)
                .min(self.table.len());
            self.reserve_remaining("memory hole", "memory hole", index..hole_end)?;
            index = hole_end;
        }
        Ok(())
    }

    /// Reserve the frames of `range` inside the table that are not reserved yet.
    fn reserve_remaining(
        &mut self,
        what: &'static str,
        identifier: &str,
        range: Range<usize>,
    ) -> Result<(), InitError> {
        let end = range.end.min(self.table.len());
        let is_reserved =
            |table: &FrameTable<'_>, i: usize| table.get(i).is_some_and(|f| f.reserved());

        let mut index = range.start;
        while index < end {
            if is_reserved(&self.table, index) {
                index += 1;
                continue;
            }
            let run_end = (index..end)
                .find(|&i| is_reserved(&self.table, i))
                .unwrap_or(end);
            self.reserve_for_boot(what, identifier, index..run_end)?;
            index = run_end;
        }
        Ok(())
    }

    fn misuse<E>(&self, operation: fmt::Arguments<'_>, error: E, severe: bool) -> E
    where
        E: fmt::Display,
    {
        match self.config.misuse {
            MisusePolicy::Halt => panic!("Frame allocator misuse: {operation}: {error}"),
            MisusePolicy::Report if severe => {
                error!("Frame allocator misuse: {operation}: {error}");
            }
            MisusePolicy::Report => warn!("Frame allocator misuse: {operation}: {error}"),
        }
        error
    }
}

/// Limit a frame count to what a single table can describe.
fn clamp_frames(frames: usize) -> usize {
    if frames > MAX_TABLE_FRAMES {
        warn!("Only the first {MAX_TABLE_FRAMES} of {frames} frames are managed");
        MAX_TABLE_FRAMES
    } else {
        frames
    }
}

/// Lowest run of `count` frames at or above `from` and below `limit` that
/// lies entirely in usable RAM.
fn place_table<I>(regions: I, from: usize, count: usize, limit: usize) -> Option<usize>
where
    I: Iterator<Item = MemoryRegion>,
{
    regions
        .filter(MemoryRegion::is_usable)
        .map(|r| usable_frames(&r))
        .filter_map(|span| {
            let start = span.start.max(from);
            let end = start.checked_add(count)?;
            (end <= span.end.min(limit)).then_some(start)
        })
        .min()
}

/// Frames lying entirely inside a usable region.
fn usable_frames(region: &MemoryRegion) -> Range<usize> {
    let first = region
        .base
        .align_up::<Size4K>()
        .map_or(usize::MAX, |base| frame_index(base.page::<Size4K>().number()));
    let last = frame_index(PhysicalAddress::new(region.end()).page::<Size4K>().number());
    first..last.max(first)
}

/// Frames touched by `[start, end)`: start rounded down, end rounded up.
fn frame_span(start: PhysicalAddress, end: PhysicalAddress) -> Range<usize> {
    let first = frame_index(start.page::<Size4K>().number());
    let last = end
        .align_up::<Size4K>()
        .map_or(usize::MAX, |end| frame_index(end.page::<Size4K>().number()));
    first..last.max(first)
}

fn frame_index(number: u64) -> usize {
    usize::try_from(number).unwrap_or(usize::MAX)
}

fn out_of_bounds(range: &Range<usize>, frames: usize) -> ReserveError {
    ReserveError::OutOfBounds {
        index: range.start.max(frames) as u64,
        frames,
    }
}

const fn out_of_bounds_error(e: OutOfBounds) -> ReserveError {
    ReserveError::OutOfBounds {
        index: e.index,
        frames: e.frames,
    }
}
