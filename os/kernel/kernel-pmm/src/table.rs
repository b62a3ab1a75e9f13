//! # Frame Table
//!
//! One [`FrameDescriptor`] per physical page frame, indexed by frame number
//! (`physical_address / FRAME_SIZE`). The table never grows or shrinks after
//! construction.
//!
//! The table borrows its storage: during boot the storage is a slice of usable
//! RAM behind the kernel image, in tests it is an ordinary array.

use crate::descriptor::{FrameDescriptor, MAX_RUN_LENGTH};
use crate::error::InvariantViolation;
use core::ops::Range;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};

/// A physical address outside the table.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OutOfBounds {
    /// Frame number of the offending address.
    pub index: u64,
    /// Number of frames in the table.
    pub frames: usize,
}

/// Most frames a table manages; a single allocation may span all of them.
pub const MAX_TABLE_FRAMES: usize = MAX_RUN_LENGTH as usize + 1;

pub struct FrameTable<'t> {
    frames: &'t mut [FrameDescriptor],
}

impl<'t> FrameTable<'t> {
    /// Take over `storage` and mark every frame free.
    ///
    /// At most [`MAX_TABLE_FRAMES`] entries are used; the rest of `storage`
    /// is left alone.
    pub fn new(storage: &'t mut [FrameDescriptor]) -> Self {
        let len = storage.len().min(MAX_TABLE_FRAMES);
        let frames = &mut storage[..len];
        frames.fill(FrameDescriptor::FREE);
        Self { frames }
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<FrameDescriptor> {
        self.frames.get(index).copied()
    }

    /// Frame number of the frame containing `pa`, if the table covers it.
    ///
    /// # Errors
    /// The frame lies beyond the last table entry.
    pub fn index_of(&self, pa: PhysicalAddress) -> Result<usize, OutOfBounds> {
        let number = pa.page::<Size4K>().number();
        usize::try_from(number)
            .ok()
            .filter(|&index| index < self.len())
            .ok_or(OutOfBounds {
                index: number,
                frames: self.len(),
            })
    }

    /// Frame number and descriptor of the frame containing `pa`.
    ///
    /// # Errors
    /// The frame lies beyond the last table entry.
    pub fn lookup(&self, pa: PhysicalAddress) -> Result<(usize, FrameDescriptor), OutOfBounds> {
        let index = self.index_of(pa)?;
        Ok((index, self.frames[index]))
    }

    /// Base address of frame `index`.
    #[inline]
    #[must_use]
    pub const fn address_of(index: usize) -> PhysicalAddress {
        PhysicalPage::<Size4K>::from_number(index as u64).base()
    }

    /// Checks that all of `range` lies inside the table.
    pub(crate) fn check_range(&self, range: &Range<usize>) -> Result<(), OutOfBounds> {
        if range.end <= self.len() {
            Ok(())
        } else {
            let first_outside = range.start.max(self.len());
            Err(OutOfBounds {
                index: first_outside as u64,
                frames: self.len(),
            })
        }
    }

    /// Number of frames whose `used` flag equals `used`.
    #[must_use]
    pub fn count(&self, used: bool) -> usize {
        self.frames.iter().filter(|f| f.used() == used).count()
    }

    #[must_use]
    pub fn count_reserved(&self) -> usize {
        self.frames.iter().filter(|f| f.reserved()).count()
    }

    pub(crate) fn frames(&self, range: Range<usize>) -> &[FrameDescriptor] {
        &self.frames[range]
    }

    /// Lowest frame index starting `count` consecutive free frames.
    ///
    /// When a window contains a blocking frame, no window starting at or
    /// before that frame can succeed, so the scan resumes right behind it.
    pub(crate) fn find_free_run(&self, count: usize) -> Option<usize> {
        if count == 0 || count > MAX_TABLE_FRAMES {
            return None;
        }

        let mut start = 0_usize;
        while start.checked_add(count)? <= self.len() {
            let window = &self.frames[start..start + count];
            match window
                .iter()
                .rposition(|f| f.used() || f.first_in_allocation())
            {
                None => return Some(start),
                Some(blocker) => start += blocker + 1,
            }
        }
        None
    }

    /// Record an allocation of `count` frames starting at `index`.
    pub(crate) fn mark_allocated(&mut self, index: usize, count: usize) {
        debug_assert!((1..=MAX_TABLE_FRAMES).contains(&count));
        let run_length =
            u32::try_from(count - 1).map_or(MAX_RUN_LENGTH, |n| n.min(MAX_RUN_LENGTH));
        let run = &mut self.frames[index..index + count];
        run[0] = FrameDescriptor::head(run_length);
        run[1..].fill(FrameDescriptor::continuation());
    }

    pub(crate) fn mark_reserved(&mut self, range: Range<usize>) {
        self.frames[range].fill(FrameDescriptor::reservation());
    }

    /// Clear the allocation headed by `index`; returns the number of frames released.
    pub(crate) fn release(&mut self, index: usize) -> usize {
        let count = self.frames[index].run_length() as usize + 1;
        self.frames[index..index + count].fill(FrameDescriptor::FREE);
        count
    }

    /// Check the structural invariants of the whole table.
    ///
    /// - A free frame carries no other flag and no run length.
    /// - A reserved frame is used and is not an allocation head.
    /// - Every frame of an allocation's run is a plain continuation.
    /// - Every used, unreserved frame belongs to exactly one allocation.
    ///
    /// # Errors
    /// The first violation found, scanning upward from frame 0.
    pub fn verify(&self) -> Result<(), InvariantViolation> {
        let mut index = 0;
        while index < self.len() {
            let frame = self.frames[index];

            if frame.reserved() {
                if !frame.used() || frame.first_in_allocation() || frame.run_length() != 0 {
                    return Err(InvariantViolation::MalformedReservation { index });
                }
                index += 1;
                continue;
            }

            if !frame.used() {
                if frame != FrameDescriptor::FREE {
                    return Err(InvariantViolation::DirtyFreeFrame { index });
                }
                index += 1;
                continue;
            }

            if !frame.first_in_allocation() {
                return Err(InvariantViolation::OrphanFrame { index });
            }

            let last = index
                .checked_add(frame.run_length() as usize)
                .filter(|&last| last < self.len())
                .ok_or(InvariantViolation::RunOutOfBounds { index })?;

            for member in index + 1..=last {
                let f = self.frames[member];
                if !f.is_continuation() || f.run_length() != 0 {
                    return Err(InvariantViolation::BrokenRun {
                        head: index,
                        index: member,
                    });
                }
            }

            index = last + 1;
        }
        Ok(())
    }
}
