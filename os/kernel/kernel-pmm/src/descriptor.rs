//! # Frame Descriptor
//!
//! Per-frame metadata, packed into a single 32-bit word so the frame table
//! costs 4 bytes per 4 KiB of RAM (≈0.1 %).
//!
//! ```text
//!  31                                3   2   1   0
//! ┌─────────────────────────────────┬───┬───┬───┐
//! │           run_length            │ R │ F │ U │
//! └─────────────────────────────────┴───┴───┴───┘
//!   U = used, F = first_in_allocation, R = reserved
//! ```
//!
//! The all-zero word is a free frame.

/// Largest `run_length` a descriptor can hold; an allocation spans at most
/// `MAX_RUN_LENGTH + 1` frames.
pub const MAX_RUN_LENGTH: u32 = (1 << 29) - 1;

/// Metadata of one physical page frame.
#[bitfield_struct::bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct FrameDescriptor {
    /// Bit 0: allocated or reserved.
    pub used: bool,
    /// Bit 1: head frame of an allocation; the only valid argument to `free`.
    pub first_in_allocation: bool,
    /// Bit 2: permanently reserved, never allocated and never freed.
    pub reserved: bool,
    /// Bits 3..31: on a head frame, the number of *additional* frames in the run.
    #[bits(29)]
    pub run_length: u32,
}

impl FrameDescriptor {
    /// A free frame.
    pub const FREE: Self = Self::new();

    /// Head frame of an allocation spanning `1 + run_length` frames.
    #[inline]
    #[must_use]
    pub const fn head(run_length: u32) -> Self {
        Self::new()
            .with_used(true)
            .with_first_in_allocation(true)
            .with_run_length(run_length)
    }

    /// Non-head frame of an allocation.
    #[inline]
    #[must_use]
    pub const fn continuation() -> Self {
        Self::new().with_used(true)
    }

    /// Permanently reserved frame.
    #[inline]
    #[must_use]
    pub const fn reservation() -> Self {
        Self::new().with_used(true).with_reserved(true)
    }

    #[inline]
    #[must_use]
    pub const fn is_free(self) -> bool {
        !self.used()
    }

    /// Used by a live allocation but not its head.
    #[inline]
    #[must_use]
    pub const fn is_continuation(self) -> bool {
        self.used() && !self.first_in_allocation() && !self.reserved()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_is_the_zero_word() {
        assert_eq!(FrameDescriptor::FREE.into_bits(), 0);
        assert_eq!(FrameDescriptor::default(), FrameDescriptor::FREE);
        assert!(FrameDescriptor::FREE.is_free());
    }

    #[test]
    fn head_layout() {
        let head = FrameDescriptor::head(MAX_RUN_LENGTH);
        assert!(head.used());
        assert!(head.first_in_allocation());
        assert!(!head.reserved());
        assert_eq!(head.run_length(), MAX_RUN_LENGTH);
        assert_eq!(head.into_bits(), (MAX_RUN_LENGTH << 3) | 0b011);
        assert!(!head.is_continuation());
    }

    #[test]
    fn continuation_and_reservation_are_distinct() {
        let cont = FrameDescriptor::continuation();
        let res = FrameDescriptor::reservation();
        assert!(cont.is_continuation());
        assert!(!res.is_continuation());
        assert_eq!(res.into_bits(), 0b101);
        assert_eq!(res.run_length(), 0);
    }
}
