//! # Frame Allocator Errors
//!
//! Caller misuse, bootstrap failure and bookkeeping corruption each get their
//! own type. Running out of frames is not an error at all: allocations return
//! `None`.

/// A reservation was rejected. The frame table is left unchanged.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReserveError {
    #[error("reservation of zero frames")]
    EmptyRange,
    #[error("frame {index} lies outside the frame table ({frames} frames)")]
    OutOfBounds { index: u64, frames: usize },
    #[error("frame {index} is already reserved")]
    AlreadyReserved { index: usize },
    #[error("frame {index} belongs to a live allocation")]
    OverlapsAllocation { index: usize },
}

/// A free was rejected. The frame table is left unchanged.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FreeError {
    #[error("attempted to free the null address")]
    NullAddress,
    #[error("frame {index} lies outside the frame table ({frames} frames)")]
    OutOfBounds { index: u64, frames: usize },
    #[error("frame {index} is reserved and cannot be freed")]
    Reserved { index: usize },
    #[error("frame {index} is not allocated (double free?)")]
    NotAllocated { index: usize },
    #[error("frame {index} is not the first frame of its allocation")]
    NotAllocationHead { index: usize },
}

/// The allocator could not be brought up. The kernel must halt: continuing
/// would hand out memory overlapping the kernel or the frame table.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InitError {
    #[error("failed to reserve the {what}: {source}")]
    Reservation {
        what: &'static str,
        source: ReserveError,
    },
    #[error("no usable memory behind the kernel image holds the frame table for {frames} frames")]
    TablePlacement { frames: usize },
}

/// The frame table violates one of its structural invariants.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("free frame {index} carries allocation flags")]
    DirtyFreeFrame { index: usize },
    #[error("reserved frame {index} is not marked used or carries allocation flags")]
    MalformedReservation { index: usize },
    #[error("allocation at frame {index} runs past the end of the table")]
    RunOutOfBounds { index: usize },
    #[error("frame {index} of the allocation headed by frame {head} is not a continuation")]
    BrokenRun { head: usize, index: usize },
    #[error("used frame {index} is neither reserved nor part of an allocation")]
    OrphanFrame { index: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        assert_eq!(
            FreeError::NotAllocated { index: 7 }.to_string(),
            "frame 7 is not allocated (double free?)"
        );
        let init = InitError::Reservation {
            what: "kernel image",
            source: ReserveError::OutOfBounds { index: 256, frames: 128 },
        };
        assert_eq!(
            init.to_string(),
            "failed to reserve the kernel image: \
             frame 256 lies outside the frame table (128 frames)"
        );
    }

    #[test]
    fn init_error_exposes_its_source() {
        use core::error::Error;

        let init = InitError::Reservation {
            what: "frame table",
            source: ReserveError::AlreadyReserved { index: 3 },
        };
        let source = init.source().map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("frame 3 is already reserved"));
    }
}
