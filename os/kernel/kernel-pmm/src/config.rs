//! # Frame Allocator Configuration

/// What to do when a caller violates an operation's preconditions
/// (double free, freeing a continuation frame, double reservation, ...).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MisusePolicy {
    /// Log the diagnostic and return the error to the caller.
    Report,
    /// Log the diagnostic and panic.
    Halt,
}

impl Default for MisusePolicy {
    fn default() -> Self {
        if cfg!(feature = "halt-on-misuse") {
            Self::Halt
        } else {
            Self::Report
        }
    }
}

/// How the number of frame table entries is derived from the memory map.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum TableSizing {
    /// Sum of all usable (`Normal`) region lengths.
    ///
    /// When usable regions are separated by holes, usable frames above the
    /// summed total are not representable and are never handed out.
    #[default]
    UsableBytes,
    /// End address of the highest usable region.
    ///
    /// Covers every usable frame. Holes below that address become table
    /// entries too; they are reserved during initialization.
    HighestUsableAddress,
}

/// Runtime knobs of the [`FrameAllocator`](crate::FrameAllocator).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct FrameAllocatorConfig {
    pub misuse: MisusePolicy,
    pub sizing: TableSizing,
}

impl FrameAllocatorConfig {
    #[must_use]
    pub const fn new(misuse: MisusePolicy, sizing: TableSizing) -> Self {
        Self { misuse, sizing }
    }

    #[must_use]
    pub const fn with_misuse(mut self, misuse: MisusePolicy) -> Self {
        self.misuse = misuse;
        self
    }

    #[must_use]
    pub const fn with_sizing(mut self, sizing: TableSizing) -> Self {
        self.sizing = sizing;
        self
    }
}
