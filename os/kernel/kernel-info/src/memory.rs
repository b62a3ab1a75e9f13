//! # Memory Layout

use kernel_memory_addresses::PhysicalAddress;

/// A simple Higher Half Direct Map (HHDM) base.
/// Anything you map at [`HHDM_BASE`] + `pa` lets the kernel
/// access physical memory via a fixed offset.
pub const HHDM_BASE: u64 = 0xffff_8880_0000_0000;

/// Where the kernel executes (VMA), matches the linker script.
pub const KERNEL_BASE: u64 = 0xffff_ffff_8000_0000;

/// Where the kernel image bytes are placed in *physical* memory (LMA).
pub const PHYS_LOAD: u64 = 0x0010_0000; // 1 MiB

const _: () = {
    assert!(PHYS_LOAD.is_multiple_of(4096));
    assert!(KERNEL_BASE > HHDM_BASE);
};

/// Physical bounds of the loaded kernel image (text, data and bss).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KernelImage {
    /// First byte of the image.
    pub start: PhysicalAddress,
    /// One past the last byte of the image.
    pub end: PhysicalAddress,
}

impl KernelImage {
    #[must_use]
    pub const fn new(start: PhysicalAddress, end: PhysicalAddress) -> Self {
        assert!(start.as_u64() <= end.as_u64(), "kernel image ends before it starts");
        Self { start, end }
    }

    /// Image size in bytes.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.end.as_u64() - self.start.as_u64()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the image bounds from the `__kernel_start` / `__kernel_end` linker
    /// symbols, translated from the kernel's link address to its load address.
    #[cfg(target_os = "none")]
    #[allow(unsafe_code)]
    #[must_use]
    pub fn from_linker() -> Self {
        unsafe extern "C" {
            static __kernel_start: u8;
            static __kernel_end: u8;
        }

        #[allow(unused_unsafe)]
        // SAFETY: Only the symbol addresses are taken, the bytes are never read.
        let (start, end) = unsafe {
            (
                (&raw const __kernel_start) as u64,
                (&raw const __kernel_end) as u64,
            )
        };

        let to_phys = |va: u64| PhysicalAddress::new(va - KERNEL_BASE + PHYS_LOAD);
        Self::new(to_phys(start), to_phys(end))
    }
}
