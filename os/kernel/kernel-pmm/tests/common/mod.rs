#![allow(dead_code)]

use kernel_memory_addresses::PhysicalAddress;
use kernel_pmm::{FRAME_SIZE, FrameAllocatorConfig, MisusePolicy, PhysMapper};

/// Fill byte of fresh arena memory, so zero-filling is observable.
pub const GARBAGE: u8 = 0xA5;

#[derive(Copy, Clone)]
#[repr(C, align(4096))]
struct Frame([u8; FRAME_SIZE]);

/// Simulated physical memory: physical address 0 is the first arena byte.
///
/// The arena is leaked so that copies of the mapper can outlive any test scope.
#[derive(Copy, Clone)]
pub struct ArenaMapper {
    base: *mut u8,
    len: usize,
}

impl ArenaMapper {
    pub fn new(frames: usize) -> Self {
        let arena: &'static mut [Frame] = Vec::leak(vec![Frame([GARBAGE; FRAME_SIZE]); frames]);
        Self {
            base: arena.as_mut_ptr().cast(),
            len: frames * FRAME_SIZE,
        }
    }

    fn offset(&self, pa: PhysicalAddress, bytes: usize) -> usize {
        let offset = usize::try_from(pa.as_u64()).unwrap();
        assert!(offset + bytes <= self.len, "{pa} (+{bytes:#x}) lies outside the arena");
        offset
    }

    /// The bytes of `frames` frames starting at `pa`.
    pub fn bytes(&self, pa: PhysicalAddress, frames: usize) -> Vec<u8> {
        let offset = self.offset(pa, frames * FRAME_SIZE);
        unsafe { std::slice::from_raw_parts(self.base.add(offset), frames * FRAME_SIZE) }.to_vec()
    }

    /// Overwrite `frames` frames starting at `pa` with `byte`.
    pub fn fill(&self, pa: PhysicalAddress, frames: usize, byte: u8) {
        let offset = self.offset(pa, frames * FRAME_SIZE);
        unsafe { self.base.add(offset).write_bytes(byte, frames * FRAME_SIZE) };
    }

    pub fn is_zeroed(&self, pa: PhysicalAddress, frames: usize) -> bool {
        self.bytes(pa, frames).iter().all(|&b| b == 0)
    }
}

unsafe impl PhysMapper for ArenaMapper {
    unsafe fn phys_to_ptr<T>(&self, pa: PhysicalAddress) -> *mut T {
        let offset = self.offset(pa, 0);
        unsafe { self.base.add(offset).cast() }
    }
}

/// Misuse is reported, independent of the `halt-on-misuse` feature.
pub fn reporting() -> FrameAllocatorConfig {
    FrameAllocatorConfig::default().with_misuse(MisusePolicy::Report)
}

pub fn pa(addr: u64) -> PhysicalAddress {
    PhysicalAddress::new(addr)
}
