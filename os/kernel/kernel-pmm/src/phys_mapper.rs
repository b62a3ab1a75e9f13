//! # Physical Memory Access
//!
//! The frame allocator manages *physical* frames but has to touch their bytes
//! twice: once to build the frame table inside RAM, and on every allocation to
//! hand out zero-filled frames. [`PhysMapper`] converts a physical address into
//! a pointer in the current address space; how that happens (identity map,
//! higher-half direct map, a test arena) is up to the implementation.
//!
//! ## Implementations
//! - [`HhdmPhysMapper`]: every physical address is mapped at `HHDM_BASE + pa`.
//! - [`IdentityPhysMapper`]: physical and virtual addresses coincide, as they
//!   do before paging is enabled.

use crate::FRAME_SIZE;
use kernel_info::memory::HHDM_BASE;
use kernel_memory_addresses::PhysicalAddress;

/// Converts physical addresses to usable pointers in the current address space.
///
/// # Safety
/// Implementations must return pointers that are valid for reads and writes of
/// every physical address the caller hands in, for as long as the mapper is
/// used. The frame allocator relies on this for every frame in its table.
pub unsafe trait PhysMapper {
    /// Pointer to the byte at physical address `pa`, typed as `T`.
    ///
    /// # Safety
    /// `pa` must be covered by the mapping.
    unsafe fn phys_to_ptr<T>(&self, pa: PhysicalAddress) -> *mut T;

    /// View `len` consecutive `T` starting at `pa`.
    ///
    /// # Safety
    /// - The range must be covered by the mapping and suitably aligned for `T`.
    /// - Nothing else may access the range for `'a`.
    /// - The bytes must be a valid `[T]`.
    unsafe fn phys_to_slice_mut<'a, T>(&self, pa: PhysicalAddress, len: usize) -> &'a mut [T] {
        // SAFETY: Forwarded to the caller.
        unsafe { core::slice::from_raw_parts_mut(self.phys_to_ptr::<T>(pa), len) }
    }

    /// Fill `count` frames starting at `pa` with zeros.
    ///
    /// # Safety
    /// The frames must be covered by the mapping and not in use by anyone else.
    unsafe fn zero_frames(&self, pa: PhysicalAddress, count: usize) {
        // SAFETY: Forwarded to the caller.
        unsafe { core::ptr::write_bytes(self.phys_to_ptr::<u8>(pa), 0, count * FRAME_SIZE) }
    }
}

/// [`PhysMapper`] implementation for kernels with a higher-half direct map (HHDM).
///
/// # Safety
/// - The HHDM mapping must be present and cover the referenced physical range.
/// - The returned pointer must only be used for valid, mapped, and writable memory.
pub struct HhdmPhysMapper;

// SAFETY: The HHDM covers all of physical memory once paging is set up.
unsafe impl PhysMapper for HhdmPhysMapper {
    unsafe fn phys_to_ptr<T>(&self, pa: PhysicalAddress) -> *mut T {
        (HHDM_BASE + pa.as_u64()) as *mut T
    }
}

/// [`PhysMapper`] for identity-mapped (or unpaged) physical memory.
pub struct IdentityPhysMapper;

// SAFETY: Without paging, or under an identity map, physical addresses are pointers.
unsafe impl PhysMapper for IdentityPhysMapper {
    unsafe fn phys_to_ptr<T>(&self, pa: PhysicalAddress) -> *mut T {
        pa.as_u64() as *mut T
    }
}
