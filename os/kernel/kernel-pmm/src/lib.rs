//! # Kernel Physical Memory Manager
//!
//! Tracks every 4 KiB physical page frame of the machine and hands out
//! physically contiguous, zero-filled runs of frames. It is the first memory
//! manager to come up during boot and depends on nothing but the firmware
//! memory map and the kernel image bounds.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              Frame Allocator                        │
//! │    • Boot reservations                              │
//! │    • First-fit allocation, free, reserve            │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │              Frame Table                            │
//! │    • One 32-bit descriptor per frame                │
//! │    • Lives in usable RAM behind the kernel image    │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │              Physical Mapper                        │
//! │    • Physical-to-virtual address translation        │
//! │    • Zero-filling of frames                         │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Components
//!
//! ### Frame Allocator ([`allocator`])
//!
//! Builds the frame table from the boot memory map, reserves low memory, the
//! kernel image, the table and all firmware regions, then serves
//! [`allocate_one`](FrameAllocator::allocate_one),
//! [`allocate_many`](FrameAllocator::allocate_many),
//! [`free`](FrameAllocator::free) and [`reserve`](FrameAllocator::reserve).
//!
//! ### Frame Table ([`table`], [`descriptor`])
//!
//! A frame is free, part of an allocation, or reserved. The first frame of an
//! allocation records how many frames follow it, which is all `free` needs.
//!
//! ### Memory Map Ingestion and Reporting ([`ingest`], [`report`])
//!
//! Sizes the table from the memory map and prints the map and usage figures
//! through the `log` facade.
//!
//! ## Usage
//!
//! ```rust
//! use core::num::NonZeroUsize;
//! use kernel_memory_addresses::PhysicalAddress;
//! use kernel_pmm::{
//!     FrameAllocator, FrameAllocatorConfig, FrameDescriptor, FrameTable, HhdmPhysMapper,
//! };
//!
//! let mut storage = [FrameDescriptor::FREE; 16];
//! let table = FrameTable::new(&mut storage);
//! let config = FrameAllocatorConfig::default();
//! let mut pmm = unsafe { FrameAllocator::from_table(table, HhdmPhysMapper, config) };
//!
//! pmm.reserve("firmware", PhysicalAddress::new(0x2000), 4).unwrap();
//! assert_eq!(pmm.count_frames(true), 4);
//! assert!(pmm.reserve("again", PhysicalAddress::new(0x3000), 1).is_err());
//! ```
//!
//! During boot the allocator is built from the firmware memory map instead:
//!
//! ```rust,no_run
//! use kernel_info::boot::{MemoryMapInfo, MemoryRegion};
//! use kernel_info::memory::KernelImage;
//! use kernel_memory_addresses::PhysicalAddress;
//! use kernel_pmm::{FrameAllocator, FrameAllocatorConfig, IdentityPhysMapper};
//!
//! # let info = MemoryMapInfo { entries_ptr: 0, entry_count: 0 };
//! # let (start, end) = (PhysicalAddress::new(0x10_0000), PhysicalAddress::new(0x12_0000));
//! # let kernel = KernelImage::new(start, end);
//! let entries = unsafe { info.entries() };
//! let regions = entries.iter().copied().map(MemoryRegion::from);
//! let config = FrameAllocatorConfig::default();
//! let pmm = unsafe { FrameAllocator::init(regions, kernel, IdentityPhysMapper, config) };
//! let Ok(mut pmm) = pmm else { panic!("cannot set up physical memory") };
//! let frame = pmm.allocate_one();
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod allocator;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod ingest;
pub mod phys_mapper;
pub mod report;
pub mod table;

pub use allocator::FrameAllocator;
pub use config::{FrameAllocatorConfig, MisusePolicy, TableSizing};
pub use descriptor::{FrameDescriptor, MAX_RUN_LENGTH};
pub use error::{FreeError, InitError, InvariantViolation, ReserveError};
pub use ingest::MemoryMapSummary;
pub use phys_mapper::{HhdmPhysMapper, IdentityPhysMapper, PhysMapper};
pub use report::{ByteSize, MemoryUsage};
pub use table::{FrameTable, MAX_TABLE_FRAMES, OutOfBounds};

use kernel_memory_addresses::{PageSize, Size4K};

/// Size of a physical page frame in bytes.
pub const FRAME_SIZE: usize = 4096;

const _: () = assert!(FRAME_SIZE as u64 == Size4K::SIZE);
