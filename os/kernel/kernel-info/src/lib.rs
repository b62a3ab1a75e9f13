//! # Kernel Configuration and Boot Interface
//!
//! This crate defines the data structures and memory layout constants shared
//! between the boot collaborator (the loader that probes physical memory) and
//! the kernel's physical memory manager.
//!
//! ## Architecture
//!
//! ### Boot Information ([`boot`])
//! Defines the loader-to-kernel memory map handoff:
//! * **Raw Records**: the 24-byte `{base, length, type, attributes}` entry as the
//!   firmware reports it ([`MemoryMapEntry`](boot::MemoryMapEntry))
//! * **Decoded Regions**: typed [`MemoryRegion`](boot::MemoryRegion) values with a
//!   [`RegionKind`](boot::RegionKind) and decoded ACPI attribute flags
//! * **ABI Stability**: `#[repr(C)]` structures for cross-component communication
//!
//! ### Memory Layout ([`memory`])
//! Establishes where the kernel lives:
//! * **Load Address**: the kernel image is placed at [`PHYS_LOAD`](memory::PHYS_LOAD)
//! * **Kernel Image Bounds**: [`KernelImage`](memory::KernelImage), sourced from
//!   the linker on the bare-metal target
//! * **Physical Memory Mapping**: HHDM (Higher Half Direct Mapping) base
//!
//! ## Physical Memory Layout
//!
//! ```text
//! Physical Memory Layout:
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │     Low Memory (< 1MiB)         │
//!             │  (BIOS, VGA, DMA buffers)       │
//! PHYS_LOAD   ├─────────────────────────────────┤ 0x0010_0000 (1 MiB)
//!             │       Kernel Image              │
//!             │   (Text, Data, BSS)             │
//!             ├─────────────────────────────────┤ align_up(kernel end)
//!             │       Frame Table               │
//!             ├─────────────────────────────────┤
//!             │    Available RAM                │
//!             │  (Managed by allocator)         │
//!             └─────────────────────────────────┘
//! ```
//!
//! Everything below the kernel image, the image itself and the frame table are
//! permanently reserved by the frame allocator before it serves any request.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod boot;
pub mod memory;
