//! # Physical Memory Address Types
//!
//! Strongly typed wrappers for physical addresses and the page frames they
//! fall into, used by the physical frame allocator and its boot collaborators.
//!
//! ## Overview
//!
//! | Type | Description |
//! |------|-------------|
//! | [`PhysicalAddress`] | A raw 64-bit physical address (RAM or MMIO). |
//! | [`PhysicalPage<S>`] | The page-aligned base of a physical page of size `S`. |
//!
//! Page frames are numbered from zero: frame `n` of size `S` covers the bytes
//! `n * S::SIZE .. (n + 1) * S::SIZE`. The frame number is what the allocator
//! uses to index its metadata table.
//!
//! ## Page Sizes
//!
//! The allocator works at 4 KiB granularity only; [`Size4K`] is the one marker
//! type implementing the sealed [`PageSize`] trait.
//!
//! ## Example
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let pa = PhysicalAddress::new(0x0012_3456);
//! let page = pa.page::<Size4K>();
//! assert_eq!(page.base().as_u64(), 0x0012_3000);
//! assert_eq!(page.number(), 0x123);
//! assert_eq!(PhysicalPage::<Size4K>::from_number(0x123), page);
//! assert_eq!(pa.align_up::<Size4K>(), Some(PhysicalAddress::new(0x0012_4000)));
//! ```
//!
//! ## Design Notes
//!
//! - The types are `#[repr(transparent)]` over `u64`, `Copy`, `Ord` and `Hash`.
//! - Alignment helpers are `const fn`; operations that can leave the 64-bit
//!   address space come in checked flavors only.

#![cfg_attr(not(any(test, doctest)), no_std)]

mod page_size;
mod physical_address;
mod physical_page;

pub use page_size::{PageSize, Size4K};
pub use physical_address::PhysicalAddress;
pub use physical_page::PhysicalPage;
