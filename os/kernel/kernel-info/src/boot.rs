//! # Boot Memory Map
//!
//! The loader hands the kernel the physical memory map exactly once, as an
//! array of BIOS `E820`-style records. The kernel only ever reads it.

use core::fmt;
use kernel_memory_addresses::PhysicalAddress;

/// Size of one raw memory map record in bytes.
pub const MEMORY_MAP_ENTRY_SIZE: usize = 24;

/// One raw memory map record as reported by the firmware.
///
/// Keep this `#[repr(C, packed)]`: the loader copies the firmware's records
/// verbatim and the kernel reinterprets the buffer.
#[repr(C, packed)]
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct MemoryMapEntry {
    /// Physical base address of the region.
    pub base: u64,

    /// Length of the region in **bytes**.
    pub length: u64,

    /// Region type code, see [`RegionKind`].
    pub kind: u32,

    /// ACPI 3.0 extended attributes, see [`AcpiAttributes`].
    pub acpi_attributes: u32,
}

const _: () = assert!(size_of::<MemoryMapEntry>() == MEMORY_MAP_ENTRY_SIZE);

impl MemoryMapEntry {
    #[must_use]
    pub const fn new(base: u64, length: u64, kind: RegionKind) -> Self {
        Self {
            base,
            length,
            kind: kind.code(),
            acpi_attributes: AcpiAttributes::new().with_do_not_ignore(true).into_bits(),
        }
    }

    /// Decode a record from its little-endian wire form.
    #[must_use]
    pub fn from_bytes(bytes: &[u8; MEMORY_MAP_ENTRY_SIZE]) -> Self {
        Self {
            base: u64::from_le_bytes(field(bytes, 0)),
            length: u64::from_le_bytes(field(bytes, 8)),
            kind: u32::from_le_bytes(field(bytes, 16)),
            acpi_attributes: u32::from_le_bytes(field(bytes, 20)),
        }
    }
}

fn field<const N: usize>(bytes: &[u8; MEMORY_MAP_ENTRY_SIZE], at: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[at..at + N]);
    out
}

impl fmt::Debug for MemoryMapEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (base, length, kind, attrs) = (self.base, self.length, self.kind, self.acpi_attributes);
        f.debug_struct("MemoryMapEntry")
            .field("base", &format_args!("{base:#x}"))
            .field("length", &format_args!("{length:#x}"))
            .field("kind", &RegionKind::from_code(kind))
            .field("acpi_attributes", &AcpiAttributes::from_bits(attrs))
            .finish()
    }
}

/// Memory map location handed over by the loader.
#[repr(C)]
#[derive(Clone, Debug)]
pub struct MemoryMapInfo {
    /// Physical (identity mapped) address of the first [`MemoryMapEntry`].
    /// Pass 0 if no memory map could be obtained.
    pub entries_ptr: u64,

    /// Number of records; zero means "no memory map available".
    pub entry_count: u32,
}

impl MemoryMapInfo {
    /// The raw records.
    ///
    /// # Safety
    /// `entries_ptr` must point to `entry_count` readable records that stay
    /// valid and unmodified for `'a`.
    #[allow(unsafe_code)]
    #[must_use]
    pub unsafe fn entries<'a>(&self) -> &'a [MemoryMapEntry] {
        if self.entries_ptr == 0 || self.entry_count == 0 {
            return &[];
        }

        // SAFETY: Caller guarantees the buffer; records are align(1).
        unsafe {
            core::slice::from_raw_parts(
                self.entries_ptr as *const MemoryMapEntry,
                self.entry_count as usize,
            )
        }
    }
}

/// Decoded type of a memory region.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RegionKind {
    /// Usable RAM.
    Normal,
    /// Firmware reserved, never usable.
    Reserved,
    /// ACPI tables; reclaimable once they were parsed.
    AcpiReclaimable,
    /// ACPI non-volatile storage.
    AcpiNvs,
    /// Defective RAM.
    Bad,
    /// Any code this kernel does not know about; treated like [`Reserved`](Self::Reserved).
    Unknown(u32),
}

impl RegionKind {
    #[must_use]
    pub const fn from_code(code: u32) -> Self {
        match code {
            1 => Self::Normal,
            2 => Self::Reserved,
            3 => Self::AcpiReclaimable,
            4 => Self::AcpiNvs,
            5 => Self::Bad,
            other => Self::Unknown(other),
        }
    }

    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::Normal => 1,
            Self::Reserved => 2,
            Self::AcpiReclaimable => 3,
            Self::AcpiNvs => 4,
            Self::Bad => 5,
            Self::Unknown(code) => code,
        }
    }

    /// Human-readable name used in the boot memory map listing.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Normal => "Available",
            Self::Reserved => "Reserved",
            Self::AcpiReclaimable => "ACPI Reclaimable",
            Self::AcpiNvs => "ACPI NVS",
            Self::Bad => "Bad",
            Self::Unknown(_) => "Unknown",
        }
    }
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// ACPI 3.0 extended attributes of a memory map record.
#[bitfield_struct::bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct AcpiAttributes {
    /// Bit 0: if clear, ACPI 3.0 says the entry should be ignored.
    pub do_not_ignore: bool,
    /// Bit 1: the region is non-volatile.
    pub non_volatile: bool,
    #[bits(30)]
    __: u32,
}

/// A decoded memory map record.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MemoryRegion {
    pub base: PhysicalAddress,
    pub length: u64,
    pub kind: RegionKind,
    pub attributes: AcpiAttributes,
}

impl MemoryRegion {
    #[must_use]
    pub const fn new(base: u64, length: u64, kind: RegionKind) -> Self {
        Self {
            base: PhysicalAddress::new(base),
            length,
            kind,
            attributes: AcpiAttributes::new().with_do_not_ignore(true),
        }
    }

    /// One past the last byte of the region, saturating at the top of the address space.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.base.as_u64().saturating_add(self.length)
    }

    /// Whether the region is general-purpose RAM.
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        matches!(self.kind, RegionKind::Normal)
    }
}

impl From<MemoryMapEntry> for MemoryRegion {
    fn from(entry: MemoryMapEntry) -> Self {
        let (base, length, kind, attrs) =
            (entry.base, entry.length, entry.kind, entry.acpi_attributes);
        Self {
            base: PhysicalAddress::new(base),
            length,
            kind: RegionKind::from_code(kind),
            attributes: AcpiAttributes::from_bits(attrs),
        }
    }
}
