//! # ELF Structures
//!
//! Decoded ELF file and program headers.
//!
//! Headers are never cast from raw memory. They are decoded field by field
//! from bytes fetched through a [`MemoryReader`](elfmap_hal::MemoryReader),
//! using the fixed layouts in [`layout`], so 32-bit, 64-bit and
//! big-endian targets all go through the same path.

pub mod layout;

use core::fmt;

// ============================================================================
// ELF CONSTANTS
// ============================================================================

/// ELF magic bytes
pub const ELF_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];

/// Offset of the class byte in `e_ident`
pub const EI_CLASS: usize = 4;
/// Offset of the data-encoding byte in `e_ident`
pub const EI_DATA: usize = 5;

/// ELF class: 32-bit
pub const ELFCLASS32: u8 = 1;
/// ELF class: 64-bit
pub const ELFCLASS64: u8 = 2;

/// ELF data: little-endian
pub const ELFDATA2LSB: u8 = 1;
/// ELF data: big-endian
pub const ELFDATA2MSB: u8 = 2;

/// ELF type: relocatable
pub const ET_REL: u16 = 1;
/// ELF type: executable
pub const ET_EXEC: u16 = 2;
/// ELF type: shared object (PIE)
pub const ET_DYN: u16 = 3;
/// ELF type: core file
pub const ET_CORE: u16 = 4;

/// Segment is executable
pub const PF_X: u32 = 1;
/// Segment is writable
pub const PF_W: u32 = 2;
/// Segment is readable
pub const PF_R: u32 = 4;

// ============================================================================
// FILE CLASS
// ============================================================================

/// Word size of an ELF module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitWidth {
    /// ELFCLASS32
    Elf32,
    /// ELFCLASS64
    Elf64,
}

impl BitWidth {
    /// Decode the `EI_CLASS` byte
    pub fn from_class(class: u8) -> Option<Self> {
        match class {
            ELFCLASS32 => Some(Self::Elf32),
            ELFCLASS64 => Some(Self::Elf64),
            _ => None,
        }
    }

    /// Width in bits
    pub fn bits(self) -> u32 {
        match self {
            Self::Elf32 => 32,
            Self::Elf64 => 64,
        }
    }
}

/// Byte order of an ELF module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endian {
    /// ELFDATA2LSB
    Little,
    /// ELFDATA2MSB
    Big,
}

impl Endian {
    /// Decode the `EI_DATA` byte
    pub fn from_data(data: u8) -> Option<Self> {
        match data {
            ELFDATA2LSB => Some(Self::Little),
            ELFDATA2MSB => Some(Self::Big),
            _ => None,
        }
    }
}

/// Object file type (`e_type`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    /// Relocatable object
    Rel,
    /// Fixed-address executable
    Exec,
    /// Shared object or position-independent executable
    Dyn,
    /// Core dump
    Core,
    /// Anything else
    Other(u16),
}

impl From<u16> for FileType {
    fn from(value: u16) -> Self {
        match value {
            ET_REL => Self::Rel,
            ET_EXEC => Self::Exec,
            ET_DYN => Self::Dyn,
            ET_CORE => Self::Core,
            other => Self::Other(other),
        }
    }
}

// ============================================================================
// SEGMENT TYPE
// ============================================================================

/// Program header type (`p_type`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentType {
    /// Unused entry
    Null,
    /// Loadable segment
    Load,
    /// Dynamic linking info
    Dynamic,
    /// Interpreter path
    Interp,
    /// Auxiliary notes
    Note,
    /// Reserved
    Shlib,
    /// Program header table
    Phdr,
    /// Thread-local storage template
    Tls,
    /// Exception handling frame table
    GnuEhFrame,
    /// Stack executability
    GnuStack,
    /// Read-only after relocation
    GnuRelro,
    /// Anything else
    Other(u32),
}

impl SegmentType {
    /// Raw value of PT_GNU_EH_FRAME
    pub const PT_GNU_EH_FRAME: u32 = 0x6474E550;
    /// Raw value of PT_GNU_STACK
    pub const PT_GNU_STACK: u32 = 0x6474E551;
    /// Raw value of PT_GNU_RELRO
    pub const PT_GNU_RELRO: u32 = 0x6474E552;

    /// Whether this segment places or re-protects pages in the address space
    pub fn shapes_memory(self) -> bool {
        matches!(self, Self::Load | Self::GnuRelro)
    }
}

impl From<u32> for SegmentType {
    fn from(value: u32) -> Self {
        match value {
            0 => Self::Null,
            1 => Self::Load,
            2 => Self::Dynamic,
            3 => Self::Interp,
            4 => Self::Note,
            5 => Self::Shlib,
            6 => Self::Phdr,
            7 => Self::Tls,
            Self::PT_GNU_EH_FRAME => Self::GnuEhFrame,
            Self::PT_GNU_STACK => Self::GnuStack,
            Self::PT_GNU_RELRO => Self::GnuRelro,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for SegmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Load => f.write_str("LOAD"),
            Self::Dynamic => f.write_str("DYNAMIC"),
            Self::Interp => f.write_str("INTERP"),
            Self::Note => f.write_str("NOTE"),
            Self::Shlib => f.write_str("SHLIB"),
            Self::Phdr => f.write_str("PHDR"),
            Self::Tls => f.write_str("TLS"),
            Self::GnuEhFrame => f.write_str("GNU_EH_FRAME"),
            Self::GnuStack => f.write_str("GNU_STACK"),
            Self::GnuRelro => f.write_str("GNU_RELRO"),
            Self::Other(v) => write!(f, "{v:#x}"),
        }
    }
}

// ============================================================================
// HEADERS
// ============================================================================

/// Decoded ELF file header, as found in target memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ehdr {
    /// Word size
    pub bit_width: BitWidth,
    /// Byte order
    pub endian: Endian,
    /// Object file type
    pub file_type: FileType,
    /// Target architecture (`e_machine`)
    pub machine: u16,
    /// Entry point virtual address
    pub entry: u64,
    /// Program header table offset from the header
    pub phoff: u64,
    /// Number of program headers
    pub phnum: u16,
    /// Size of one program header entry
    pub phentsize: u16,
    /// Address the header was found at
    pub base: u64,
}

impl Ehdr {
    /// Check if this is a PIE/shared object
    pub fn is_pie(&self) -> bool {
        self.file_type == FileType::Dyn
    }

    /// Address of program header `index`, if it does not overflow
    pub fn phdr_address(&self, index: u16) -> Option<u64> {
        let stride = u64::from(self.phentsize).checked_mul(u64::from(index))?;
        self.base.checked_add(self.phoff)?.checked_add(stride)
    }
}

/// Decoded ELF program header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Phdr {
    /// Segment type
    pub p_type: SegmentType,
    /// Segment flags (`PF_*`)
    pub flags: u32,
    /// Segment file offset
    pub offset: u64,
    /// Segment virtual address
    pub vaddr: u64,
    /// Segment size in file
    pub filesz: u64,
    /// Segment size in memory
    pub memsz: u64,
    /// Segment alignment
    pub align: u64,
}

impl Phdr {
    /// Check if this is a loadable segment
    pub fn is_loadable(&self) -> bool {
        self.p_type == SegmentType::Load
    }

    /// Check if readable
    pub fn is_readable(&self) -> bool {
        self.flags & PF_R != 0
    }

    /// Check if writable
    pub fn is_writable(&self) -> bool {
        self.flags & PF_W != 0
    }

    /// Check if executable
    pub fn is_executable(&self) -> bool {
        self.flags & PF_X != 0
    }
}
