//! # Header Layouts
//!
//! Byte layouts of the ELF32/ELF64 file and program headers.
//!
//! Offsets and widths are format constants from the System V gABI. The
//! 32-bit program header moves `p_flags` after the size fields, which is why
//! each field carries its own offset instead of being derived from a struct.

use static_assertions::const_assert_eq;

use super::{BitWidth, Ehdr, Endian, FileType, Phdr, SegmentType};

/// Location of one header field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Byte offset from the start of the header
    pub offset: usize,
    /// Width in bytes (2, 4 or 8)
    pub width: usize,
}

const fn field(offset: usize, width: usize) -> Field {
    Field { offset, width }
}

/// File header layout
#[derive(Debug, Clone, Copy)]
pub struct EhdrLayout {
    /// Total header size
    pub size: usize,
    /// `e_type`
    pub e_type: Field,
    /// `e_machine`
    pub e_machine: Field,
    /// `e_entry`
    pub e_entry: Field,
    /// `e_phoff`
    pub e_phoff: Field,
    /// `e_phentsize`
    pub e_phentsize: Field,
    /// `e_phnum`
    pub e_phnum: Field,
}

/// Program header layout
#[derive(Debug, Clone, Copy)]
pub struct PhdrLayout {
    /// Total entry size
    pub size: usize,
    /// `p_type`
    pub p_type: Field,
    /// `p_flags`
    pub p_flags: Field,
    /// `p_offset`
    pub p_offset: Field,
    /// `p_vaddr`
    pub p_vaddr: Field,
    /// `p_filesz`
    pub p_filesz: Field,
    /// `p_memsz`
    pub p_memsz: Field,
    /// `p_align`
    pub p_align: Field,
}

/// `Elf32_Ehdr`
pub const EHDR32: EhdrLayout = EhdrLayout {
    size: 52,
    e_type: field(16, 2),
    e_machine: field(18, 2),
    e_entry: field(24, 4),
    e_phoff: field(28, 4),
    e_phentsize: field(42, 2),
    e_phnum: field(44, 2),
};

/// `Elf64_Ehdr`
pub const EHDR64: EhdrLayout = EhdrLayout {
    size: 64,
    e_type: field(16, 2),
    e_machine: field(18, 2),
    e_entry: field(24, 8),
    e_phoff: field(32, 8),
    e_phentsize: field(54, 2),
    e_phnum: field(56, 2),
};

/// `Elf32_Phdr`
pub const PHDR32: PhdrLayout = PhdrLayout {
    size: 32,
    p_type: field(0, 4),
    p_offset: field(4, 4),
    p_vaddr: field(8, 4),
    p_filesz: field(16, 4),
    p_memsz: field(20, 4),
    p_flags: field(24, 4),
    p_align: field(28, 4),
};

/// `Elf64_Phdr`
pub const PHDR64: PhdrLayout = PhdrLayout {
    size: 56,
    p_type: field(0, 4),
    p_flags: field(4, 4),
    p_offset: field(8, 8),
    p_vaddr: field(16, 8),
    p_filesz: field(32, 8),
    p_memsz: field(40, 8),
    p_align: field(48, 8),
};

/// Largest header size across both classes
pub const MAX_EHDR_SIZE: usize = EHDR64.size;
/// Largest program header size across both classes
pub const MAX_PHDR_SIZE: usize = PHDR64.size;

const_assert_eq!(EHDR32.size, 52);
const_assert_eq!(EHDR64.size, 64);
const_assert_eq!(PHDR32.size, 32);
const_assert_eq!(PHDR64.size, 56);
const_assert_eq!(EHDR64.e_phnum.offset + EHDR64.e_phnum.width, 58);
const_assert_eq!(PHDR32.p_align.offset + PHDR32.p_align.width, PHDR32.size);
const_assert_eq!(PHDR64.p_align.offset + PHDR64.p_align.width, PHDR64.size);

impl BitWidth {
    /// File header layout for this class
    pub fn ehdr_layout(self) -> &'static EhdrLayout {
        match self {
            Self::Elf32 => &EHDR32,
            Self::Elf64 => &EHDR64,
        }
    }

    /// Program header layout for this class
    pub fn phdr_layout(self) -> &'static PhdrLayout {
        match self {
            Self::Elf32 => &PHDR32,
            Self::Elf64 => &PHDR64,
        }
    }
}

// ============================================================================
// FIELD DECODING
// ============================================================================

/// Read one field out of a header buffer
///
/// The buffer must cover the whole header; layouts guarantee every field
/// lies inside `size`.
fn read_field(bytes: &[u8], f: Field, endian: Endian) -> u64 {
    let raw = &bytes[f.offset..f.offset + f.width];
    let mut acc = 0u64;
    match endian {
        Endian::Little => {
            for &b in raw.iter().rev() {
                acc = (acc << 8) | u64::from(b);
            }
        },
        Endian::Big => {
            for &b in raw {
                acc = (acc << 8) | u64::from(b);
            }
        },
    }
    acc
}

/// Decode a file header from its raw bytes
///
/// Returns `None` if `bytes` is shorter than the header of `bit_width`.
pub fn decode_ehdr(
    bytes: &[u8],
    bit_width: BitWidth,
    endian: Endian,
    base: u64,
) -> Option<Ehdr> {
    let l = bit_width.ehdr_layout();
    if bytes.len() < l.size {
        return None;
    }
    Some(Ehdr {
        bit_width,
        endian,
        file_type: FileType::from(read_field(bytes, l.e_type, endian) as u16),
        machine: read_field(bytes, l.e_machine, endian) as u16,
        entry: read_field(bytes, l.e_entry, endian),
        phoff: read_field(bytes, l.e_phoff, endian),
        phnum: read_field(bytes, l.e_phnum, endian) as u16,
        phentsize: read_field(bytes, l.e_phentsize, endian) as u16,
        base,
    })
}

/// Decode a program header from its raw bytes
///
/// Returns `None` if `bytes` is shorter than the entry of `bit_width`.
pub fn decode_phdr(bytes: &[u8], bit_width: BitWidth, endian: Endian) -> Option<Phdr> {
    let l = bit_width.phdr_layout();
    if bytes.len() < l.size {
        return None;
    }
    Some(Phdr {
        p_type: SegmentType::from(read_field(bytes, l.p_type, endian) as u32),
        flags: read_field(bytes, l.p_flags, endian) as u32,
        offset: read_field(bytes, l.p_offset, endian),
        vaddr: read_field(bytes, l.p_vaddr, endian),
        filesz: read_field(bytes, l.p_filesz, endian),
        memsz: read_field(bytes, l.p_memsz, endian),
        align: read_field(bytes, l.p_align, endian),
    })
}
