//! # Header Locator
//!
//! Finds and decodes the ELF header of the module containing an address.
//!
//! ```text
//!   hint ──▶ align down ──▶ read 4 bytes ──▶ "\x7FELF"? ──yes──▶ decode Ehdr
//!                 ▲                              │
//!                 └──────── one page lower ◀─no──┘   (bounded)
//! ```
//!
//! A module's ELF header is mapped at the start of its first page, so
//! walking page boundaries downwards from any interior pointer reaches it.

use alloc::vec::Vec;

use elfmap_hal::{MemoryReader, PageSize};

use crate::config::MapperConfig;
use crate::elf::layout::{decode_ehdr, decode_phdr, MAX_EHDR_SIZE, MAX_PHDR_SIZE};
use crate::elf::{BitWidth, Ehdr, Endian, Phdr, EI_CLASS, ELF_MAGIC};
use crate::{Error, Result};

// ============================================================================
// BACKWARD SCAN
// ============================================================================

/// Scan downwards from `hint` for a page starting with the ELF magic
///
/// Examines at most `max_pages` page boundaries with exactly one read each,
/// stopping early at address zero. Unreadable pages are skipped.
pub fn find_header_base<R: MemoryReader>(
    reader: &R,
    hint: u64,
    page_size: PageSize,
    max_pages: usize,
) -> Result<u64> {
    let mut candidate = page_size.align_down(hint);
    let mut scanned = 0usize;

    while scanned < max_pages {
        scanned += 1;
        match reader.read_array::<4>(candidate) {
            Ok(magic) if magic == ELF_MAGIC => {
                log::debug!("ELF header for {:#x} found at {:#x}", hint, candidate);
                return Ok(candidate);
            },
            Ok(_) => {},
            Err(fault) => log::trace!("header scan: {}", fault),
        }

        match candidate.checked_sub(page_size.size()) {
            Some(next) => candidate = next,
            None => break,
        }
    }

    log::warn!("could not find ELF base below {:#x} ({} pages scanned)", hint, scanned);
    Err(Error::NotFound { hint, scanned })
}

// ============================================================================
// HEADER DECODING
// ============================================================================

/// Decode the ELF header located at `base`
///
/// `base` must already hold the ELF magic.
pub fn decode_header<R: MemoryReader>(reader: &R, base: u64) -> Result<(BitWidth, Ehdr)> {
    let addr = base.checked_add(EI_CLASS as u64).ok_or(Error::MalformedHeader {
        base,
        reason: "header wraps the address space",
    })?;
    let [class, data] = reader.read_array::<2>(addr)?;

    let bit_width = BitWidth::from_class(class).ok_or(Error::MalformedHeader {
        base,
        reason: "class byte is neither ELFCLASS32 nor ELFCLASS64",
    })?;
    let endian = Endian::from_data(data).ok_or(Error::MalformedHeader {
        base,
        reason: "data byte is neither ELFDATA2LSB nor ELFDATA2MSB",
    })?;

    let layout = bit_width.ehdr_layout();
    let mut buf = [0u8; MAX_EHDR_SIZE];
    reader.read(base, &mut buf[..layout.size])?;
    let ehdr = decode_ehdr(&buf[..layout.size], bit_width, endian, base).ok_or(
        Error::MalformedHeader {
            base,
            reason: "header shorter than its class requires",
        },
    )?;

    if ehdr.phnum != 0 && usize::from(ehdr.phentsize) < bit_width.phdr_layout().size {
        return Err(Error::MalformedHeader {
            base,
            reason: "program header entries smaller than the format requires",
        });
    }

    log::debug!(
        "ELF{} {:?} header at {:#x}: type {:?}, {} program headers at +{:#x}",
        bit_width.bits(),
        endian,
        base,
        ehdr.file_type,
        ehdr.phnum,
        ehdr.phoff
    );

    Ok((bit_width, ehdr))
}

/// Locate and decode the ELF header of the module containing `hint`
///
/// Every failure means "no usable ELF module at this address": an exhausted
/// scan or an unreadable header is `NotFound`, bad identification bytes are
/// `MalformedHeader`.
pub fn locate_and_decode<R: MemoryReader>(
    reader: &R,
    hint: u64,
    config: &MapperConfig,
) -> Result<(BitWidth, Ehdr)> {
    let base = find_header_base(reader, hint, config.page_size, config.max_scan_pages)?;

    decode_header(reader, base).map_err(|err| match err {
        Error::ReadFault(fault) => {
            log::debug!("ELF header at {:#x} unreadable: {}", base, fault);
            let pages_below = (config.page_size.align_down(hint) - base) / config.page_size.size();
            let scanned = pages_below as usize + 1;
            Error::NotFound { hint, scanned }
        },
        other => other,
    })
}

// ============================================================================
// PROGRAM HEADER TABLE
// ============================================================================

/// Program headers read from target memory
///
/// Entries that could not be read are left out and their indices recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhdrTable {
    entries: Vec<Phdr>,
    skipped: Vec<u16>,
}

impl PhdrTable {
    /// Decoded entries, in table order
    pub fn entries(&self) -> &[Phdr] {
        &self.entries
    }

    /// Indices of entries that could not be read
    pub fn skipped(&self) -> &[u16] {
        &self.skipped
    }

    /// Number of decoded entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no entry was decoded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `PartialTable` if any entry was skipped
    pub fn partial(&self) -> Option<Error> {
        if self.skipped.is_empty() {
            None
        } else {
            Some(Error::PartialTable {
                decoded: self.entries.len(),
                skipped: self.skipped.len(),
            })
        }
    }

    /// Iterate over decoded entries
    pub fn iter(&self) -> core::slice::Iter<'_, Phdr> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a PhdrTable {
    type Item = &'a Phdr;
    type IntoIter = core::slice::Iter<'a, Phdr>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Read every program header described by `ehdr`
pub fn program_headers<R: MemoryReader>(reader: &R, ehdr: &Ehdr) -> PhdrTable {
    let layout = ehdr.bit_width.phdr_layout();
    let mut table = PhdrTable {
        entries: Vec::with_capacity(usize::from(ehdr.phnum)),
        skipped: Vec::new(),
    };
    let mut buf = [0u8; MAX_PHDR_SIZE];

    for index in 0..ehdr.phnum {
        let Some(addr) = ehdr.phdr_address(index) else {
            log::warn!("program header {} of {:#x} lies past the address space", index, ehdr.base);
            table.skipped.push(index);
            continue;
        };

        match reader.read(addr, &mut buf[..layout.size]) {
            Ok(()) => match decode_phdr(&buf[..layout.size], ehdr.bit_width, ehdr.endian) {
                Some(phdr) => table.entries.push(phdr),
                None => table.skipped.push(index),
            },
            Err(fault) => {
                log::warn!("skipping program header {} of {:#x}: {}", index, ehdr.base, fault);
                table.skipped.push(index);
            },
        }
    }

    table
}

// ============================================================================
// TESTS
// ============================================================================
