//! # Pages
//!
//! Output records of the page map builder.

use alloc::string::String;
use core::fmt;

use crate::elf::{PF_R, PF_W, PF_X};

bitflags::bitflags! {
    /// Page access permissions
    ///
    /// Bit values match the ELF `PF_*` segment flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PageFlags: u32 {
        /// Executable
        const EXECUTE = PF_X;
        /// Writable
        const WRITE = PF_W;
        /// Readable
        const READ = PF_R;
    }
}

impl PageFlags {
    /// Convert ELF segment flags, dropping processor/OS-specific bits
    pub fn from_elf(p_flags: u32) -> Self {
        Self::from_bits_truncate(p_flags)
    }

    /// Apply a later segment's permissions to an already-mapped page
    ///
    /// The new flags replace the old ones, except that execute permission
    /// is never withdrawn: loaders map read-only views over code without
    /// clearing it.
    pub fn overlay(self, later: Self) -> Self {
        later | (self & Self::EXECUTE)
    }
}

impl fmt::Display for PageFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bit = |flag: Self, c: char| if self.contains(flag) { c } else { '-' };
        write!(
            f,
            "{}{}{}",
            bit(Self::READ, 'r'),
            bit(Self::WRITE, 'w'),
            bit(Self::EXECUTE, 'x')
        )
    }
}

/// A page-aligned range of target memory with uniform permissions
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Page {
    /// Start address
    pub vaddr: u64,
    /// Size in bytes
    pub memsz: u64,
    /// Permissions
    pub flags: PageFlags,
    /// Offset of the backing bytes in the object file
    pub offset: u64,
    /// Object file the page belongs to
    pub objfile: String,
    /// False for synthetic no-access pages filling holes between segments
    pub backed: bool,
}

impl Page {
    /// Create a segment-backed page
    pub fn new(vaddr: u64, memsz: u64, flags: PageFlags, offset: u64) -> Self {
        Self {
            vaddr,
            memsz,
            flags,
            offset,
            objfile: String::new(),
            backed: true,
        }
    }

    /// Create a no-access page covering a hole
    pub fn gap(vaddr: u64, memsz: u64, offset: u64) -> Self {
        Self {
            backed: false,
            ..Self::new(vaddr, memsz, PageFlags::empty(), offset)
        }
    }

    /// Start address
    #[inline]
    pub fn start(&self) -> u64 {
        self.vaddr
    }

    /// One past the last address, `None` when the page ends at the top of
    /// the address space
    #[inline]
    pub fn end(&self) -> Option<u64> {
        self.vaddr.checked_add(self.memsz)
    }

    /// Check if `addr` falls inside this page
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.vaddr && addr - self.vaddr < self.memsz
    }

    /// Check if readable
    pub fn is_readable(&self) -> bool {
        self.flags.contains(PageFlags::READ)
    }

    /// Check if writable
    pub fn is_writable(&self) -> bool {
        self.flags.contains(PageFlags::WRITE)
    }

    /// Check if executable
    pub fn is_executable(&self) -> bool {
        self.flags.contains(PageFlags::EXECUTE)
    }
}

impl fmt::Display for Page {
    /// vmmap-style line: `start-end rwxp size offset objfile`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:x}-{:x} {}p {:x} {:x}",
            self.vaddr,
            self.vaddr.wrapping_add(self.memsz),
            self.flags,
            self.memsz,
            self.offset
        )?;
        if !self.objfile.is_empty() {
            write!(f, " {}", self.objfile)?;
        }
        Ok(())
    }
}
