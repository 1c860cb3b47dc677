//! # Page Arithmetic
//!
//! Page size handling for target address spaces.
//!
//! Targets do not all use 4 KiB pages (arm64 kernels may run 16 KiB or
//! 64 KiB), so the size is a runtime value rather than a constant.

use core::fmt;

// =============================================================================
// Page Size
// =============================================================================

/// Page size of a target address space
///
/// Always a nonzero power of two.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PageSize(u64);

impl PageSize {
    /// 4 KB page
    pub const SIZE_4K: Self = Self(0x1000);
    /// 16 KB page
    pub const SIZE_16K: Self = Self(0x4000);
    /// 64 KB page
    pub const SIZE_64K: Self = Self(0x10000);

    /// Create a page size, rejecting values that are not a power of two
    #[inline]
    pub const fn new(size: u64) -> Option<Self> {
        if size.is_power_of_two() {
            Some(Self(size))
        } else {
            None
        }
    }

    /// Get the size in bytes
    #[inline]
    pub const fn size(self) -> u64 {
        self.0
    }

    /// Get the alignment mask
    #[inline]
    pub const fn mask(self) -> u64 {
        !(self.0 - 1)
    }

    /// Check if an address is aligned to this page size
    #[inline]
    pub const fn is_aligned(self, addr: u64) -> bool {
        addr & !self.mask() == 0
    }

    /// Align an address down to this page size
    #[inline]
    pub const fn align_down(self, addr: u64) -> u64 {
        addr & self.mask()
    }

    /// Align an address or length up to this page size
    ///
    /// Returns `None` when the result does not fit in 64 bits.
    #[inline]
    pub const fn align_up(self, addr: u64) -> Option<u64> {
        match addr.checked_add(self.0 - 1) {
            Some(v) => Some(v & self.mask()),
            None => None,
        }
    }

    /// Offset of an address within its page
    #[inline]
    pub const fn page_offset(self, addr: u64) -> u64 {
        addr & !self.mask()
    }

    /// Number of pages needed to cover `len` bytes
    #[inline]
    pub const fn pages_for(self, len: u64) -> u64 {
        len.div_ceil(self.0)
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::SIZE_4K
    }
}

impl fmt::Debug for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PageSize({:#x})", self.0)
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            s if s >= 0x100000 && s % 0x100000 == 0 => write!(f, "{}MB", s / 0x100000),
            s if s >= 0x400 && s % 0x400 == 0 => write!(f, "{}KB", s / 0x400),
            s => write!(f, "{}B", s),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_power_of_two() {
        assert!(PageSize::new(0).is_none());
        assert!(PageSize::new(0x1800).is_none());
        assert_eq!(PageSize::new(0x1000), Some(PageSize::SIZE_4K));
    }

    #[test]
    fn test_alignment() {
        let ps = PageSize::SIZE_4K;
        assert_eq!(ps.align_down(0x400123), 0x400000);
        assert_eq!(ps.align_up(0x400123), Some(0x401000));
        assert_eq!(ps.align_up(0x401000), Some(0x401000));
        assert_eq!(ps.page_offset(0x400123), 0x123);
        assert!(ps.is_aligned(0x7000));
        assert!(!ps.is_aligned(0x7001));
    }

    #[test]
    fn test_align_up_overflow() {
        assert_eq!(PageSize::SIZE_4K.align_up(u64::MAX), None);
        assert_eq!(PageSize::SIZE_4K.align_up(u64::MAX & !0xFFF), Some(u64::MAX & !0xFFF));
    }

    #[test]
    fn test_pages_for() {
        let ps = PageSize::SIZE_16K;
        assert_eq!(ps.pages_for(0), 0);
        assert_eq!(ps.pages_for(1), 1);
        assert_eq!(ps.pages_for(0x8000), 2);
    }

    #[test]
    fn test_display() {
        extern crate std;
        use std::string::ToString;

        assert_eq!(PageSize::SIZE_4K.to_string(), "4KB");
        assert_eq!(PageSize::SIZE_64K.to_string(), "64KB");
        assert_eq!(PageSize::new(0x200000).map(|p| p.to_string()).as_deref(), Some("2MB"));
    }
}
