//! # Target Memory Access
//!
//! The read primitive through which all target bytes flow.
//!
//! A read either fills the whole buffer or fails with a [`ReadFault`]. A
//! zero-filled buffer is never used to signal failure, so callers can tell an
//! unmapped page from a page full of zeroes.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::fmt;

// =============================================================================
// Read Fault
// =============================================================================

/// A single failed read from target memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadFault {
    /// Address the read started at
    pub address: u64,
    /// Number of bytes requested
    pub len: usize,
}

impl ReadFault {
    /// Create a fault for `len` bytes at `address`
    #[inline]
    pub const fn new(address: u64, len: usize) -> Self {
        Self { address, len }
    }
}

impl fmt::Display for ReadFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot read {} bytes at {:#x}", self.len, self.address)
    }
}

// =============================================================================
// Memory Reader
// =============================================================================

/// Source of target memory
///
/// Implementations own their timeout and retry policy; a call must return
/// within bounded time.
pub trait MemoryReader {
    /// Fill `buf` with the bytes starting at `address`
    fn read(&self, address: u64, buf: &mut [u8]) -> Result<(), ReadFault>;

    /// Read a fixed-size array
    fn read_array<const N: usize>(&self, address: u64) -> Result<[u8; N], ReadFault>
    where
        Self: Sized,
    {
        let mut buf = [0u8; N];
        self.read(address, &mut buf)?;
        Ok(buf)
    }

    /// Read a single byte
    fn read_u8(&self, address: u64) -> Result<u8, ReadFault>
    where
        Self: Sized,
    {
        let [byte] = self.read_array::<1>(address)?;
        Ok(byte)
    }
}

impl<R: MemoryReader + ?Sized> MemoryReader for &R {
    fn read(&self, address: u64, buf: &mut [u8]) -> Result<(), ReadFault> {
        (**self).read(address, buf)
    }
}

// =============================================================================
// Memory Image
// =============================================================================

/// Sparse in-memory address space
///
/// Holds non-overlapping mapped regions. Reads may span adjacent regions but
/// fault on any unmapped byte.
#[derive(Debug, Clone, Default)]
pub struct MemoryImage {
    regions: BTreeMap<u64, Vec<u8>>,
}

impl MemoryImage {
    /// Create an empty address space
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `bytes` at `base`
    ///
    /// Returns `false` and leaves the image untouched if the new region would
    /// overlap an existing one or wrap past the top of the address space.
    pub fn map(&mut self, base: u64, bytes: Vec<u8>) -> bool {
        if bytes.is_empty() {
            return true;
        }
        let Some(end) = base.checked_add(bytes.len() as u64) else {
            return false;
        };

        let overlaps_prev = self
            .regions
            .range(..=base)
            .next_back()
            .is_some_and(|(&start, data)| start + data.len() as u64 > base);
        let overlaps_next = self.regions.range(base..end).next().is_some();
        if overlaps_prev || overlaps_next {
            log::warn!("refusing overlapping mapping at {:#x}..{:#x}", base, end);
            return false;
        }

        self.regions.insert(base, bytes);
        true
    }

    /// Overwrite bytes inside already-mapped memory
    pub fn write(&mut self, address: u64, bytes: &[u8]) -> Result<(), ReadFault> {
        // All or nothing: check the whole range before touching it
        let mut scratch = alloc::vec![0u8; bytes.len()];
        self.read(address, &mut scratch)?;

        let mut done = 0usize;
        while done < bytes.len() {
            let cursor = address.wrapping_add(done as u64);
            let (start, data) = self
                .regions
                .range_mut(..=cursor)
                .next_back()
                .ok_or(ReadFault::new(address, bytes.len()))?;
            let offset = (cursor - *start) as usize;
            if offset >= data.len() {
                return Err(ReadFault::new(address, bytes.len()));
            }
            let n = (data.len() - offset).min(bytes.len() - done);
            data[offset..offset + n].copy_from_slice(&bytes[done..done + n]);
            done += n;
        }
        Ok(())
    }

    /// Number of mapped regions
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }
}

impl MemoryReader for MemoryImage {
    fn read(&self, address: u64, buf: &mut [u8]) -> Result<(), ReadFault> {
        let fault = ReadFault::new(address, buf.len());
        let mut done = 0usize;
        while done < buf.len() {
            let cursor = address.checked_add(done as u64).ok_or(fault)?;
            let (start, data) = self.regions.range(..=cursor).next_back().ok_or(fault)?;
            let offset = (cursor - start) as usize;
            if offset >= data.len() {
                return Err(fault);
            }
            let n = (data.len() - offset).min(buf.len() - done);
            buf[done..done + n].copy_from_slice(&data[offset..offset + n]);
            done += n;
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_read_within_region() {
        let mut image = MemoryImage::new();
        assert!(image.map(0x1000, vec![1, 2, 3, 4]));

        let mut buf = [0u8; 2];
        image.read(0x1001, &mut buf).unwrap();
        assert_eq!(buf, [2, 3]);
        assert_eq!(image.read_u8(0x1003), Ok(4));
    }

    #[test]
    fn test_read_spans_adjacent_regions() {
        let mut image = MemoryImage::new();
        assert!(image.map(0x1000, vec![0xAA; 0x10]));
        assert!(image.map(0x1010, vec![0xBB; 0x10]));

        let buf: [u8; 4] = image.read_array(0x100E).unwrap();
        assert_eq!(buf, [0xAA, 0xAA, 0xBB, 0xBB]);
    }

    #[test]
    fn test_unmapped_read_faults() {
        let mut image = MemoryImage::new();
        assert!(image.map(0x1000, vec![0; 0x10]));

        assert_eq!(image.read_u8(0xFFF), Err(ReadFault::new(0xFFF, 1)));
        // Partially mapped reads fail as a whole
        let mut buf = [0u8; 4];
        assert_eq!(image.read(0x100E, &mut buf), Err(ReadFault::new(0x100E, 4)));
    }

    #[test]
    fn test_zero_bytes_are_not_faults() {
        let mut image = MemoryImage::new();
        assert!(image.map(0x2000, vec![0; 8]));
        assert_eq!(image.read_array::<4>(0x2000), Ok([0; 4]));
    }

    #[test]
    fn test_overlapping_map_rejected() {
        let mut image = MemoryImage::new();
        assert!(image.map(0x1000, vec![0; 0x100]));
        assert!(!image.map(0x10F0, vec![0; 0x20]));
        assert!(!image.map(0xFF0, vec![0; 0x20]));
        assert!(!image.map(u64::MAX, vec![0; 2]));
        assert_eq!(image.region_count(), 1);
    }

    #[test]
    fn test_write_patches_mapped_bytes() {
        let mut image = MemoryImage::new();
        assert!(image.map(0x1000, vec![0; 0x10]));
        image.write(0x1004, &[9, 8]).unwrap();
        assert_eq!(image.read_array::<3>(0x1003), Ok([0, 9, 8]));
        assert!(image.write(0x100F, &[1, 2]).is_err());
        assert_eq!(image.read_u8(0x100F), Ok(0));
    }

    #[test]
    fn test_reader_by_reference() {
        let mut image = MemoryImage::new();
        assert!(image.map(0x3000, vec![7]));
        let by_ref = &image;
        assert_eq!(by_ref.read_u8(0x3000), Ok(7));
    }
}
