//! Synthetic ELF images for tests.

use alloc::vec;
use alloc::vec::Vec;
use core::cell::Cell;

use elfmap_hal::{MemoryImage, MemoryReader, ReadFault};

use crate::elf::layout::Field;
use crate::elf::{BitWidth, Endian, SegmentType, ELF_MAGIC};

/// One program header to emit
#[derive(Debug, Clone, Copy)]
pub(crate) struct SegmentDef {
    pub p_type: u32,
    pub flags: u32,
    pub offset: u64,
    pub vaddr: u64,
    pub memsz: u64,
}

/// PT_LOAD segment
pub(crate) fn load(vaddr: u64, memsz: u64, flags: u32, offset: u64) -> SegmentDef {
    SegmentDef { p_type: 1, flags, offset, vaddr, memsz }
}

/// PT_GNU_RELRO segment
pub(crate) fn relro(vaddr: u64, memsz: u64, flags: u32, offset: u64) -> SegmentDef {
    SegmentDef { p_type: SegmentType::PT_GNU_RELRO, flags, offset, vaddr, memsz }
}

/// Any other segment type
pub(crate) fn other(p_type: u32, vaddr: u64, memsz: u64, flags: u32) -> SegmentDef {
    SegmentDef { p_type, flags, offset: 0, vaddr, memsz }
}

/// Header page of an ELF module: Ehdr followed directly by the Phdr table
pub(crate) struct ElfImage {
    bit_width: BitWidth,
    endian: Endian,
    file_type: u16,
    entry: u64,
    segments: Vec<SegmentDef>,
}

impl ElfImage {
    pub fn elf64(file_type: u16) -> Self {
        Self::new(BitWidth::Elf64, file_type)
    }

    pub fn elf32(file_type: u16) -> Self {
        Self::new(BitWidth::Elf32, file_type)
    }

    fn new(bit_width: BitWidth, file_type: u16) -> Self {
        Self {
            bit_width,
            endian: Endian::Little,
            file_type,
            entry: 0,
            segments: Vec::new(),
        }
    }

    pub fn big_endian(mut self) -> Self {
        self.endian = Endian::Big;
        self
    }

    pub fn entry(mut self, entry: u64) -> Self {
        self.entry = entry;
        self
    }

    pub fn segment(mut self, segment: SegmentDef) -> Self {
        self.segments.push(segment);
        self
    }

    fn put(&self, buf: &mut [u8], at: usize, f: Field, value: u64) {
        let bytes = value.to_be_bytes();
        let field = &bytes[8 - f.width..];
        let dst = &mut buf[at + f.offset..at + f.offset + f.width];
        match self.endian {
            Endian::Big => dst.copy_from_slice(field),
            Endian::Little => {
                for (d, s) in dst.iter_mut().zip(field.iter().rev()) {
                    *d = *s;
                }
            },
        }
    }

    /// Raw bytes of the header page (one 4 KiB page)
    pub fn bytes(&self) -> Vec<u8> {
        let eh = self.bit_width.ehdr_layout();
        let ph = self.bit_width.phdr_layout();
        let mut buf = vec![0u8; 0x1000];

        buf[..4].copy_from_slice(&ELF_MAGIC);
        buf[4] = match self.bit_width {
            BitWidth::Elf32 => 1,
            BitWidth::Elf64 => 2,
        };
        buf[5] = match self.endian {
            Endian::Little => 1,
            Endian::Big => 2,
        };
        buf[6] = 1;

        self.put(&mut buf, 0, eh.e_type, u64::from(self.file_type));
        self.put(&mut buf, 0, eh.e_machine, 62);
        self.put(&mut buf, 0, eh.e_entry, self.entry);
        self.put(&mut buf, 0, eh.e_phoff, eh.size as u64);
        self.put(&mut buf, 0, eh.e_phentsize, ph.size as u64);
        self.put(&mut buf, 0, eh.e_phnum, self.segments.len() as u64);

        for (i, seg) in self.segments.iter().enumerate() {
            let at = eh.size + i * ph.size;
            self.put(&mut buf, at, ph.p_type, u64::from(seg.p_type));
            self.put(&mut buf, at, ph.p_flags, u64::from(seg.flags));
            self.put(&mut buf, at, ph.p_offset, seg.offset);
            self.put(&mut buf, at, ph.p_vaddr, seg.vaddr);
            self.put(&mut buf, at, ph.p_filesz, seg.memsz);
            self.put(&mut buf, at, ph.p_memsz, seg.memsz);
            self.put(&mut buf, at, ph.p_align, 0x1000);
        }

        buf
    }

    /// Map the header page at `base`
    pub fn map_at(&self, mem: &mut MemoryImage, base: u64) {
        assert!(mem.map(base, self.bytes()), "header page overlaps at {base:#x}");
    }
}

/// Reader wrapper counting read calls
pub(crate) struct CountingReader<R> {
    inner: R,
    reads: Cell<usize>,
}

impl<R: MemoryReader> CountingReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, reads: Cell::new(0) }
    }

    pub fn reads(&self) -> usize {
        self.reads.get()
    }
}

impl<R: MemoryReader> MemoryReader for CountingReader<R> {
    fn read(&self, address: u64, buf: &mut [u8]) -> Result<(), ReadFault> {
        self.reads.set(self.reads.get() + 1);
        self.inner.read(address, buf)
    }
}
