//! # Page Map Builder
//!
//! Turns a program header table into the page map a loader would produce.
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐
//! │ emit per │──▶│ relocate │──▶│ coalesce │──▶│ fill gaps│──▶│  label   │
//! │   page   │   │ (ET_DYN) │   │ (W bit)  │   │  (---p)  │   │          │
//! └──────────┘   └──────────┘   └──────────┘   └──────────┘   └──────────┘
//! ```
//!
//! Headers are applied in table order so later entries (PT_GNU_RELRO) can
//! re-protect a subset of what earlier PT_LOAD entries mapped.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use elfmap_hal::PageSize;

use crate::config::BuildLimits;
use crate::elf::{Ehdr, Phdr};
use crate::page::{Page, PageFlags};

/// Page-aligned extent of one segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SegmentSpan {
    start: u64,
    offset: u64,
    pages: u64,
}

impl SegmentSpan {
    /// Align a segment to page boundaries, `None` on overflow
    fn of(phdr: &Phdr, page_size: PageSize) -> Option<Self> {
        let memsz = phdr.memsz.checked_add(page_size.page_offset(phdr.vaddr))?;
        let memsz = page_size.align_up(memsz)?;
        let start = page_size.align_down(phdr.vaddr);
        start.checked_add(memsz - 1)?;

        Some(Self {
            start,
            offset: page_size.align_down(phdr.offset),
            pages: memsz / page_size.size(),
        })
    }
}

/// Emit one page per page-sized stride of every memory-shaping segment
///
/// Pages hit by several segments take the later segment's flags, with the
/// execute bit kept once set.
pub fn emit_pages(phdrs: &[Phdr], page_size: PageSize, limits: &BuildLimits) -> Vec<Page> {
    let mut pages: BTreeMap<u64, Page> = BTreeMap::new();
    let stride = page_size.size();

    for phdr in phdrs.iter().filter(|p| p.p_type.shapes_memory()) {
        if phdr.memsz == 0 {
            continue;
        }

        let Some(span) = SegmentSpan::of(phdr, page_size) else {
            log::warn!(
                "{} segment at {:#x} (memsz {:#x}) overflows the address space, skipped",
                phdr.p_type,
                phdr.vaddr,
                phdr.memsz
            );
            continue;
        };
        if span.pages > limits.max_segment_pages {
            log::warn!(
                "{} segment at {:#x} spans {} pages (limit {}), skipped",
                phdr.p_type,
                phdr.vaddr,
                span.pages,
                limits.max_segment_pages
            );
            continue;
        }

        let flags = PageFlags::from_elf(phdr.flags);
        for i in 0..span.pages {
            let delta = i * stride;
            let addr = span.start + delta;
            pages
                .entry(addr)
                .and_modify(|page| page.flags = page.flags.overlay(flags))
                .or_insert_with(|| Page::new(addr, stride, flags, span.offset.wrapping_add(delta)));
        }
    }

    pages.into_values().collect()
}

/// Shift every page by the module's load address
pub fn relocate(pages: &mut [Page], base: u64) {
    for page in pages.iter_mut() {
        page.vaddr = page.vaddr.wrapping_add(base);
    }
}

/// Merge runs of contiguous pages that agree on write permission
///
/// Expects pages sorted by address. A merged run keeps the file offset and
/// read permission of its first page and is executable if any page in it
/// was. A write boundary is never merged across.
pub fn coalesce(pages: Vec<Page>) -> Vec<Page> {
    let mut merged: Vec<Page> = Vec::with_capacity(pages.len());

    for page in pages {
        if let Some(prev) = merged.last_mut() {
            if prev.is_writable() == page.is_writable() && prev.end() == Some(page.vaddr) {
                prev.memsz += page.memsz;
                prev.flags |= page.flags & PageFlags::EXECUTE;
                continue;
            }
        }
        merged.push(page);
    }

    merged
}

/// Insert a no-access page into every hole between consecutive pages
///
/// Expects pages sorted by address and non-overlapping. A gap page takes
/// the file offset of the page following it.
pub fn fill_gaps(pages: Vec<Page>) -> Vec<Page> {
    let mut filled = Vec::with_capacity(pages.len() * 2);
    let mut iter = pages.into_iter().peekable();

    while let Some(page) = iter.next() {
        let end = page.end();
        filled.push(page);

        if let (Some(end), Some(next)) = (end, iter.peek()) {
            if end < next.vaddr {
                filled.push(Page::gap(end, next.vaddr - end, next.offset));
            }
        }
    }

    filled
}

/// Build the page map of a module from its program headers
///
/// Returns pages sorted by address, non-overlapping, and covering the whole
/// span of the module without holes. A module without PT_LOAD segments has
/// no pages.
pub fn build_page_map(
    ehdr: &Ehdr,
    phdrs: &[Phdr],
    objfile: &str,
    page_size: PageSize,
    limits: &BuildLimits,
) -> Vec<Page> {
    if !phdrs.iter().any(|p| p.is_loadable() && p.memsz != 0) {
        log::debug!("module at {:#x} has no loadable segments", ehdr.base);
        return Vec::new();
    }

    let mut pages = emit_pages(phdrs, page_size, limits);

    if ehdr.is_pie() {
        relocate(&mut pages, ehdr.base);
    }

    pages.sort_by_key(|p| p.vaddr);
    let mut pages = fill_gaps(coalesce(pages));

    for page in pages.iter_mut() {
        page.objfile = objfile.into();
    }

    log::debug!("module at {:#x} ({}): {} pages", ehdr.base, objfile, pages.len());
    pages
}

// ============================================================================
// TESTS
// ============================================================================
