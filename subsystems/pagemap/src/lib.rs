//! # ELF Page Map Reconstruction
//!
//! Rebuilds the memory layout of a loaded ELF module (page ranges,
//! permissions, load base) from bytes read out of a live, possibly remote
//! process, without relying on OS process maps.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                            ElfMapper                                 │
//! │                                                                      │
//! │  address ──▶ ┌─────────────┐   (BitWidth, Ehdr)   ┌──────────────┐   │
//! │              │   locator   │ ───────────────────▶ │   builder    │   │
//! │              │ scan/decode │                      │ emit, merge, │   │
//! │              └──────┬──────┘                      │ relocate,    │   │
//! │                     │ Phdr table                  │ coalesce,    │   │
//! │                     └───────────────────────────▶ │ fill, label  │   │
//! │                                                   └──────┬───────┘   │
//! │  ┌─────────────────────────────────────┐                 │           │
//! │  │ PageMapCache (objfile/exec gens)    │ ◀───────────────┘ Vec<Page> │
//! │  └─────────────────────────────────────┘                             │
//! │  ┌─────────────────────────────────────┐                             │
//! │  │ EntryResolver (auxv, text, symbols) │ ──▶ entry(), exe()          │
//! │  └─────────────────────────────────────┘                             │
//! └──────────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//!                 elfmap_hal::MemoryReader / PageSize
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use elfmap_pagemap::ElfMapper;
//!
//! let mapper = ElfMapper::new(reader);
//! for page in mapper.map(pc, "/bin/ls") {
//!     log::info!("{}", page);
//! }
//! mapper.on_new_object_loaded();
//! ```

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod builder;
pub mod cache;
pub mod config;
pub mod elf;
pub mod entry;
pub mod error;
pub mod locator;
pub mod mapper;
pub mod page;

#[cfg(test)]
mod testing;

use alloc::vec::Vec;

use elfmap_hal::MemoryReader;

pub use builder::build_page_map;
pub use cache::{CacheStats, Generation, LifecycleEvent, PageMapCache};
pub use config::{BuildLimits, MapperConfig, MapperConfigBuilder};
pub use elf::{BitWidth, Ehdr, Endian, FileType, Phdr, SegmentType};
pub use entry::{
    AuxvEntry, AuxvSource, DebuggerText, EntryResolver, EntryStrategy, InfoFilesEntry,
    SymbolEntry, SymbolLookup,
};
pub use error::{Error, Result};
pub use locator::{locate_and_decode, program_headers, PhdrTable};
pub use mapper::ElfMapper;
pub use page::{Page, PageFlags};

/// Page map of the module containing `address`, without caching
///
/// Returns an empty list when no ELF module can be found there.
pub fn map<R: MemoryReader>(
    reader: &R,
    address: u64,
    label: &str,
    config: &MapperConfig,
) -> Vec<Page> {
    let (_, ehdr) = match locate_and_decode(reader, address, config) {
        Ok(found) => found,
        Err(err) => {
            log::debug!("no page map for {:#x}: {}", address, err);
            return Vec::new();
        },
    };

    let table = program_headers(reader, &ehdr);
    if let Some(partial) = table.partial() {
        log::warn!("module at {:#x}: {}", ehdr.base, partial);
    }

    build_page_map(&ehdr, table.entries(), label, config.page_size, &config.limits)
}
