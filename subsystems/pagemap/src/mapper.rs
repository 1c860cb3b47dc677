//! # ELF Mapper
//!
//! Binds a memory reader, a configuration and a cache into the page map
//! service used by the host debugger.

use alloc::vec::Vec;

use elfmap_hal::MemoryReader;

use crate::builder;
use crate::cache::{LifecycleEvent, PageMapCache};
use crate::config::MapperConfig;
use crate::elf::{BitWidth, Ehdr, Phdr};
use crate::entry::EntryResolver;
use crate::locator::{self, PhdrTable};
use crate::page::Page;
use crate::{Error, Result};

/// Page map service over one target address space
#[derive(Debug)]
pub struct ElfMapper<R> {
    reader: R,
    config: MapperConfig,
    cache: PageMapCache,
}

impl<R: MemoryReader> ElfMapper<R> {
    /// Create a mapper with the default configuration
    pub fn new(reader: R) -> Self {
        Self::with_config(reader, MapperConfig::default())
    }

    /// Create a mapper with a custom configuration
    pub fn with_config(reader: R, config: MapperConfig) -> Self {
        Self {
            reader,
            config,
            cache: PageMapCache::new(config.cache_enabled),
        }
    }

    /// Underlying memory reader
    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// Active configuration
    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Memo tables
    pub fn cache(&self) -> &PageMapCache {
        &self.cache
    }

    /// Locate and decode the ELF header of the module containing `address`
    ///
    /// Failures are not cached, so a module that becomes readable later is
    /// found on the next call.
    pub fn locate_and_decode(&self, address: u64) -> Result<(BitWidth, Ehdr)> {
        let key = self.config.page_size.align_down(address);

        if let Some(hit) = self.cache.header(key) {
            return Ok(hit);
        }

        let found = locator::locate_and_decode(&self.reader, address, &self.config)?;
        self.cache.store_header(key, found);
        Ok(found)
    }

    /// Read the program header table described by `ehdr`
    pub fn program_headers(&self, ehdr: &Ehdr) -> PhdrTable {
        locator::program_headers(&self.reader, ehdr)
    }

    /// Build a page map from already-decoded headers
    pub fn build_page_map(&self, ehdr: &Ehdr, phdrs: &[Phdr], objfile: &str) -> Vec<Page> {
        builder::build_page_map(ehdr, phdrs, objfile, self.config.page_size, &self.config.limits)
    }

    /// Page map of the module containing `address`, labelled `label`
    ///
    /// Fails only when no usable ELF header is found. Unreadable program
    /// headers shrink the result instead.
    pub fn try_map(&self, address: u64, label: &str) -> Result<Vec<Page>> {
        let (_, ehdr) = self.locate_and_decode(address)?;

        if let Some(pages) = self.cache.page_map(ehdr.base, label) {
            return Ok(pages);
        }

        let table = self.program_headers(&ehdr);
        if let Some(partial) = table.partial() {
            log::warn!("module at {:#x}: {}", ehdr.base, partial);
        }

        let pages = self.build_page_map(&ehdr, table.entries(), label);
        self.cache.store_page_map(ehdr.base, label, &pages);
        Ok(pages)
    }

    /// Page map of the module containing `address`, empty when there is
    /// no module there
    pub fn map(&self, address: u64, label: &str) -> Vec<Page> {
        self.try_map(address, label).unwrap_or_else(|err| {
            log::debug!("no page map for {:#x}: {}", address, err);
            Vec::new()
        })
    }

    /// Entry point of the main executable, memoized until the process
    /// starts or exits
    pub fn entry(&self, resolver: &EntryResolver<'_>) -> Option<u64> {
        if let Some(entry) = self.cache.entry() {
            return Some(entry);
        }
        let entry = resolver.resolve()?;
        self.cache.store_entry(entry);
        Some(entry)
    }

    /// ELF header of the main executable
    pub fn exe(&self, resolver: &EntryResolver<'_>) -> Result<Ehdr> {
        let entry = self
            .entry(resolver)
            .ok_or(Error::NotFound { hint: 0, scanned: 0 })?;
        self.locate_and_decode(entry).map(|(_, ehdr)| ehdr)
    }

    /// Forward a lifecycle event to the cache
    pub fn handle_event(&self, event: LifecycleEvent) {
        self.cache.handle_event(event);
    }

    /// A new object file was loaded
    pub fn on_new_object_loaded(&self) {
        self.handle_event(LifecycleEvent::NewObjfile);
    }

    /// The process started
    pub fn on_start(&self) {
        self.handle_event(LifecycleEvent::Start);
    }

    /// The process exited
    pub fn on_process_exit(&self) {
        self.handle_event(LifecycleEvent::Exit);
    }
}
