//! # Mapper Configuration
//!
//! Tunables for header location and page map construction.

use elfmap_hal::PageSize;

use crate::{Error, Result};

/// Default number of pages scanned below a hint (4 MiB at 4 KiB pages)
pub const DEFAULT_MAX_SCAN_PAGES: usize = 1024;

/// Default ceiling on pages emitted for one segment (4 GiB at 4 KiB pages)
pub const DEFAULT_MAX_SEGMENT_PAGES: u64 = 1 << 20;

/// Limits applied while emitting pages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildLimits {
    /// Segments covering more pages than this are skipped
    pub max_segment_pages: u64,
}

impl Default for BuildLimits {
    fn default() -> Self {
        Self { max_segment_pages: DEFAULT_MAX_SEGMENT_PAGES }
    }
}

/// Page mapper configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapperConfig {
    /// Page size of the target
    pub page_size: PageSize,
    /// Maximum page candidates examined by the backward header scan
    pub max_scan_pages: usize,
    /// Page emission limits
    pub limits: BuildLimits,
    /// Whether results are memoized between lifecycle events
    pub cache_enabled: bool,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            page_size: PageSize::SIZE_4K,
            max_scan_pages: DEFAULT_MAX_SCAN_PAGES,
            limits: BuildLimits::default(),
            cache_enabled: true,
        }
    }
}

impl MapperConfig {
    /// Create builder for configuration
    pub fn builder() -> MapperConfigBuilder {
        MapperConfigBuilder::new()
    }
}

// ============================================================================
// CONFIG BUILDER
// ============================================================================

/// Builder for MapperConfig
#[derive(Debug, Default)]
pub struct MapperConfigBuilder {
    page_size: Option<u64>,
    max_scan_pages: Option<usize>,
    max_segment_pages: Option<u64>,
    cache_enabled: Option<bool>,
}

impl MapperConfigBuilder {
    /// Create new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set target page size in bytes
    pub fn page_size(mut self, size: u64) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Set the backward scan bound
    pub fn max_scan_pages(mut self, pages: usize) -> Self {
        self.max_scan_pages = Some(pages);
        self
    }

    /// Set the per-segment page ceiling
    pub fn max_segment_pages(mut self, pages: u64) -> Self {
        self.max_segment_pages = Some(pages);
        self
    }

    /// Enable or disable memoization
    pub fn cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = Some(enabled);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<MapperConfig> {
        let mut config = MapperConfig::default();

        if let Some(size) = self.page_size {
            config.page_size = PageSize::new(size)
                .ok_or(Error::InvalidConfig("page size must be a power of two"))?;
        }
        if let Some(pages) = self.max_scan_pages {
            if pages == 0 {
                return Err(Error::InvalidConfig("scan bound must be at least one page"));
            }
            config.max_scan_pages = pages;
        }
        if let Some(pages) = self.max_segment_pages {
            if pages == 0 {
                return Err(Error::InvalidConfig("segment ceiling must be at least one page"));
            }
            config.limits.max_segment_pages = pages;
        }
        if let Some(enabled) = self.cache_enabled {
            config.cache_enabled = enabled;
        }

        Ok(config)
    }
}
