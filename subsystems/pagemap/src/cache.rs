//! # Page Map Cache
//!
//! Memoizes header lookups, page maps and the entry point of the debugged
//! process until a lifecycle event makes them stale.
//!
//! Every entry carries the generation it was computed in. `NewObjfile`
//! advances the object-file generation, `Start` and `Exit` advance the
//! execution generation. Headers and page maps depend on both, the entry
//! point only on the latter.
//!
//! Only successful lookups are stored. A failed header scan may come from
//! a transient read fault and is retried on the next call.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use spin::Mutex;

use crate::elf::{BitWidth, Ehdr};
use crate::page::Page;

/// Lifecycle signal from the host debugger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// Process started or was attached to
    Start,
    /// A new object file (executable or shared library) was loaded
    NewObjfile,
    /// Process exited
    Exit,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::NewObjfile => write!(f, "new objfile"),
            Self::Exit => write!(f, "exit"),
        }
    }
}

/// Pair of generation counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Generation {
    /// Bumped on every `NewObjfile`
    pub objfile: u64,
    /// Bumped on every `Start` and `Exit`
    pub exec: u64,
}

impl Generation {
    /// Generation following `event`
    pub fn advance(self, event: LifecycleEvent) -> Self {
        match event {
            LifecycleEvent::NewObjfile => Self {
                objfile: self.objfile.wrapping_add(1),
                ..self
            },
            LifecycleEvent::Start | LifecycleEvent::Exit => Self {
                exec: self.exec.wrapping_add(1),
                ..self
            },
        }
    }
}

/// Cache lookup counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that found nothing current
    pub misses: u64,
}

#[derive(Debug, Clone)]
struct Stamped<T> {
    value: T,
    generation: Generation,
}

#[derive(Debug, Default)]
struct CacheState {
    generation: Generation,
    headers: BTreeMap<u64, Stamped<(BitWidth, Ehdr)>>,
    page_maps: BTreeMap<u64, BTreeMap<String, Stamped<Vec<Page>>>>,
    entry: Option<Stamped<u64>>,
    stats: CacheStats,
}

impl CacheState {
    fn count<T>(&mut self, found: Option<T>) -> Option<T> {
        if found.is_some() {
            self.stats.hits += 1;
        } else {
            self.stats.misses += 1;
        }
        found
    }

    fn purge(&mut self) {
        let current = self.generation;
        self.headers.retain(|_, e| e.generation == current);
        self.page_maps.retain(|_, maps| {
            maps.retain(|_, e| e.generation == current);
            !maps.is_empty()
        });
        if self.entry.as_ref().is_some_and(|e| e.generation.exec != current.exec) {
            self.entry = None;
        }
    }
}

/// Generation-stamped memo tables behind a spinlock
#[derive(Debug)]
pub struct PageMapCache {
    enabled: bool,
    state: Mutex<CacheState>,
}

impl Default for PageMapCache {
    fn default() -> Self {
        Self::new(true)
    }
}

impl PageMapCache {
    /// Create an empty cache. A disabled cache misses every lookup and
    /// stores nothing, but still tracks generations.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Whether lookups can hit
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Current generation counters
    pub fn generation(&self) -> Generation {
        self.state.lock().generation
    }

    /// Hit/miss counters since creation
    pub fn stats(&self) -> CacheStats {
        self.state.lock().stats
    }

    /// Cached header lookup for a page-aligned hint
    pub fn header(&self, hint: u64) -> Option<(BitWidth, Ehdr)> {
        if !self.enabled {
            return None;
        }
        let mut state = self.state.lock();
        let current = state.generation;
        let found = state
            .headers
            .get(&hint)
            .filter(|e| e.generation == current)
            .map(|e| e.value);
        if found.is_some() {
            log::debug!("cache hit: header for {:#x}", hint);
        }
        state.count(found)
    }

    /// Remember the header found for a page-aligned hint
    pub fn store_header(&self, hint: u64, header: (BitWidth, Ehdr)) {
        if !self.enabled {
            return;
        }
        let mut state = self.state.lock();
        let generation = state.generation;
        state.headers.insert(
            hint,
            Stamped {
                value: header,
                generation,
            },
        );
    }

    /// Cached page map of the module at `base` built under `label`
    pub fn page_map(&self, base: u64, label: &str) -> Option<Vec<Page>> {
        if !self.enabled {
            return None;
        }
        let mut state = self.state.lock();
        let current = state.generation;
        let found = state
            .page_maps
            .get(&base)
            .and_then(|maps| maps.get(label))
            .filter(|e| e.generation == current)
            .map(|e| e.value.clone());
        if found.is_some() {
            log::debug!("cache hit: page map for {:#x} ({})", base, label);
        }
        state.count(found)
    }

    /// Remember the page map of the module at `base`
    pub fn store_page_map(&self, base: u64, label: &str, pages: &[Page]) {
        if !self.enabled {
            return;
        }
        let mut state = self.state.lock();
        let generation = state.generation;
        state.page_maps.entry(base).or_default().insert(
            label.into(),
            Stamped {
                value: pages.to_vec(),
                generation,
            },
        );
    }

    /// Cached entry point of the main executable
    pub fn entry(&self) -> Option<u64> {
        if !self.enabled {
            return None;
        }
        let mut state = self.state.lock();
        let exec = state.generation.exec;
        let found = state
            .entry
            .as_ref()
            .filter(|e| e.generation.exec == exec)
            .map(|e| e.value);
        state.count(found)
    }

    /// Remember the entry point of the main executable
    pub fn store_entry(&self, entry: u64) {
        if !self.enabled {
            return;
        }
        let mut state = self.state.lock();
        let generation = state.generation;
        state.entry = Some(Stamped {
            value: entry,
            generation,
        });
    }

    /// Advance generations and drop everything the event made stale
    pub fn handle_event(&self, event: LifecycleEvent) {
        let mut state = self.state.lock();
        state.generation = state.generation.advance(event);
        state.purge();
        log::debug!(
            "{}: cache generation {}/{}",
            event,
            state.generation.objfile,
            state.generation.exec
        );
    }

    /// Drop every entry without touching generations
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.headers.clear();
        state.page_maps.clear();
        state.entry = None;
    }
}
