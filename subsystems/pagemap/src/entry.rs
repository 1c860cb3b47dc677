//! # Entry Point Resolution
//!
//! Finds the entry point of the main executable by asking a list of
//! strategies in order. The first one that answers wins.
//!
//! ```text
//! EntryResolver
//!   ├── AuxvEntry       AT_ENTRY from the auxiliary vector
//!   ├── InfoFilesEntry  "Entry point: 0x..." in debugger output
//!   └── SymbolEntry     _start, start, __start, main
//! ```
//!
//! Each data source sits behind a one-method trait, implemented for plain
//! closures so hosts can wire them up without adapter types.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

/// Lowest value accepted from debugger text. Smaller values are PIE
/// offsets reported before relocation.
pub const MIN_REPORTED_ENTRY: u64 = 0x10000;

/// Symbols tried by `SymbolEntry`, in order
pub const DEFAULT_ENTRY_SYMBOLS: &[&str] = &["_start", "start", "__start", "main"];

// ============================================================================
// DATA SOURCES
// ============================================================================

/// Access to the auxiliary vector of the process
pub trait AuxvSource {
    /// Value of `AT_ENTRY`, if present
    fn at_entry(&self) -> Option<u64>;
}

/// Free-form text output of the host debugger
pub trait DebuggerText {
    /// Output of the debugger's "info files" command
    fn info_files(&self) -> Option<String>;
}

/// Symbol name resolution
pub trait SymbolLookup {
    /// Address of `name`, if it resolves
    fn lookup(&self, name: &str) -> Option<u64>;
}

impl<F: Fn() -> Option<u64>> AuxvSource for F {
    fn at_entry(&self) -> Option<u64> {
        self()
    }
}

impl<F: Fn() -> Option<String>> DebuggerText for F {
    fn info_files(&self) -> Option<String> {
        self()
    }
}

impl<F: Fn(&str) -> Option<u64>> SymbolLookup for F {
    fn lookup(&self, name: &str) -> Option<u64> {
        self(name)
    }
}

// ============================================================================
// STRATEGIES
// ============================================================================

/// One way of finding the entry point
pub trait EntryStrategy {
    /// Strategy name
    fn name(&self) -> &'static str;

    /// Entry point, or `None` to defer to the next strategy
    fn entry_point(&self) -> Option<u64>;
}

/// `AT_ENTRY` from the auxiliary vector; zero counts as absent
#[derive(Debug)]
pub struct AuxvEntry<A>(pub A);

impl<A: AuxvSource> EntryStrategy for AuxvEntry<A> {
    fn name(&self) -> &'static str {
        "auxv"
    }

    fn entry_point(&self) -> Option<u64> {
        self.0.at_entry().filter(|&entry| entry != 0)
    }
}

/// Entry point line in "info files" output
#[derive(Debug)]
pub struct InfoFilesEntry<T>(pub T);

impl<T: DebuggerText> EntryStrategy for InfoFilesEntry<T> {
    fn name(&self) -> &'static str {
        "info files"
    }

    fn entry_point(&self) -> Option<u64> {
        let text = self.0.info_files()?;
        parse_entry_point(&text).filter(|&entry| entry >= MIN_REPORTED_ENTRY)
    }
}

/// Parse the first `Entry point: 0x...` line of debugger output
pub fn parse_entry_point(text: &str) -> Option<u64> {
    let line = text.lines().find(|line| line.contains("Entry point"))?;
    let word = line.split_whitespace().last()?;
    let digits = word
        .strip_prefix("0x")
        .or_else(|| word.strip_prefix("0X"))
        .unwrap_or(word);
    u64::from_str_radix(digits, 16).ok()
}

/// First well-known start symbol that resolves
#[derive(Debug)]
pub struct SymbolEntry<S> {
    lookup: S,
    names: &'static [&'static str],
}

impl<S: SymbolLookup> SymbolEntry<S> {
    /// Try `DEFAULT_ENTRY_SYMBOLS`
    pub fn new(lookup: S) -> Self {
        Self::with_names(lookup, DEFAULT_ENTRY_SYMBOLS)
    }

    /// Try `names` in order
    pub fn with_names(lookup: S, names: &'static [&'static str]) -> Self {
        Self { lookup, names }
    }
}

impl<S: SymbolLookup> EntryStrategy for SymbolEntry<S> {
    fn name(&self) -> &'static str {
        "symbol"
    }

    fn entry_point(&self) -> Option<u64> {
        self.names.iter().find_map(|name| self.lookup.lookup(name))
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

/// Ordered list of entry point strategies
#[derive(Default)]
pub struct EntryResolver<'a> {
    strategies: Vec<Box<dyn EntryStrategy + 'a>>,
}

impl<'a> EntryResolver<'a> {
    /// Create an empty resolver
    pub fn new() -> Self {
        Self { strategies: Vec::new() }
    }

    /// Auxiliary vector, then debugger text, then start symbols
    pub fn default_chain<A, T, S>(auxv: A, text: T, symbols: S) -> Self
    where
        A: AuxvSource + 'a,
        T: DebuggerText + 'a,
        S: SymbolLookup + 'a,
    {
        Self::new()
            .with(AuxvEntry(auxv))
            .with(InfoFilesEntry(text))
            .with(SymbolEntry::new(symbols))
    }

    /// Append a strategy
    pub fn with<E: EntryStrategy + 'a>(mut self, strategy: E) -> Self {
        self.add(strategy);
        self
    }

    /// Append a strategy
    pub fn add<E: EntryStrategy + 'a>(&mut self, strategy: E) {
        self.strategies.push(Box::new(strategy));
    }

    /// Number of strategies
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Check if no strategy is registered
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Ask each strategy in turn
    pub fn resolve(&self) -> Option<u64> {
        for strategy in &self.strategies {
            if let Some(entry) = strategy.entry_point() {
                log::debug!("entry point {:#x} from {}", entry, strategy.name());
                return Some(entry);
            }
        }
        log::debug!("no entry point from {} strategies", self.strategies.len());
        None
    }
}

impl fmt::Debug for EntryResolver<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.strategies.iter().map(|s| s.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use core::cell::Cell;

    const INFO_FILES: &str = "\
Symbols from \"/bin/true\".
Native process:
\tUsing the running image of child process 4242.
Local exec file:
\t`/bin/true', file type elf64-x86-64.
\tEntry point: 0x401a60
\t0x0000000000400238 - 0x0000000000400254 is .interp
";

    struct Counted<'c> {
        calls: &'c Cell<usize>,
        answer: Option<u64>,
    }

    impl EntryStrategy for Counted<'_> {
        fn name(&self) -> &'static str {
            "counted"
        }

        fn entry_point(&self) -> Option<u64> {
            self.calls.set(self.calls.get() + 1);
            self.answer
        }
    }

    #[test]
    fn test_parse_entry_point() {
        assert_eq!(parse_entry_point(INFO_FILES), Some(0x401a60));
        assert_eq!(parse_entry_point("Entry point: 0X5850"), Some(0x5850));
        assert_eq!(parse_entry_point("Entry point: nowhere"), None);
        assert_eq!(parse_entry_point("no process"), None);
    }

    #[test]
    fn test_first_answer_wins() {
        let calls = Cell::new(0);
        let resolver = EntryResolver::new()
            .with(Counted { calls: &calls, answer: None })
            .with(Counted { calls: &calls, answer: Some(0x401000) })
            .with(Counted { calls: &calls, answer: Some(0xdead0000) });

        assert_eq!(resolver.resolve(), Some(0x401000));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_auxv_zero_is_absent() {
        let resolver = EntryResolver::default_chain(
            || Some(0u64),
            || Some(INFO_FILES.to_string()),
            |_: &str| None::<u64>,
        );
        assert_eq!(resolver.resolve(), Some(0x401a60));
    }

    #[test]
    fn test_auxv_preferred() {
        let resolver = EntryResolver::default_chain(
            || Some(0x555555555040u64),
            || Some(INFO_FILES.to_string()),
            |_: &str| Some(0x1234u64),
        );
        assert_eq!(resolver.resolve(), Some(0x555555555040));
    }

    #[test]
    fn test_pie_offset_falls_through_to_symbols() {
        let resolver = EntryResolver::default_chain(
            || None::<u64>,
            || Some("\tEntry point: 0x5850\n".to_string()),
            |name: &str| (name == "__start").then_some(0x555555559850u64),
        );
        assert_eq!(resolver.len(), 3);
        assert_eq!(resolver.resolve(), Some(0x555555559850));
    }

    #[test]
    fn test_symbol_order() {
        let seen = core::cell::RefCell::new(Vec::new());
        let strategy = SymbolEntry::new(|name: &str| {
            seen.borrow_mut().push(name.to_string());
            (name == "main").then_some(0x401136u64)
        });
        assert_eq!(strategy.entry_point(), Some(0x401136));
        assert_eq!(*seen.borrow(), ["_start", "start", "__start", "main"]);
    }

    #[test]
    fn test_nothing_resolves() {
        let empty = EntryResolver::new();
        assert!(empty.is_empty());
        assert_eq!(empty.resolve(), None);

        let resolver = EntryResolver::default_chain(
            || None::<u64>,
            || None::<String>,
            |_: &str| None::<u64>,
        );
        assert_eq!(resolver.resolve(), None);
    }
}
