//! # Error Types
//!
//! Failures of header location and decoding.
//!
//! Only header-level failures reach callers as errors. Per-page and
//! per-program-header faults are absorbed where they happen and shrink the
//! result instead.

use core::fmt;

use elfmap_hal::ReadFault;

/// Page mapper result type
pub type Result<T> = core::result::Result<T, Error>;

/// Page mapper error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A single memory read failed
    ReadFault(ReadFault),
    /// No ELF magic within the bounded backward scan
    NotFound {
        /// Address the scan started from
        hint: u64,
        /// Number of page candidates examined
        scanned: usize,
    },
    /// A header field holds a value the format does not allow
    MalformedHeader {
        /// Address of the offending ELF header
        base: u64,
        /// What was wrong with it
        reason: &'static str,
    },
    /// Some program headers could not be read
    PartialTable {
        /// Entries decoded successfully
        decoded: usize,
        /// Entries skipped
        skipped: usize,
    },
    /// Mapper configuration rejected by its builder
    InvalidConfig(&'static str),
}

impl Error {
    /// Check whether this error means "no module at this address"
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFault(fault) => write!(f, "Read fault: {fault}"),
            Self::NotFound { hint, scanned } => {
                write!(f, "No ELF header within {scanned} pages below {hint:#x}")
            },
            Self::MalformedHeader { base, reason } => {
                write!(f, "Malformed ELF header at {base:#x}: {reason}")
            },
            Self::PartialTable { decoded, skipped } => {
                write!(f, "Program header table incomplete: {decoded} decoded, {skipped} skipped")
            },
            Self::InvalidConfig(reason) => write!(f, "Invalid configuration: {reason}"),
        }
    }
}

impl From<ReadFault> for Error {
    fn from(fault: ReadFault) -> Self {
        Self::ReadFault(fault)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
