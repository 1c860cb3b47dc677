//! # ELF Mapper HAL
//!
//! Collaborator layer consumed by the page mapper.
//!
//! The mapper never touches a process directly. Everything it knows about a
//! target comes through the [`MemoryReader`] trait, and every alignment
//! decision goes through [`PageSize`]. Hosts plug in whatever backs the
//! address space (a remote stub, ptrace, a core file); [`MemoryImage`] is the
//! in-memory implementation used for offline analysis and tests.
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐
//! │  MemoryReader   │◀────│  elfmap-pagemap │
//! │ (remote/ptrace) │     │                 │
//! └─────────────────┘     └────────┬────────┘
//!                                  │
//!                         ┌────────▼────────┐
//!                         │    PageSize     │
//!                         └─────────────────┘
//! ```

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

pub mod memory;
pub mod paging;

pub use memory::{MemoryImage, MemoryReader, ReadFault};
pub use paging::PageSize;
