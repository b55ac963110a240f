//! Hierarchical containers objects are persisted into.
//!
//! - [`IndexedIo`] - the directory/leaf interface
//! - [`MemoryIndexedIo`] - container held in memory
//! - [`FileIndexedIo`] - container stored in a binary file

pub mod compression;
mod data_type;
pub mod file;
mod memory;
mod traits;
mod tree;

pub use data_type::*;
pub use file::{FileIndexedIo, FileOptions};
pub use memory::MemoryIndexedIo;
pub use traits::*;
