//! The hierarchical container interface.
//!
//! A container is a tree of named entries. Each entry is either a directory
//! or a typed [`Leaf`]. Handles are cheap, reference counted views onto one
//! directory of a shared tree.

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use super::data_type::{DataType, Leaf, LeafValue};
use crate::util::{Error, InternedString, Result};

/// Shared handle to a container directory.
pub type IndexedIoPtr = Arc<dyn IndexedIo>;

/// Absolute or relative list of entry names.
pub type EntryPath = SmallVec<[InternedString; 8]>;

/// How a container was opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
    Append,
}

impl OpenMode {
    #[inline]
    pub fn is_writable(&self) -> bool {
        !matches!(self, Self::Read)
    }
}

/// Kind of a directory entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryType {
    Directory,
    File,
}

/// What to do when a requested subdirectory is absent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MissingBehaviour {
    ThrowIfMissing,
    NullIfMissing,
    CreateIfMissing,
}

/// Description of one directory entry.
#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    pub id: InternedString,
    pub entry_type: EntryType,
    /// Leaf type; `None` for directories.
    pub data_type: Option<DataType>,
    /// Element count for array leaves.
    pub array_length: Option<usize>,
}

impl Entry {
    pub fn directory(id: InternedString) -> Self {
        Self {
            id,
            entry_type: EntryType::Directory,
            data_type: None,
            array_length: None,
        }
    }

    pub fn file(id: InternedString, data_type: DataType, array_length: Option<usize>) -> Self {
        Self {
            id,
            entry_type: EntryType::File,
            data_type: Some(data_type),
            array_length,
        }
    }

    #[inline]
    pub fn is_directory(&self) -> bool {
        self.entry_type == EntryType::Directory
    }
}

// ============================================================================
// IndexedIo trait
// ============================================================================

/// A handle onto one directory of a hierarchical container.
pub trait IndexedIo: Send + Sync + fmt::Debug {
    /// Mode the underlying container was opened with.
    fn open_mode(&self) -> OpenMode;

    /// Absolute path of this directory from the container root.
    fn path(&self) -> EntryPath;

    /// Name of this directory (empty for the root).
    fn current_entry_id(&self) -> InternedString;

    /// Check whether an entry of any kind exists.
    fn has_entry(&self, name: &str) -> bool;

    /// Describe one entry.
    fn entry(&self, name: &str) -> Result<Entry>;

    /// Names of all entries, sorted.
    fn entry_ids(&self) -> Vec<InternedString>;

    /// Open a subdirectory, honouring `missing`.
    ///
    /// Returns `Ok(None)` only for [`MissingBehaviour::NullIfMissing`].
    fn subdirectory_with(&self, name: &str, missing: MissingBehaviour) -> Result<Option<IndexedIoPtr>>;

    /// Parent directory, `None` at the root.
    fn parent_directory(&self) -> Option<IndexedIoPtr>;

    /// Handle onto the container root.
    fn root(&self) -> IndexedIoPtr;

    /// Store a leaf, replacing an existing leaf of the same name.
    fn write(&self, name: &str, value: Leaf) -> Result<()>;

    /// Read a leaf.
    fn read(&self, name: &str) -> Result<Leaf>;

    /// Remove an entry and everything below it.
    fn remove(&self, name: &str) -> Result<()>;

    /// Remove every entry of this directory.
    fn remove_all(&self) -> Result<()>;

    /// Declare this directory complete. Later writes below it fail.
    fn commit(&self) -> Result<()>;

    // ------------------------------------------------------------------------
    // Provided
    // ------------------------------------------------------------------------

    /// Names of entries of one kind.
    fn entry_ids_of_type(&self, entry_type: EntryType) -> Vec<InternedString> {
        self.entry_ids()
            .into_iter()
            .filter(|id| {
                self.entry(id)
                    .map(|e| e.entry_type == entry_type)
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Existing subdirectory or [`Error::EntryNotFound`].
    fn subdirectory(&self, name: &str) -> Result<IndexedIoPtr> {
        self.subdirectory_with(name, MissingBehaviour::ThrowIfMissing)?
            .ok_or_else(|| Error::EntryNotFound(name.to_string()))
    }

    /// Existing or newly created subdirectory.
    fn create_subdirectory(&self, name: &str) -> Result<IndexedIoPtr> {
        self.subdirectory_with(name, MissingBehaviour::CreateIfMissing)?
            .ok_or_else(|| Error::EntryNotFound(name.to_string()))
    }

    /// Walk an absolute path from the root.
    fn directory(&self, path: &[InternedString], missing: MissingBehaviour) -> Result<Option<IndexedIoPtr>> {
        let mut current = self.root();
        for part in path {
            match current.subdirectory_with(part, missing)? {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Slash-joined form of [`IndexedIo::path`].
    fn path_string(&self) -> String {
        let path = self.path();
        let mut out = String::from("/");
        out.push_str(&path.iter().map(|p| p.as_str()).collect::<Vec<_>>().join("/"));
        out
    }
}

impl dyn IndexedIo {
    /// Store any [`LeafValue`].
    pub fn write_value<T: LeafValue>(&self, name: &str, value: T) -> Result<()> {
        self.write(name, value.into_leaf())
    }

    /// Read a leaf as a specific Rust type.
    pub fn read_value<T: LeafValue>(&self, name: &str) -> Result<T> {
        let leaf = self.read(name)?;
        T::from_leaf(leaf).map_err(|leaf| Error::EntryTypeMismatch {
            name: name.to_string(),
            expected: T::DATA_TYPE.to_string(),
            actual: leaf.data_type().to_string(),
        })
    }

    pub fn read_u32(&self, name: &str) -> Result<u32> {
        self.read_value(name)
    }

    pub fn read_i32(&self, name: &str) -> Result<i32> {
        self.read_value(name)
    }

    pub fn read_string(&self, name: &str) -> Result<String> {
        self.read_value(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_constructors() {
        let d = Entry::directory("dir".into());
        assert!(d.is_directory());
        assert!(d.data_type.is_none());

        let f = Entry::file("f".into(), DataType::array(super::super::ValueKind::Float), Some(3));
        assert_eq!(f.entry_type, EntryType::File);
        assert_eq!(f.array_length, Some(3));
    }

    #[test]
    fn test_open_mode() {
        assert!(!OpenMode::Read.is_writable());
        assert!(OpenMode::Write.is_writable());
        assert!(OpenMode::Append.is_writable());
    }
}
