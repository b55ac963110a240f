//! Container held entirely in memory.

use std::sync::Arc;

use super::data_type::Leaf;
use super::traits::{IndexedIoPtr, OpenMode};
use super::tree::{NodeId, Store, StoredLeaf, Tree, TreeIo};
use crate::util::{Error, Result};

#[derive(Debug)]
pub(crate) struct MemoryStore;

impl Store for MemoryStore {
    fn mode(&self) -> OpenMode {
        OpenMode::Write
    }

    fn fetch(&self, _stored: &StoredLeaf) -> Result<Leaf> {
        Err(Error::invalid("memory container has no stored leaves"))
    }

    fn commit(&self, tree: &mut Tree, id: NodeId) -> Result<()> {
        tracing::trace!("commit {}", tree.path_string(id));
        tree.freeze(id)
    }

    fn close(&self, _tree: &mut Tree) -> Result<()> {
        Ok(())
    }
}

/// Writable container living in memory. Committed directories become read-only.
pub struct MemoryIndexedIo;

impl MemoryIndexedIo {
    /// Create an empty container and return a handle to its root.
    pub fn create() -> IndexedIoPtr {
        Arc::new(TreeIo::new_root(Tree::new(), MemoryStore))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{EntryType, MissingBehaviour};
    use crate::util::InternedString;

    #[test]
    fn test_write_and_read() {
        let root = MemoryIndexedIo::create();
        root.write_value("version", 3u32).unwrap();
        root.write_value("names", vec![String::from("a"), String::from("b")]).unwrap();

        assert_eq!(root.read_u32("version").unwrap(), 3);
        assert_eq!(root.read_value::<Vec<String>>("names").unwrap(), ["a", "b"]);
        assert!(matches!(root.read_i32("version"), Err(Error::EntryTypeMismatch { .. })));
        assert!(matches!(root.read("missing"), Err(Error::EntryNotFound(_))));
    }

    #[test]
    fn test_subdirectories_and_paths() {
        let root = MemoryIndexedIo::create();
        let a = root.create_subdirectory("a").unwrap();
        let b = a.create_subdirectory("b").unwrap();
        b.write_value("x", 1i32).unwrap();

        assert_eq!(b.path_string(), "/a/b");
        assert_eq!(b.current_entry_id(), "b");
        assert_eq!(b.parent_directory().unwrap().path_string(), "/a");
        assert!(root.parent_directory().is_none());

        let path: Vec<InternedString> = vec!["a".into(), "b".into()];
        let found = b.directory(&path, MissingBehaviour::ThrowIfMissing).unwrap().unwrap();
        assert_eq!(found.read_i32("x").unwrap(), 1);

        assert!(root.subdirectory_with("nope", MissingBehaviour::NullIfMissing).unwrap().is_none());
        assert!(matches!(root.subdirectory("nope"), Err(Error::EntryNotFound(_))));
    }

    #[test]
    fn test_entries() {
        let root = MemoryIndexedIo::create();
        root.create_subdirectory("dir").unwrap();
        root.write_value("floats", vec![1.0f32, 2.0]).unwrap();

        assert_eq!(root.entry_ids().len(), 2);
        assert_eq!(root.entry_ids_of_type(EntryType::Directory), ["dir"]);
        let e = root.entry("floats").unwrap();
        assert_eq!(e.entry_type, EntryType::File);
        assert_eq!(e.array_length, Some(2));
    }

    #[test]
    fn test_commit_freezes_subtree() {
        let root = MemoryIndexedIo::create();
        let a = root.create_subdirectory("a").unwrap();
        let b = a.create_subdirectory("b").unwrap();
        a.commit().unwrap();

        assert!(matches!(b.write_value("x", 1i32), Err(Error::Frozen(_))));
        assert!(matches!(a.remove("b"), Err(Error::Frozen(_))));
        // siblings stay writable
        root.write_value("y", 2i32).unwrap();
    }

    #[test]
    fn test_remove() {
        let root = MemoryIndexedIo::create();
        root.write_value("x", 1i32).unwrap();
        root.create_subdirectory("d").unwrap().write_value("z", 1i32).unwrap();
        root.remove("x").unwrap();
        assert!(!root.has_entry("x"));
        root.remove_all().unwrap();
        assert!(root.entry_ids().is_empty());
    }
}
