//! In-memory entry tree shared by the container implementations.
//!
//! Nodes live in an arena addressed by index so directory handles stay
//! small and parents can be reached without reference cycles. A [`Store`]
//! decides what `commit` means and how leaves that still live in a backing
//! file are fetched.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::data_type::{DataType, Leaf};
use super::traits::{Entry, EntryPath, IndexedIo, IndexedIoPtr, MissingBehaviour, OpenMode};
use crate::util::{Error, InternedString, Result};

pub(crate) type NodeId = usize;

pub(crate) const ROOT: NodeId = 0;

/// Location of a leaf payload inside a backing file.
#[derive(Clone, Copy, Debug)]
pub(crate) struct StoredLeaf {
    pub data_type: DataType,
    pub array_length: Option<usize>,
    pub pos: u64,
    pub size: u64,
    pub compressed: bool,
}

#[derive(Debug)]
pub(crate) enum LeafSlot {
    Loaded(Leaf),
    Stored(StoredLeaf),
}

impl LeafSlot {
    fn describe(&self) -> (DataType, Option<usize>) {
        match self {
            LeafSlot::Loaded(leaf) => (leaf.data_type(), leaf.array_length()),
            LeafSlot::Stored(s) => (s.data_type, s.array_length),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Directory {
    pub entries: BTreeMap<InternedString, NodeId>,
    pub frozen: bool,
    /// Group position once the subtree has been streamed out.
    pub flushed: Option<u64>,
}

#[derive(Debug)]
pub(crate) enum NodeKind {
    Directory(Directory),
    Leaf(LeafSlot),
}

#[derive(Debug)]
pub(crate) struct Node {
    pub name: InternedString,
    pub parent: Option<NodeId>,
    pub kind: NodeKind,
}

/// Arena of container nodes; index 0 is the root directory.
#[derive(Debug)]
pub(crate) struct Tree {
    nodes: Vec<Option<Node>>,
    free: Vec<NodeId>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    pub fn new() -> Self {
        let root = Node {
            name: InternedString::default(),
            parent: None,
            kind: NodeKind::Directory(Directory::default()),
        };
        Self { nodes: vec![Some(root)], free: Vec::new() }
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(id)
            .and_then(|n| n.as_ref())
            .ok_or_else(|| Error::invalid(format!("dangling container node {}", id)))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id)
            .and_then(|n| n.as_mut())
            .ok_or_else(|| Error::invalid(format!("dangling container node {}", id)))
    }

    pub fn dir(&self, id: NodeId) -> Result<&Directory> {
        match &self.node(id)?.kind {
            NodeKind::Directory(d) => Ok(d),
            NodeKind::Leaf(_) => Err(Error::invalid("handle does not refer to a directory")),
        }
    }

    pub fn dir_mut(&mut self, id: NodeId) -> Result<&mut Directory> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Directory(d) => Ok(d),
            NodeKind::Leaf(_) => Err(Error::invalid("handle does not refer to a directory")),
        }
    }

    /// Directory that accepts modification.
    fn writable_dir(&mut self, id: NodeId) -> Result<&mut Directory> {
        let dir = self.dir(id)?;
        if dir.frozen || dir.flushed.is_some() {
            return Err(Error::Frozen(self.path_string(id)));
        }
        self.dir_mut(id)
    }

    /// Directory whose contents are still present in memory.
    fn readable_dir(&self, id: NodeId) -> Result<&Directory> {
        let dir = self.dir(id)?;
        if dir.flushed.is_some() {
            return Err(Error::Frozen(self.path_string(id)));
        }
        Ok(dir)
    }

    pub fn child(&self, dir: NodeId, name: &str) -> Option<NodeId> {
        self.dir(dir).ok().and_then(|d| d.entries.get(name).copied())
    }

    pub fn path(&self, id: NodeId) -> EntryPath {
        let mut path = EntryPath::new();
        let mut current = Some(id);
        while let Some(n) = current.and_then(|i| self.node(i).ok()) {
            if n.parent.is_some() {
                path.push(n.name.clone());
            }
            current = n.parent;
        }
        path.reverse();
        path
    }

    pub fn path_string(&self, id: NodeId) -> String {
        let path = self.path(id);
        let parts: Vec<&str> = path.iter().map(|p| p.as_str()).collect();
        format!("/{}", parts.join("/"))
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        if let Some(id) = self.free.pop() {
            self.nodes[id] = Some(node);
            id
        } else {
            self.nodes.push(Some(node));
            self.nodes.len() - 1
        }
    }

    pub fn entry(&self, dir: NodeId, name: &str) -> Result<Entry> {
        let id = self
            .readable_dir(dir)?
            .entries
            .get(name)
            .copied()
            .ok_or_else(|| Error::EntryNotFound(self.child_path(dir, name)))?;
        let node = self.node(id)?;
        Ok(match &node.kind {
            NodeKind::Directory(_) => Entry::directory(node.name.clone()),
            NodeKind::Leaf(slot) => {
                let (data_type, len) = slot.describe();
                Entry::file(node.name.clone(), data_type, len)
            }
        })
    }

    pub fn entry_ids(&self, dir: NodeId) -> Vec<InternedString> {
        match self.readable_dir(dir) {
            Ok(d) => d.entries.keys().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    fn child_path(&self, dir: NodeId, name: &str) -> String {
        let base = self.path_string(dir);
        if base == "/" {
            format!("/{}", name)
        } else {
            format!("{}/{}", base, name)
        }
    }

    /// Find or create a subdirectory.
    pub fn subdirectory(&mut self, dir: NodeId, name: &str, missing: MissingBehaviour) -> Result<Option<NodeId>> {
        if let Some(id) = self.readable_dir(dir)?.entries.get(name).copied() {
            return match self.node(id)?.kind {
                NodeKind::Directory(_) => Ok(Some(id)),
                NodeKind::Leaf(_) => Err(Error::EntryTypeMismatch {
                    name: self.child_path(dir, name),
                    expected: "Directory".into(),
                    actual: "File".into(),
                }),
            };
        }
        match missing {
            MissingBehaviour::NullIfMissing => Ok(None),
            MissingBehaviour::ThrowIfMissing => Err(Error::EntryNotFound(self.child_path(dir, name))),
            MissingBehaviour::CreateIfMissing => {
                validate_name(name)?;
                self.writable_dir(dir)?;
                let id = self.alloc(Node {
                    name: InternedString::new(name),
                    parent: Some(dir),
                    kind: NodeKind::Directory(Directory::default()),
                });
                self.writable_dir(dir)?.entries.insert(InternedString::new(name), id);
                Ok(Some(id))
            }
        }
    }

    pub fn write(&mut self, dir: NodeId, name: &str, leaf: Leaf) -> Result<()> {
        validate_name(name)?;
        let existing = self.writable_dir(dir)?.entries.get(name).copied();
        match existing {
            Some(id) => {
                let path = self.child_path(dir, name);
                let node = self.node_mut(id)?;
                match &mut node.kind {
                    NodeKind::Leaf(slot) => *slot = LeafSlot::Loaded(leaf),
                    NodeKind::Directory(_) => return Err(Error::EntryExists(path)),
                }
            }
            None => {
                let id = self.alloc(Node {
                    name: InternedString::new(name),
                    parent: Some(dir),
                    kind: NodeKind::Leaf(LeafSlot::Loaded(leaf)),
                });
                self.writable_dir(dir)?.entries.insert(InternedString::new(name), id);
            }
        }
        Ok(())
    }

    /// Register a leaf whose payload stays in the backing file.
    pub fn insert_stored(&mut self, dir: NodeId, name: &str, stored: StoredLeaf) -> Result<()> {
        validate_name(name)?;
        if self.child(dir, name).is_some() {
            return Err(Error::EntryExists(self.child_path(dir, name)));
        }
        let id = self.alloc(Node {
            name: InternedString::new(name),
            parent: Some(dir),
            kind: NodeKind::Leaf(LeafSlot::Stored(stored)),
        });
        self.dir_mut(dir)?.entries.insert(InternedString::new(name), id);
        Ok(())
    }

    /// Leaf slot for `name`, or an error describing why there is none.
    pub fn leaf(&self, dir: NodeId, name: &str) -> Result<&LeafSlot> {
        let id = self
            .readable_dir(dir)?
            .entries
            .get(name)
            .copied()
            .ok_or_else(|| Error::EntryNotFound(self.child_path(dir, name)))?;
        match &self.node(id)?.kind {
            NodeKind::Leaf(slot) => Ok(slot),
            NodeKind::Directory(_) => Err(Error::EntryTypeMismatch {
                name: self.child_path(dir, name),
                expected: "File".into(),
                actual: "Directory".into(),
            }),
        }
    }

    pub fn remove(&mut self, dir: NodeId, name: &str) -> Result<()> {
        let path = self.child_path(dir, name);
        let id = self
            .writable_dir(dir)?
            .entries
            .remove(name)
            .ok_or(Error::EntryNotFound(path))?;
        self.free_subtree(id);
        Ok(())
    }

    pub fn remove_all(&mut self, dir: NodeId) -> Result<()> {
        let ids: Vec<NodeId> = std::mem::take(&mut self.writable_dir(dir)?.entries)
            .into_values()
            .collect();
        for id in ids {
            self.free_subtree(id);
        }
        Ok(())
    }

    /// Release `id` and all its descendants.
    pub fn free_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(id).and_then(|n| n.take()) {
                if let NodeKind::Directory(d) = node.kind {
                    stack.extend(d.entries.into_values());
                }
                self.free.push(id);
            }
        }
    }

    /// Mark a directory and everything below it read-only.
    pub fn freeze(&mut self, id: NodeId) -> Result<()> {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            if let NodeKind::Directory(d) = &mut self.node_mut(id)?.kind {
                d.frozen = true;
                stack.extend(d.entries.values().copied());
            }
        }
        Ok(())
    }

    /// Number of live nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len() - self.free.len()
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') {
        return Err(Error::argument(format!("invalid entry name {:?}", name)));
    }
    Ok(())
}

// ============================================================================
// Store and handle
// ============================================================================

/// Backend behaviour plugged under a [`Tree`].
pub(crate) trait Store: Send + Sync + fmt::Debug + 'static {
    fn mode(&self) -> OpenMode;

    /// Load a leaf payload that has not been read yet.
    fn fetch(&self, stored: &StoredLeaf) -> Result<Leaf>;

    /// Complete the directory `id`.
    fn commit(&self, tree: &mut Tree, id: NodeId) -> Result<()>;

    /// Flush everything still pending. Called once, when the last handle goes.
    fn close(&self, tree: &mut Tree) -> Result<()>;
}

#[derive(Debug)]
pub(crate) struct Shared<S: Store> {
    pub tree: RwLock<Tree>,
    pub store: S,
}

impl<S: Store> Drop for Shared<S> {
    fn drop(&mut self) {
        if let Err(e) = self.store.close(self.tree.get_mut()) {
            tracing::warn!("failed to close container: {}", e);
        }
    }
}

/// Directory handle over a shared tree.
pub(crate) struct TreeIo<S: Store> {
    pub shared: Arc<Shared<S>>,
    pub node: NodeId,
}

impl<S: Store> TreeIo<S> {
    pub fn new_root(tree: Tree, store: S) -> Self {
        Self {
            shared: Arc::new(Shared { tree: RwLock::new(tree), store }),
            node: ROOT,
        }
    }

    fn handle(&self, node: NodeId) -> IndexedIoPtr {
        Arc::new(TreeIo { shared: self.shared.clone(), node })
    }

    fn check_writable(&self) -> Result<()> {
        if self.shared.store.mode().is_writable() {
            Ok(())
        } else {
            Err(Error::ReadOnly)
        }
    }
}

impl<S: Store> fmt::Debug for TreeIo<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self.shared.tree.read().path_string(self.node);
        f.debug_struct("IndexedIo")
            .field("path", &path)
            .field("mode", &self.shared.store.mode())
            .finish()
    }
}

impl<S: Store> IndexedIo for TreeIo<S> {
    fn open_mode(&self) -> OpenMode {
        self.shared.store.mode()
    }

    fn path(&self) -> EntryPath {
        self.shared.tree.read().path(self.node)
    }

    fn current_entry_id(&self) -> InternedString {
        self.shared
            .tree
            .read()
            .node(self.node)
            .map(|n| n.name.clone())
            .unwrap_or_default()
    }

    fn has_entry(&self, name: &str) -> bool {
        self.shared.tree.read().child(self.node, name).is_some()
    }

    fn entry(&self, name: &str) -> Result<Entry> {
        self.shared.tree.read().entry(self.node, name)
    }

    fn entry_ids(&self) -> Vec<InternedString> {
        self.shared.tree.read().entry_ids(self.node)
    }

    fn subdirectory_with(&self, name: &str, missing: MissingBehaviour) -> Result<Option<IndexedIoPtr>> {
        if missing == MissingBehaviour::CreateIfMissing && !self.has_entry(name) {
            self.check_writable()?;
        }
        let id = self.shared.tree.write().subdirectory(self.node, name, missing)?;
        Ok(id.map(|id| self.handle(id)))
    }

    fn parent_directory(&self) -> Option<IndexedIoPtr> {
        let parent = self.shared.tree.read().node(self.node).ok()?.parent?;
        Some(self.handle(parent))
    }

    fn root(&self) -> IndexedIoPtr {
        self.handle(ROOT)
    }

    fn write(&self, name: &str, value: Leaf) -> Result<()> {
        self.check_writable()?;
        self.shared.tree.write().write(self.node, name, value)
    }

    fn read(&self, name: &str) -> Result<Leaf> {
        let tree = self.shared.tree.read();
        match tree.leaf(self.node, name)? {
            LeafSlot::Loaded(leaf) => Ok(leaf.clone()),
            LeafSlot::Stored(stored) => self.shared.store.fetch(stored),
        }
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.check_writable()?;
        self.shared.tree.write().remove(self.node, name)
    }

    fn remove_all(&self) -> Result<()> {
        self.check_writable()?;
        self.shared.tree.write().remove_all(self.node)
    }

    fn commit(&self) -> Result<()> {
        if !self.open_mode().is_writable() {
            return Ok(());
        }
        let mut tree = self.shared.tree.write();
        self.shared.store.commit(&mut tree, self.node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_paths() {
        let mut t = Tree::new();
        let a = t.subdirectory(ROOT, "a", MissingBehaviour::CreateIfMissing).unwrap().unwrap();
        let b = t.subdirectory(a, "b", MissingBehaviour::CreateIfMissing).unwrap().unwrap();
        assert_eq!(t.path_string(b), "/a/b");
        assert_eq!(t.path_string(ROOT), "/");
        assert_eq!(t.path(b).len(), 2);
    }

    #[test]
    fn test_remove_frees_nodes() {
        let mut t = Tree::new();
        let a = t.subdirectory(ROOT, "a", MissingBehaviour::CreateIfMissing).unwrap().unwrap();
        t.write(a, "x", Leaf::Int(1)).unwrap();
        t.write(a, "y", Leaf::Int(2)).unwrap();
        assert_eq!(t.len(), 4);
        t.remove(ROOT, "a").unwrap();
        assert_eq!(t.len(), 1);
        assert!(matches!(t.remove(ROOT, "a"), Err(Error::EntryNotFound(_))));
    }

    #[test]
    fn test_freeze_blocks_writes() {
        let mut t = Tree::new();
        let a = t.subdirectory(ROOT, "a", MissingBehaviour::CreateIfMissing).unwrap().unwrap();
        let b = t.subdirectory(a, "b", MissingBehaviour::CreateIfMissing).unwrap().unwrap();
        t.freeze(a).unwrap();
        assert!(matches!(t.write(b, "x", Leaf::Int(1)), Err(Error::Frozen(_))));
        assert!(matches!(
            t.subdirectory(a, "c", MissingBehaviour::CreateIfMissing),
            Err(Error::Frozen(_))
        ));
        // existing directories can still be opened
        assert_eq!(t.subdirectory(a, "b", MissingBehaviour::ThrowIfMissing).unwrap(), Some(b));
    }

    #[test]
    fn test_invalid_names() {
        let mut t = Tree::new();
        assert!(t.write(ROOT, "", Leaf::Int(1)).is_err());
        assert!(t.write(ROOT, "a/b", Leaf::Int(1)).is_err());
    }

    #[test]
    fn test_leaf_and_directory_clash() {
        let mut t = Tree::new();
        t.write(ROOT, "x", Leaf::Int(1)).unwrap();
        assert!(matches!(
            t.subdirectory(ROOT, "x", MissingBehaviour::CreateIfMissing),
            Err(Error::EntryTypeMismatch { .. })
        ));
        t.subdirectory(ROOT, "d", MissingBehaviour::CreateIfMissing).unwrap();
        assert!(matches!(t.write(ROOT, "d", Leaf::Int(1)), Err(Error::EntryExists(_))));
    }
}
