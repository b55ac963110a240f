//! Container stored in a single binary file.
//!
//! Reading parses the directory structure up front and fetches leaf payloads
//! lazily from a memory map. Writing keeps the tree in memory until a
//! directory is committed; its subtree is then streamed to disk and released.
//! The root and the final header are written when the last handle is dropped.

pub mod format;
pub mod reader;
pub mod writer;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use self::format::*;
use self::reader::IStreams;
use self::writer::OStream;
use super::compression;
use super::data_type::Leaf;
use super::traits::{EntryType, IndexedIoPtr, MissingBehaviour, OpenMode};
use super::tree::{LeafSlot, NodeId, NodeKind, Store, StoredLeaf, Tree, TreeIo, ROOT};
use crate::util::{Error, Result};

/// Tuning for file containers.
#[derive(Clone, Debug)]
pub struct FileOptions {
    /// zlib level for leaf payloads, 0 disables compression.
    pub compression_level: u32,
    /// Payloads smaller than this are stored raw.
    pub compression_threshold: usize,
    /// Memory-map files opened for reading.
    pub use_mmap: bool,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            compression_level: 6,
            compression_threshold: 256,
            use_mmap: cfg!(feature = "mmap"),
        }
    }
}

#[derive(Debug)]
pub(crate) struct FileStore {
    mode: OpenMode,
    path: PathBuf,
    options: FileOptions,
    reader: Option<IStreams>,
    writer: Mutex<Option<OStream>>,
}

impl FileStore {
    fn write_dir(&self, tree: &Tree, out: &mut OStream, id: NodeId) -> Result<u64> {
        let dir = tree.dir(id)?;
        if let Some(pos) = dir.flushed {
            return Ok(pos);
        }

        let mut index = Vec::with_capacity(dir.entries.len());
        let mut children = Vec::with_capacity(dir.entries.len() + 1);
        children.push(0);

        for (name, &child) in &dir.entries {
            match &tree.node(child)?.kind {
                NodeKind::Directory(_) => {
                    let pos = self.write_dir(tree, out, child)?;
                    children.push(make_group_offset(pos));
                    index.push(IndexEntry {
                        name: name.clone(),
                        entry_type: EntryType::Directory,
                        data_type: None,
                        array_length: None,
                        compressed: false,
                    });
                }
                NodeKind::Leaf(slot) => {
                    let fetched;
                    let leaf = match slot {
                        LeafSlot::Loaded(leaf) => leaf,
                        LeafSlot::Stored(stored) => {
                            fetched = self.fetch(stored)?;
                            &fetched
                        }
                    };
                    let raw = leaf.encode();
                    let packed = if raw.len() >= self.options.compression_threshold {
                        compression::compress(&raw, self.options.compression_level)?
                    } else {
                        None
                    };
                    let compressed = packed.is_some();
                    let pos = out.write_data(packed.as_deref().unwrap_or(&raw))?;
                    children.push(make_data_offset(pos));
                    index.push(IndexEntry {
                        name: name.clone(),
                        entry_type: EntryType::File,
                        data_type: Some(leaf.data_type()),
                        array_length: leaf.array_length(),
                        compressed,
                    });
                }
            }
        }

        children[0] = make_data_offset(out.write_data(&encode_index(&index))?);
        out.write_group(&children)
    }

    fn read_dir(&self, streams: &IStreams, tree: &mut Tree, id: NodeId, pos: u64, depth: usize) -> Result<()> {
        if depth > 4096 {
            return Err(Error::invalid("directory nesting too deep"));
        }
        let children = streams.read_group(pos)?;
        let (first, rest) = children
            .split_first()
            .ok_or_else(|| Error::invalid(format!("directory group at {} has no index", pos)))?;
        if !is_data_offset(*first) {
            return Err(Error::invalid(format!("directory group at {} has no index", pos)));
        }
        let index = decode_index(&streams.read_data(extract_offset(*first))?)?;
        if index.len() != rest.len() {
            return Err(Error::invalid(format!(
                "directory at {} lists {} entries but has {} children",
                pos,
                index.len(),
                rest.len()
            )));
        }

        for (entry, &offset) in index.iter().zip(rest) {
            match entry.entry_type {
                EntryType::Directory => {
                    if is_data_offset(offset) {
                        return Err(Error::invalid(format!("{} should be a group", entry.name)));
                    }
                    let child = tree
                        .subdirectory(id, &entry.name, MissingBehaviour::CreateIfMissing)?
                        .ok_or_else(|| Error::invalid("directory creation failed"))?;
                    self.read_dir(streams, tree, child, extract_offset(offset), depth + 1)?;
                }
                EntryType::File => {
                    if !is_data_offset(offset) {
                        return Err(Error::invalid(format!("{} should be a data block", entry.name)));
                    }
                    let data_type = entry
                        .data_type
                        .ok_or_else(|| Error::invalid(format!("{} has no data type", entry.name)))?;
                    let block = extract_offset(offset);
                    let stored = StoredLeaf {
                        data_type,
                        array_length: entry.array_length,
                        pos: block + 8,
                        size: streams.read_u64(block)?,
                        compressed: entry.compressed,
                    };
                    if self.mode == OpenMode::Read {
                        tree.insert_stored(id, &entry.name, stored)?;
                    } else {
                        let leaf = fetch_from(streams, &stored)?;
                        tree.write(id, &entry.name, leaf)?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn fetch_from(streams: &IStreams, stored: &StoredLeaf) -> Result<Leaf> {
    let bytes = streams.read_bytes(stored.pos, stored.size as usize)?;
    let bytes = if stored.compressed {
        compression::decompress(&bytes)?
    } else {
        bytes
    };
    Leaf::decode(stored.data_type, &bytes)
}

impl Store for FileStore {
    fn mode(&self) -> OpenMode {
        self.mode
    }

    fn fetch(&self, stored: &StoredLeaf) -> Result<Leaf> {
        let streams = self
            .reader
            .as_ref()
            .ok_or_else(|| Error::invalid("leaf payload has no backing file"))?;
        fetch_from(streams, stored)
    }

    fn commit(&self, tree: &mut Tree, id: NodeId) -> Result<()> {
        let mut guard = self.writer.lock();
        let out = guard.as_mut().ok_or(Error::ReadOnly)?;
        let pos = self.write_dir(tree, out, id)?;

        let dir = tree.dir_mut(id)?;
        let released: Vec<NodeId> = std::mem::take(&mut dir.entries).into_values().collect();
        dir.flushed = Some(pos);
        dir.frozen = true;
        for child in released {
            tree.free_subtree(child);
        }
        tracing::debug!("committed {} at {}", tree.path_string(id), pos);
        Ok(())
    }

    fn close(&self, tree: &mut Tree) -> Result<()> {
        let Some(mut out) = self.writer.lock().take() else {
            return Ok(());
        };
        let root = self.write_dir(tree, &mut out, ROOT)?;
        out.finish(root)?;
        tracing::debug!("closed {} (root at {})", self.path.display(), root);
        Ok(())
    }
}

/// Container stored in a binary file.
pub struct FileIndexedIo;

impl FileIndexedIo {
    /// Open a file container with default options.
    pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> Result<IndexedIoPtr> {
        Self::open_with(path, mode, FileOptions::default())
    }

    /// Open a file container.
    ///
    /// `Write` truncates, `Append` loads the existing contents (if any) and
    /// rewrites the file when the container is closed.
    pub fn open_with(path: impl AsRef<Path>, mode: OpenMode, options: FileOptions) -> Result<IndexedIoPtr> {
        let path = path.as_ref();
        let mut tree = Tree::new();

        let reader = match mode {
            OpenMode::Read => Some(IStreams::open(path, options.use_mmap)?),
            OpenMode::Append if path.exists() => Some(IStreams::open(path, false)?),
            _ => None,
        };

        let mut store = FileStore {
            mode,
            path: path.to_path_buf(),
            options,
            reader: None,
            writer: Mutex::new(None),
        };

        if let Some(streams) = &reader {
            if !streams.is_frozen() {
                return Err(Error::invalid(format!("{} was not closed cleanly", path.display())));
            }
            let root = streams.root_pos()?;
            store.read_dir(streams, &mut tree, ROOT, root, 0)?;
            tracing::debug!("opened {} ({} entries)", path.display(), tree.len() - 1);
        }

        match mode {
            OpenMode::Read => store.reader = reader,
            OpenMode::Write | OpenMode::Append => {
                // Append has copied everything into memory; release the file before truncating it.
                drop(reader);
                *store.writer.get_mut() = Some(OStream::create(path)?);
            }
        }

        Ok(Arc::new(TreeIo::new_root(tree, store)))
    }
}
