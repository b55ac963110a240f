//! Versioned, reference preserving serialization into an [`IndexedIo`].
//!
//! One object saved as `name` inside directory `D` is laid out as:
//!
//! ```text
//! D/name/type                       type name (String)
//! D/name/data/<Layer>/ioVersion     one per class layer that saves (UInt)
//! D/name/data/<Layer>/data/...      that layer's fields
//! ```
//!
//! Saving an object a second time writes an `InternedStringArray` leaf with
//! the path of the first copy, relative to the directory the save started in.
//!
//! [`IndexedIo`]: crate::io::IndexedIo

use std::collections::HashMap;

use tracing::{debug, trace};

use super::object::ObjectPtr;
use crate::io::{EntryPath, IndexedIoPtr};
use crate::util::{Error, InternedString, Result};

pub(crate) const TYPE_ENTRY: &str = "type";
pub(crate) const DATA_ENTRY: &str = "data";
pub(crate) const IO_VERSION_ENTRY: &str = "ioVersion";

/// Bookkeeping shared by all contexts of one top-level save.
pub(crate) struct SaveSession {
    root: EntryPath,
    // Holding the handle keeps the address from being reused mid-save.
    saved: HashMap<usize, (ObjectPtr, Vec<InternedString>)>,
}

/// Handed to [`Object::save`](super::Object::save); scoped to one object.
pub struct SaveContext<'a> {
    io: IndexedIoPtr,
    session: &'a mut SaveSession,
}

impl<'a> SaveContext<'a> {
    /// Directory holding this object's layers.
    pub fn raw_container(&self) -> &IndexedIoPtr {
        &self.io
    }

    /// Open the versioned directory of one class layer and return its `data`.
    pub fn container(&mut self, type_name: &str, io_version: u32) -> Result<IndexedIoPtr> {
        let layer = self.io.create_subdirectory(type_name)?;
        layer.write_value(IO_VERSION_ENTRY, io_version)?;
        layer.create_subdirectory(DATA_ENTRY)
    }

    /// Save `object` as `name` inside `container`.
    pub fn save(&mut self, object: &ObjectPtr, container: &IndexedIoPtr, name: &str) -> Result<()> {
        if let Some((_, path)) = self.session.saved.get(&object.addr()) {
            trace!(name, path = ?path, "save reference");
            return container.write_value(name, path.clone());
        }

        let dir = container.create_subdirectory(name)?;
        let path = relative_path(&dir.path(), &self.session.root)?;
        self.session.saved.insert(object.addr(), (object.clone(), path));

        let source = object.read();
        trace!(name, type_name = source.type_name(), "save object");
        dir.write_value(TYPE_ENTRY, source.type_name().to_string())?;
        let data = dir.create_subdirectory(DATA_ENTRY)?;
        let mut ctx = SaveContext {
            io: data,
            session: &mut *self.session,
        };
        source.save(&mut ctx)
    }
}

/// `path` with the `root` prefix removed.
pub(crate) fn relative_path(path: &[InternedString], root: &[InternedString]) -> Result<Vec<InternedString>> {
    path.strip_prefix(root)
        .map(|p| p.to_vec())
        .ok_or_else(|| Error::invalid("object saved outside of the session root"))
}

/// Save `object` as `io/name`, then commit that directory.
pub(crate) fn save_object(object: &ObjectPtr, io: &IndexedIoPtr, name: &str) -> Result<()> {
    debug!(path = %io.path_string(), name, "save");
    let mut session = SaveSession {
        root: io.path(),
        saved: HashMap::new(),
    };
    let mut ctx = SaveContext {
        io: io.clone(),
        session: &mut session,
    };
    ctx.save(object, io, name)?;
    io.subdirectory(name)?.commit()?;
    debug!(objects = session.saved.len(), "save complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::IntData;
    use crate::io::{EntryType, MemoryIndexedIo};
    use crate::objects::CompoundObject;

    #[test]
    fn test_layout() {
        let io = MemoryIndexedIo::create();
        ObjectPtr::new(IntData::new(5)).save(&io, "five").unwrap();

        let dir = io.subdirectory("five").unwrap();
        assert_eq!(dir.read_string("type").unwrap(), "IntData");
        let layer = dir.subdirectory("data").unwrap().subdirectory("IntData").unwrap();
        assert_eq!(layer.read_u32("ioVersion").unwrap(), 1);
        assert_eq!(layer.subdirectory("data").unwrap().read_i32("value").unwrap(), 5);
    }

    #[test]
    fn test_second_save_is_reference() {
        let member = ObjectPtr::new(IntData::new(1));
        let mut c = CompoundObject::new();
        c.insert("a", member.clone());
        c.insert("b", member);

        let io = MemoryIndexedIo::create();
        ObjectPtr::new(c).save(&io, "c").unwrap();

        let members = io
            .directory(
                &["c", "data", "CompoundObject", "data", "members"].map(InternedString::from),
                crate::io::MissingBehaviour::ThrowIfMissing,
            )
            .unwrap()
            .unwrap();
        assert_eq!(members.entry("a").unwrap().entry_type, EntryType::Directory);
        assert_eq!(members.entry("b").unwrap().entry_type, EntryType::File);
        let path: Vec<InternedString> = members.read_value("b").unwrap();
        let expected: Vec<InternedString> =
            ["c", "data", "CompoundObject", "data", "members", "a"].map(InternedString::from).to_vec();
        assert_eq!(path, expected);
    }

    #[test]
    fn test_relative_path() {
        let root: Vec<InternedString> = vec!["x".into()];
        let path: Vec<InternedString> = vec!["x".into(), "y".into()];
        assert_eq!(relative_path(&path, &root).unwrap(), vec![InternedString::from("y")]);
        assert!(relative_path(&root, &path).is_err());
    }
}
