//! Loading objects written by [`SaveContext`](super::SaveContext).

use std::collections::HashMap;

use tracing::{debug, trace};

use super::object::{ObjectPtr, WeakObjectPtr};
use super::registry::TypeRegistry;
use super::save::{relative_path, DATA_ENTRY, IO_VERSION_ENTRY, TYPE_ENTRY};
use crate::io::{EntryPath, IndexedIoPtr, Leaf, MissingBehaviour};
use crate::util::{Error, InternedString, Result};

/// Bookkeeping shared by all contexts of one top-level load.
pub(crate) struct LoadSession {
    root: IndexedIoPtr,
    root_path: EntryPath,
    registry: TypeRegistry,
    loaded: HashMap<Vec<InternedString>, ObjectPtr>,
}

/// Handed to [`Object::load`](super::Object::load); scoped to one object.
pub struct LoadContext<'a> {
    io: IndexedIoPtr,
    target: WeakObjectPtr,
    session: &'a mut LoadSession,
}

impl<'a> LoadContext<'a> {
    /// Directory holding this object's layers.
    pub fn raw_container(&self) -> &IndexedIoPtr {
        &self.io
    }

    /// Handle of the object being loaded.
    pub fn current_target(&self) -> WeakObjectPtr {
        self.target.clone()
    }

    /// Open the `data` directory of one class layer.
    ///
    /// `io_version` holds the version this library writes and receives the
    /// stored one. Newer stored versions are rejected.
    pub fn container(&self, type_name: &str, io_version: &mut u32) -> Result<IndexedIoPtr> {
        let layer = self.io.subdirectory(type_name)?;
        let stored = layer.read_u32(IO_VERSION_ENTRY)?;
        if stored > *io_version {
            return Err(Error::IncompatibleVersion {
                type_name: type_name.to_string(),
                found: stored,
                supported: *io_version,
            });
        }
        *io_version = stored;
        layer.subdirectory(DATA_ENTRY)
    }

    /// Load the object stored as `name` inside `container`.
    ///
    /// A directory holds the object itself; a leaf is a reference to an
    /// object stored elsewhere in the same session.
    pub fn load(&mut self, container: &IndexedIoPtr, name: &str) -> Result<ObjectPtr> {
        let entry = container.entry(name)?;
        let path = if entry.is_directory() {
            let mut path = relative_path(&container.path(), &self.session.root_path)?;
            path.push(InternedString::from(name));
            path
        } else {
            match container.read(name)? {
                Leaf::InternedStringArray(path) => path,
                Leaf::String(path) => path
                    .split('/')
                    .filter(|p| !p.is_empty())
                    .map(InternedString::from)
                    .collect(),
                other => {
                    return Err(Error::EntryTypeMismatch {
                        name: name.to_string(),
                        expected: "InternedStringArray".to_string(),
                        actual: other.data_type().to_string(),
                    })
                }
            }
        };
        self.load_path(path)
    }

    fn load_path(&mut self, path: Vec<InternedString>) -> Result<ObjectPtr> {
        if let Some(existing) = self.session.loaded.get(&path) {
            trace!(path = ?path, "load reference");
            return Ok(existing.clone());
        }

        let mut absolute: Vec<InternedString> = self.session.root_path.to_vec();
        absolute.extend(path.iter().cloned());
        let dir = self
            .session
            .root
            .directory(&absolute, MissingBehaviour::ThrowIfMissing)?
            .ok_or_else(|| Error::EntryNotFound(join(&path)))?;

        let type_name = dir.read_string(TYPE_ENTRY)?;
        trace!(path = ?path, type_name, "load object");
        let object = self.session.registry.create_named(&type_name)?;
        self.session.loaded.insert(path, object.clone());

        let mut ctx = LoadContext {
            io: dir.subdirectory(DATA_ENTRY)?,
            target: object.downgrade(),
            session: &mut *self.session,
        };
        object.write().load(&mut ctx)?;
        Ok(object)
    }
}

fn join(path: &[InternedString]) -> String {
    path.iter().map(|p| p.as_str()).collect::<Vec<_>>().join("/")
}

/// Load the object stored as `io/name`.
pub(crate) fn load_object(io: &IndexedIoPtr, name: &str, registry: &TypeRegistry) -> Result<ObjectPtr> {
    debug!(path = %io.path_string(), name, "load");
    let mut session = LoadSession {
        root: io.clone(),
        root_path: io.path(),
        registry: registry.clone(),
        loaded: HashMap::new(),
    };
    let mut ctx = LoadContext {
        io: io.clone(),
        target: WeakObjectPtr::new(),
        session: &mut session,
    };
    let object = ctx.load(io, name)?;
    debug!(objects = session.loaded.len(), "load complete");
    Ok(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{IntData, StringData};
    use crate::io::MemoryIndexedIo;
    use crate::objects::CompoundObject;

    #[test]
    fn test_round_trip_shares_members() {
        let member = ObjectPtr::new(StringData::new("shared".to_string()));
        let mut c = CompoundObject::new();
        c.insert("a", member.clone());
        c.insert("b", member);
        c.insert("n", ObjectPtr::new(IntData::new(3)));
        let src = ObjectPtr::new(c);

        let io = MemoryIndexedIo::create();
        src.save(&io, "c").unwrap();
        let loaded = ObjectPtr::load(&io, "c").unwrap();
        assert!(loaded.is_equal_to(&src));

        let c = loaded.downcast_ref::<CompoundObject>().unwrap();
        assert!(c.get("a").unwrap().ptr_eq(c.get("b").unwrap()));
    }

    #[test]
    fn test_legacy_string_reference() {
        let io = MemoryIndexedIo::create();
        ObjectPtr::new(IntData::new(9)).save(&io, "value").unwrap();
        io.write_value("alias", "value".to_string()).unwrap();

        let loaded = ObjectPtr::load(&io, "alias").unwrap();
        assert_eq!(*loaded.downcast_ref::<IntData>().unwrap().value(), 9);
    }

    #[test]
    fn test_newer_version_rejected() {
        let io = MemoryIndexedIo::create();
        ObjectPtr::new(IntData::new(1)).save(&io, "v").unwrap();

        let layer = io.create_subdirectory("w").unwrap();
        layer.write_value("type", "IntData".to_string()).unwrap();
        let stored = layer.create_subdirectory("data").unwrap().create_subdirectory("IntData").unwrap();
        stored.write_value("ioVersion", 99u32).unwrap();
        stored.create_subdirectory("data").unwrap().write_value("value", 1i32).unwrap();

        let err = ObjectPtr::load(&io, "w").unwrap_err();
        assert!(matches!(err, Error::IncompatibleVersion { found: 99, .. }));
    }

    #[test]
    fn test_unknown_type_name() {
        let io = MemoryIndexedIo::create();
        let dir = io.create_subdirectory("x").unwrap();
        dir.write_value("type", "NoSuchType".to_string()).unwrap();
        dir.create_subdirectory("data").unwrap();
        assert!(matches!(ObjectPtr::load(&io, "x"), Err(Error::UnregisteredType(_))));
    }
}
