//! # Scene Object
//!
//! A runtime-typed, reference-counted object model for scene description.
//!
//! Every value (typed data, compounds, primitives, groups) is an [`Object`]
//! held behind a shared [`ObjectPtr`]. Objects can be created by type id or
//! name from a [`TypeRegistry`], deep-copied with internal sharing preserved,
//! hashed into a deterministic [`MurmurHash`], and saved to or loaded from a
//! hierarchical [`IndexedIo`] container with per-type versioning.
//!
//! ## Modules
//!
//! - [`util`] - Errors, interned strings, math types
//! - [`hash`] - Structural hashing
//! - [`io`] - Hierarchical containers (memory and file backed)
//! - [`core`] - Object trait, registry, copy/save/load engines
//! - [`data`] - Typed data objects
//! - [`objects`] - Compound, vector and matrix containers
//! - [`render`] - Renderer protocol, groups and state
//! - [`geom`] - Geometric primitives
//!
//! ## Example
//!
//! ```ignore
//! use scene_object::prelude::*;
//!
//! let mut compound = CompoundObject::new();
//! let shared = ObjectPtr::new(IntData::new(42));
//! compound.insert("a", shared.clone());
//! compound.insert("b", shared);
//!
//! let io = FileIndexedIo::open("scene.sob", OpenMode::Write)?;
//! ObjectPtr::new(compound).save(&io, "root")?;
//! ```

pub mod util;
pub mod hash;
pub mod io;
pub mod core;
pub mod data;
pub mod objects;
pub mod render;
pub mod geom;

// Re-export commonly used types
pub use crate::core::{Object, ObjectPtr, TypeId, TypeRegistry};
pub use hash::MurmurHash;
pub use io::{IndexedIo, IndexedIoPtr};
pub use util::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{
        CopyContext, MemoryAccumulator, Object, ObjectPtr, ObjectType, TypeDescription, TypeId,
        TypeRegistry, WeakObjectPtr,
    };
    pub use crate::data::*;
    pub use crate::geom::*;
    pub use crate::hash::MurmurHash;
    pub use crate::io::{FileIndexedIo, FileOptions, IndexedIo, IndexedIoPtr, MemoryIndexedIo, OpenMode};
    pub use crate::objects::{CompoundObject, ObjectMatrix, ObjectVector};
    pub use crate::render::*;
    pub use crate::util::{Box3f, Error, InternedString, Mat4, Result, Vec3};
}
