//! Core layer - the runtime-typed object model.
//!
//! This module provides:
//! - [`Object`] / [`ObjectPtr`] - polymorphic values behind shared handles
//! - [`TypeId`] / [`TypeDescription`] - runtime type identity and hierarchy
//! - [`TypeRegistry`] - creation of objects by id or name
//! - [`CopyContext`] - sharing-preserving deep copy
//! - [`SaveContext`] / [`LoadContext`] - versioned persistence
//! - [`MemoryAccumulator`] - memory accounting over shared graphs

mod copy;
mod load;
mod memory;
pub mod object;
mod registry;
mod save;
mod type_ids;

pub use copy::CopyContext;
pub use load::LoadContext;
pub use memory::MemoryAccumulator;
pub use object::{Object, ObjectPtr, ObjectType, WeakObjectPtr};
pub use registry::{CreatorData, CreatorFn, TypeRegistry};
pub use save::SaveContext;
pub use type_ids::*;
