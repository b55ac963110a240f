//! Generic object containers.

mod compound;
mod matrix;
mod vector;

pub use compound::{CompoundObject, COMPOUND_OBJECT};
pub(crate) use compound::{hash_members, members_equal};
pub use matrix::{ObjectMatrix, OBJECT_MATRIX};
pub use vector::{ObjectVector, OBJECT_VECTOR};

use crate::core::TypeRegistry;

pub(crate) fn register_types(registry: &TypeRegistry) {
    registry.register::<CompoundObject>();
    registry.register::<ObjectVector>();
    registry.register::<ObjectMatrix>();
}
