//! Typed data objects.
//!
//! [`TypedData<T>`] wraps a single value; the registered aliases cover
//! scalars, strings and the common math types in simple (`IntData`) and
//! vector (`IntVectorData`) form.

mod typed;

pub(crate) use typed::register_types;
pub use typed::*;
