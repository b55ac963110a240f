//! Utility types used throughout the library:
//! - [`Error`] / [`Result`] - Error handling
//! - [`InternedString`] - shared, pointer-comparable names
//! - Math type re-exports from glam plus [`Box3f`]

mod error;
mod interned;
mod math;

pub use error::*;
pub use interned::*;
pub use math::*;
