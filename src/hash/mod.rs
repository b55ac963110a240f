//! Structural hashing.

mod murmur;

pub use murmur::*;
