//! Error types for the scene object library.

use std::path::PathBuf;
use thiserror::Error;

use crate::core::TypeId;

/// Main error type for object, container and persistence operations.
#[derive(Error, Debug)]
pub enum Error {
    /// No creator is registered under this type id or name
    #[error("Type {0} is not a registered Object type")]
    UnregisteredType(String),

    /// The type is registered but has no creator
    #[error("Type {0} is an abstract type")]
    AbstractTypeInstantiation(String),

    /// Operation received an object of the wrong concrete type
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// A required child slot holds nothing
    #[error("Null child: {0}")]
    NullChild(String),

    /// Stored layer version is newer than this library understands
    #[error("File version {found} greater than library version {supported} for {type_name}")]
    IncompatibleVersion {
        type_name: String,
        found: u32,
        supported: u32,
    },

    /// Removal of something that is not a child of this group
    #[error("Object is not a child of this group")]
    NotAChild,

    /// Index outside a container's bounds
    #[error("Index {index} out of range (size: {size})")]
    IndexOutOfRange { index: usize, size: usize },

    /// Container entry does not exist
    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    /// Container entry already exists with a different kind
    #[error("Entry already exists: {0}")]
    EntryExists(String),

    /// Container entry has another kind or data type than requested
    #[error("Entry {name}: expected {expected}, found {actual}")]
    EntryTypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    /// Argument violates a documented precondition
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Invalid magic bytes at start of file
    #[error("Invalid container file: expected SOBIO magic bytes")]
    InvalidMagic,

    /// Unsupported file format version
    #[error("Unsupported container version: {0}")]
    UnsupportedVersion(u16),

    /// File is truncated or corrupted
    #[error("Unexpected end of file at position {0}")]
    UnexpectedEof(u64),

    /// Invalid data structure in file
    #[error("Invalid file structure: {0}")]
    InvalidStructure(String),

    /// Container was opened read-only
    #[error("Container is read-only")]
    ReadOnly,

    /// Directory was committed and can no longer be modified
    #[error("Directory is committed and cannot be modified: {0}")]
    Frozen(String),

    /// Memory mapping failed
    #[error("Memory mapping failed: {0}")]
    MmapFailed(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid structure error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidStructure(msg.into())
    }

    /// Create an invalid argument error.
    pub fn argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Unregistered type reported by id.
    pub fn unregistered_id(id: TypeId) -> Self {
        Self::UnregisteredType(id.to_string())
    }

    /// Type mismatch between two type names.
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;
