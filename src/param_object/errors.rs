use thiserror::Error;

/// A property path could not be resolved against a concrete object.
///
/// Always carries the full original path expression plus the segment that
/// failed, so the defect can be located without internal state dumps.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("property '{segment}' not found on {shape} while resolving '{path}'")]
    MissingProperty {
        path: String,
        segment: String,
        shape: String,
    },

    #[error("index {index} out of bounds (length {len}) while resolving '{path}'")]
    IndexOutOfBounds {
        path: String,
        index: usize,
        len: usize,
    },

    #[error("index token '{token}' is not a valid list position while resolving '{path}'")]
    InvalidIndex { path: String, token: String },

    #[error("cannot address segment '{segment}' on a {shape} value while resolving '{path}'")]
    WrongShape {
        path: String,
        segment: String,
        shape: String,
    },

    #[error("cannot write through null container at segment '{segment}' of '{path}'")]
    NullContainer { path: String, segment: String },

    #[error("no setter for property '{segment}' on {shape} while resolving '{path}'")]
    NoSetter {
        path: String,
        segment: String,
        shape: String,
    },
}

/// More than one accessor candidate matches a property.
///
/// Deferred until the accessor is actually invoked: an ambiguous accessor
/// that is never called is not an error. Both candidate descriptions are
/// surfaced.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("ambiguous accessors for property '{property}' on {type_name}: candidates {candidates:?}")]
pub struct AmbiguousAccessorError {
    pub type_name: String,
    pub property: String,
    pub candidates: Vec<String>,
}

/// Either of the two fatal property-access failures. Write paths can hit
/// both; read paths only ever produce [`AccessError`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PropertyError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Ambiguous(#[from] AmbiguousAccessorError),
}

/// Failure reported by a record's accessor table, before path context is
/// attached by the walker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordAccessFailure {
    NoSuchProperty,
    NoSetter,
    Ambiguous(AmbiguousAccessorError),
}
