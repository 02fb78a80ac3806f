//! Error kinds for both schema compilation and runtime codec
//! operations. Compile errors are collected into a `Vec` by
//! the caller (see `schema::compile`); runtime errors propagate immediately
//! via `?` and abort the enclosing encode/decode.

use thiserror::Error;

/// A single problem found while compiling a schema. Carries the path of the
/// offending declaration (`TypeName` or `TypeName.fields.fieldName`) so that
/// several errors can be reported to the caller at once.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{path}: {message}")]
pub struct SchemaError {
    pub path: String,
    pub message: String,
}

impl SchemaError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Runtime error raised by a `Codec`'s four operations.
#[derive(Debug, Error, PartialEq)]
pub enum CodecError {
    /// A required field or value was absent at `fromObject`.
    #[error("Required {0}")]
    Required(String),

    /// A numeric value fell outside the codec's representable range.
    #[error("Overflow: {0}")]
    Overflow(String),

    /// A value was syntactically invalid for its codec.
    #[error("{0}")]
    Format(String),

    /// A fixed-width codec received input of the wrong length.
    #[error("{0}")]
    LengthMismatch(String),

    /// `fromBytes` ran past the end of the cursor.
    #[error("Illegal offset")]
    IllegalOffset,

    /// A composition call (`vector`, `optional`, `set`, ...) received an
    /// argument that was not a `Codec`.
    #[error("{0}")]
    WrongKindArgument(String),

    /// A duplicate element was found while decoding/encoding a `set`.
    #[error("duplicate element in set: {0}")]
    DuplicateElement(String),
}

pub type CodecResult<T> = Result<T, CodecError>;
