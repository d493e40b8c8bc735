//! Codec errors.

use thiserror::Error;

/// Result alias for JSON and CBOR conversion.
pub type CodecResult<T> = Result<T, CodecError>;

/// Failure to move a [`Value`](crate::Value) in or out of its JSON or
/// canonical CBOR form.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Canonical CBOR has no NaN.
    #[error("cannot encode NaN in canonical form")]
    NaNForbidden,

    /// Canonical CBOR only allows definite lengths.
    #[error("indefinite-length item in canonical input")]
    IndefiniteLengthForbidden,

    /// A text item is not UTF-8.
    #[error("text item is not valid UTF-8")]
    InvalidUtf8,

    /// Input stopped in the middle of an item.
    #[error("input truncated")]
    UnexpectedEof,

    /// Bytes that do not form a canonical item.
    #[error("malformed binary value: {message}")]
    InvalidStructure {
        /// What was wrong.
        message: String,
    },

    /// A major type or simple value records cannot hold.
    #[error("{type_name} cannot be represented as a record value")]
    UnsupportedType {
        /// The rejected type.
        type_name: String,
    },

    /// An integer outside the `i64` range.
    #[error("integer does not fit in 64 bits")]
    IntegerOverflow,

    /// A declared length larger than the decoder accepts.
    #[error("declared length {claimed} exceeds limit {max_allowed}")]
    SizeLimitExceeded {
        /// Declared length.
        claimed: u64,
        /// Accepted maximum.
        max_allowed: u64,
    },

    /// Malformed JSON text, or JSON that is not a record batch.
    #[error("invalid JSON: {message}")]
    InvalidJson {
        /// Parser message.
        message: String,
    },
}

impl CodecError {
    /// Malformed binary input.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }

    /// A type records cannot hold.
    pub fn unsupported_type(type_name: impl Into<String>) -> Self {
        Self::UnsupportedType {
            type_name: type_name.into(),
        }
    }

    /// Malformed or mis-shaped JSON.
    pub fn invalid_json(message: impl Into<String>) -> Self {
        Self::InvalidJson {
            message: message.into(),
        }
    }
}
