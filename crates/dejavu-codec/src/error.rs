//! Error types for the codecs.

use thiserror::Error;

/// Codec result type
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors from decoding configurations and keys.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("malformed field (expected `name: value`): {0:?}")]
    MalformedField(String),

    #[error("field {field} expects an integer, got {value:?}")]
    InvalidInt { field: String, value: String },

    #[error("field {field} expects a boolean, got {value:?}")]
    InvalidBool { field: String, value: String },

    #[error("malformed key (expected a parenthesized tuple): {0:?}")]
    MalformedKey(String),
}
