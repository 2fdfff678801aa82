//! Error types for the protowire-core library.
//!
//! Every fallible operation in the crate returns [`Error`]. Decode failures
//! surface as [`Error::MalformedInput`], setter failures as [`Error::Range`]
//! or [`Error::TypeMismatch`]. Unknown fields are never an error.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for protowire operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all protowire operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Structurally invalid wire data
    #[error("malformed input at offset {offset}: {details}")]
    MalformedInput {
        /// Byte offset where the error occurred
        offset: usize,
        /// Detailed description of the issue
        details: String,
    },

    /// Integer outside the declared domain of a field
    #[error("value {value} out of range for field '{field}' (expected {min}..={max})")]
    Range {
        /// Field name
        field: String,
        /// Rejected value
        value: i128,
        /// Smallest accepted value
        min: i128,
        /// Largest accepted value
        max: i128,
    },

    /// Value variant does not match the field kind
    #[error("type mismatch for field '{field}': expected {expected}, found {found}")]
    TypeMismatch {
        /// Field name
        field: String,
        /// Kind declared by the descriptor
        expected: String,
        /// Kind of the supplied value
        found: String,
    },

    /// Field is not declared by the message descriptor
    #[error("message '{message}' has no field '{field}'")]
    UnknownField {
        /// Message type name
        message: String,
        /// Field name or number as given by the caller
        field: String,
    },

    /// Invalid field number in descriptor
    #[error("invalid field number {number}: must be between 1 and {max}, outside 19000..=19999")]
    InvalidFieldNumber {
        /// The invalid field number
        number: u32,
        /// Maximum valid field number
        max: u32,
    },

    /// Two fields of one message share a number or name
    #[error("duplicate field '{field}' in message '{message}'")]
    DuplicateField {
        /// Message type name
        message: String,
        /// Offending field name or number
        field: String,
    },

    /// Encoded message would exceed the serialization limit
    #[error("message '{message}' is {size} bytes, over the serialization limit of {limit} bytes")]
    MessageTooLarge {
        /// Message type name
        message: String,
        /// Encoded size in bytes
        size: usize,
        /// Largest accepted size
        limit: usize,
    },

    /// Failed to parse FileDescriptorSet
    #[error("failed to parse descriptor set: {0}")]
    DescriptorParse(#[from] prost::DecodeError),

    /// Failed to build a message descriptor
    #[error("failed to build descriptor: {0}")]
    DescriptorBuild(String),

    /// No message with the requested name
    #[error("message type '{name}' not found")]
    MessageNotFound {
        /// Fully-qualified message name
        name: String,
    },

    /// Failed to read input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Generic internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Creates a new malformed input error
    pub fn malformed(offset: usize, details: impl Into<String>) -> Self {
        Self::MalformedInput {
            offset,
            details: details.into(),
        }
    }

    /// Creates a new range error
    pub fn range(field: impl Into<String>, value: i128, min: i128, max: i128) -> Self {
        Self::Range {
            field: field.into(),
            value,
            min,
            max,
        }
    }

    /// Creates a new type mismatch error
    pub fn type_mismatch(
        field: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            field: field.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Creates a new unknown field error
    pub fn unknown_field(message: impl Into<String>, field: impl ToString) -> Self {
        Self::UnknownField {
            message: message.into(),
            field: field.to_string(),
        }
    }

    /// Creates a new duplicate field error
    pub fn duplicate_field(message: impl Into<String>, field: impl ToString) -> Self {
        Self::DuplicateField {
            message: message.into(),
            field: field.to_string(),
        }
    }

    /// Creates a new message-too-large error
    pub fn message_too_large(message: impl Into<String>, size: usize, limit: usize) -> Self {
        Self::MessageTooLarge {
            message: message.into(),
            size,
            limit,
        }
    }

    /// Creates a new descriptor build error
    pub fn descriptor_build(msg: impl Into<String>) -> Self {
        Self::DescriptorBuild(msg.into())
    }

    /// Creates a new message-not-found error
    pub fn message_not_found(name: impl Into<String>) -> Self {
        Self::MessageNotFound { name: name.into() }
    }

    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns a copy of a malformed input error with its offset shifted.
    ///
    /// Nested decoders report offsets relative to their own slice.
    pub(crate) fn shift_offset(self, base: usize) -> Self {
        match self {
            Self::MalformedInput { offset, details } => Self::MalformedInput {
                offset: offset + base,
                details,
            },
            other => other,
        }
    }

    /// Returns true if the bytes were not a valid message of the requested type
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedInput { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::range("max_reconnect_backoff_ms", 1 << 31, -(1 << 31), (1 << 31) - 1);
        let msg = err.to_string();
        assert!(msg.contains("max_reconnect_backoff_ms"));
        assert!(msg.contains("2147483648"));

        let err = Error::message_too_large("grpc.testing.ReconnectParams", 3, 2);
        assert_eq!(
            err.to_string(),
            "message 'grpc.testing.ReconnectParams' is 3 bytes, over the serialization limit of 2 bytes"
        );
    }

    #[test]
    fn test_is_malformed() {
        assert!(Error::malformed(3, "truncated varint").is_malformed());
        assert!(!Error::unknown_field("Foo", 7).is_malformed());
    }

    #[test]
    fn test_shift_offset() {
        let err = Error::malformed(2, "length overrun").shift_offset(10);
        match err {
            Error::MalformedInput { offset, .. } => assert_eq!(offset, 12),
            other => panic!("unexpected error: {other}"),
        }
    }
}
