//! Error types for the deproto-core library.
//!
//! Every variant describes invalid input data, never a programming error.
//! Offsets are absolute positions in the buffer handed to the top-level
//! decode call, so a caller can tell a truncated capture from corruption
//! in the middle of a payload.

use thiserror::Error;

/// Result type alias for deproto operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all decode operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The field key varint is missing or malformed
    #[error("malformed field key at offset {offset}")]
    MalformedKey {
        /// Byte offset of the key
        offset: usize,
    },

    /// A varint field value is malformed or runs past the end of the input
    #[error("malformed varint value at offset {offset}")]
    MalformedVarint {
        /// Byte offset of the value
        offset: usize,
    },

    /// Not enough bytes for a fixed-width value
    #[error("truncated fixed-width value at offset {offset}: need {expected} bytes, have {available}")]
    TruncatedFixed {
        /// Byte offset of the value
        offset: usize,
        /// Bytes required (4 or 8)
        expected: usize,
        /// Bytes actually remaining
        available: usize,
    },

    /// The length prefix of a length-delimited field is malformed
    #[error("malformed length prefix at offset {offset}")]
    MalformedLength {
        /// Byte offset of the length varint
        offset: usize,
    },

    /// A length-delimited payload extends past the end of the input
    #[error("truncated length-delimited payload at offset {offset}: need {expected} bytes, have {available}")]
    TruncatedLength {
        /// Byte offset of the payload
        offset: usize,
        /// Length announced by the prefix
        expected: u64,
        /// Bytes actually remaining
        available: usize,
    },

    /// The key carries wire type 6 or 7
    #[error("unknown wire type {wire_type} at offset {offset}")]
    UnknownWireType {
        /// Byte offset of the key
        offset: usize,
        /// The offending wire type bits
        wire_type: u8,
    },

    /// Nested payloads go deeper than the configured limit
    #[error("maximum nesting depth {max_depth} exceeded at offset {offset}")]
    MaxDepthExceeded {
        /// Byte offset of the payload that would exceed the limit
        offset: usize,
        /// The configured limit
        max_depth: usize,
    },
}

impl Error {
    /// Creates a new malformed key error
    pub fn malformed_key(offset: usize) -> Self {
        Self::MalformedKey { offset }
    }

    /// Creates a new malformed varint error
    pub fn malformed_varint(offset: usize) -> Self {
        Self::MalformedVarint { offset }
    }

    /// Creates a new truncated fixed-width error
    pub fn truncated_fixed(offset: usize, expected: usize, available: usize) -> Self {
        Self::TruncatedFixed {
            offset,
            expected,
            available,
        }
    }

    /// Creates a new malformed length error
    pub fn malformed_length(offset: usize) -> Self {
        Self::MalformedLength { offset }
    }

    /// Creates a new truncated length-delimited error
    pub fn truncated_length(offset: usize, expected: u64, available: usize) -> Self {
        Self::TruncatedLength {
            offset,
            expected,
            available,
        }
    }

    /// Byte offset in the top-level buffer where decoding failed
    pub fn offset(&self) -> usize {
        match self {
            Self::MalformedKey { offset }
            | Self::MalformedVarint { offset }
            | Self::TruncatedFixed { offset, .. }
            | Self::MalformedLength { offset }
            | Self::TruncatedLength { offset, .. }
            | Self::UnknownWireType { offset, .. }
            | Self::MaxDepthExceeded { offset, .. } => *offset,
        }
    }

    /// Returns true if a fixed-width value or payload ran past the end of the input
    pub fn is_truncation(&self) -> bool {
        matches!(
            self,
            Self::TruncatedFixed { .. } | Self::TruncatedLength { .. }
        )
    }
}
