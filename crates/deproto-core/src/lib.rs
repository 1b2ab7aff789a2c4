//! # deproto-core
//!
//! A library for inspecting Protocol Buffer wire data without a schema.
//!
//! This crate provides the core functionality for:
//! - Decoding raw protobuf wire format into an ordered field tree
//! - Guessing whether length-delimited payloads are nested messages,
//!   printable text, or opaque bytes
//! - Rendering the tree as indented, human-readable text
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`decoder`]: Wire format parsing and payload classification
//! - [`field`]: The decoded field tree
//! - [`render`]: Text rendering
//! - [`stats`]: Tree traversal and summary statistics
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```
//! use deproto_core::{Decoder, Renderer};
//!
//! // field 1 = 150, field 2 { field 1 = 1 }
//! let data = [0x08, 0x96, 0x01, 0x12, 0x02, 0x08, 0x01];
//!
//! let fields = Decoder::new().decode(&data)?;
//! let text = Renderer::new().render(&fields);
//!
//! assert_eq!(
//!     text,
//!     "[1 Varint]: 150 (0x96)\n[2 Length-delimited]: (2 bytes)\n    [1 Varint]: 1 (0x1)\n"
//! );
//! # Ok::<(), deproto_core::Error>(())
//! ```
//!
//! Nested-message detection is a heuristic. Without a schema the same bytes
//! can be a string, a bytes field, or a message, and the decoder prefers
//! the message reading whenever one exists.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod decoder;
pub mod error;
pub mod field;
pub mod render;
pub mod stats;

// Re-export primary types for convenience
pub use decoder::{
    decode_field, decode_fields, Decoder, DecoderConfig, PartialDecode, WireType,
    DEFAULT_HEURISTIC_BUDGET, DEFAULT_MAX_DEPTH,
};
pub use error::{Error, Result};
pub use field::{Content, Field, FieldValue, Payload};
pub use render::{render_field, render_fields, RenderConfig, Renderer};
pub use stats::{FieldVisitor, StatsVisitor};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
