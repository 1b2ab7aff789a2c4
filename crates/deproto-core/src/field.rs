//! Decoded field tree.
//!
//! A decoded buffer is an ordered `Vec<Field>`. Length-delimited fields own
//! their payload bytes and, when the payload looked like a message, the
//! fields decoded from it. The tree is built once by the decoder and never
//! mutated afterwards.

use crate::decoder::WireType;

/// A single decoded field
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Field number (key bits 3..63)
    pub id: u64,
    /// Decoded value
    pub value: FieldValue,
}

/// The value of a field, one variant per wire type
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Raw unsigned varint, no zig-zag or sign interpretation
    Varint(u64),
    /// Little-endian 64-bit value
    Fixed64(u64),
    /// Length-prefixed payload
    LengthDelimited(Payload),
    /// Start of a legacy group (tag only)
    StartGroup,
    /// End of a legacy group (tag only)
    EndGroup,
    /// Little-endian 32-bit value
    Fixed32(u32),
}

/// How a length-delimited payload was interpreted
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// The payload decoded as a non-empty field sequence
    Message(Vec<Field>),
    /// The payload is printable UTF-8 text
    Text(String),
    /// Neither; only the raw bytes are kept
    Opaque,
}

/// Raw bytes of a length-delimited field together with their interpretation
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    data: Vec<u8>,
    content: Content,
}

impl Field {
    /// Creates a new field
    pub fn new(id: u64, value: FieldValue) -> Self {
        Self { id, value }
    }

    /// Wire type this field was encoded with
    pub fn wire_type(&self) -> WireType {
        self.value.wire_type()
    }

    /// Returns true if this is a length-delimited field holding a nested message
    pub fn is_message(&self) -> bool {
        matches!(
            &self.value,
            FieldValue::LengthDelimited(payload) if payload.fields().is_some()
        )
    }
}

impl FieldValue {
    /// Wire type matching this variant
    pub fn wire_type(&self) -> WireType {
        match self {
            FieldValue::Varint(_) => WireType::Varint,
            FieldValue::Fixed64(_) => WireType::Fixed64,
            FieldValue::LengthDelimited(_) => WireType::LengthDelimited,
            FieldValue::StartGroup => WireType::StartGroup,
            FieldValue::EndGroup => WireType::EndGroup,
            FieldValue::Fixed32(_) => WireType::Fixed32,
        }
    }

    /// The 64-bit pattern reinterpreted as a double, for `Fixed64` values
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Fixed64(bits) => Some(f64::from_bits(*bits)),
            _ => None,
        }
    }

    /// The 32-bit pattern reinterpreted as a float, for `Fixed32` values
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            FieldValue::Fixed32(bits) => Some(f32::from_bits(*bits)),
            _ => None,
        }
    }
}

impl Payload {
    /// Creates a payload from its bytes and classification
    pub fn new(data: Vec<u8>, content: Content) -> Self {
        Self { data, content }
    }

    /// Raw payload bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true for a zero-length payload
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// How the payload was classified
    pub fn content(&self) -> &Content {
        &self.content
    }

    /// Nested fields, if the payload decoded as a message
    pub fn fields(&self) -> Option<&[Field]> {
        match &self.content {
            Content::Message(fields) => Some(fields),
            _ => None,
        }
    }

    /// Text, if the payload was classified as printable
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            Content::Text(text) => Some(text),
            _ => None,
        }
    }
}
