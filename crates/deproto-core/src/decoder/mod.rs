//! Schema-less field decoding.
//!
//! This module turns raw protobuf wire data into a tree of [`Field`]s.
//!
//! ## Algorithm Overview
//!
//! 1. Read the key varint and split it into field number and wire type
//! 2. Read the value according to the wire type
//! 3. For length-delimited values, try to decode the payload as a nested
//!    field sequence; if that fails or yields nothing, check whether it is
//!    printable text; otherwise keep it as opaque bytes
//! 4. Repeat from the end of the field until the buffer is consumed
//!
//! Errors raised while probing a payload for nested fields never escape
//! the probe. They only mean the payload is not a message.
//!
//! ## Example
//!
//! ```
//! use deproto_core::{Content, Decoder, FieldValue};
//!
//! // field 1 = 150, field 2 = "hello"
//! let data = [0x08, 0x96, 0x01, 0x12, 0x05, b'h', b'e', b'l', b'l', b'o'];
//! let fields = Decoder::new().decode(&data)?;
//!
//! assert_eq!(fields[0].value, FieldValue::Varint(150));
//! match &fields[1].value {
//!     FieldValue::LengthDelimited(payload) => {
//!         assert_eq!(payload.content(), &Content::Text("hello".into()))
//!     }
//!     _ => unreachable!(),
//! }
//! # Ok::<(), deproto_core::Error>(())
//! ```

mod text;
mod wire;

use crate::error::{Error, Result};
use crate::field::{Content, Field, FieldValue, Payload};
use tracing::{debug, trace};

pub use text::{is_printable_text, printable_text};
pub use wire::{
    decode_varint, read_fixed32, read_fixed64, split_key, InvalidWireType, WireType,
    MAX_VARINT_LEN,
};

/// Default nesting depth probed for embedded messages
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Default byte budget for nested-message probing (64 MB)
pub const DEFAULT_HEURISTIC_BUDGET: usize = 64 * 1024 * 1024;

/// Configuration for the decoder
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Deepest nesting level the message probe may reach (top level is 0)
    pub max_depth: usize,
    /// Surface [`Error::MaxDepthExceeded`] to the caller instead of
    /// falling back to text or opaque classification
    pub strict_depth: bool,
    /// Total payload bytes the message probe may examine per decode call
    pub heuristic_budget: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            strict_depth: false,
            heuristic_budget: DEFAULT_HEURISTIC_BUDGET,
        }
    }
}

impl DecoderConfig {
    /// Creates a new decoder config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum nesting depth
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Sets whether exceeding the depth limit fails the whole decode
    pub fn strict_depth(mut self, strict: bool) -> Self {
        self.strict_depth = strict;
        self
    }

    /// Sets the byte budget for nested-message probing
    pub fn heuristic_budget(mut self, bytes: usize) -> Self {
        self.heuristic_budget = bytes;
        self
    }
}

/// Fields decoded before an error, together with that error
#[derive(Debug, Clone, PartialEq)]
pub struct PartialDecode {
    /// Fields fully decoded before the failure, in wire order
    pub fields: Vec<Field>,
    /// The error that stopped decoding, if any
    pub error: Option<Error>,
}

impl PartialDecode {
    /// Returns true if the whole buffer was decoded
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// Converts into a `Result`, discarding the partial fields on error
    pub fn into_result(self) -> Result<Vec<Field>> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.fields),
        }
    }
}

/// Per-call bookkeeping shared by every level of the recursion
#[derive(Debug)]
struct DecodeState {
    budget: usize,
    budget_exhausted: bool,
}

impl DecodeState {
    fn new(config: &DecoderConfig) -> Self {
        Self {
            budget: config.heuristic_budget,
            budget_exhausted: false,
        }
    }

    /// Reserve `len` bytes of probing budget
    fn spend(&mut self, len: usize) -> bool {
        if len > self.budget {
            self.budget_exhausted = true;
            return false;
        }
        self.budget -= len;
        true
    }
}

/// Schema-less protobuf decoder
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    config: DecoderConfig,
}

impl Decoder {
    /// Creates a new decoder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new decoder with custom configuration
    pub fn with_config(config: DecoderConfig) -> Self {
        Self { config }
    }

    /// Returns the decoder configuration
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decode every field in `data`.
    ///
    /// An empty buffer yields an empty sequence. Any error fails the call;
    /// use [`Decoder::decode_partial`] to keep the fields read before it.
    pub fn decode(&self, data: &[u8]) -> Result<Vec<Field>> {
        self.decode_partial(data).into_result()
    }

    /// Decode every field in `data`, keeping what was read before an error.
    pub fn decode_partial(&self, data: &[u8]) -> PartialDecode {
        let mut state = DecodeState::new(&self.config);
        let mut fields = Vec::new();
        let error = self.decode_into(data, 0, 0, &mut state, &mut fields).err();

        if state.budget_exhausted {
            debug!(
                "Heuristic budget of {} bytes exhausted; remaining payloads were not probed",
                self.config.heuristic_budget
            );
        }

        match &error {
            None => debug!("Decoded {} fields from {} bytes", fields.len(), data.len()),
            Some(e) => debug!("Decode stopped after {} fields: {}", fields.len(), e),
        }

        PartialDecode { fields, error }
    }

    /// Decode a single field from the front of `data`.
    ///
    /// Returns the field and the number of bytes consumed, which is always
    /// greater than zero.
    pub fn decode_field(&self, data: &[u8]) -> Result<(Field, usize)> {
        let mut state = DecodeState::new(&self.config);
        self.field_at(data, 0, 0, &mut state)
    }

    fn decode_into(
        &self,
        data: &[u8],
        base: usize,
        depth: usize,
        state: &mut DecodeState,
        fields: &mut Vec<Field>,
    ) -> Result<()> {
        let mut position = 0;

        while position < data.len() {
            let (field, length) = self.field_at(&data[position..], base + position, depth, state)?;
            fields.push(field);
            position += length;
        }

        Ok(())
    }

    /// Decode one field; `offset` is the absolute position of `data[0]`
    fn field_at(
        &self,
        data: &[u8],
        offset: usize,
        depth: usize,
        state: &mut DecodeState,
    ) -> Result<(Field, usize)> {
        let (key, key_len) = decode_varint(data).ok_or_else(|| Error::malformed_key(offset))?;
        let (id, wire_bits) = split_key(key);
        let wire_type = WireType::try_from(wire_bits).map_err(|InvalidWireType(wire_type)| {
            Error::UnknownWireType { offset, wire_type }
        })?;

        let rest = &data[key_len..];
        let value_offset = offset + key_len;

        let (value, value_len) = match wire_type {
            WireType::Varint => {
                let (value, len) =
                    decode_varint(rest).ok_or_else(|| Error::malformed_varint(value_offset))?;
                (FieldValue::Varint(value), len)
            }
            WireType::Fixed64 => {
                let value = read_fixed64(rest)
                    .ok_or_else(|| Error::truncated_fixed(value_offset, 8, rest.len()))?;
                (FieldValue::Fixed64(value), 8)
            }
            WireType::Fixed32 => {
                let value = read_fixed32(rest)
                    .ok_or_else(|| Error::truncated_fixed(value_offset, 4, rest.len()))?;
                (FieldValue::Fixed32(value), 4)
            }
            WireType::LengthDelimited => {
                let (length, prefix_len) =
                    decode_varint(rest).ok_or_else(|| Error::malformed_length(value_offset))?;
                let body = &rest[prefix_len..];
                let body_offset = value_offset + prefix_len;

                let length = usize::try_from(length)
                    .ok()
                    .filter(|&len| len <= body.len())
                    .ok_or_else(|| Error::truncated_length(body_offset, length, body.len()))?;

                let bytes = &body[..length];
                let content = self.classify(bytes, body_offset, depth, state)?;
                (
                    FieldValue::LengthDelimited(Payload::new(bytes.to_vec(), content)),
                    prefix_len + length,
                )
            }
            // Group markers are tag-only; the key is the whole field
            WireType::StartGroup => (FieldValue::StartGroup, 0),
            WireType::EndGroup => (FieldValue::EndGroup, 0),
        };

        Ok((Field::new(id, value), key_len + value_len))
    }

    /// Decide whether a payload is a nested message, printable text, or
    /// opaque bytes, in that order of preference.
    ///
    /// `depth` is the level of the field that owns the payload. Only a
    /// depth violation in strict mode is returned as an error.
    fn classify(
        &self,
        data: &[u8],
        offset: usize,
        depth: usize,
        state: &mut DecodeState,
    ) -> Result<Content> {
        // Empty payloads are text, not an empty message
        if data.is_empty() {
            return Ok(Content::Text(String::new()));
        }

        match self.probe_message(data, offset, depth + 1, state) {
            Ok(Some(fields)) if !fields.is_empty() => {
                trace!("Payload at {} decoded as {} nested fields", offset, fields.len());
                return Ok(Content::Message(fields));
            }
            Ok(_) => {}
            Err(e @ Error::MaxDepthExceeded { .. }) if self.config.strict_depth => return Err(e),
            Err(e) => trace!("Payload at {} is not a message: {}", offset, e),
        }

        Ok(match printable_text(data) {
            Some(text) => Content::Text(text.to_owned()),
            None => Content::Opaque,
        })
    }

    /// Try to decode a payload as a field sequence at `depth`.
    ///
    /// Returns `Ok(None)` when the probing budget is spent.
    fn probe_message(
        &self,
        data: &[u8],
        offset: usize,
        depth: usize,
        state: &mut DecodeState,
    ) -> Result<Option<Vec<Field>>> {
        if depth > self.config.max_depth {
            return Err(Error::MaxDepthExceeded {
                offset,
                max_depth: self.config.max_depth,
            });
        }

        if !state.spend(data.len()) {
            trace!("Skipping message probe at {}: budget exhausted", offset);
            return Ok(None);
        }

        let mut fields = Vec::new();
        self.decode_into(data, offset, depth, state, &mut fields)?;
        Ok(Some(fields))
    }
}

/// Decode every field in `data` with the default configuration
///
/// This is a convenience function for `Decoder::new().decode(data)`.
pub fn decode_fields(data: &[u8]) -> Result<Vec<Field>> {
    Decoder::new().decode(data)
}

/// Decode a single field from the front of `data` with the default configuration
pub fn decode_field(data: &[u8]) -> Result<(Field, usize)> {
    Decoder::new().decode_field(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use crate::render::render_fields;
    use proptest::prelude::*;
    use prost::encoding::{self, WireType as ProstWireType};

    fn payload(field: &Field) -> &Payload {
        match &field.value {
            FieldValue::LengthDelimited(payload) => payload,
            other => panic!("expected a length-delimited field, got {:?}", other),
        }
    }

    /// Field 1 wrapping `inner` as a length-delimited payload
    fn wrap(inner: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encoding::bytes::encode(1, &inner.to_vec(), &mut buf);
        buf.to_vec()
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(decode_fields(&[]).unwrap(), Vec::<Field>::new());
    }

    #[test]
    fn test_varint_round_trip() {
        for (number, value) in [(1u32, 0u64), (15, 150), (16, 300), (536_870_911, u64::MAX)] {
            let mut buf = BytesMut::new();
            encoding::encode_key(number, ProstWireType::Varint, &mut buf);
            encoding::encode_varint(value, &mut buf);

            let (field, consumed) = decode_field(&buf).unwrap();
            assert_eq!(field.id, u64::from(number));
            assert_eq!(field.value, FieldValue::Varint(value));
            assert_eq!(consumed, buf.len());
        }
    }

    #[test]
    fn test_fixed64_as_double() {
        let data = [0x09, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xF0, 0x3F];
        let (field, consumed) = decode_field(&data).unwrap();
        assert_eq!(consumed, 9);
        assert_eq!(field.wire_type(), WireType::Fixed64);
        assert_eq!(field.value.as_f64(), Some(1.0));
    }

    #[test]
    fn test_fixed32_as_float() {
        let mut buf = BytesMut::new();
        encoding::float::encode(3, &-2.5f32, &mut buf);
        let (field, consumed) = decode_field(&buf).unwrap();
        assert_eq!(consumed, 5);
        assert_eq!(field.id, 3);
        assert_eq!(field.value.as_f32(), Some(-2.5));
    }

    #[test]
    fn test_mixed_message_preserves_order_and_duplicates() {
        let mut buf = BytesMut::new();
        encoding::uint64::encode(2, &7, &mut buf);
        encoding::string::encode(1, &"first".to_string(), &mut buf);
        encoding::uint64::encode(2, &8, &mut buf);
        encoding::double::encode(4, &0.5, &mut buf);

        let fields = decode_fields(&buf).unwrap();
        let ids: Vec<u64> = fields.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![2, 1, 2, 4]);
        assert_eq!(fields[0].value, FieldValue::Varint(7));
        assert_eq!(fields[2].value, FieldValue::Varint(8));
        assert_eq!(payload(&fields[1]).text(), Some("first"));
        assert_eq!(fields[3].value.as_f64(), Some(0.5));
    }

    #[test]
    fn test_nested_message() {
        let mut inner = BytesMut::new();
        encoding::uint32::encode(1, &42, &mut inner);
        encoding::string::encode(2, &"name".to_string(), &mut inner);
        let data = wrap(&inner);

        let fields = decode_fields(&data).unwrap();
        assert_eq!(fields.len(), 1);
        assert!(fields[0].is_message());

        let nested = payload(&fields[0]).fields().unwrap();
        assert_eq!(nested.len(), 2);
        assert_eq!(nested[0].value, FieldValue::Varint(42));
        assert_eq!(payload(&nested[1]).text(), Some("name"));
        assert_eq!(payload(&fields[0]).as_bytes(), &inner[..]);
    }

    #[test]
    fn test_text_payload() {
        let fields = decode_fields(&wrap(b"hello")).unwrap();
        assert_eq!(payload(&fields[0]).content(), &Content::Text("hello".into()));
    }

    #[test]
    fn test_recent_unicode_payload_is_text() {
        for text in ["love 🥰", "pay ₿ ok"] {
            let fields = decode_fields(&wrap(text.as_bytes())).unwrap();
            assert_eq!(payload(&fields[0]).content(), &Content::Text(text.into()));
        }
    }

    #[test]
    fn test_opaque_payload() {
        let fields = decode_fields(&wrap(&[0xDE, 0xAD, 0xBE, 0xEF])).unwrap();
        assert_eq!(payload(&fields[0]).content(), &Content::Opaque);
        assert_eq!(payload(&fields[0]).as_bytes(), &[0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn test_message_preferred_over_text() {
        // "(!" is printable and also field 5 = varint 33
        let fields = decode_fields(&wrap(b"(!")).unwrap();
        let nested = payload(&fields[0]).fields().unwrap();
        assert_eq!(nested, &[Field::new(5, FieldValue::Varint(33))]);
    }

    #[test]
    fn test_empty_payload_is_text() {
        let fields = decode_fields(&[0x0A, 0x00]).unwrap();
        assert_eq!(payload(&fields[0]).content(), &Content::Text(String::new()));
        assert!(payload(&fields[0]).is_empty());
    }

    #[test]
    fn test_group_markers_are_tag_only() {
        // field 1 start group, field 2 varint 1, field 1 end group
        let data = [0x0B, 0x10, 0x01, 0x0C];
        let fields = decode_fields(&data).unwrap();
        assert_eq!(
            fields,
            vec![
                Field::new(1, FieldValue::StartGroup),
                Field::new(2, FieldValue::Varint(1)),
                Field::new(1, FieldValue::EndGroup),
            ]
        );
    }

    #[test]
    fn test_field_number_zero_is_accepted() {
        let (field, consumed) = decode_field(&[0x00, 0x05]).unwrap();
        assert_eq!(field, Field::new(0, FieldValue::Varint(5)));
        assert_eq!(consumed, 2);
    }

    #[test]
    fn test_malformed_key() {
        assert_eq!(decode_field(&[]), Err(Error::malformed_key(0)));
        assert_eq!(decode_field(&[0x80]), Err(Error::malformed_key(0)));
        assert_eq!(
            decode_fields(&[0x08, 0x01, 0xFF]),
            Err(Error::malformed_key(2))
        );
    }

    #[test]
    fn test_malformed_varint() {
        assert_eq!(decode_field(&[0x08]), Err(Error::malformed_varint(1)));
        assert_eq!(decode_field(&[0x08, 0x80, 0x80]), Err(Error::malformed_varint(1)));
    }

    #[test]
    fn test_truncated_fixed() {
        assert_eq!(
            decode_field(&[0x09, 0x01, 0x02, 0x03]),
            Err(Error::truncated_fixed(1, 8, 3))
        );
        assert_eq!(decode_field(&[0x0D, 0x01]), Err(Error::truncated_fixed(1, 4, 1)));
    }

    #[test]
    fn test_truncated_length() {
        let data = [0x0A, 0x05, b'a', b'b'];
        let result = Decoder::new().decode_partial(&data);
        assert!(result.fields.is_empty());
        assert_eq!(result.error, Some(Error::truncated_length(2, 5, 2)));
        assert!(result.error.unwrap().is_truncation());
    }

    #[test]
    fn test_huge_length_is_truncation() {
        let data = [0x0A, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
        assert_eq!(
            decode_field(&data),
            Err(Error::truncated_length(11, u64::MAX, 0))
        );
    }

    #[test]
    fn test_malformed_length() {
        assert_eq!(decode_field(&[0x0A]), Err(Error::malformed_length(1)));
        assert_eq!(decode_field(&[0x0A, 0x80]), Err(Error::malformed_length(1)));
    }

    #[test]
    fn test_unknown_wire_type() {
        assert_eq!(
            decode_field(&[0x0E]),
            Err(Error::UnknownWireType {
                offset: 0,
                wire_type: 6
            })
        );
        assert_eq!(
            decode_fields(&[0x08, 0x01, 0x0F]),
            Err(Error::UnknownWireType {
                offset: 2,
                wire_type: 7
            })
        );
    }

    #[test]
    fn test_partial_decode_keeps_earlier_fields() {
        let data = [0x08, 0x01, 0x10, 0x02, 0x1D, 0x00];
        let result = Decoder::new().decode_partial(&data);
        assert!(!result.is_complete());
        assert_eq!(
            result.fields,
            vec![
                Field::new(1, FieldValue::Varint(1)),
                Field::new(2, FieldValue::Varint(2)),
            ]
        );
        assert_eq!(result.error, Some(Error::truncated_fixed(5, 4, 1)));
        assert!(Decoder::new().decode(&data).is_err());
    }

    #[test]
    fn test_nested_errors_stay_local() {
        // Payload starts like a message but ends with a truncated fixed32
        let data = wrap(&[0x08, 0x01, 0x15, 0x00]);
        let fields = decode_fields(&data).unwrap();
        assert_eq!(payload(&fields[0]).content(), &Content::Opaque);
    }

    #[test]
    fn test_nested_error_offsets_are_absolute() {
        // Same payload as above, probed where it sits inside its parent
        let inner = [0x08, 0x01, 0x15, 0x00];
        let mut state = DecodeState::new(&DecoderConfig::default());
        let err = Decoder::new()
            .probe_message(&inner, 2, 1, &mut state)
            .unwrap_err();
        assert_eq!(err, Error::truncated_fixed(5, 4, 1));
    }

    fn nest(levels: usize) -> Vec<u8> {
        let mut data = vec![0x08, 0x01];
        for _ in 0..levels {
            data = wrap(&data);
        }
        data
    }

    fn message_depth(fields: &[Field]) -> usize {
        fields
            .iter()
            .filter_map(|f| match &f.value {
                FieldValue::LengthDelimited(p) => p.fields().map(|n| 1 + message_depth(n)),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    #[test]
    fn test_depth_limit_falls_back() {
        let data = nest(5);
        let decoder = Decoder::with_config(DecoderConfig::new().max_depth(2));
        let fields = decoder.decode(&data).unwrap();
        assert_eq!(message_depth(&fields), 2);

        assert_eq!(message_depth(&decode_fields(&data).unwrap()), 5);
    }

    #[test]
    fn test_depth_limit_strict() {
        let data = nest(5);
        let decoder = Decoder::with_config(DecoderConfig::new().max_depth(2).strict_depth(true));
        match decoder.decode(&data) {
            Err(Error::MaxDepthExceeded { max_depth, .. }) => assert_eq!(max_depth, 2),
            other => panic!("expected depth error, got {:?}", other),
        }

        let decoder = Decoder::with_config(DecoderConfig::new().max_depth(5).strict_depth(true));
        assert!(decoder.decode(&data).is_ok());
    }

    #[test]
    fn test_budget_exhaustion_skips_probe() {
        let mut inner = BytesMut::new();
        encoding::uint32::encode(1, &1, &mut inner);
        let data = wrap(&inner);

        let decoder = Decoder::with_config(DecoderConfig::new().heuristic_budget(1));
        let fields = decoder.decode(&data).unwrap();
        // 0x08 0x01 is neither a probed message nor text
        assert_eq!(payload(&fields[0]).content(), &Content::Opaque);

        let decoder = Decoder::with_config(DecoderConfig::new().heuristic_budget(2));
        assert!(decoder.decode(&data).unwrap()[0].is_message());
    }

    #[test]
    fn test_config_builder() {
        let config = DecoderConfig::new()
            .max_depth(3)
            .strict_depth(true)
            .heuristic_budget(100);

        assert_eq!(config.max_depth, 3);
        assert!(config.strict_depth);
        assert_eq!(config.heuristic_budget, 100);
    }

    #[derive(Debug, Clone)]
    enum Scalar {
        Varint(u64),
        Fixed64(u64),
        Fixed32(u32),
    }

    fn scalar() -> impl Strategy<Value = Scalar> {
        prop_oneof![
            any::<u64>().prop_map(Scalar::Varint),
            any::<u64>().prop_map(Scalar::Fixed64),
            any::<u32>().prop_map(Scalar::Fixed32),
        ]
    }

    proptest! {
        #[test]
        fn test_every_field_renders_in_wire_order(
            entries in prop::collection::vec((1u32..=536_870_911, scalar()), 0..32)
        ) {
            let mut buf = BytesMut::new();
            for (id, value) in &entries {
                match value {
                    Scalar::Varint(v) => encoding::uint64::encode(*id, v, &mut buf),
                    Scalar::Fixed64(v) => encoding::fixed64::encode(*id, v, &mut buf),
                    Scalar::Fixed32(v) => encoding::fixed32::encode(*id, v, &mut buf),
                }
            }

            let fields = decode_fields(&buf).unwrap();
            prop_assert_eq!(fields.len(), entries.len());

            let rendered = render_fields(&fields);
            let lines: Vec<&str> = rendered.lines().collect();
            prop_assert_eq!(lines.len(), entries.len());

            for ((line, field), (id, value)) in lines.iter().zip(&fields).zip(&entries) {
                let (name, expected) = match value {
                    Scalar::Varint(v) => ("Varint", FieldValue::Varint(*v)),
                    Scalar::Fixed64(v) => ("Fixed64", FieldValue::Fixed64(*v)),
                    Scalar::Fixed32(v) => ("Fixed32", FieldValue::Fixed32(*v)),
                };
                let header = format!("[{} {}]: ", id, name);
                prop_assert!(line.starts_with(&header), "{:?} does not start with {:?}", line, header);
                prop_assert_eq!(field.id, u64::from(*id));
                prop_assert_eq!(&field.value, &expected);
            }
        }
    }
}
