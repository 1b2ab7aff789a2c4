//! Low-level protobuf wire format primitives.
//!
//! ## Wire Format Overview
//!
//! Each protobuf field is encoded as:
//! - A varint "key" containing the field number and wire type
//! - The field data (format depends on wire type)
//!
//! Wire types:
//! - 0: VARINT (int32, int64, uint32, uint64, sint32, sint64, bool, enum)
//! - 1: I64 (fixed64, sfixed64, double)
//! - 2: LEN (string, bytes, embedded messages, packed repeated fields)
//! - 3/4: SGROUP/EGROUP (deprecated)
//! - 5: I32 (fixed32, sfixed32, float)

use std::fmt;

/// Varints are at most 10 bytes for a 64-bit value
pub const MAX_VARINT_LEN: usize = 10;

/// Protobuf wire types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WireType {
    /// Variable-length integer
    Varint = 0,
    /// 64-bit fixed-width
    Fixed64 = 1,
    /// Length-delimited (strings, bytes, embedded messages)
    LengthDelimited = 2,
    /// Start group (deprecated)
    StartGroup = 3,
    /// End group (deprecated)
    EndGroup = 4,
    /// 32-bit fixed-width
    Fixed32 = 5,
}

/// Wire type bits that do not name a legal wire type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidWireType(pub u8);

impl TryFrom<u8> for WireType {
    type Error = InvalidWireType;

    fn try_from(value: u8) -> Result<Self, InvalidWireType> {
        match value {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::Fixed64),
            2 => Ok(WireType::LengthDelimited),
            3 => Ok(WireType::StartGroup),
            4 => Ok(WireType::EndGroup),
            5 => Ok(WireType::Fixed32),
            other => Err(InvalidWireType(other)),
        }
    }
}

impl WireType {
    /// Numeric wire type as it appears in the key
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Renders the header name: `Varint`, `Fixed64`, `Length-delimited`,
/// `Fixed32`, and `Unknown(n)` for the group markers.
impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireType::Varint => f.write_str("Varint"),
            WireType::Fixed64 => f.write_str("Fixed64"),
            WireType::LengthDelimited => f.write_str("Length-delimited"),
            WireType::Fixed32 => f.write_str("Fixed32"),
            WireType::StartGroup | WireType::EndGroup => write!(f, "Unknown({})", self.as_u8()),
        }
    }
}

/// Decode a varint from the given bytes.
///
/// Returns the decoded value and the number of bytes consumed, or `None`
/// if the input ends before the last group or the encoding overflows 64 bits.
pub fn decode_varint(data: &[u8]) -> Option<(u64, usize)> {
    let mut result: u64 = 0;

    for (i, &byte) in data.iter().take(MAX_VARINT_LEN).enumerate() {
        // The tenth group may only carry bit 63
        if i == MAX_VARINT_LEN - 1 && byte > 1 {
            return None;
        }

        result |= u64::from(byte & 0x7F) << (7 * i);

        if byte & 0x80 == 0 {
            return Some((result, i + 1));
        }
    }

    None
}

/// Split a key into field number and raw wire type bits.
pub fn split_key(key: u64) -> (u64, u8) {
    (key >> 3, (key & 0x07) as u8)
}

/// Read a little-endian `u64` from the front of `data`.
pub fn read_fixed64(data: &[u8]) -> Option<u64> {
    let bytes: [u8; 8] = data.get(..8)?.try_into().ok()?;
    Some(u64::from_le_bytes(bytes))
}

/// Read a little-endian `u32` from the front of `data`.
pub fn read_fixed32(data: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = data.get(..4)?.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}
