//! Tree traversal and summary statistics.
//!
//! This module provides the [`FieldVisitor`] trait for walking a decoded
//! field tree without matching on every variant by hand.

use crate::field::{Content, Field, FieldValue, Payload};

/// Trait for visiting the fields of a decoded tree.
///
/// Every method has a no-op default, so implementors only override what
/// they care about. [`walk`] calls them depth-first in wire order; `depth`
/// is 0 for top-level fields.
///
/// # Example
///
/// ```
/// use deproto_core::stats::{walk, FieldVisitor};
/// use deproto_core::{decode_fields, Field};
///
/// struct Ids(Vec<u64>);
///
/// impl FieldVisitor for Ids {
///     fn visit_field(&mut self, field: &Field, _depth: usize) {
///         self.0.push(field.id);
///     }
/// }
///
/// let fields = decode_fields(&[0x08, 0x01, 0x12, 0x02, 0x18, 0x02])?;
/// let mut ids = Ids(Vec::new());
/// walk(&fields, &mut ids);
/// assert_eq!(ids.0, vec![1, 2, 3]);
/// # Ok::<(), deproto_core::Error>(())
/// ```
pub trait FieldVisitor {
    /// Called for every field before its variant-specific method
    fn visit_field(&mut self, field: &Field, depth: usize) {
        let _ = (field, depth);
    }

    /// Called for varint, fixed-width, and group fields
    fn visit_scalar(&mut self, value: &FieldValue, depth: usize) {
        let _ = (value, depth);
    }

    /// Called for length-delimited fields, before any children are visited
    fn visit_payload(&mut self, payload: &Payload, depth: usize) {
        let _ = (payload, depth);
    }
}

/// Walk `fields` depth-first, in wire order, calling `visitor` for each one
pub fn walk<V: FieldVisitor + ?Sized>(fields: &[Field], visitor: &mut V) {
    walk_at(fields, visitor, 0);
}

fn walk_at<V: FieldVisitor + ?Sized>(fields: &[Field], visitor: &mut V, depth: usize) {
    for field in fields {
        visitor.visit_field(field, depth);
        match &field.value {
            FieldValue::LengthDelimited(payload) => {
                visitor.visit_payload(payload, depth);
                if let Some(children) = payload.fields() {
                    walk_at(children, visitor, depth + 1);
                }
            }
            scalar => visitor.visit_scalar(scalar, depth),
        }
    }
}

/// A visitor that collects statistics about a decoded tree
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StatsVisitor {
    /// Total number of fields at every level
    pub field_count: usize,
    /// Number of varint fields
    pub varint_count: usize,
    /// Number of fixed64 and fixed32 fields
    pub fixed_count: usize,
    /// Number of group start/end markers
    pub group_count: usize,
    /// Payloads decoded as nested messages
    pub message_count: usize,
    /// Payloads classified as text
    pub text_count: usize,
    /// Payloads kept as opaque bytes
    pub opaque_count: usize,
    /// Deepest level at which a field was found (top level is 0)
    pub max_depth: usize,
}

impl StatsVisitor {
    /// Collect statistics for a field sequence
    pub fn collect(fields: &[Field]) -> Self {
        let mut stats = Self::default();
        walk(fields, &mut stats);
        stats
    }
}

impl FieldVisitor for StatsVisitor {
    fn visit_field(&mut self, _field: &Field, depth: usize) {
        self.field_count += 1;
        self.max_depth = self.max_depth.max(depth);
    }

    fn visit_scalar(&mut self, value: &FieldValue, _depth: usize) {
        match value {
            FieldValue::Varint(_) => self.varint_count += 1,
            FieldValue::Fixed64(_) | FieldValue::Fixed32(_) => self.fixed_count += 1,
            FieldValue::StartGroup | FieldValue::EndGroup => self.group_count += 1,
            FieldValue::LengthDelimited(_) => {}
        }
    }

    fn visit_payload(&mut self, payload: &Payload, _depth: usize) {
        match payload.content() {
            Content::Message(_) => self.message_count += 1,
            Content::Text(_) => self.text_count += 1,
            Content::Opaque => self.opaque_count += 1,
        }
    }
}
