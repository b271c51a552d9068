//! Typed records: ordered field-name to value mappings.

use bytes::Bytes;

use crate::schema::{FieldValue, Schema};

/// Result of looking up a field on a decoded record.
///
/// Reading a field never panics and never errors: an absent optional field
/// resolves to its schema default, and an undeclared field resolves to
/// [`FieldLookup::Absent`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldLookup<'a> {
    /// The field is present on the record.
    Present(&'a FieldValue),
    /// The field is absent but the schema declares a default.
    Default(&'a FieldValue),
    /// The field is neither present nor declared with a default.
    Absent,
}

impl<'a> FieldLookup<'a> {
    /// Returns the resolved value, if any.
    #[must_use]
    pub const fn value(self) -> Option<&'a FieldValue> {
        match self {
            Self::Present(v) | Self::Default(v) => Some(v),
            Self::Absent => None,
        }
    }

    /// Returns true if no value could be resolved.
    #[must_use]
    pub const fn is_absent(self) -> bool {
        matches!(self, Self::Absent)
    }
}

/// A field carried on the wire that the reader schema does not declare.
///
/// Preserved opaquely so that re-encoding under a newer schema does not
/// drop data written by an older writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownField {
    /// Field name as written.
    pub name: String,
    /// Wire type tag as written.
    pub tag: u8,
    /// Raw encoded value bytes.
    pub raw: Bytes,
}

/// An ordered mapping of field name to typed value.
///
/// Field order is insertion order; setting an existing field replaces its
/// value in place without reordering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypedRecord {
    fields: Vec<(String, FieldValue)>,
    unknown: Vec<UnknownField>,
}

impl TypedRecord {
    /// Creates an empty record.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fields: Vec::new(),
            unknown: Vec::new(),
        }
    }

    /// Sets a field value, replacing any existing value in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> &mut Self {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((name, value)),
        }
        self
    }

    /// Returns the value of a field set on this record, if any.
    ///
    /// This does not consult schema defaults; use [`Self::lookup`] for
    /// schema-aware resolution.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Resolves a field against a schema.
    ///
    /// Present fields resolve to their value; absent fields with a declared
    /// default resolve to the default; everything else is `Absent`.
    #[must_use]
    pub fn lookup<'a>(&'a self, schema: &'a Schema, name: &str) -> FieldLookup<'a> {
        if let Some(value) = self.get(name) {
            return FieldLookup::Present(value);
        }

        match schema.field(name).and_then(|f| f.default.as_ref()) {
            Some(default) => FieldLookup::Default(default),
            None => FieldLookup::Absent,
        }
    }

    /// Returns the fields set on this record, in insertion order.
    #[must_use]
    pub fn fields(&self) -> &[(String, FieldValue)] {
        &self.fields
    }

    /// Returns the number of fields set on this record.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if no fields are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns unknown fields preserved from decoding.
    #[must_use]
    pub fn unknown_fields(&self) -> &[UnknownField] {
        &self.unknown
    }

    /// Attaches an unknown field preserved from the wire.
    pub(crate) fn push_unknown(&mut self, field: UnknownField) {
        self.unknown.push(field);
    }
}
