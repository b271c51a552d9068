//! Wire codec for typed records.
//!
//! # Wire Format
//!
//! A record encodes as a little-endian field list:
//!
//! ```text
//! u16 field_count
//! repeated field_count times:
//!   u16 name_len, name bytes (UTF-8)
//!   u8  type tag
//!   u32 value_len, value bytes
//! ```
//!
//! Values encode as: string → UTF-8 bytes; int32 → 4 bytes LE;
//! float32 → 4 bytes LE (IEEE-754 bits); bool → 1 byte.
//!
//! Every value is length-prefixed, so a reader can skip fields it does not
//! declare; that is what makes decoding tolerant of schema evolution.
//! Declared fields are written in declaration order, then preserved unknown
//! fields in their original order, which keeps encoding deterministic.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{SchemaError, SchemaResult};
use crate::record::{TypedRecord, UnknownField};
use crate::schema::{FieldType, FieldValue, Schema};

impl Schema {
    /// Validates a record against this schema and encodes it.
    ///
    /// Declared fields are checked in order: a present field must match the
    /// declared type exactly (no coercion), an absent field with a default
    /// is substituted, and an absent field without one fails. Fields set on
    /// the record but not declared here are rejected. On any failure no
    /// partial bytes are returned.
    ///
    /// Identical (schema, record) pairs always produce identical bytes.
    ///
    /// # Errors
    /// `MissingRequiredField`, `TypeMismatch`, or `UndeclaredField`.
    pub fn validate_and_encode(&self, record: &TypedRecord) -> SchemaResult<Bytes> {
        // Reject fields the schema does not declare before writing anything.
        for (name, _) in record.fields() {
            if self.field(name).is_none() {
                return Err(SchemaError::UndeclaredField {
                    schema: self.name().to_string(),
                    field: name.clone(),
                });
            }
        }

        // Resolve every declared field to a value, failing fast so no
        // partial encoding can escape.
        let mut resolved: Vec<(&str, &FieldValue)> = Vec::with_capacity(self.fields().len());
        for field in self.fields() {
            match record.get(&field.name) {
                Some(value) => {
                    if value.field_type() != field.field_type {
                        return Err(SchemaError::TypeMismatch {
                            schema: self.name().to_string(),
                            field: field.name.clone(),
                            expected: field.field_type,
                            actual: value.field_type(),
                        });
                    }
                    resolved.push((&field.name, value));
                }
                None => match field.default.as_ref() {
                    Some(default) => resolved.push((&field.name, default)),
                    None => {
                        return Err(SchemaError::MissingRequiredField {
                            schema: self.name().to_string(),
                            field: field.name.clone(),
                        });
                    }
                },
            }
        }

        let mut buf = BytesMut::new();

        let count = resolved.len() + record.unknown_fields().len();
        debug_assert!(count <= usize::from(u16::MAX));
        #[allow(clippy::cast_possible_truncation)] // Field counts are far below u16::MAX.
        buf.put_u16_le(count as u16);

        for (name, value) in resolved {
            encode_field(&mut buf, name, value);
        }

        // Carry unknown fields through re-encoding so data written by a
        // newer writer survives an older reader.
        for unknown in record.unknown_fields() {
            encode_raw_field(&mut buf, &unknown.name, unknown.tag, &unknown.raw);
        }

        Ok(buf.freeze())
    }

    /// Decodes a record from bytes.
    ///
    /// Fields this schema declares are decoded into typed values; fields it
    /// does not declare (or declares with a different type) are preserved
    /// opaquely. Fields this schema declares that are missing from the wire
    /// are left absent; [`TypedRecord::lookup`] resolves their defaults.
    ///
    /// Decoding bytes produced by [`Self::validate_and_encode`] never fails.
    ///
    /// # Errors
    /// `Truncated` or `Corrupt`, only for bytes not produced by this codec.
    pub fn decode(&self, bytes: &[u8]) -> SchemaResult<TypedRecord> {
        let mut buf = bytes;

        if buf.remaining() < 2 {
            return Err(SchemaError::Truncated {
                context: "field count",
                needed: 2 - buf.remaining(),
            });
        }
        let count = buf.get_u16_le();

        let mut record = TypedRecord::new();

        for _ in 0..count {
            let (name, tag, raw) = decode_raw_field(&mut buf)?;

            let declared = self.field(&name);
            let matches_declared = declared.is_some_and(|f| f.field_type.tag() == tag);

            if matches_declared {
                let value = decode_value(&name, tag, &raw)?;
                record.set(name, value);
            } else {
                // Undeclared name or diverged type: keep the bytes opaque.
                record.push_unknown(UnknownField { name, tag, raw });
            }
        }

        Ok(record)
    }
}

/// Encodes one typed field.
fn encode_field(buf: &mut BytesMut, name: &str, value: &FieldValue) {
    let raw = match value {
        FieldValue::Str(v) => Bytes::copy_from_slice(v.as_bytes()),
        FieldValue::Int32(v) => Bytes::copy_from_slice(&v.to_le_bytes()),
        FieldValue::Float32(v) => Bytes::copy_from_slice(&v.to_le_bytes()),
        FieldValue::Bool(v) => Bytes::copy_from_slice(&[u8::from(*v)]),
    };
    encode_raw_field(buf, name, value.field_type().tag(), &raw);
}

/// Encodes one field from its raw value bytes.
#[allow(clippy::cast_possible_truncation)] // Name and value sizes bounded by limits.
fn encode_raw_field(buf: &mut BytesMut, name: &str, tag: u8, raw: &Bytes) {
    buf.put_u16_le(name.len() as u16);
    buf.put_slice(name.as_bytes());
    buf.put_u8(tag);
    buf.put_u32_le(raw.len() as u32);
    buf.put_slice(raw);
}

/// Decodes one field into (name, tag, raw value bytes).
fn decode_raw_field(buf: &mut &[u8]) -> SchemaResult<(String, u8, Bytes)> {
    if buf.remaining() < 2 {
        return Err(SchemaError::Truncated {
            context: "field name length",
            needed: 2 - buf.remaining(),
        });
    }
    let name_len = buf.get_u16_le() as usize;

    if buf.remaining() < name_len {
        return Err(SchemaError::Truncated {
            context: "field name",
            needed: name_len - buf.remaining(),
        });
    }
    let name_bytes = buf.copy_to_bytes(name_len);
    let name = String::from_utf8(name_bytes.to_vec()).map_err(|_| SchemaError::Corrupt {
        message: "field name is not valid UTF-8".to_string(),
    })?;

    if buf.remaining() < 1 + 4 {
        return Err(SchemaError::Truncated {
            context: "field header",
            needed: 1 + 4 - buf.remaining(),
        });
    }
    let tag = buf.get_u8();
    let value_len = buf.get_u32_le() as usize;

    if buf.remaining() < value_len {
        return Err(SchemaError::Truncated {
            context: "field value",
            needed: value_len - buf.remaining(),
        });
    }
    let raw = buf.copy_to_bytes(value_len);

    Ok((name, tag, raw))
}

/// Decodes raw value bytes under a known type tag.
fn decode_value(name: &str, tag: u8, raw: &Bytes) -> SchemaResult<FieldValue> {
    let field_type = FieldType::from_tag(tag).ok_or_else(|| SchemaError::Corrupt {
        message: format!("field '{name}' carries unknown type tag {tag}"),
    })?;

    let wrong_size = |expected: usize| SchemaError::Corrupt {
        message: format!(
            "field '{name}' of type {field_type} has {} value bytes, expected {expected}",
            raw.len()
        ),
    };

    match field_type {
        FieldType::String => {
            let text = String::from_utf8(raw.to_vec()).map_err(|_| SchemaError::Corrupt {
                message: format!("field '{name}' is not valid UTF-8"),
            })?;
            Ok(FieldValue::Str(text))
        }
        FieldType::Int32 => {
            let bytes: [u8; 4] = raw.as_ref().try_into().map_err(|_| wrong_size(4))?;
            Ok(FieldValue::Int32(i32::from_le_bytes(bytes)))
        }
        FieldType::Float32 => {
            let bytes: [u8; 4] = raw.as_ref().try_into().map_err(|_| wrong_size(4))?;
            Ok(FieldValue::Float32(f32::from_le_bytes(bytes)))
        }
        FieldType::Bool => match raw.as_ref() {
            [0] => Ok(FieldValue::Bool(false)),
            [1] => Ok(FieldValue::Bool(true)),
            [_] => Err(SchemaError::Corrupt {
                message: format!("field '{name}' has a non-boolean byte"),
            }),
            _ => Err(wrong_size(1)),
        },
    }
}
