//! Schema definitions: named, versioned sets of typed fields.
//!
//! Schemas are immutable once built. A field is required unless it
//! declares a default value.

use std::fmt;

use serde::Deserialize;

use crate::error::{SchemaError, SchemaResult};

/// The type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// UTF-8 string.
    String,
    /// 32-bit signed integer.
    Int32,
    /// 32-bit IEEE-754 float.
    Float32,
    /// Boolean.
    Bool,
}

impl FieldType {
    /// Returns the wire tag for this type.
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::String => 0,
            Self::Int32 => 1,
            Self::Float32 => 2,
            Self::Bool => 3,
        }
    }

    /// Creates a field type from a wire tag.
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::String),
            1 => Some(Self::Int32),
            2 => Some(Self::Float32),
            3 => Some(Self::Bool),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Int32 => "int32",
            Self::Float32 => "float32",
            Self::Bool => "bool",
        };
        write!(f, "{name}")
    }
}

/// A typed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// UTF-8 string value.
    Str(String),
    /// 32-bit integer value.
    Int32(i32),
    /// 32-bit float value.
    Float32(f32),
    /// Boolean value.
    Bool(bool),
}

impl FieldValue {
    /// Returns the runtime type of this value.
    #[must_use]
    pub const fn field_type(&self) -> FieldType {
        match self {
            Self::Str(_) => FieldType::String,
            Self::Int32(_) => FieldType::Int32,
            Self::Float32(_) => FieldType::Float32,
            Self::Bool(_) => FieldType::Bool,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Float32(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        Self::Int32(v)
    }
}

impl From<f32> for FieldValue {
    fn from(v: f32) -> Self {
        Self::Float32(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// A single field declaration in a schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    /// Field name, unique within the schema.
    pub name: String,
    /// Declared type.
    pub field_type: FieldType,
    /// Default value, substituted when the field is absent at encode time.
    /// A field with no default is required.
    pub default: Option<FieldValue>,
}

impl FieldDef {
    /// Creates a required field (no default).
    #[must_use]
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            default: None,
        }
    }

    /// Creates an optional field with a default value.
    #[must_use]
    pub fn with_default(name: impl Into<String>, default: FieldValue) -> Self {
        Self {
            name: name.into(),
            field_type: default.field_type(),
            default: Some(default),
        }
    }

    /// Returns true if the field must be present at encode time.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// A named, versioned set of typed fields. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    name: String,
    version: u32,
    fields: Vec<FieldDef>,
}

impl Schema {
    /// Builds a schema from its field declarations.
    ///
    /// # Errors
    /// Returns `InvalidSchema` if the name is empty, a field name is
    /// duplicated, or a default value's type contradicts the declared type.
    pub fn new(
        name: impl Into<String>,
        version: u32,
        fields: Vec<FieldDef>,
    ) -> SchemaResult<Self> {
        let name = name.into();

        if name.is_empty() {
            return Err(SchemaError::InvalidSchema {
                schema: "<unnamed>".to_string(),
                reason: "schema name must not be empty".to_string(),
            });
        }

        for (i, field) in fields.iter().enumerate() {
            if field.name.is_empty() {
                return Err(SchemaError::InvalidSchema {
                    schema: name,
                    reason: format!("field {i} has an empty name"),
                });
            }

            if fields[..i].iter().any(|f| f.name == field.name) {
                return Err(SchemaError::InvalidSchema {
                    schema: name,
                    reason: format!("duplicate field name '{}'", field.name),
                });
            }

            if let Some(ref default) = field.default {
                if default.field_type() != field.field_type {
                    return Err(SchemaError::InvalidSchema {
                        schema: name,
                        reason: format!(
                            "default for field '{}' has type {} but the field declares {}",
                            field.name,
                            default.field_type(),
                            field.field_type
                        ),
                    });
                }
            }
        }

        Ok(Self {
            name,
            version,
            fields,
        })
    }

    /// Parses a schema from its JSON definition.
    ///
    /// ```json
    /// {
    ///   "name": "customer",
    ///   "version": 1,
    ///   "fields": [
    ///     { "name": "first_name", "type": "string" },
    ///     { "name": "age", "type": "int32" },
    ///     { "name": "automated_email", "type": "bool", "default": true }
    ///   ]
    /// }
    /// ```
    ///
    /// # Errors
    /// Returns `InvalidSchema` if the JSON is malformed or the definition
    /// violates the schema rules.
    pub fn parse(json: &str) -> SchemaResult<Self> {
        let raw: RawSchema = serde_json::from_str(json).map_err(|e| SchemaError::InvalidSchema {
            schema: "<unnamed>".to_string(),
            reason: format!("malformed JSON: {e}"),
        })?;

        let mut fields = Vec::with_capacity(raw.fields.len());
        for raw_field in raw.fields {
            let field_type = match raw_field.field_type.as_str() {
                "string" => FieldType::String,
                "int32" | "int" => FieldType::Int32,
                "float32" | "float" => FieldType::Float32,
                "bool" | "boolean" => FieldType::Bool,
                other => {
                    return Err(SchemaError::InvalidSchema {
                        schema: raw.name,
                        reason: format!(
                            "field '{}' declares unsupported type '{other}'",
                            raw_field.name
                        ),
                    });
                }
            };

            let default = match raw_field.default {
                None => None,
                Some(value) => Some(json_default(&raw.name, &raw_field.name, field_type, &value)?),
            };

            fields.push(FieldDef {
                name: raw_field.name,
                field_type,
                default,
            });
        }

        Self::new(raw.name, raw.version, fields)
    }

    /// Returns the schema name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the schema version.
    #[must_use]
    pub const fn version(&self) -> u32 {
        self.version
    }

    /// Returns the declared fields, in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Looks up a field declaration by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Raw serde shape for the JSON schema definition.
#[derive(Deserialize)]
struct RawSchema {
    name: String,
    #[serde(default = "default_version")]
    version: u32,
    fields: Vec<RawField>,
}

const fn default_version() -> u32 {
    1
}

#[derive(Deserialize)]
struct RawField {
    name: String,
    #[serde(rename = "type")]
    field_type: String,
    #[serde(default)]
    default: Option<serde_json::Value>,
}

/// Converts a JSON default into a typed value, checked against the
/// declared field type.
fn json_default(
    schema: &str,
    field: &str,
    field_type: FieldType,
    value: &serde_json::Value,
) -> SchemaResult<FieldValue> {
    let mismatch = || SchemaError::InvalidSchema {
        schema: schema.to_string(),
        reason: format!("default for field '{field}' does not match declared type {field_type}"),
    };

    match field_type {
        FieldType::String => value
            .as_str()
            .map(|s| FieldValue::Str(s.to_string()))
            .ok_or_else(mismatch),
        FieldType::Int32 => value
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .map(FieldValue::Int32)
            .ok_or_else(mismatch),
        #[allow(clippy::cast_possible_truncation)] // f64 -> f32 defaults are declared small.
        FieldType::Float32 => value
            .as_f64()
            .map(|v| FieldValue::Float32(v as f32))
            .ok_or_else(mismatch),
        FieldType::Bool => value.as_bool().map(FieldValue::Bool).ok_or_else(mismatch),
    }
}
