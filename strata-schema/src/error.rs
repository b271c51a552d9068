//! Schema and codec error types.

use thiserror::Error;

use crate::schema::FieldType;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors that can occur during schema validation, encoding, or decoding.
///
/// Missing fields and wrongly-typed fields are distinct kinds: callers
/// correct them differently, so they must be able to discriminate.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchemaError {
    /// A required field (declared without a default) is absent.
    #[error("missing required field '{field}' in schema '{schema}'")]
    MissingRequiredField {
        /// Schema being validated against.
        schema: String,
        /// The absent field.
        field: String,
    },

    /// A field is present but its runtime type does not match the
    /// declared type. No implicit coercion is performed.
    #[error("field '{field}' has type {actual} but schema '{schema}' declares {expected}")]
    TypeMismatch {
        /// Schema being validated against.
        schema: String,
        /// The offending field.
        field: String,
        /// Declared type.
        expected: FieldType,
        /// Actual runtime type.
        actual: FieldType,
    },

    /// A field was set on the record that the schema does not declare.
    #[error("field '{field}' is not declared by schema '{schema}'")]
    UndeclaredField {
        /// Schema being validated against.
        schema: String,
        /// The undeclared field.
        field: String,
    },

    /// A schema definition is malformed.
    #[error("invalid schema '{schema}': {reason}")]
    InvalidSchema {
        /// The schema name (or "<unnamed>").
        schema: String,
        /// Why the definition is invalid.
        reason: String,
    },

    /// The byte buffer ended before a complete record was read.
    ///
    /// Only possible for bytes not produced by this codec.
    #[error("truncated record: needed {needed} more bytes while reading {context}")]
    Truncated {
        /// What was being read.
        context: &'static str,
        /// How many more bytes were needed.
        needed: usize,
    },

    /// The byte buffer contains data this codec cannot interpret.
    ///
    /// Only possible for bytes not produced by this codec.
    #[error("corrupt record: {message}")]
    Corrupt {
        /// Description of the corruption.
        message: String,
    },

    /// A schema with this name and version is already published.
    #[error("schema '{schema}' version {version} is already published")]
    VersionExists {
        /// The schema name.
        schema: String,
        /// The conflicting version.
        version: u32,
    },

    /// No schema is registered under this name (and version, if given).
    #[error("schema '{schema}' not found")]
    SchemaNotFound {
        /// The schema name.
        schema: String,
    },
}
