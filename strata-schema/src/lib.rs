//! Strata Schema - schema registry and typed-record codec.
//!
//! This crate validates and encodes typed records against named, versioned
//! schemas, and decodes them back. A schema is an ordered set of typed
//! fields; a record is an ordered mapping of field name to typed value.
//!
//! # Validation
//!
//! Encoding walks the declared fields in order:
//! - present field with the declared type → encoded as-is
//! - present field with the wrong runtime type → [`SchemaError::TypeMismatch`]
//!   (no implicit coercion, ever)
//! - absent field with a declared default → the default is substituted
//! - absent field with no default → [`SchemaError::MissingRequiredField`]
//!
//! # Evolution
//!
//! Decoding is log-tolerant: fields the reader schema does not declare are
//! preserved as opaque bytes, and declared fields missing from the wire are
//! filled from defaults or left absent. Decoding bytes produced by this
//! codec never fails.
//!
//! # Determinism
//!
//! Identical (schema, record) pairs always produce identical bytes, so
//! exact-equality tests and downstream deduplication are safe.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod codec;
mod error;
mod record;
mod registry;
mod schema;

pub use error::{SchemaError, SchemaResult};
pub use record::{FieldLookup, TypedRecord, UnknownField};
pub use registry::SchemaRegistry;
pub use schema::{FieldDef, FieldType, FieldValue, Schema};
