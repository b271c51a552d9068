//! In-process schema registry.
//!
//! Schemas are published under a (name, version) pair and immutable once
//! published; re-publishing an existing version is rejected rather than
//! silently replaced.

use std::collections::HashMap;

use crate::error::{SchemaError, SchemaResult};
use crate::schema::Schema;

/// Registry of published schemas, keyed by name and version.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    /// (name, version) -> schema.
    schemas: HashMap<(String, u32), Schema>,
    /// name -> highest published version.
    latest: HashMap<String, u32>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            schemas: HashMap::new(),
            latest: HashMap::new(),
        }
    }

    /// Publishes a schema.
    ///
    /// # Errors
    /// Returns `VersionExists` if this (name, version) is already published.
    pub fn publish(&mut self, schema: Schema) -> SchemaResult<()> {
        let key = (schema.name().to_string(), schema.version());

        if self.schemas.contains_key(&key) {
            return Err(SchemaError::VersionExists {
                schema: key.0,
                version: key.1,
            });
        }

        let highest = self.latest.entry(key.0.clone()).or_insert(0);
        if schema.version() > *highest {
            *highest = schema.version();
        }

        self.schemas.insert(key, schema);
        Ok(())
    }

    /// Fetches a schema by name and version.
    ///
    /// # Errors
    /// Returns `SchemaNotFound` if no such schema is published.
    pub fn get(&self, name: &str, version: u32) -> SchemaResult<&Schema> {
        self.schemas
            .get(&(name.to_string(), version))
            .ok_or_else(|| SchemaError::SchemaNotFound {
                schema: name.to_string(),
            })
    }

    /// Fetches the highest published version of a schema.
    ///
    /// # Errors
    /// Returns `SchemaNotFound` if no version is published under this name.
    pub fn latest(&self, name: &str) -> SchemaResult<&Schema> {
        let version = self
            .latest
            .get(name)
            .copied()
            .ok_or_else(|| SchemaError::SchemaNotFound {
                schema: name.to_string(),
            })?;
        self.get(name, version)
    }

    /// Returns the number of published schemas.
    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Returns true if no schemas are published.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
