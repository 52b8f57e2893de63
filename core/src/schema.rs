//! Static schema descriptors and the catalog that serves them.
//!
//! Descriptors are built once at process start, validated, and shared
//! read-only behind `Arc` for the process lifetime. Nothing here is looked
//! up through ambient globals; the catalog is passed to whoever needs it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// A hash key with an optional range key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySchema {
    pub hash_field: String,
    pub range_field: Option<String>,
}

impl KeySchema {
    pub fn hash(field: impl Into<String>) -> Self { Self { hash_field: field.into(), range_field: None } }

    pub fn hash_range(hash: impl Into<String>, range: impl Into<String>) -> Self {
        Self { hash_field: hash.into(), range_field: Some(range.into()) }
    }
}

/// Which fields an index makes retrievable without a follow-up fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Projection {
    All,
    KeysOnly,
    Include(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub name: String,
    pub key: KeySchema,
    pub projection: Projection,
}

impl IndexDescriptor {
    pub fn new(name: impl Into<String>, key: KeySchema, projection: Projection) -> Self {
        Self { name: name.into(), key, projection }
    }
}

/// Static description of one record type: its table, fields, primary key,
/// and secondary indexes. Index declaration order is significant — the
/// planner breaks ties by it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    /// Record type name; doubles as the store table name.
    pub record_type: String,
    /// Known attribute names for this record type.
    pub fields: Vec<String>,
    pub primary_key: KeySchema,
    pub indexes: Vec<IndexDescriptor>,
}

#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    #[error("key field {field} of {owner} is not a schema field")]
    UnknownKeyField { owner: String, field: String },

    #[error("duplicate index name: {0}")]
    DuplicateIndex(String),

    #[error("record type already registered: {0}")]
    DuplicateRecordType(String),
}

impl SchemaDescriptor {
    pub fn new(record_type: impl Into<String>, fields: impl IntoIterator<Item = impl Into<String>>, primary_key: KeySchema) -> Self {
        Self { record_type: record_type.into(), fields: fields.into_iter().map(Into::into).collect(), primary_key, indexes: Vec::new() }
    }

    pub fn with_index(mut self, index: IndexDescriptor) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn has_field(&self, name: &str) -> bool { self.fields.iter().any(|f| f == name) }

    pub fn index(&self, name: &str) -> Option<&IndexDescriptor> { self.indexes.iter().find(|i| i.name == name) }

    /// Every key field (primary and per index) must be a declared field, and
    /// index names must be unique.
    pub fn validate(&self) -> Result<(), SchemaError> {
        self.validate_key(&self.primary_key, &self.record_type)?;
        for (i, index) in self.indexes.iter().enumerate() {
            self.validate_key(&index.key, &index.name)?;
            if self.indexes[..i].iter().any(|prior| prior.name == index.name) {
                return Err(SchemaError::DuplicateIndex(index.name.clone()));
            }
        }
        Ok(())
    }

    fn validate_key(&self, key: &KeySchema, owner: &str) -> Result<(), SchemaError> {
        if !self.has_field(&key.hash_field) {
            return Err(SchemaError::UnknownKeyField { owner: owner.to_string(), field: key.hash_field.clone() });
        }
        if let Some(range_field) = &key.range_field {
            if !self.has_field(range_field) {
                return Err(SchemaError::UnknownKeyField { owner: owner.to_string(), field: range_field.clone() });
            }
        }
        Ok(())
    }
}

/// Record type name -> descriptor. Built once, then read-only.
#[derive(Debug, Default)]
pub struct Catalog {
    schemas: HashMap<String, Arc<SchemaDescriptor>>,
}

impl Catalog {
    pub fn new() -> Self { Self::default() }

    pub fn register(&mut self, schema: SchemaDescriptor) -> Result<(), SchemaError> {
        schema.validate()?;
        if self.schemas.contains_key(&schema.record_type) {
            return Err(SchemaError::DuplicateRecordType(schema.record_type));
        }
        self.schemas.insert(schema.record_type.clone(), Arc::new(schema));
        Ok(())
    }

    pub fn describe(&self, record_type: &str) -> Option<Arc<SchemaDescriptor>> { self.schemas.get(record_type).cloned() }
}
