//! The store client boundary: wire types and the object-safe trait this
//! engine drives. Connection setup, credentials, and pooling live with the
//! implementor; the client is assumed safe for concurrent use.

use crate::error::{MappingError, StoreError};
use crate::plan::QuerySpec;
use crate::schema::KeySchema;
use crate::value::Value;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A raw store item: attribute name -> value.
pub type RawItem = BTreeMap<String, Value>;

/// A fully qualified item address: hash part plus optional range part,
/// each as (field, value).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemKey {
    pub hash: (String, Value),
    pub range: Option<(String, Value)>,
}

impl ItemKey {
    pub fn new(hash_field: impl Into<String>, hash_value: impl Into<Value>) -> Self {
        Self { hash: (hash_field.into(), hash_value.into()), range: None }
    }

    pub fn and_range(mut self, range_field: impl Into<String>, range_value: impl Into<Value>) -> Self {
        self.range = Some((range_field.into(), range_value.into()));
        self
    }

    /// The key as an attribute map.
    pub fn attributes(&self) -> RawItem {
        let mut out = RawItem::new();
        out.insert(self.hash.0.clone(), self.hash.1.clone());
        if let Some((field, value)) = &self.range {
            out.insert(field.clone(), value.clone());
        }
        out
    }

    /// Whether an item carries exactly this key's attribute values.
    pub fn addresses(&self, item: &RawItem) -> bool {
        let hash_matches = item.get(&self.hash.0) == Some(&self.hash.1);
        let range_matches = match &self.range {
            Some((field, value)) => item.get(field) == Some(value),
            None => true,
        };
        hash_matches && range_matches
    }

    /// Extract the key a schema's key definition addresses an item by.
    pub fn extract(key: &KeySchema, item: &RawItem) -> Result<Self, MappingError> {
        let hash_value = item.get(&key.hash_field).ok_or_else(|| MappingError::MissingField(key.hash_field.clone()))?;
        let mut out = ItemKey::new(key.hash_field.clone(), hash_value.clone());
        if let Some(range_field) = &key.range_field {
            let range_value = item.get(range_field).ok_or_else(|| MappingError::MissingField(range_field.clone()))?;
            out = out.and_range(range_field.clone(), range_value.clone());
        }
        Ok(out)
    }
}

/// One element of a write batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WriteOp {
    Put(RawItem),
    Delete(ItemKey),
}

/// Opaque resume position for paginated query/scan calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuationToken(pub Vec<u8>);

/// One page of a query or scan response.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<RawItem>,
    /// Present while more pages remain; a page with a token is never final.
    pub next: Option<ContinuationToken>,
}

/// Batch-read response: found items plus the keys the store did not get to.
#[derive(Debug, Clone, Default)]
pub struct BatchGetOutput {
    pub items: Vec<RawItem>,
    pub unprocessed: Vec<ItemKey>,
}

/// Batch-write response: the operations the store did not get to.
#[derive(Debug, Clone, Default)]
pub struct BatchWriteOutput {
    pub unprocessed: Vec<WriteOp>,
}

/// Per-request item ceilings. Properties of the store, not of this engine;
/// the chunker consults whatever the client reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreLimits {
    pub max_batch_write: usize,
    pub max_batch_read: usize,
}

impl Default for StoreLimits {
    fn default() -> Self { Self { max_batch_write: 25, max_batch_read: 100 } }
}

/// The store's native call surface.
///
/// `query` and `scan` return one page per call; the executor follows
/// continuation tokens. Batch calls may complete a subset and report the
/// rest as unprocessed — reconciliation is the executor's job, the client
/// just reports faithfully.
#[async_trait]
pub trait StoreClient: Send + Sync {
    fn limits(&self) -> StoreLimits { StoreLimits::default() }

    async fn get_item(&self, table: &str, key: &ItemKey) -> Result<Option<RawItem>, StoreError>;

    async fn batch_get_item(&self, table: &str, keys: &[ItemKey]) -> Result<BatchGetOutput, StoreError>;

    async fn query(&self, table: &str, query: &QuerySpec, exclusive_start: Option<ContinuationToken>) -> Result<Page, StoreError>;

    async fn scan(&self, table: &str, exclusive_start: Option<ContinuationToken>) -> Result<Page, StoreError>;

    async fn put_item(&self, table: &str, item: RawItem) -> Result<(), StoreError>;

    async fn delete_item(&self, table: &str, key: &ItemKey) -> Result<(), StoreError>;

    async fn batch_write_item(&self, table: &str, ops: &[WriteOp]) -> Result<BatchWriteOutput, StoreError>;
}
