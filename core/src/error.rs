//! Public error types for keyplane.
//!
//! Caller errors (bad conditions, mapping mismatches) surface immediately and
//! are never retried. Transient store conditions are retried inside the
//! executor and only surface once the retry budget is exhausted.

use crate::store::ItemKey;
use thiserror::Error;

/// Planning-stage caller errors.
///
/// Returned from: `ConditionSet::normalize`
#[derive(Debug, Error, PartialEq)]
pub enum PlanError {
    /// The parsing collaborator handed over an operator this engine cannot plan
    #[error("unsupported operator {operator} on field {field}")]
    UnsupportedOperator { field: String, operator: &'static str },

    /// Two range conditions on one field; a normalized field carries at most one
    #[error("conflicting range conditions on field {field}")]
    ConflictingCondition { field: String },
}

/// Schema/record conversion errors from the mapping collaborator.
#[derive(Debug, Error, PartialEq)]
pub enum MappingError {
    #[error("missing field: {0}")]
    MissingField(String),

    #[error("invalid type for field {field}: expected {expected}, got {given}")]
    InvalidType { field: String, expected: String, given: String },
}

/// Errors surfaced by a store client call, per the store's native contract.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store rejected the request for capacity reasons; retryable
    #[error("request throttled by store")]
    Throttled,

    /// The store could not be reached; fatal for the call after a few attempts
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store rejected the request as malformed; caller error, no retry
    #[error("store validation: {0}")]
    Validation(String),
}

impl StoreError {
    /// Whether a retry with backoff may succeed.
    pub fn is_transient(&self) -> bool { matches!(self, StoreError::Throttled) }
}

/// Error type for read operations.
///
/// Returned from: `Engine::fetch_one`, `Engine::fetch_many`
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("unknown record type: {0}")]
    UnknownRecordType(String),

    #[error("invalid query: {0}")]
    InvalidQuery(#[from] PlanError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    /// Keys the store never processed, after the retry budget ran out
    #[error("{} keys unprocessed after retries", .0.len())]
    UnprocessedKeys(Vec<ItemKey>),

    /// Caller-level deadline exceeded; in-flight store calls were cancelled
    #[error("timeout")]
    Timeout,

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Error type for write operations.
///
/// Returned from: `Engine::write_many`, `Engine::delete_many`
#[derive(Debug, Error)]
pub enum MutationError {
    #[error("unknown record type: {0}")]
    UnknownRecordType(String),

    #[error("invalid query: {0}")]
    InvalidQuery(#[from] PlanError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    /// Caller-level deadline exceeded; committed sibling chunks stay committed
    #[error("timeout")]
    Timeout,

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl From<tokio::time::error::Elapsed> for RetrievalError {
    fn from(_: tokio::time::error::Elapsed) -> Self { RetrievalError::Timeout }
}

impl From<tokio::time::error::Elapsed> for MutationError {
    fn from(_: tokio::time::error::Elapsed) -> Self { MutationError::Timeout }
}
