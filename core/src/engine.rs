//! The caller-facing operations: fetch_one, fetch_many, write_many,
//! delete_many. Each call plans, executes, and materializes against an
//! injected catalog and store client; no state survives the call.

use crate::condition::{Condition, ConditionSet};
use crate::error::{MutationError, RetrievalError};
use crate::executor::{Executor, WriteOutcome};
use crate::materialize::{self, RecordMapper};
use crate::plan::{plan_access, AccessPlan};
use crate::retry::{RetryPolicy, Sleeper, TokioSleeper};
use crate::schema::{Catalog, SchemaDescriptor};
use crate::store::{ItemKey, StoreClient, WriteOp};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct EngineConfig {
    /// Concurrent in-flight chunks per logical operation.
    pub concurrency: usize,
    pub retry: RetryPolicy,
    /// Caller-level deadline for one logical operation. On expiry all
    /// in-flight chunk calls are cancelled; chunk writes already applied
    /// stay applied — cancellation cannot roll back committed chunks.
    pub timeout: Option<Duration>,
    pub sleeper: Arc<dyn Sleeper>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { concurrency: 8, retry: RetryPolicy::default(), timeout: None, sleeper: Arc::new(TokioSleeper) }
    }
}

/// Result of `delete_many`. `failed_keys` carries keys that could not be
/// deleted (or read for deletion) within the retry budget.
#[derive(Debug, Clone, Default)]
pub struct DeleteOutcome {
    pub deleted_count: usize,
    pub failed_keys: Vec<ItemKey>,
}

pub struct Engine {
    catalog: Arc<Catalog>,
    executor: Executor,
    timeout: Option<Duration>,
}

impl Engine {
    pub fn new(catalog: Arc<Catalog>, store: Arc<dyn StoreClient>) -> Self {
        Self::with_config(catalog, store, EngineConfig::default())
    }

    pub fn with_config(catalog: Arc<Catalog>, store: Arc<dyn StoreClient>, config: EngineConfig) -> Self {
        let executor = Executor::new(store)
            .with_retry_policy(config.retry)
            .with_sleeper(config.sleeper)
            .with_concurrency(config.concurrency);
        Self { catalog, executor, timeout: config.timeout }
    }

    /// Fetch a single record by its full primary key. A store miss is
    /// `Ok(None)`, not an error.
    pub async fn fetch_one<M: RecordMapper>(&self, mapper: &M, key: ItemKey) -> Result<Option<M::Record>, RetrievalError> {
        let schema = self.describe::<RetrievalError>(mapper.record_type())?;
        let plan = AccessPlan::DirectGet { key, residual: Vec::new() };
        let outcome = self.bounded(self.executor.fetch(&schema.record_type, &plan)).await?;
        match outcome.items.first() {
            Some(item) => Ok(Some(mapper.from_raw_item(item)?)),
            None => Ok(None),
        }
    }

    /// Fetch every record satisfying the conditions. Ordering is
    /// unspecified; batch-get results arrive in store response order, so
    /// callers needing request order must re-sort by key.
    pub async fn fetch_many<M: RecordMapper>(&self, mapper: &M, conditions: Vec<Condition>) -> Result<Vec<M::Record>, RetrievalError> {
        let schema = self.describe::<RetrievalError>(mapper.record_type())?;
        let set = ConditionSet::normalize(conditions)?;
        let plan = plan_access(&schema, &set);
        let outcome = self.bounded(self.executor.fetch(&schema.record_type, &plan)).await?;
        if !outcome.unprocessed_keys.is_empty() {
            return Err(RetrievalError::UnprocessedKeys(outcome.unprocessed_keys));
        }
        Ok(materialize::materialize(mapper, outcome.items, plan.residual())?)
    }

    /// Write records by key (puts overwrite). Partial failure is a value:
    /// the outcome carries both the success count and the failed items.
    pub async fn write_many<M: RecordMapper>(&self, mapper: &M, records: &[M::Record]) -> Result<WriteOutcome, MutationError> {
        let schema = self.describe::<MutationError>(mapper.record_type())?;
        let ops = records
            .iter()
            .map(|record| Ok(WriteOp::Put(mapper.to_raw_item(record)?)))
            .collect::<Result<Vec<_>, MutationError>>()?;
        debug!(table = %schema.record_type, records = ops.len(), "write_many");
        self.bounded(self.executor.write(&schema.record_type, ops)).await
    }

    /// Delete every record satisfying the conditions: plan and fetch the
    /// matching items, then batch-delete by primary key.
    pub async fn delete_many<M: RecordMapper>(&self, mapper: &M, conditions: Vec<Condition>) -> Result<DeleteOutcome, MutationError> {
        let schema = self.describe::<MutationError>(mapper.record_type())?;
        let set = ConditionSet::normalize(conditions)?;
        let plan = plan_access(&schema, &set);

        self.bounded(async {
            let read = self.executor.fetch(&schema.record_type, &plan).await.map_err(read_failure)?;
            // keys we never managed to read cannot be deleted; report them
            let mut failed_keys = read.unprocessed_keys;

            let matching = materialize::filter_residual(read.items, plan.residual());
            let keys = matching
                .iter()
                .map(|item| ItemKey::extract(&schema.primary_key, item))
                .collect::<Result<Vec<_>, _>>()?;
            debug!(table = %schema.record_type, matching = keys.len(), "delete_many");

            let ops = keys.into_iter().map(WriteOp::Delete).collect();
            let outcome = self.executor.write(&schema.record_type, ops).await?;
            failed_keys.extend(outcome.failed.into_iter().filter_map(|op| match op {
                WriteOp::Delete(key) => Some(key),
                WriteOp::Put(_) => None,
            }));
            Ok(DeleteOutcome { deleted_count: outcome.succeeded, failed_keys })
        })
        .await
    }

    fn describe<E: From<UnknownRecordType>>(&self, record_type: &str) -> Result<Arc<SchemaDescriptor>, E> {
        self.catalog.describe(record_type).ok_or_else(|| UnknownRecordType(record_type.to_string()).into())
    }

    async fn bounded<T, E>(&self, fut: impl Future<Output = Result<T, E>>) -> Result<T, E>
    where E: From<tokio::time::error::Elapsed> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, fut).await.map_err(E::from)?,
            None => fut.await,
        }
    }
}

/// Internal carrier so `describe` can serve both error types.
struct UnknownRecordType(String);

impl From<UnknownRecordType> for RetrievalError {
    fn from(err: UnknownRecordType) -> Self { RetrievalError::UnknownRecordType(err.0) }
}

impl From<UnknownRecordType> for MutationError {
    fn from(err: UnknownRecordType) -> Self { MutationError::UnknownRecordType(err.0) }
}

/// Map a read failure encountered on the delete path into a mutation error.
fn read_failure(err: RetrievalError) -> MutationError {
    match err {
        RetrievalError::UnknownRecordType(name) => MutationError::UnknownRecordType(name),
        RetrievalError::InvalidQuery(plan) => MutationError::InvalidQuery(plan),
        RetrievalError::Mapping(mapping) => MutationError::Mapping(mapping),
        RetrievalError::Timeout => MutationError::Timeout,
        RetrievalError::Store(store) => MutationError::Store(store),
        // unprocessed keys stem from throttling; the executor reports them
        // in the outcome rather than as an error, so this arm is a fallback
        RetrievalError::UnprocessedKeys(_) => MutationError::Store(crate::error::StoreError::Throttled),
    }
}
