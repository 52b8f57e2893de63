//! Issues planned requests against the store and reconciles partial results:
//! chunked batches, unprocessed-item retries, and pagination.
//!
//! Sibling chunks and fan-out queries run concurrently under a bounded
//! limit; the caller-visible outcome always aggregates every chunk. Within
//! one chunk the retry loop is strictly ordered — the chunk is complete only
//! once every item succeeded or the budget ran out.

use crate::chunk::{chunk, BatchChunk};
use crate::error::{MutationError, RetrievalError, StoreError};
use crate::plan::{AccessPlan, QuerySpec};
use crate::retry::{RetryPolicy, Sleeper, TokioSleeper};
use crate::store::{ContinuationToken, ItemKey, RawItem, StoreClient, WriteOp};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Store-unreachable calls get this many total attempts, then surface.
const UNAVAILABLE_ATTEMPTS: u32 = 2;

const DEFAULT_CONCURRENCY: usize = 8;

/// Aggregated result of a read plan.
#[derive(Debug, Clone, Default)]
pub struct ReadOutcome {
    pub items: Vec<RawItem>,
    /// Keys never processed within the retry budget. Never discarded.
    pub unprocessed_keys: Vec<ItemKey>,
}

/// Aggregated result of a batch write.
#[derive(Debug, Clone, Default)]
pub struct WriteOutcome {
    pub succeeded: usize,
    /// Operations still unprocessed after the retry budget. Sibling chunks
    /// that succeeded remain committed.
    pub failed: Vec<WriteOp>,
}

pub struct Executor {
    store: Arc<dyn StoreClient>,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    concurrency: usize,
}

impl Executor {
    pub fn new(store: Arc<dyn StoreClient>) -> Self {
        Self { store, retry: RetryPolicy::default(), sleeper: Arc::new(TokioSleeper), concurrency: DEFAULT_CONCURRENCY }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Execute a read plan to completion: every chunk resolved, every
    /// continuation token followed.
    pub async fn fetch(&self, table: &str, plan: &AccessPlan) -> Result<ReadOutcome, RetrievalError> {
        match plan {
            AccessPlan::DirectGet { key, .. } => {
                let item = self.call_with_retries("get_item", || self.store.get_item(table, key)).await?;
                Ok(ReadOutcome { items: item.into_iter().collect(), unprocessed_keys: Vec::new() })
            }
            AccessPlan::BatchGet { keys, .. } => self.batch_get(table, keys.clone()).await,
            AccessPlan::Query { queries, .. } => {
                let page_sets: Vec<Vec<RawItem>> = stream::iter(queries.iter().map(|spec| self.run_query(table, spec)))
                    .buffer_unordered(self.concurrency)
                    .try_collect()
                    .await?;
                Ok(ReadOutcome { items: page_sets.into_iter().flatten().collect(), unprocessed_keys: Vec::new() })
            }
            AccessPlan::Scan { .. } => {
                let items = self.run_scan(table).await?;
                Ok(ReadOutcome { items, unprocessed_keys: Vec::new() })
            }
        }
    }

    /// Execute a write batch to completion. Empty input is an immediate
    /// success with no network call.
    pub async fn write(&self, table: &str, ops: Vec<WriteOp>) -> Result<WriteOutcome, MutationError> {
        if ops.is_empty() {
            return Ok(WriteOutcome::default());
        }
        let limit = self.store.limits().max_batch_write;
        let chunks = chunk(ops, limit);
        debug!(table, chunks = chunks.len(), "dispatching write batch");

        let outcomes: Vec<WriteOutcome> = stream::iter(chunks.into_iter().map(|c| self.write_chunk(table, c)))
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;

        let mut merged = WriteOutcome::default();
        for outcome in outcomes {
            merged.succeeded += outcome.succeeded;
            merged.failed.extend(outcome.failed);
        }
        Ok(merged)
    }

    async fn batch_get(&self, table: &str, keys: Vec<ItemKey>) -> Result<ReadOutcome, RetrievalError> {
        if keys.is_empty() {
            return Ok(ReadOutcome::default());
        }
        let limit = self.store.limits().max_batch_read;
        let chunks = chunk(keys, limit);
        debug!(table, chunks = chunks.len(), "dispatching batch get");

        let outcomes: Vec<ReadOutcome> = stream::iter(chunks.into_iter().map(|c| self.read_chunk(table, c)))
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;

        let mut merged = ReadOutcome::default();
        for outcome in outcomes {
            merged.items.extend(outcome.items);
            merged.unprocessed_keys.extend(outcome.unprocessed_keys);
        }
        Ok(merged)
    }

    /// Resolve one read chunk: retry only the unprocessed subset until it
    /// drains or the budget runs out.
    async fn read_chunk(&self, table: &str, chunk: BatchChunk<ItemKey>) -> Result<ReadOutcome, RetrievalError> {
        let mut remaining = chunk.items;
        let mut items = Vec::new();
        let mut attempt = 0u32;
        loop {
            let output = self.call_with_retries("batch_get_item", || self.store.batch_get_item(table, &remaining)).await?;
            items.extend(output.items);
            remaining = output.unprocessed;
            if remaining.is_empty() {
                break;
            }
            if self.retry.attempts_exhausted(attempt) {
                error!(table, unprocessed = remaining.len(), "keys unprocessed after retry budget");
                break;
            }
            let delay = self.retry.delay_for(attempt);
            warn!(table, unprocessed = remaining.len(), ?delay, "retrying unprocessed keys");
            self.sleeper.sleep(delay).await;
            attempt += 1;
        }
        Ok(ReadOutcome { items, unprocessed_keys: remaining })
    }

    /// Resolve one write chunk. A store-side validation rejection fails only
    /// this chunk's items; sibling chunks are unaffected.
    async fn write_chunk(&self, table: &str, chunk: BatchChunk<WriteOp>) -> Result<WriteOutcome, MutationError> {
        let total = chunk.items.len();
        let mut remaining = chunk.items;
        let mut attempt = 0u32;
        loop {
            match self.call_with_retries("batch_write_item", || self.store.batch_write_item(table, &remaining)).await {
                Ok(output) => {
                    remaining = output.unprocessed;
                    if remaining.is_empty() {
                        break;
                    }
                    if self.retry.attempts_exhausted(attempt) {
                        error!(table, unprocessed = remaining.len(), "writes unprocessed after retry budget");
                        break;
                    }
                    let delay = self.retry.delay_for(attempt);
                    warn!(table, unprocessed = remaining.len(), ?delay, "retrying unprocessed writes");
                    self.sleeper.sleep(delay).await;
                    attempt += 1;
                }
                Err(StoreError::Validation(reason)) => {
                    warn!(table, %reason, items = remaining.len(), "store rejected chunk; failing its items only");
                    return Ok(WriteOutcome { succeeded: total - remaining.len(), failed: remaining });
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(WriteOutcome { succeeded: total - remaining.len(), failed: remaining })
    }

    /// Follow a query's continuation tokens until exhausted. A page is never
    /// surfaced while a token is outstanding.
    async fn run_query(&self, table: &str, spec: &QuerySpec) -> Result<Vec<RawItem>, RetrievalError> {
        let mut items = Vec::new();
        let mut token: Option<ContinuationToken> = None;
        loop {
            let page = self.call_with_retries("query", || self.store.query(table, spec, token.clone())).await?;
            items.extend(page.items);
            match page.next {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(items)
    }

    async fn run_scan(&self, table: &str) -> Result<Vec<RawItem>, RetrievalError> {
        let mut items = Vec::new();
        let mut token: Option<ContinuationToken> = None;
        loop {
            let page = self.call_with_retries("scan", || self.store.scan(table, token.clone())).await?;
            items.extend(page.items);
            match page.next {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(items)
    }

    /// Retry a single store call: throttles back off under the policy,
    /// unavailability gets a small fixed number of attempts, anything else
    /// surfaces immediately.
    async fn call_with_retries<T, F, Fut>(&self, label: &'static str, mut call: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut attempt = 0u32;
        let mut unavailable_attempts = 0u32;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(StoreError::Throttled) => {
                    if self.retry.attempts_exhausted(attempt) {
                        error!(label, attempts = attempt + 1, "throttled; retry budget exhausted");
                        return Err(StoreError::Throttled);
                    }
                    let delay = self.retry.delay_for(attempt);
                    warn!(label, ?delay, "store throttled; backing off");
                    self.sleeper.sleep(delay).await;
                    attempt += 1;
                }
                Err(StoreError::Unavailable(reason)) => {
                    unavailable_attempts += 1;
                    if unavailable_attempts >= UNAVAILABLE_ATTEMPTS {
                        error!(label, attempts = unavailable_attempts, "store unavailable");
                        return Err(StoreError::Unavailable(reason));
                    }
                    let delay = self.retry.delay_for(attempt);
                    warn!(label, %reason, ?delay, "store unavailable; retrying");
                    self.sleeper.sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
