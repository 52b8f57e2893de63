use async_trait::async_trait;
use keyplane_core::condition::Condition;
use keyplane_core::error::StoreError;
use keyplane_core::materialize;
use keyplane_core::plan::QuerySpec;
use keyplane_core::schema::KeySchema;
use keyplane_core::store::{
    BatchGetOutput, BatchWriteOutput, ContinuationToken, ItemKey, Page, RawItem, StoreClient, StoreLimits, WriteOp,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::debug;

/// A scripted behavior for the next batch call, consumed FIFO.
#[derive(Debug, Clone, PartialEq)]
pub enum Fault {
    /// Fail the call with `StoreError::Throttled`.
    Throttle,
    /// Process only the first `n` items; report the rest unprocessed.
    Partial(usize),
    /// Fail the call with `StoreError::Unavailable`.
    Unavailable(String),
}

/// Per-method call counts, for asserting request shapes in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CallCounts {
    pub get_item: usize,
    pub batch_get_item: usize,
    pub query: usize,
    pub scan: usize,
    pub put_item: usize,
    pub delete_item: usize,
    pub batch_write_item: usize,
}

#[derive(Default)]
struct Counters {
    get_item: AtomicUsize,
    batch_get_item: AtomicUsize,
    query: AtomicUsize,
    scan: AtomicUsize,
    put_item: AtomicUsize,
    delete_item: AtomicUsize,
    batch_write_item: AtomicUsize,
}

struct Table {
    key: KeySchema,
    items: Vec<RawItem>,
}

pub struct MemoryStore {
    tables: Mutex<HashMap<String, Table>>,
    limits: StoreLimits,
    /// When set, query/scan responses carry at most this many items per page.
    page_size: Option<usize>,
    faults: Mutex<VecDeque<Fault>>,
    counters: Counters,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            limits: StoreLimits::default(),
            page_size: None,
            faults: Mutex::new(VecDeque::new()),
            counters: Counters::default(),
        }
    }

    pub fn with_limits(mut self, limits: StoreLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size.max(1));
        self
    }

    /// Declare a table and the key its items are addressed by.
    pub fn create_table(&self, name: impl Into<String>, key: KeySchema) {
        self.tables.lock().unwrap().insert(name.into(), Table { key, items: Vec::new() });
    }

    /// Script the next batch call's behavior. Faults queue FIFO and each is
    /// consumed by exactly one `batch_get_item`/`batch_write_item` call.
    pub fn push_fault(&self, fault: Fault) { self.faults.lock().unwrap().push_back(fault) }

    pub fn call_counts(&self) -> CallCounts {
        CallCounts {
            get_item: self.counters.get_item.load(Ordering::SeqCst),
            batch_get_item: self.counters.batch_get_item.load(Ordering::SeqCst),
            query: self.counters.query.load(Ordering::SeqCst),
            scan: self.counters.scan.load(Ordering::SeqCst),
            put_item: self.counters.put_item.load(Ordering::SeqCst),
            delete_item: self.counters.delete_item.load(Ordering::SeqCst),
            batch_write_item: self.counters.batch_write_item.load(Ordering::SeqCst),
        }
    }

    /// Snapshot of a table's items, in insertion order.
    pub fn items(&self, table: &str) -> Vec<RawItem> {
        self.tables.lock().unwrap().get(table).map(|t| t.items.clone()).unwrap_or_default()
    }

    fn next_fault(&self) -> Option<Fault> { self.faults.lock().unwrap().pop_front() }

    fn upsert(table: &mut Table, item: RawItem) -> Result<(), StoreError> {
        let key = ItemKey::extract(&table.key, &item)
            .map_err(|err| StoreError::Validation(format!("item is missing key attributes: {err}")))?;
        match table.items.iter_mut().find(|existing| key.addresses(existing)) {
            Some(existing) => *existing = item,
            None => table.items.push(item),
        }
        Ok(())
    }

    fn remove(table: &mut Table, key: &ItemKey) {
        table.items.retain(|item| !key.addresses(item));
    }

    fn paginate(&self, items: Vec<RawItem>, start: Option<ContinuationToken>) -> Result<Page, StoreError> {
        let offset = match start {
            Some(token) => decode_token(&token)?,
            None => 0,
        };
        let Some(page_size) = self.page_size else {
            return Ok(Page { items, next: None });
        };
        let end = (offset + page_size).min(items.len());
        let next = (end < items.len()).then(|| encode_token(end));
        Ok(Page { items: items[offset.min(items.len())..end].to_vec(), next })
    }
}

impl Default for MemoryStore {
    fn default() -> Self { Self::new() }
}

fn encode_token(offset: usize) -> ContinuationToken { ContinuationToken(offset.to_be_bytes().to_vec()) }

fn decode_token(token: &ContinuationToken) -> Result<usize, StoreError> {
    let bytes: [u8; 8] = token.0.as_slice().try_into().map_err(|_| StoreError::Validation("malformed continuation token".into()))?;
    Ok(usize::from_be_bytes(bytes))
}

fn with_table<T>(
    tables: &Mutex<HashMap<String, Table>>,
    name: &str,
    f: impl FnOnce(&mut Table) -> Result<T, StoreError>,
) -> Result<T, StoreError> {
    let mut tables = tables.lock().unwrap();
    let table = tables.get_mut(name).ok_or_else(|| StoreError::Validation(format!("no such table: {name}")))?;
    f(table)
}

#[async_trait]
impl StoreClient for MemoryStore {
    fn limits(&self) -> StoreLimits { self.limits }

    async fn get_item(&self, table: &str, key: &ItemKey) -> Result<Option<RawItem>, StoreError> {
        self.counters.get_item.fetch_add(1, Ordering::SeqCst);
        with_table(&self.tables, table, |t| Ok(t.items.iter().find(|item| key.addresses(item)).cloned()))
    }

    async fn batch_get_item(&self, table: &str, keys: &[ItemKey]) -> Result<BatchGetOutput, StoreError> {
        self.counters.batch_get_item.fetch_add(1, Ordering::SeqCst);
        if keys.len() > self.limits.max_batch_read {
            return Err(StoreError::Validation(format!("batch get of {} exceeds limit {}", keys.len(), self.limits.max_batch_read)));
        }
        let (processed, unprocessed) = match self.next_fault() {
            Some(Fault::Throttle) => return Err(StoreError::Throttled),
            Some(Fault::Unavailable(reason)) => return Err(StoreError::Unavailable(reason)),
            Some(Fault::Partial(n)) => {
                debug!(processed = n.min(keys.len()), total = keys.len(), "scripted partial batch get");
                keys.split_at(n.min(keys.len()))
            }
            None => (keys, &[][..]),
        };
        with_table(&self.tables, table, |t| {
            let items = processed.iter().filter_map(|key| t.items.iter().find(|item| key.addresses(item)).cloned()).collect();
            Ok(BatchGetOutput { items, unprocessed: unprocessed.to_vec() })
        })
    }

    async fn query(&self, table: &str, query: &QuerySpec, exclusive_start: Option<ContinuationToken>) -> Result<Page, StoreError> {
        self.counters.query.fetch_add(1, Ordering::SeqCst);
        let matching = with_table(&self.tables, table, |t| {
            let hash = Condition::new(query.hash_field.clone(), keyplane_core::condition::Comparison::Eq(query.hash_value.clone()));
            let range = query.range.as_ref().map(|r| Condition::new(r.field.clone(), r.op.clone()));
            Ok(t.items
                .iter()
                .filter(|item| materialize::matches(item, &hash))
                .filter(|item| range.as_ref().map(|r| materialize::matches(item, r)).unwrap_or(true))
                .cloned()
                .collect::<Vec<_>>())
        })?;
        self.paginate(matching, exclusive_start)
    }

    async fn scan(&self, table: &str, exclusive_start: Option<ContinuationToken>) -> Result<Page, StoreError> {
        self.counters.scan.fetch_add(1, Ordering::SeqCst);
        let items = with_table(&self.tables, table, |t| Ok(t.items.clone()))?;
        self.paginate(items, exclusive_start)
    }

    async fn put_item(&self, table: &str, item: RawItem) -> Result<(), StoreError> {
        self.counters.put_item.fetch_add(1, Ordering::SeqCst);
        with_table(&self.tables, table, |t| Self::upsert(t, item))
    }

    async fn delete_item(&self, table: &str, key: &ItemKey) -> Result<(), StoreError> {
        self.counters.delete_item.fetch_add(1, Ordering::SeqCst);
        with_table(&self.tables, table, |t| {
            Self::remove(t, key);
            Ok(())
        })
    }

    async fn batch_write_item(&self, table: &str, ops: &[WriteOp]) -> Result<BatchWriteOutput, StoreError> {
        self.counters.batch_write_item.fetch_add(1, Ordering::SeqCst);
        if ops.len() > self.limits.max_batch_write {
            return Err(StoreError::Validation(format!("batch write of {} exceeds limit {}", ops.len(), self.limits.max_batch_write)));
        }
        let (processed, unprocessed) = match self.next_fault() {
            Some(Fault::Throttle) => return Err(StoreError::Throttled),
            Some(Fault::Unavailable(reason)) => return Err(StoreError::Unavailable(reason)),
            Some(Fault::Partial(n)) => {
                debug!(processed = n.min(ops.len()), total = ops.len(), "scripted partial batch write");
                ops.split_at(n.min(ops.len()))
            }
            None => (ops, &[][..]),
        };
        with_table(&self.tables, table, |t| {
            for op in processed {
                match op {
                    WriteOp::Put(item) => Self::upsert(t, item.clone())?,
                    WriteOp::Delete(key) => Self::remove(t, key),
                }
            }
            Ok(BatchWriteOutput { unprocessed: unprocessed.to_vec() })
        })
    }
}
