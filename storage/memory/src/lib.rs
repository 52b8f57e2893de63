//! An in-memory [`StoreClient`] with the reference store's semantics:
//! overwrite-by-key puts, paginated query/scan, batch calls that can leave
//! items unprocessed. Faults are scripted per call so tests can drive the
//! executor's retry and backoff paths deterministically.

mod store;

pub use store::{CallCounts, Fault, MemoryStore};
