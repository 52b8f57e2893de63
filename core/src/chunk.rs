//! Splits oversized batch requests into store-compliant chunks.
//!
//! Chunking is plain sequential slicing: no reordering, so concatenating
//! chunk payloads reproduces the input exactly, and `offset + i` recovers
//! any item's original index.

/// A request-sized slice of a larger batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchChunk<T> {
    /// Index of `items[0]` in the original sequence.
    pub offset: usize,
    pub items: Vec<T>,
}

/// Partition `items` into chunks of at most `limit` items.
/// Empty input yields no chunks — the executor must not touch the network.
pub fn chunk<T>(items: Vec<T>, limit: usize) -> Vec<BatchChunk<T>> {
    assert!(limit > 0, "chunk limit must be positive");
    let mut chunks = Vec::with_capacity(items.len().div_ceil(limit));
    let mut offset = 0;
    let mut remaining = items;
    while !remaining.is_empty() {
        let tail = remaining.split_off(remaining.len().min(limit));
        let len = remaining.len();
        chunks.push(BatchChunk { offset, items: remaining });
        offset += len;
        remaining = tail;
    }
    chunks
}
