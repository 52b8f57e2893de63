//! # keyplane
//!
//! keyplane sits between an application's declarative record queries and a
//! wide-column key-value store whose access patterns are constrained:
//! single-item gets, hash/range queries against a primary key or secondary
//! index, unordered scans, and batch calls with hard item-count ceilings
//! and partial-failure responses.
//!
//! Given a set of field conditions, the planner picks the cheapest valid
//! access pattern — direct get, batch get, index query, or filtered scan —
//! and whatever the pattern cannot express is applied as a residual filter
//! on the returned items, so results are always correct even when the match
//! is suboptimal.
//!
//! The executor chunks oversized batches to the store's ceilings, runs
//! sibling chunks concurrently, retries unprocessed subsets with jittered
//! exponential backoff, and follows pagination tokens to exhaustion.
//! Partial failure is a first-class return value, never an exception.
//!
//! ## Caveats callers must know
//!
//! - Batch-get results arrive in store response order, not request order.
//! - A caller-level timeout cancels in-flight calls, but chunk writes that
//!   already committed stay committed; multi-chunk writes are not atomic.

pub use keyplane_core::*;
