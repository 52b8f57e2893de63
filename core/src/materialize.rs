//! Turns raw store items back into caller records, after enforcing each
//! plan's residual conditions as an in-memory filter. This is what keeps an
//! under-matched access pattern correct: whatever the key couldn't express
//! gets checked here, item by item.

use crate::condition::{Comparison, Condition};
use crate::error::MappingError;
use crate::store::RawItem;

/// The schema-mapping collaborator: converts between caller records and raw
/// attribute maps. Field-name translation and type coercion live behind it.
pub trait RecordMapper: Send + Sync {
    type Record;

    /// Record type name; also the store table this record type lives in.
    fn record_type(&self) -> &str;

    fn to_raw_item(&self, record: &Self::Record) -> Result<RawItem, MappingError>;

    fn from_raw_item(&self, item: &RawItem) -> Result<Self::Record, MappingError>;
}

/// Whether an item satisfies one condition. A missing field or a
/// cross-typed value fails the condition — filtering never lets an
/// unverifiable item through.
pub fn matches(item: &RawItem, condition: &Condition) -> bool {
    let Some(value) = item.get(&condition.field) else {
        return false;
    };
    match &condition.op {
        Comparison::Eq(expected) => value == expected,
        Comparison::Ne(expected) => value.partial_cmp(expected).is_some() && value != expected,
        Comparison::Lt(bound) => value.partial_cmp(bound).is_some_and(|o| o.is_lt()),
        Comparison::Lte(bound) => value.partial_cmp(bound).is_some_and(|o| o.is_le()),
        Comparison::Gt(bound) => value.partial_cmp(bound).is_some_and(|o| o.is_gt()),
        Comparison::Gte(bound) => value.partial_cmp(bound).is_some_and(|o| o.is_ge()),
        Comparison::In(values) => values.contains(value),
        Comparison::Between(low, high) => {
            value.partial_cmp(low).is_some_and(|o| o.is_ge()) && value.partial_cmp(high).is_some_and(|o| o.is_le())
        }
    }
}

pub fn matches_all(item: &RawItem, conditions: &[Condition]) -> bool {
    conditions.iter().all(|condition| matches(item, condition))
}

/// Drop every item that violates a residual condition.
pub fn filter_residual(items: Vec<RawItem>, residual: &[Condition]) -> Vec<RawItem> {
    if residual.is_empty() {
        return items;
    }
    items.into_iter().filter(|item| matches_all(item, residual)).collect()
}

/// Filter by the plan's residual, then map into records. A mapping failure
/// is a schema mismatch and surfaces immediately.
pub fn materialize<M: RecordMapper>(mapper: &M, items: Vec<RawItem>, residual: &[Condition]) -> Result<Vec<M::Record>, MappingError> {
    filter_residual(items, residual).iter().map(|item| mapper.from_raw_item(item)).collect()
}
