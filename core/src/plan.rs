//! The access planner: given a normalized condition set and a schema, pick
//! the cheapest access pattern the store supports and carry everything the
//! pattern cannot satisfy as residual conditions for post-filtering.
//!
//! Priority order, first match wins: direct get, primary-key batch/fan-out,
//! secondary index query, scan. A suboptimal match is still correct — the
//! residual filter guarantees no condition is silently dropped — it just
//! reads more than it returns.

use crate::condition::{Comparison, Condition, ConditionSet, FieldConstraint};
use crate::schema::{IndexDescriptor, SchemaDescriptor};
use crate::store::ItemKey;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A single hash-partition query, against the primary key (`index: None`)
/// or a named secondary index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub index: Option<String>,
    pub hash_field: String,
    pub hash_value: Value,
    pub range: Option<RangePredicate>,
}

/// The key condition pushed down on a range field.
/// By construction `op` is one of Eq/Lt/Lte/Gt/Gte.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangePredicate {
    pub field: String,
    pub op: Comparison,
}

/// An executable access plan. Every condition from the planner's input is
/// either consumed by the access pattern or present in `residual`.
#[derive(Debug, Clone, PartialEq)]
pub enum AccessPlan {
    /// Single fully-keyed item lookup.
    DirectGet { key: ItemKey, residual: Vec<Condition> },
    /// Multi-key lookup on the primary key; chunked by the executor.
    BatchGet { keys: Vec<ItemKey>, residual: Vec<Condition> },
    /// One or more independent partition queries; results are concatenated.
    Query { queries: Vec<QuerySpec>, residual: Vec<Condition> },
    /// Full-table traversal with client-side filtering.
    Scan { residual: Vec<Condition> },
}

impl AccessPlan {
    pub fn residual(&self) -> &[Condition] {
        match self {
            AccessPlan::DirectGet { residual, .. }
            | AccessPlan::BatchGet { residual, .. }
            | AccessPlan::Query { residual, .. }
            | AccessPlan::Scan { residual } => residual,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AccessPlan::DirectGet { .. } => "direct_get",
            AccessPlan::BatchGet { .. } => "batch_get",
            AccessPlan::Query { .. } => "query",
            AccessPlan::Scan { .. } => "scan",
        }
    }
}

/// Choose the lowest-cost plan for a condition set against a schema.
pub fn plan_access(schema: &SchemaDescriptor, conditions: &ConditionSet) -> AccessPlan {
    let plan = if let Some(hash_values) = conditions.get(&schema.primary_key.hash_field).and_then(|c| c.membership.clone()) {
        plan_primary(schema, conditions, hash_values)
    } else if let Some(plan) = plan_secondary(schema, conditions) {
        plan
    } else {
        // Not an error: no usable key condition degrades to a filtered scan.
        warn!(table = %schema.record_type, "no indexed condition; planning full scan");
        AccessPlan::Scan { residual: conditions.to_conditions() }
    };
    debug!(table = %schema.record_type, kind = plan.kind(), residual = plan.residual().len(), "planned access");
    plan
}

/// Cases 1 and 2: the primary hash field carries a membership constraint.
fn plan_primary(schema: &SchemaDescriptor, conditions: &ConditionSet, hash_values: Vec<Value>) -> AccessPlan {
    let pk = &schema.primary_key;
    let mut consumed = Consumed::default();
    consumed.membership(&pk.hash_field);

    let Some(range_field) = pk.range_field.as_deref() else {
        let residual = consumed.residual(conditions);
        return match hash_values.as_slice() {
            [single] => AccessPlan::DirectGet { key: ItemKey::new(pk.hash_field.as_str(), single.clone()), residual },
            _ => AccessPlan::BatchGet { keys: hash_keys(&pk.hash_field, &hash_values), residual },
        };
    };

    let range_constraint = conditions.get(range_field).cloned().unwrap_or_default();
    match range_constraint {
        // Exact range values: the full key set is determined. A lingering
        // range bound on the same field stays residual.
        FieldConstraint { membership: Some(range_values), .. } => {
            consumed.membership(range_field);
            let residual = consumed.residual(conditions);
            match (hash_values.as_slice(), range_values.as_slice()) {
                ([hash], [range]) => AccessPlan::DirectGet {
                    key: ItemKey::new(pk.hash_field.as_str(), hash.clone()).and_range(range_field, range.clone()),
                    residual,
                },
                _ => {
                    let keys = hash_values
                        .iter()
                        .flat_map(|h| {
                            range_values
                                .iter()
                                .map(move |r| ItemKey::new(pk.hash_field.as_str(), h.clone()).and_range(range_field, r.clone()))
                        })
                        .collect();
                    AccessPlan::BatchGet { keys, residual }
                }
            }
        }
        // A range bound cannot address items; each hash value becomes one
        // partition query with the bound pushed down.
        FieldConstraint { membership: None, range: Some(bound) } => {
            consumed.range(range_field);
            let residual = consumed.residual(conditions);
            let range = Some(RangePredicate { field: range_field.to_string(), op: bound.to_comparison() });
            AccessPlan::Query { queries: partition_queries(None, &pk.hash_field, &hash_values, range), residual }
        }
        // Unconstrained range field: a partial key cannot address one item,
        // so even a single hash value plans as a partition query.
        FieldConstraint { membership: None, range: None } => {
            let residual = consumed.residual(conditions);
            AccessPlan::Query { queries: partition_queries(None, &pk.hash_field, &hash_values, None), residual }
        }
    }
}

/// Case 3: pick a secondary index whose hash field has an exact constraint.
/// An index with a constrained range field beats a hash-only match; ties go
/// to declaration order.
fn plan_secondary(schema: &SchemaDescriptor, conditions: &ConditionSet) -> Option<AccessPlan> {
    let mut first_viable: Option<&IndexDescriptor> = None;
    let mut chosen: Option<&IndexDescriptor> = None;

    for index in &schema.indexes {
        let viable = conditions.get(&index.key.hash_field).map(|c| c.membership.is_some()).unwrap_or(false);
        if !viable {
            continue;
        }
        first_viable.get_or_insert(index);

        let range_constrained = index
            .key
            .range_field
            .as_deref()
            .and_then(|f| conditions.get(f))
            .map(|c| c.membership.is_some() || c.range.is_some())
            .unwrap_or(false);
        if range_constrained {
            chosen = Some(index);
            break;
        }
    }

    let index = chosen.or(first_viable)?;
    let hash_field = &index.key.hash_field;
    let hash_values = conditions.get(hash_field).and_then(|c| c.membership.clone()).unwrap_or_default();

    let mut consumed = Consumed::default();
    consumed.membership(hash_field);

    // Push at most one key condition on the index range field: a bound if
    // present, else a single exact value. Anything not pushed stays residual.
    let mut range = None;
    if let Some(range_field) = index.key.range_field.as_deref() {
        if let Some(constraint) = conditions.get(range_field) {
            if let Some(bound) = &constraint.range {
                range = Some(RangePredicate { field: range_field.to_string(), op: bound.to_comparison() });
                consumed.range(range_field);
            } else if let Some(exact) = constraint.exact_value() {
                range = Some(RangePredicate { field: range_field.to_string(), op: Comparison::Eq(exact.clone()) });
                consumed.membership(range_field);
            }
        }
    }

    let residual = consumed.residual(conditions);
    Some(AccessPlan::Query { queries: partition_queries(Some(index.name.as_str()), hash_field, &hash_values, range), residual })
}

fn hash_keys(hash_field: &str, values: &[Value]) -> Vec<ItemKey> {
    values.iter().map(|v| ItemKey::new(hash_field, v.clone())).collect()
}

fn partition_queries(index: Option<&str>, hash_field: &str, hash_values: &[Value], range: Option<RangePredicate>) -> Vec<QuerySpec> {
    hash_values
        .iter()
        .map(|v| QuerySpec {
            index: index.map(str::to_string),
            hash_field: hash_field.to_string(),
            hash_value: v.clone(),
            range: range.clone(),
        })
        .collect()
}

/// Bookkeeping for which constraint parts the chosen access pattern
/// satisfies; whatever is left re-emits as residual conditions.
#[derive(Default)]
struct Consumed {
    memberships: Vec<String>,
    ranges: Vec<String>,
}

impl Consumed {
    fn membership(&mut self, field: &str) { self.memberships.push(field.to_string()); }

    fn range(&mut self, field: &str) { self.ranges.push(field.to_string()); }

    fn residual(&self, conditions: &ConditionSet) -> Vec<Condition> {
        let mut out = Vec::new();
        for (field, constraint) in conditions.iter() {
            if let Some(values) = &constraint.membership {
                if !self.memberships.iter().any(|f| f == field) {
                    let op = match values.as_slice() {
                        [single] => Comparison::Eq(single.clone()),
                        _ => Comparison::In(values.clone()),
                    };
                    out.push(Condition::new(field, op));
                }
            }
            if let Some(bound) = &constraint.range {
                if !self.ranges.iter().any(|f| f == field) {
                    out.push(Condition::new(field, bound.to_comparison()));
                }
            }
        }
        out
    }
}
