//! Field conditions and their canonical form.
//!
//! The parsing collaborator hands over a flat list of [`Condition`]s.
//! [`ConditionSet::normalize`] folds them into one constraint per field:
//! a membership set (equality and `IN` merged by intersection) and at most
//! one range bound. The planner consumes the normalized form only.

use crate::error::PlanError;
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A raw comparison as produced by the parsing collaborator.
///
/// `Ne` and `Between` are representable so the collaborator can hand them
/// over, but the normalizer refuses them: neither can be planned against a
/// hash/range store key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Comparison {
    Eq(Value),
    Ne(Value),
    Lt(Value),
    Lte(Value),
    Gt(Value),
    Gte(Value),
    In(Vec<Value>),
    Between(Value, Value),
}

impl Comparison {
    pub fn operator_name(&self) -> &'static str {
        match self {
            Comparison::Eq(_) => "=",
            Comparison::Ne(_) => "!=",
            Comparison::Lt(_) => "<",
            Comparison::Lte(_) => "<=",
            Comparison::Gt(_) => ">",
            Comparison::Gte(_) => ">=",
            Comparison::In(_) => "IN",
            Comparison::Between(_, _) => "BETWEEN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub op: Comparison,
}

impl Condition {
    pub fn new(field: impl Into<String>, op: Comparison) -> Self { Self { field: field.into(), op } }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self { Self::new(field, Comparison::Eq(value.into())) }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self { Self::new(field, Comparison::Ne(value.into())) }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self { Self::new(field, Comparison::Lt(value.into())) }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self { Self::new(field, Comparison::Lte(value.into())) }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self { Self::new(field, Comparison::Gt(value.into())) }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self { Self::new(field, Comparison::Gte(value.into())) }

    pub fn one_of(field: impl Into<String>, values: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        Self::new(field, Comparison::In(values.into_iter().map(Into::into).collect()))
    }
}

/// A single directed range bound on a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RangeBound {
    Lt(Value),
    Lte(Value),
    Gt(Value),
    Gte(Value),
}

impl RangeBound {
    /// Whether a candidate value satisfies the bound. Cross-typed values never do.
    pub fn matches(&self, candidate: &Value) -> bool {
        match self {
            RangeBound::Lt(v) => candidate.partial_cmp(v).is_some_and(|o| o.is_lt()),
            RangeBound::Lte(v) => candidate.partial_cmp(v).is_some_and(|o| o.is_le()),
            RangeBound::Gt(v) => candidate.partial_cmp(v).is_some_and(|o| o.is_gt()),
            RangeBound::Gte(v) => candidate.partial_cmp(v).is_some_and(|o| o.is_ge()),
        }
    }

    pub fn to_comparison(&self) -> Comparison {
        match self {
            RangeBound::Lt(v) => Comparison::Lt(v.clone()),
            RangeBound::Lte(v) => Comparison::Lte(v.clone()),
            RangeBound::Gt(v) => Comparison::Gt(v.clone()),
            RangeBound::Gte(v) => Comparison::Gte(v.clone()),
        }
    }
}

/// The normalized constraints on one field.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldConstraint {
    /// Merged equality/`IN` value set. `Some(vec![])` is a legal empty
    /// intersection and plans to an empty fan-out.
    pub membership: Option<Vec<Value>>,
    /// At most one directed bound per field.
    pub range: Option<RangeBound>,
}

impl FieldConstraint {
    /// Membership holding exactly one value, if so constrained.
    pub fn exact_value(&self) -> Option<&Value> {
        match self.membership.as_deref() {
            Some([v]) => Some(v),
            _ => None,
        }
    }
}

/// Canonical condition set: insertion-ordered field -> constraint map.
///
/// Insertion order is preserved so planning is deterministic for equal
/// inputs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConditionSet {
    fields: IndexMap<String, FieldConstraint>,
}

impl ConditionSet {
    /// Fold a raw condition list into canonical per-field constraints.
    ///
    /// `Eq(x)` is treated as `In([x])`; repeated memberships on a field merge
    /// by intersection. A second range bound on a field (either direction)
    /// fails with [`PlanError::ConflictingCondition`].
    pub fn normalize(conditions: impl IntoIterator<Item = Condition>) -> Result<Self, PlanError> {
        let mut fields: IndexMap<String, FieldConstraint> = IndexMap::new();

        for condition in conditions {
            let operator = condition.op.operator_name();
            let entry = fields.entry(condition.field.clone()).or_default();
            match condition.op {
                Comparison::Eq(value) => merge_membership(entry, vec![value]),
                Comparison::In(values) => merge_membership(entry, values),
                Comparison::Lt(value) => merge_range(entry, RangeBound::Lt(value), &condition.field)?,
                Comparison::Lte(value) => merge_range(entry, RangeBound::Lte(value), &condition.field)?,
                Comparison::Gt(value) => merge_range(entry, RangeBound::Gt(value), &condition.field)?,
                Comparison::Gte(value) => merge_range(entry, RangeBound::Gte(value), &condition.field)?,
                Comparison::Ne(_) | Comparison::Between(_, _) => {
                    return Err(PlanError::UnsupportedOperator { field: condition.field, operator });
                }
            }
        }

        Ok(Self { fields })
    }

    pub fn get(&self, field: &str) -> Option<&FieldConstraint> { self.fields.get(field) }

    pub fn is_empty(&self) -> bool { self.fields.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldConstraint)> { self.fields.iter().map(|(k, v)| (k.as_str(), v)) }

    /// Re-emit the set as a flat condition list, in field insertion order.
    /// Single-value memberships come back as `Eq`, larger ones as `In`.
    pub fn to_conditions(&self) -> Vec<Condition> {
        let mut out = Vec::new();
        for (field, constraint) in &self.fields {
            if let Some(values) = &constraint.membership {
                let op = match values.as_slice() {
                    [single] => Comparison::Eq(single.clone()),
                    _ => Comparison::In(values.clone()),
                };
                out.push(Condition::new(field.clone(), op));
            }
            if let Some(bound) = &constraint.range {
                out.push(Condition::new(field.clone(), bound.to_comparison()));
            }
        }
        out
    }
}

fn merge_membership(entry: &mut FieldConstraint, values: Vec<Value>) {
    match &mut entry.membership {
        None => entry.membership = Some(values),
        Some(existing) => existing.retain(|v| values.contains(v)),
    }
}

fn merge_range(entry: &mut FieldConstraint, bound: RangeBound, field: &str) -> Result<(), PlanError> {
    if entry.range.is_some() {
        return Err(PlanError::ConflictingCondition { field: field.to_string() });
    }
    entry.range = Some(bound);
    Ok(())
}
