//! Parameterized row filters.
//!
//! A [`Filter`] is an immutable conjunction of [`Condition`]s, each comparing a
//! named row field against a typed [`Value`]. Filters are evaluated directly
//! against rows and never rendered into query text, so caller-supplied values
//! cannot alter the shape of a scan.

use crate::types::RowId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A record that can be paginated and filtered.
pub trait Row: Clone + Send + Sync {
    /// Stable, strictly increasing identifier.
    fn id(&self) -> RowId;

    /// Read a named field. Unknown fields read as [`Value::Null`]; the field
    /// named `id` must resolve to the row id.
    fn field(&self, name: &str) -> Value;
}

/// A typed field value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Compare two values of the same kind. Integers compare numerically
    /// across signedness; any other kind mismatch is incomparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Uint(a), Value::Uint(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Uint(b)) => Some((*a as i128).cmp(&(*b as i128))),
            (Value::Uint(a), Value::Int(b)) => Some((*a as i128).cmp(&(*b as i128))),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Uint(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Uint(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{:?}", v),
        }
    }
}

/// Comparison operator of a condition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    IsNull,
    IsNotNull,
}

/// A single `field <op> value` predicate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub op: Op,
    pub value: Value,
}

impl Condition {
    pub fn new(field: impl Into<String>, op: Op, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Evaluate against a row.
    pub fn matches<R: Row>(&self, row: &R) -> bool {
        let actual = row.field(&self.field);
        match self.op {
            Op::IsNull => actual.is_null(),
            Op::IsNotNull => !actual.is_null(),
            // Null never compares, not even to Null.
            _ if actual.is_null() || self.value.is_null() => false,
            Op::Eq => actual.compare(&self.value) == Some(Ordering::Equal),
            Op::Ne => matches!(
                actual.compare(&self.value),
                Some(Ordering::Less | Ordering::Greater)
            ),
            Op::Lt => actual.compare(&self.value) == Some(Ordering::Less),
            Op::Le => matches!(
                actual.compare(&self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Op::Gt => actual.compare(&self.value) == Some(Ordering::Greater),
            Op::Ge => matches!(
                actual.compare(&self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.op {
            Op::Eq => "=",
            Op::Ne => "!=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::IsNull => return write!(f, "{} is null", self.field),
            Op::IsNotNull => return write!(f, "{} is not null", self.field),
        };
        write!(f, "{} {} {}", self.field, op, self.value)
    }
}

/// Immutable conjunction of conditions. The empty filter matches every row.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    /// Filter matching every row.
    pub fn all() -> Self {
        Self::default()
    }

    /// Add a condition, returning the extended filter.
    pub fn and(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(Condition::new(field, Op::Eq, value))
    }

    pub fn ne(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(Condition::new(field, Op::Ne, value))
    }

    pub fn lt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(Condition::new(field, Op::Lt, value))
    }

    pub fn le(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(Condition::new(field, Op::Le, value))
    }

    pub fn gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(Condition::new(field, Op::Gt, value))
    }

    pub fn ge(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(Condition::new(field, Op::Ge, value))
    }

    pub fn is_null(self, field: impl Into<String>) -> Self {
        self.and(Condition::new(field, Op::IsNull, Value::Null))
    }

    pub fn is_not_null(self, field: impl Into<String>) -> Self {
        self.and(Condition::new(field, Op::IsNotNull, Value::Null))
    }

    /// Whether every condition holds for `row`.
    pub fn matches<R: Row>(&self, row: &R) -> bool {
        self.conditions.iter().all(|c| c.matches(row))
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.conditions.is_empty() {
            return write!(f, "true");
        }
        for (i, condition) in self.conditions.iter().enumerate() {
            if i > 0 {
                write!(f, " and ")?;
            }
            write!(f, "{}", condition)?;
        }
        Ok(())
    }
}
