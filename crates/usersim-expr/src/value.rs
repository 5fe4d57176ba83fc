//! Runtime values produced by evaluation and stored in fact environments.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::number::Number;

/// A concrete fact value: boolean or exact number.
///
/// Serialises untagged, so a fact reads as plain `true` or `12` in JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactValue {
    Bool(bool),
    Num(Number),
}

impl FactValue {
    /// The sort of this value.
    pub fn sort(&self) -> Sort {
        match self {
            FactValue::Bool(_) => Sort::Bool,
            FactValue::Num(_) => Sort::Num,
        }
    }
}

impl From<bool> for FactValue {
    fn from(b: bool) -> Self {
        FactValue::Bool(b)
    }
}

impl From<Number> for FactValue {
    fn from(n: Number) -> Self {
        FactValue::Num(n)
    }
}

impl From<i64> for FactValue {
    fn from(n: i64) -> Self {
        FactValue::Num(Number::int(n))
    }
}

impl From<i32> for FactValue {
    fn from(n: i32) -> Self {
        FactValue::Num(Number::from(n))
    }
}

impl fmt::Display for FactValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactValue::Bool(b) => write!(f, "{b}"),
            FactValue::Num(n) => write!(f, "{n}"),
        }
    }
}

/// Sort (type) of an expression or fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Sort {
    Bool,
    Num,
    /// Either sort. Unobserved facts take whichever sort their context needs.
    Any,
}

impl Sort {
    /// Unifies two sorts, `None` when they conflict.
    pub fn unify(self, other: Sort) -> Option<Sort> {
        match (self, other) {
            (Sort::Any, s) | (s, Sort::Any) => Some(s),
            (a, b) if a == b => Some(a),
            _ => None,
        }
    }

    /// True when a value of this sort can stand where `expected` is needed.
    pub fn fits(self, expected: Sort) -> bool {
        self.unify(expected).is_some()
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sort::Bool => write!(f, "bool"),
            Sort::Num => write!(f, "number"),
            Sort::Any => write!(f, "any"),
        }
    }
}

/// The result of evaluating an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    Num(Number),
    /// A fact that was not observed in this scenario.
    Unobserved,
    /// Ill-sorted operands, division by zero or arithmetic overflow.
    Undefined,
}

impl Value {
    /// Boolean reading. Unobserved facts read as `false` so guards stay shut.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Unobserved => Some(false),
            Value::Num(_) | Value::Undefined => None,
        }
    }

    /// Numeric reading. Unobserved facts read as the sentinel.
    pub fn as_num(&self, sentinel: Number) -> Option<Number> {
        match self {
            Value::Num(n) => Some(*n),
            Value::Unobserved => Some(sentinel),
            Value::Bool(_) | Value::Undefined => None,
        }
    }

    /// True only for a definite boolean `true`.
    pub fn is_true(&self) -> bool {
        matches!(self, Value::Bool(true))
    }
}

impl From<FactValue> for Value {
    fn from(v: FactValue) -> Self {
        match v {
            FactValue::Bool(b) => Value::Bool(b),
            FactValue::Num(n) => Value::Num(n),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Num(n) => write!(f, "{n}"),
            Value::Unobserved => write!(f, "unobserved"),
            Value::Undefined => write!(f, "undefined"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unobserved_reads() {
        assert_eq!(Value::Unobserved.as_bool(), Some(false));
        assert_eq!(Value::Unobserved.as_num(Number::int(-1)), Some(Number::int(-1)));
        assert!(!Value::Unobserved.is_true());
    }

    #[test]
    fn test_sort_unify() {
        assert_eq!(Sort::Any.unify(Sort::Num), Some(Sort::Num));
        assert_eq!(Sort::Bool.unify(Sort::Num), None);
        assert!(Sort::Any.fits(Sort::Bool));
    }

    #[test]
    fn test_fact_value_untagged_json() {
        assert_eq!(serde_json::to_string(&FactValue::Bool(true)).unwrap(), "true");
        assert_eq!(serde_json::to_string(&FactValue::from(3)).unwrap(), "3");
        let parsed: FactValue = serde_json::from_str("2.5").unwrap();
        assert_eq!(parsed, FactValue::Num(Number::ratio(5, 2).unwrap()));
    }
}
