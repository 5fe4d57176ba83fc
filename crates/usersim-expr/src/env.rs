//! The grounded fact environment a persona is judged against.
//!
//! A [`FactEnv`] is an immutable map from fact name to [`FactValue`] plus the
//! sentinel number that stands in for facts the scenario did not observe.
//! Lookups never fail: a missing name yields [`Value::Unobserved`], which
//! reads as the sentinel in numeric position and as `false` in boolean
//! position. With the default sentinel of `-1`, a guard such as
//! `Implies(p99_ms >= 0, p99_ms <= 500)` is vacuously true whenever `p99_ms`
//! was not measured.
//!
//! ## Ingestion
//!
//! [`FactEnv::from_json`] accepts the `facts` object of a facts document:
//!
//! | JSON value | Stored as |
//! |------------|-----------|
//! | `true` / `false` | boolean |
//! | number | exact number; `0`/`1` also add a `<name>_bool` alias |
//! | `"true"`, `"yes"`, `"1"` | `true` |
//! | `"false"`, `"no"`, `"0"` | `false` |
//! | anything else | skipped |
//!
//! Names have `-` and `.` replaced by `_` so they are valid formula
//! identifiers.

use std::collections::BTreeMap;

use serde_json::Value as Json;
use tracing::warn;

use crate::expr::Expr;
use crate::number::Number;
use crate::value::{FactValue, Value};

/// Default "not observed" sentinel.
pub const DEFAULT_SENTINEL: i64 = -1;

/// Replaces characters that cannot appear in an identifier.
pub fn sanitize_fact_name(name: &str) -> String {
    name.replace(['-', '.'], "_")
}

/// An immutable, fully grounded fact environment.
#[derive(Debug, Clone, PartialEq)]
pub struct FactEnv {
    facts: BTreeMap<String, FactValue>,
    sentinel: Number,
}

impl Default for FactEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl FactEnv {
    /// An empty environment with the default sentinel.
    pub fn new() -> Self {
        Self {
            facts: BTreeMap::new(),
            sentinel: Number::int(DEFAULT_SENTINEL),
        }
    }

    /// Builds an environment from a facts JSON object.
    pub fn from_json(facts: &serde_json::Map<String, Json>) -> Self {
        let mut env = Self::new();
        for (raw_name, raw_value) in facts {
            let name = sanitize_fact_name(raw_name);
            match raw_value {
                Json::Bool(b) => {
                    env.facts.insert(name, FactValue::Bool(*b));
                }
                Json::Number(n) => match Number::from_json(n) {
                    Some(number) => {
                        if number == Number::ZERO || number == Number::ONE {
                            env.facts.insert(
                                format!("{name}_bool"),
                                FactValue::Bool(number == Number::ONE),
                            );
                        }
                        env.facts.insert(name, FactValue::Num(number));
                    }
                    None => warn!("Skipping fact '{}': number {} out of range", raw_name, n),
                },
                Json::String(s) => match s.to_ascii_lowercase().as_str() {
                    "true" | "yes" | "1" => {
                        env.facts.insert(name, FactValue::Bool(true));
                    }
                    "false" | "no" | "0" => {
                        env.facts.insert(name, FactValue::Bool(false));
                    }
                    _ => warn!("Skipping fact '{}': string value is not boolean", raw_name),
                },
                other => warn!(
                    "Skipping fact '{}': unsupported value {}",
                    raw_name, other
                ),
            }
        }
        env
    }

    /// Replaces the sentinel used for unobserved facts.
    pub fn with_sentinel(mut self, sentinel: Number) -> Self {
        self.sentinel = sentinel;
        self
    }

    /// Adds or replaces a single fact.
    pub fn with_fact(mut self, name: impl AsRef<str>, value: impl Into<FactValue>) -> Self {
        self.facts
            .insert(sanitize_fact_name(name.as_ref()), value.into());
        self
    }

    /// The observed value for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&FactValue> {
        self.facts.get(name)
    }

    /// Evaluation-time lookup; never fails.
    pub fn lookup(&self, name: &str) -> Value {
        match self.facts.get(name) {
            Some(v) => Value::from(*v),
            None => Value::Unobserved,
        }
    }

    /// A variable expression for `name`, for personas written in Rust.
    pub fn fact(&self, name: &str) -> Expr {
        Expr::var(sanitize_fact_name(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.facts.contains_key(name)
    }

    pub fn sentinel(&self) -> Number {
        self.sentinel
    }

    /// Observed fact names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.facts.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FactValue)> {
        self.facts.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// A new environment with `overrides` layered on top. `self` is untouched.
    pub fn overlay<'a, I>(&self, overrides: I) -> FactEnv
    where
        I: IntoIterator<Item = (&'a str, FactValue)>,
    {
        let mut facts = self.facts.clone();
        for (name, value) in overrides {
            facts.insert(name.to_string(), value);
        }
        FactEnv {
            facts,
            sentinel: self.sentinel,
        }
    }
}
