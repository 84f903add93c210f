//! The user fact base: a nested JSON object addressed by dotted paths.
//!
//! Key invariant: "not yet known" is represented only by absence. `null`
//! leaves are dropped on construction and `set` refuses to store one, so
//! `get(path).is_none()` is the single test for a gap. Keys are never
//! removed once present; they can only be overwritten.

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;

/// Age at which a person is treated as a senior citizen.
pub const SENIOR_AGE: u32 = 60;

/// Age at which a person is treated as a super senior citizen.
pub const SUPER_SENIOR_AGE: u32 = 80;

/// Structured user facts with dotted-path access.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactBase {
    root: Map<String, Value>,
}

impl FactBase {
    /// Create an empty fact base.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a fact base from user-supplied details.
    ///
    /// Drops `null` leaves, copies a legacy `user_age` into `age_self`,
    /// coerces a string `is_senior_citizen` and re-derives it from
    /// `age_self` when the age is known.
    pub fn from_json(details: Value) -> Result<Self, CoreError> {
        let root = match details {
            Value::Object(map) => map,
            other => return Err(CoreError::not_an_object(&other)),
        };
        let mut facts = FactBase {
            root: strip_nulls(root),
        };
        if !facts.contains("age_self") {
            if let Some(age) = facts.get("user_age").cloned() {
                facts.root.insert("age_self".to_string(), age);
            }
        }
        if let Some(Value::String(s)) = facts.root.get("is_senior_citizen") {
            let coerced = s.trim().eq_ignore_ascii_case("true");
            facts
                .root
                .insert("is_senior_citizen".to_string(), Value::Bool(coerced));
        }
        facts.refresh_derived();
        Ok(facts)
    }

    /// Look up a value by dotted path.
    ///
    /// A missing intermediate key, or an intermediate that is not an
    /// object, yields `None`; it is never an error.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.root.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        if current.is_null() {
            None
        } else {
            Some(current)
        }
    }

    /// True when the path resolves to a non-null value.
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Set a value by dotted path, creating intermediate objects.
    ///
    /// Overwrites whatever was there, including a scalar intermediate.
    /// Setting `null` is a no-op: unknown values never enter the fact base.
    pub fn set(&mut self, path: &str, value: Value) -> Result<(), CoreError> {
        let segments: Vec<&str> = path.split('.').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(CoreError::InvalidPath {
                path: path.to_string(),
            });
        }
        if value.is_null() {
            return Ok(());
        }
        let (last, parents) = match segments.split_last() {
            Some(split) => split,
            None => {
                return Err(CoreError::InvalidPath {
                    path: path.to_string(),
                })
            }
        };
        let mut current = &mut self.root;
        for segment in parents {
            let slot = current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            current = match slot {
                Value::Object(map) => map,
                _ => {
                    return Err(CoreError::InvalidPath {
                        path: path.to_string(),
                    })
                }
            };
        }
        current.insert(last.to_string(), value);
        Ok(())
    }

    /// Numeric fact as a decimal; absent or unparseable facts read as zero.
    pub fn decimal(&self, path: &str) -> Decimal {
        self.get(path).and_then(value_to_decimal).unwrap_or_default()
    }

    /// Age fact in whole years; absent or negative facts read as zero,
    /// and ages past `u32::MAX` saturate.
    pub fn age(&self, path: &str) -> u32 {
        let age = self.decimal(path).trunc();
        if age.is_sign_negative() {
            return 0;
        }
        age.to_u32().unwrap_or(u32::MAX)
    }

    /// Boolean fact. Accepts JSON booleans and the strings `"true"`/`"false"`.
    pub fn flag(&self, path: &str) -> Option<bool> {
        match self.get(path)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) if s.trim().eq_ignore_ascii_case("true") => Some(true),
            Value::String(s) if s.trim().eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }

    /// Categorical fact, lowercased. `None` is the "unknown" sentinel.
    pub fn category(&self, path: &str) -> Option<String> {
        match self.get(path)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_lowercase()),
            _ => None,
        }
    }

    /// Recompute derived flags from their primary facts.
    ///
    /// Currently only `is_senior_citizen`, derived from `age_self`.
    pub fn refresh_derived(&mut self) {
        if self.contains("age_self") {
            let senior = self.age("age_self") >= SENIOR_AGE;
            self.root
                .insert("is_senior_citizen".to_string(), Value::Bool(senior));
        }
    }

    /// Borrow the underlying JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.root
    }

    /// Clone the facts into a JSON value (for prompts and persistence).
    pub fn to_json(&self) -> Value {
        Value::Object(self.root.clone())
    }
}

/// Parse a JSON number or numeric string into a decimal.
///
/// Strings may carry a leading `₹` and Indian or Western digit grouping.
pub fn value_to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()
        }
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .trim_start_matches('₹')
                .chars()
                .filter(|c| *c != ',' && !c.is_whitespace())
                .collect();
            Decimal::from_str(&cleaned).ok()
        }
        _ => None,
    }
}

fn strip_nulls(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::Object(inner) => Some((key, Value::Object(strip_nulls(inner)))),
            other => Some((key, other)),
        })
        .collect()
}
