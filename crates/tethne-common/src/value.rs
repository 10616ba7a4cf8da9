//! Field values shared by papers, indices and feature sets.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A hashable, totally ordered field value.
///
/// Used as secondary-index key, feature element and slicing axis, so it
/// deliberately has no floating-point variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Text(String),
    List(Vec<Value>),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// Build a `List` of `Text` values.
    pub fn tuple<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::List(items.into_iter().map(|s| Value::Text(s.into())).collect())
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Text(s) => s.trim().parse().ok(),
            Value::List(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    /// An empty string or an empty list.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Int(_) => false,
            Value::Text(s) => s.trim().is_empty(),
            Value::List(items) => items.is_empty(),
        }
    }

    /// Scalars yield themselves; lists yield their members (one level).
    pub fn flatten(&self) -> Vec<Value> {
        match self {
            Value::List(items) => items.clone(),
            other => vec![other.clone()],
        }
    }

    /// Whitespace-collapsed, lower-cased rendering used for fuzzy equality.
    pub fn normalized(&self) -> String {
        match self {
            Value::List(items) => items
                .iter()
                .map(Value::normalized)
                .collect::<Vec<_>>()
                .join("|"),
            other => other
                .to_string()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Text(s) => f.write_str(s),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                f.write_str(&parts.join(" "))
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Int(i as i64)
    }
}

impl<V: Into<Value>> From<Vec<V>> for Value {
    fn from(items: Vec<V>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tuple_display_joins_with_space() {
        let v = Value::tuple(["ZENG", "EDDY Y"]);
        assert_eq!(v.to_string(), "ZENG EDDY Y");
    }

    #[test]
    fn test_normalized_collapses_whitespace() {
        let a = Value::text("  Journal   of Things ");
        let b = Value::text("journal of things");
        assert_eq!(a.normalized(), b.normalized());
    }

    #[test]
    fn test_as_int_parses_text() {
        assert_eq!(Value::text(" 2012").as_int(), Some(2012));
        assert_eq!(Value::tuple(["a"]).as_int(), None);
    }

    #[test]
    fn test_ordering_is_total() {
        let mut values = vec![Value::text("b"), Value::Int(3), Value::text("a"), Value::Int(1)];
        values.sort();
        assert_eq!(values, vec![Value::Int(1), Value::Int(3), Value::text("a"), Value::text("b")]);
    }
}
