use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

///
/// Value
///
/// Untyped runtime literal shared by criteria, rows, and bind parameters.
/// Values carry no schema knowledge; type compatibility is checked during
/// criteria validation, never here.
///

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    List(Vec<Value>),
}

///
/// ValueKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Float,
    Text,
    Timestamp,
    List,
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Value {
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Text(_) => ValueKind::Text,
            Self::Timestamp(_) => ValueKind::Timestamp,
            Self::List(_) => ValueKind::List,
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Compare two values of the same kind.
    ///
    /// `Int` and `Float` compare against each other after widening.
    /// Any other cross-kind comparison (and anything involving `Null` or
    /// `List`) is undefined and returns `None`; callers decide whether an
    /// undefined comparison means "no match" or "keep input order".
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Float(a), Self::Float(b)) => Some(a.total_cmp(b)),
            (Self::Int(a), Self::Float(b)) => Some(widen(*a).total_cmp(b)),
            (Self::Float(a), Self::Int(b)) => Some(a.total_cmp(&widen(*b))),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Timestamp(a), Self::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Equality under the same widening rules as [`Self::compare`].
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        matches!(self.compare(other), Some(Ordering::Equal))
    }

    /// Text prefix test; `None` when either side is not text.
    #[must_use]
    pub fn text_starts_with(&self, needle: &Self) -> Option<bool> {
        match (self, needle) {
            (Self::Text(hay), Self::Text(pre)) => Some(hay.starts_with(pre.as_str())),
            _ => None,
        }
    }

    /// Text suffix test; `None` when either side is not text.
    #[must_use]
    pub fn text_ends_with(&self, needle: &Self) -> Option<bool> {
        match (self, needle) {
            (Self::Text(hay), Self::Text(suf)) => Some(hay.ends_with(suf.as_str())),
            _ => None,
        }
    }

    /// Text substring test; `None` when either side is not text.
    #[must_use]
    pub fn text_contains(&self, needle: &Self) -> Option<bool> {
        match (self, needle) {
            (Self::Text(hay), Self::Text(sub)) => Some(hay.contains(sub.as_str())),
            _ => None,
        }
    }
}

// Widening keeps Int/Float comparisons defined without a coercion layer.
#[expect(clippy::cast_precision_loss)]
const fn widen(value: i64) -> f64 {
    value as f64
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl<V: Into<Value>> From<Vec<V>> for Value {
    fn from(values: Vec<V>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl<V: Into<Value>> From<Option<V>> for Value {
    fn from(value: Option<V>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_is_defined_within_a_kind() {
        assert_eq!(
            Value::Int(1).compare(&Value::Int(2)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::Text("b".into()).compare(&Value::Text("a".into())),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn compare_widens_int_and_float() {
        assert_eq!(
            Value::Int(2).compare(&Value::Float(1.5)),
            Some(Ordering::Greater)
        );
        assert!(Value::Float(3.0).same_as(&Value::Int(3)));
    }

    #[test]
    fn compare_is_undefined_across_kinds() {
        assert_eq!(Value::Int(1).compare(&Value::Text("1".into())), None);
        assert_eq!(Value::Null.compare(&Value::Null), None);
        assert_eq!(Value::List(vec![]).compare(&Value::List(vec![])), None);
    }

    #[test]
    fn text_helpers_reject_non_text_operands() {
        let hay = Value::Text("username".into());
        assert_eq!(hay.text_starts_with(&Value::Text("user".into())), Some(true));
        assert_eq!(hay.text_ends_with(&Value::Text("name".into())), Some(true));
        assert_eq!(hay.text_contains(&Value::Text("erna".into())), Some(true));
        assert_eq!(hay.text_contains(&Value::Int(1)), None);
        assert_eq!(Value::Int(1).text_contains(&hay), None);
    }

    #[test]
    fn option_conversion_maps_none_to_null() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(7i64)), Value::Int(7));
    }
}
