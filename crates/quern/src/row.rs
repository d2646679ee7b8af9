use crate::value::Value;
use derive_more::IntoIterator;
use serde::{Deserialize, Serialize};

///
/// Row
///
/// Ordered field-name → value mapping produced by query executors and
/// consumed by the projection mapper. Field order is insertion order so
/// projected rows keep the shape the caller asked for.
///
/// Relation fields joined into a row use dotted paths (`team.name`).
/// An absent field reads as SQL NULL would under a left join.
///

#[derive(Clone, Debug, Default, PartialEq, IntoIterator, Serialize, Deserialize)]
pub struct Row {
    #[into_iterator(owned, ref)]
    fields: Vec<(String, Value)>,
}

impl Row {
    #[must_use]
    pub const fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Insert or replace a field, keeping first-insertion order.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Read a field with left-join semantics: absent fields are NULL.
    #[must_use]
    pub fn get_or_null(&self, name: &str) -> Value {
        self.get(name).cloned().unwrap_or(Value::Null)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|(field, _)| field == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<N: Into<String>, V: Into<Value>> FromIterator<(N, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut row = Self::new();
        for (name, value) in iter {
            row.set(name, value);
        }
        row
    }
}

///
/// TESTS
///
