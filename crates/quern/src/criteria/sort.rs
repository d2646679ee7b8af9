use serde::{Deserialize, Serialize};

///
/// SortDirection
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    #[must_use]
    pub const fn is_descending(self) -> bool {
        matches!(self, Self::Desc)
    }
}

///
/// SortKey
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

///
/// SortSpec
///
/// Ordered sort keys; earlier keys win, later keys break ties.
/// An empty spec means "no explicit ordering"; the compiler appends a
/// primary-key tie-break so page boundaries stay deterministic either way.
///

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SortSpec {
    keys: Vec<SortKey>,
}

impl SortSpec {
    #[must_use]
    pub const fn none() -> Self {
        Self { keys: Vec::new() }
    }

    #[must_use]
    pub fn by(field: impl Into<String>, direction: SortDirection) -> Self {
        Self::none().then(field, direction)
    }

    #[must_use]
    pub fn asc(field: impl Into<String>) -> Self {
        Self::by(field, SortDirection::Asc)
    }

    #[must_use]
    pub fn desc(field: impl Into<String>) -> Self {
        Self::by(field, SortDirection::Desc)
    }

    /// Append a tie-break key.
    #[must_use]
    pub fn then(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.keys.push(SortKey {
            field: field.into(),
            direction,
        });
        self
    }

    #[must_use]
    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[must_use]
    pub fn references(&self, field: &str) -> bool {
        self.keys.iter().any(|key| key.field == field)
    }
}

///
/// TESTS
///
