mod ast;
mod eval;
mod normalize;
mod sort;
mod validate;

pub use ast::{CompareOp, ComparePredicate, Predicate};
pub(crate) use eval::eval;
pub(crate) use normalize::normalize;
pub use sort::{SortDirection, SortKey, SortSpec};
pub use validate::{ValidateError, validate, validate_sort};

///
/// Criteria
///
/// In-memory representation of one filter/sort request: a predicate tree
/// plus an ordered sort specification. Built per call, either
/// programmatically or from a parsed descriptor, then consumed by the
/// compiler and discarded after execution.
///

#[derive(Clone, Debug, PartialEq)]
pub struct Criteria {
    pub predicate: Predicate,
    pub sort: SortSpec,
}

impl Criteria {
    /// Criteria that matches every row, with no explicit ordering.
    #[must_use]
    pub const fn match_all() -> Self {
        Self {
            predicate: Predicate::True,
            sort: SortSpec::none(),
        }
    }

    #[must_use]
    pub const fn new(predicate: Predicate) -> Self {
        Self {
            predicate,
            sort: SortSpec::none(),
        }
    }

    /// AND another predicate into the filter.
    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = match self.predicate {
            Predicate::True => predicate,
            existing => Predicate::And(vec![existing, predicate]),
        };
        self
    }

    /// Append an ascending sort key.
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.sort = self.sort.then(field, SortDirection::Asc);
        self
    }

    /// Append a descending sort key.
    #[must_use]
    pub fn order_by_desc(mut self, field: impl Into<String>) -> Self {
        self.sort = self.sort.then(field, SortDirection::Desc);
        self
    }

    #[must_use]
    pub fn sorted(mut self, sort: SortSpec) -> Self {
        self.sort = sort;
        self
    }
}

impl From<Predicate> for Criteria {
    fn from(predicate: Predicate) -> Self {
        Self::new(predicate)
    }
}
