use crate::value::Value;
use std::{
    fmt,
    ops::{BitAnd, BitOr},
};

///
/// Predicate AST
///
/// Pure, schema-agnostic representation of query predicates. Field names
/// are logical paths (`age`, `team.name`). This layer contains no type
/// checks or execution semantics; interpretation happens in later passes:
///
/// - normalization
/// - validation (schema-aware)
/// - compilation
/// - evaluation / SQL rendering
///

///
/// CompareOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    NotIn,
    StartsWith,
    EndsWith,
    Contains,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::In => "in",
            Self::NotIn => "not_in",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::Contains => "contains",
        };
        f.write_str(token)
    }
}

impl CompareOp {
    /// Whether this operator requires an orderable field type.
    #[must_use]
    pub const fn requires_ordering(self) -> bool {
        matches!(self, Self::Lt | Self::Lte | Self::Gt | Self::Gte)
    }

    /// Whether this operator is defined on text fields only.
    #[must_use]
    pub const fn requires_text(self) -> bool {
        matches!(self, Self::StartsWith | Self::EndsWith | Self::Contains)
    }

    /// Whether the literal operand must be a list.
    #[must_use]
    pub const fn takes_list(self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }
}

///
/// ComparePredicate
///

#[derive(Clone, Debug, PartialEq)]
pub struct ComparePredicate {
    pub field: String,
    pub op: CompareOp,
    pub value: Value,
}

impl ComparePredicate {
    #[must_use]
    pub fn new(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }
}

///
/// Predicate
///

#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    True,
    And(Vec<Self>),
    Or(Vec<Self>),
    Not(Box<Self>),
    Compare(ComparePredicate),
    IsNull { field: String },
    IsNotNull { field: String },
}

impl Predicate {
    #[must_use]
    pub const fn and(preds: Vec<Self>) -> Self {
        Self::And(preds)
    }

    #[must_use]
    pub const fn or(preds: Vec<Self>) -> Self {
        Self::Or(preds)
    }

    #[expect(clippy::should_implement_trait)]
    #[must_use]
    pub fn not(pred: Self) -> Self {
        Self::Not(Box::new(pred))
    }

    #[must_use]
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Compare(ComparePredicate::new(field, CompareOp::Eq, value))
    }

    #[must_use]
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Compare(ComparePredicate::new(field, CompareOp::Ne, value))
    }

    #[must_use]
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Compare(ComparePredicate::new(field, CompareOp::Lt, value))
    }

    #[must_use]
    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Compare(ComparePredicate::new(field, CompareOp::Lte, value))
    }

    #[must_use]
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Compare(ComparePredicate::new(field, CompareOp::Gt, value))
    }

    #[must_use]
    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Compare(ComparePredicate::new(field, CompareOp::Gte, value))
    }

    #[must_use]
    pub fn in_(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::Compare(ComparePredicate::new(
            field,
            CompareOp::In,
            Value::List(values),
        ))
    }

    #[must_use]
    pub fn not_in(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::Compare(ComparePredicate::new(
            field,
            CompareOp::NotIn,
            Value::List(values),
        ))
    }

    #[must_use]
    pub fn starts_with(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Compare(ComparePredicate::new(
            field,
            CompareOp::StartsWith,
            Value::Text(value.into()),
        ))
    }

    #[must_use]
    pub fn ends_with(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Compare(ComparePredicate::new(
            field,
            CompareOp::EndsWith,
            Value::Text(value.into()),
        ))
    }

    #[must_use]
    pub fn contains(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Compare(ComparePredicate::new(
            field,
            CompareOp::Contains,
            Value::Text(value.into()),
        ))
    }

    #[must_use]
    pub fn is_null(field: impl Into<String>) -> Self {
        Self::IsNull {
            field: field.into(),
        }
    }

    #[must_use]
    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self::IsNotNull {
            field: field.into(),
        }
    }

    /// Visit every field path referenced by this predicate.
    pub(crate) fn for_each_field<'a>(&'a self, visit: &mut impl FnMut(&'a str)) {
        match self {
            Self::True => {}
            Self::And(children) | Self::Or(children) => {
                for child in children {
                    child.for_each_field(visit);
                }
            }
            Self::Not(inner) => inner.for_each_field(visit),
            Self::Compare(cmp) => visit(&cmp.field),
            Self::IsNull { field } | Self::IsNotNull { field } => visit(field),
        }
    }
}

impl BitAnd for Predicate {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        Self::And(vec![self, rhs])
    }
}

impl BitOr for Predicate {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self::Or(vec![self, rhs])
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_sugar_builds_and_or_trees() {
        let predicate = Predicate::eq("username", "ada") & Predicate::gt("age", 30i64)
            | Predicate::is_null("team.name");

        assert!(matches!(predicate, Predicate::Or(children) if children.len() == 2));
    }

    #[test]
    fn for_each_field_walks_every_branch() {
        let predicate = Predicate::not(
            Predicate::eq("username", "ada")
                & (Predicate::gt("age", 30i64) | Predicate::is_not_null("team.name")),
        );

        let mut fields = Vec::new();
        predicate.for_each_field(&mut |field| fields.push(field.to_string()));
        fields.sort_unstable();
        assert_eq!(fields, vec!["age", "team.name", "username"]);
    }
}
