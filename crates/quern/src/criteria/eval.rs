use crate::{
    criteria::ast::{CompareOp, ComparePredicate, Predicate},
    row::Row,
    value::Value,
};
use std::cmp::Ordering;

///
/// Evaluate a predicate against a single row.
///
/// Pure runtime evaluation: no schema access, no validation. Absent
/// fields read as NULL (left-join semantics), NULL never satisfies a
/// comparison, and an undefined comparison evaluates to `false`.
///
/// CONTRACT: internal-only; predicates must be validated before
/// evaluation.
///
#[must_use]
pub(crate) fn eval(row: &Row, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::True => true,
        Predicate::And(children) => children.iter().all(|child| eval(row, child)),
        Predicate::Or(children) => children.iter().any(|child| eval(row, child)),
        Predicate::Not(inner) => !eval(row, inner),
        Predicate::Compare(cmp) => eval_compare(row, cmp),
        Predicate::IsNull { field } => row.get_or_null(field).is_null(),
        Predicate::IsNotNull { field } => !row.get_or_null(field).is_null(),
    }
}

fn eval_compare(row: &Row, cmp: &ComparePredicate) -> bool {
    let actual = row.get_or_null(&cmp.field);
    if actual.is_null() {
        return false;
    }

    match cmp.op {
        CompareOp::Eq => actual.same_as(&cmp.value),
        CompareOp::Ne => matches!(
            actual.compare(&cmp.value),
            Some(Ordering::Less | Ordering::Greater)
        ),
        CompareOp::Lt => matches!(actual.compare(&cmp.value), Some(Ordering::Less)),
        CompareOp::Lte => matches!(
            actual.compare(&cmp.value),
            Some(Ordering::Less | Ordering::Equal)
        ),
        CompareOp::Gt => matches!(actual.compare(&cmp.value), Some(Ordering::Greater)),
        CompareOp::Gte => matches!(
            actual.compare(&cmp.value),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        CompareOp::In => list_contains(&cmp.value, &actual),
        CompareOp::NotIn => match &cmp.value {
            Value::List(_) => !list_contains(&cmp.value, &actual),
            _ => false,
        },
        CompareOp::StartsWith => actual.text_starts_with(&cmp.value).unwrap_or(false),
        CompareOp::EndsWith => actual.text_ends_with(&cmp.value).unwrap_or(false),
        CompareOp::Contains => actual.text_contains(&cmp.value).unwrap_or(false),
    }
}

fn list_contains(list: &Value, needle: &Value) -> bool {
    match list {
        Value::List(items) => items.iter().any(|item| item.same_as(needle)),
        _ => false,
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> Row {
        Row::new()
            .with("id", 7i64)
            .with("username", "ada")
            .with("age", 36i64)
            .with("nickname", Value::Null)
    }

    #[test]
    fn comparisons_match_present_fields() {
        let row = row();

        assert!(eval(&row, &Predicate::eq("username", "ada")));
        assert!(eval(&row, &Predicate::gt("age", 30i64)));
        assert!(!eval(&row, &Predicate::gt("age", 40i64)));
        assert!(eval(
            &row,
            &Predicate::in_("age", vec![Value::Int(35), Value::Int(36)])
        ));
        assert!(eval(&row, &Predicate::starts_with("username", "ad")));
    }

    #[test]
    fn null_and_missing_fields_never_satisfy_comparisons() {
        let row = row();

        assert!(!eval(&row, &Predicate::eq("nickname", "grace")));
        assert!(!eval(&row, &Predicate::eq("team.name", "core")));
        assert!(!eval(
            &row,
            &Predicate::in_("team.name", vec![Value::Text("core".into())])
        ));
    }

    #[test]
    fn is_null_treats_missing_as_null() {
        let row = row();

        assert!(eval(&row, &Predicate::is_null("nickname")));
        assert!(eval(&row, &Predicate::is_null("team.name")));
        assert!(eval(&row, &Predicate::is_not_null("username")));
        assert!(!eval(&row, &Predicate::is_not_null("team.name")));
    }

    #[test]
    fn connectives_combine_and_negate() {
        let row = row();

        let both = Predicate::eq("username", "ada") & Predicate::lt("age", 40i64);
        assert!(eval(&row, &both));

        let either = Predicate::eq("username", "grace") | Predicate::lt("age", 40i64);
        assert!(eval(&row, &either));

        assert!(!eval(&row, &Predicate::not(both)));
        assert!(eval(&row, &Predicate::True));
    }
}
