use crate::criteria::ast::Predicate;

///
/// Normalize a predicate into a canonical, deterministic form.
///
/// Guarantees:
/// - logical equivalence is preserved
/// - nested AND / OR nodes are flattened
/// - the neutral element `True` is removed from conjunctions
/// - single-child AND / OR collapse to the child
/// - double negation is eliminated
/// - sibling order is deterministic
///
/// Canonical form feeds the count-cache key, so two criteria that differ
/// only in construction order share one cached total.
///
#[must_use]
pub(crate) fn normalize(predicate: &Predicate) -> Predicate {
    match predicate {
        Predicate::True => Predicate::True,
        Predicate::And(children) => normalize_and(children),
        Predicate::Or(children) => normalize_or(children),
        Predicate::Not(inner) => normalize_not(inner),
        Predicate::Compare(cmp) => Predicate::Compare(cmp.clone()),
        Predicate::IsNull { field } => Predicate::IsNull {
            field: field.clone(),
        },
        Predicate::IsNotNull { field } => Predicate::IsNotNull {
            field: field.clone(),
        },
    }
}

fn normalize_and(children: &[Predicate]) -> Predicate {
    let mut flat = Vec::new();
    for child in children {
        match normalize(child) {
            Predicate::True => {}
            Predicate::And(nested) => flat.extend(nested),
            other => flat.push(other),
        }
    }

    order_siblings(&mut flat);
    match flat.len() {
        0 => Predicate::True,
        1 => flat.remove(0),
        _ => Predicate::And(flat),
    }
}

fn normalize_or(children: &[Predicate]) -> Predicate {
    let mut flat = Vec::new();
    for child in children {
        match normalize(child) {
            // True absorbs the whole disjunction.
            Predicate::True => return Predicate::True,
            Predicate::Or(nested) => flat.extend(nested),
            other => flat.push(other),
        }
    }

    order_siblings(&mut flat);
    match flat.len() {
        0 => Predicate::True,
        1 => flat.remove(0),
        _ => Predicate::Or(flat),
    }
}

fn normalize_not(inner: &Predicate) -> Predicate {
    let normalized = normalize(inner);
    if let Predicate::Not(double) = normalized {
        return *double;
    }
    Predicate::Not(Box::new(normalized))
}

// Deterministic sibling order via the structural debug form; values have
// no total order of their own (floats), so this is the stable stand-in.
fn order_siblings(children: &mut [Predicate]) {
    children.sort_by_cached_key(|child| format!("{child:?}"));
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_nested_conjunctions() {
        let nested = Predicate::And(vec![
            Predicate::eq("a", 1i64),
            Predicate::And(vec![Predicate::eq("b", 2i64), Predicate::eq("c", 3i64)]),
        ]);

        assert!(matches!(
            normalize(&nested),
            Predicate::And(children) if children.len() == 3
        ));
    }

    #[test]
    fn removes_neutral_true_and_collapses_singletons() {
        let padded = Predicate::And(vec![Predicate::True, Predicate::eq("a", 1i64)]);
        assert_eq!(normalize(&padded), Predicate::eq("a", 1i64));

        let empty = Predicate::And(vec![Predicate::True]);
        assert_eq!(normalize(&empty), Predicate::True);
    }

    #[test]
    fn true_absorbs_disjunctions() {
        let either = Predicate::Or(vec![Predicate::eq("a", 1i64), Predicate::True]);
        assert_eq!(normalize(&either), Predicate::True);
    }

    #[test]
    fn eliminates_double_negation() {
        let doubled = Predicate::not(Predicate::not(Predicate::eq("a", 1i64)));
        assert_eq!(normalize(&doubled), Predicate::eq("a", 1i64));
    }

    #[test]
    fn construction_order_does_not_matter() {
        let left = Predicate::eq("a", 1i64) & Predicate::gt("b", 2i64);
        let right = Predicate::gt("b", 2i64) & Predicate::eq("a", 1i64);

        assert_eq!(normalize(&left), normalize(&right));
    }
}
