use crate::{
    criteria::{
        ast::{CompareOp, ComparePredicate, Predicate},
        sort::SortSpec,
    },
    schema::{EntitySchema, FieldType, ResolveError, SchemaRegistry},
    value::Value,
};
use thiserror::Error as ThisError;

///
/// ValidateError
///
/// Criteria/schema mismatches, detected before anything executes.
///

#[derive(Debug, ThisError)]
pub enum ValidateError {
    #[error("unknown field '{field}' on entity '{entity}'")]
    UnknownField { entity: String, field: String },

    #[error("entity '{entity}' has no declared relation for '{field}'")]
    UnknownRelation { entity: String, field: String },

    #[error("operator '{op}' is not valid for field '{field}'")]
    InvalidOperator { field: String, op: String },

    #[error("invalid literal for field '{field}': {message}")]
    InvalidLiteral { field: String, message: String },
}

impl From<ResolveError> for ValidateError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::UnknownField { entity, field } => Self::UnknownField { entity, field },
            ResolveError::UnknownRelation { entity, field } => {
                Self::UnknownRelation { entity, field }
            }
        }
    }
}

/// Validate a predicate tree against an entity's field map.
///
/// Checks field existence (one-hop relation paths included), operator
/// compatibility with the field type, and literal fit. Pure; never
/// touches storage.
pub fn validate(
    registry: &SchemaRegistry,
    schema: &EntitySchema,
    predicate: &Predicate,
) -> Result<(), ValidateError> {
    match predicate {
        Predicate::True => Ok(()),
        Predicate::And(children) | Predicate::Or(children) => {
            for child in children {
                validate(registry, schema, child)?;
            }
            Ok(())
        }
        Predicate::Not(inner) => validate(registry, schema, inner),
        Predicate::Compare(cmp) => validate_compare(registry, schema, cmp),
        Predicate::IsNull { field } | Predicate::IsNotNull { field } => {
            registry.resolve(schema, field)?;
            Ok(())
        }
    }
}

/// Validate sort keys: every key must resolve and be orderable.
pub fn validate_sort(
    registry: &SchemaRegistry,
    schema: &EntitySchema,
    sort: &SortSpec,
) -> Result<(), ValidateError> {
    for key in sort.keys() {
        let resolved = registry.resolve(schema, &key.field)?;
        if !resolved.ty.is_orderable() {
            return Err(ValidateError::InvalidOperator {
                field: key.field.clone(),
                op: "order_by".to_string(),
            });
        }
    }
    Ok(())
}

fn validate_compare(
    registry: &SchemaRegistry,
    schema: &EntitySchema,
    cmp: &ComparePredicate,
) -> Result<(), ValidateError> {
    let resolved = registry.resolve(schema, &cmp.field)?;
    let ty = resolved.ty;

    if cmp.op.requires_ordering() && !ty.is_orderable() {
        return Err(invalid_operator(&cmp.field, cmp.op));
    }
    if cmp.op.requires_text() && !ty.is_text() {
        return Err(invalid_operator(&cmp.field, cmp.op));
    }

    if cmp.op.takes_list() {
        let Value::List(items) = &cmp.value else {
            return Err(invalid_literal(&cmp.field, "expected list literal"));
        };
        for item in items {
            ensure_literal_fits(&cmp.field, ty, item)?;
        }
        return Ok(());
    }

    if matches!(cmp.value, Value::List(_)) {
        return Err(invalid_literal(&cmp.field, "expected scalar literal"));
    }

    ensure_literal_fits(&cmp.field, ty, &cmp.value)
}

fn ensure_literal_fits(field: &str, ty: FieldType, literal: &Value) -> Result<(), ValidateError> {
    if ty.matches_value(literal) {
        Ok(())
    } else {
        Err(invalid_literal(
            field,
            "literal type does not match field type",
        ))
    }
}

fn invalid_operator(field: &str, op: CompareOp) -> ValidateError {
    ValidateError::InvalidOperator {
        field: field.to_string(),
        op: op.to_string(),
    }
}

fn invalid_literal(field: &str, message: &str) -> ValidateError {
    ValidateError::InvalidLiteral {
        field: field.to_string(),
        message: message.to_string(),
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EntitySchema, FieldType, SchemaRegistry};

    fn registry() -> SchemaRegistry {
        let member = EntitySchema::builder("member", "member")
            .field("id", FieldType::Int)
            .field("username", FieldType::Text)
            .field("age", FieldType::Int)
            .field("active", FieldType::Bool)
            .field("team_id", FieldType::Int)
            .relation("team", "team", "team_id", "id")
            .primary_key("id")
            .build()
            .expect("member schema");
        let team = EntitySchema::builder("team", "team")
            .field("id", FieldType::Int)
            .field("name", FieldType::Text)
            .primary_key("id")
            .build()
            .expect("team schema");

        SchemaRegistry::new(vec![member, team]).expect("registry")
    }

    #[test]
    fn accepts_typed_predicates_across_relations() {
        let registry = registry();
        let schema = registry.get("member").expect("member").clone();

        let predicate = Predicate::eq("username", "ada")
            & Predicate::gt("age", 30i64)
            & Predicate::starts_with("team.name", "engineering");

        assert!(validate(&registry, &schema, &predicate).is_ok());
    }

    #[test]
    fn rejects_unknown_fields() {
        let registry = registry();
        let schema = registry.get("member").expect("member").clone();

        let predicate = Predicate::eq("nickname", "ada");
        assert!(matches!(
            validate(&registry, &schema, &predicate),
            Err(ValidateError::UnknownField { field, .. }) if field == "nickname"
        ));
    }

    #[test]
    fn rejects_ordering_operators_on_unordered_types() {
        let registry = registry();
        let schema = registry.get("member").expect("member").clone();

        let predicate = Predicate::gt("active", true);
        assert!(matches!(
            validate(&registry, &schema, &predicate),
            Err(ValidateError::InvalidOperator { field, op }) if field == "active" && op == "gt"
        ));
    }

    #[test]
    fn rejects_text_operators_on_numeric_fields() {
        let registry = registry();
        let schema = registry.get("member").expect("member").clone();

        let predicate = Predicate::contains("age", "3");
        assert!(matches!(
            validate(&registry, &schema, &predicate),
            Err(ValidateError::InvalidOperator { field, op })
                if field == "age" && op == "contains"
        ));
    }

    #[test]
    fn rejects_mismatched_literals() {
        let registry = registry();
        let schema = registry.get("member").expect("member").clone();

        let predicate = Predicate::eq("age", "thirty");
        assert!(matches!(
            validate(&registry, &schema, &predicate),
            Err(ValidateError::InvalidLiteral { field, .. }) if field == "age"
        ));

        let predicate = Predicate::in_("age", vec![Value::Int(1), Value::Text("x".into())]);
        assert!(matches!(
            validate(&registry, &schema, &predicate),
            Err(ValidateError::InvalidLiteral { field, .. }) if field == "age"
        ));
    }

    #[test]
    fn rejects_unorderable_sort_keys() {
        let registry = registry();
        let schema = registry.get("member").expect("member").clone();

        let sort = SortSpec::asc("active");
        assert!(matches!(
            validate_sort(&registry, &schema, &sort),
            Err(ValidateError::InvalidOperator { op, .. }) if op == "order_by"
        ));
        assert!(validate_sort(&registry, &schema, &SortSpec::desc("team.name")).is_ok());
    }
}
