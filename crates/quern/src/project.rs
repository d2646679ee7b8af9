use crate::{
    row::Row,
    schema::{EntitySchema, SchemaRegistry},
    value::{Value, ValueKind},
};
use chrono::{DateTime, Utc};
use derive_more::Deref;
use thiserror::Error as ThisError;

///
/// Projection
///
/// An ordered subset of logical field paths. The output row keeps this
/// order regardless of how the executor laid out the source row.
///

#[derive(Clone, Debug, Deref, Eq, PartialEq)]
pub struct Projection {
    fields: Vec<String>,
}

impl Projection {
    #[must_use]
    pub fn of<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

///
/// ProjectError
///

#[derive(Debug, ThisError)]
pub enum ProjectError {
    #[error("projection names unknown field '{field}' on entity '{entity}'")]
    UnknownField { entity: String, field: String },

    #[error("row is missing required field '{field}'")]
    MissingField { field: String },

    #[error("field '{field}' holds {actual}, expected {expected}")]
    WrongType {
        field: String,
        expected: ValueKind,
        actual: ValueKind,
    },
}

///
/// Projector
///
/// A projection validated against an entity's field map. Construction
/// fails on unknown fields so a bad projection can never reach the
/// executor; applying it is then infallible.
///

#[derive(Clone, Debug)]
pub struct Projector {
    projection: Projection,
}

impl Projector {
    pub fn new(
        registry: &SchemaRegistry,
        schema: &EntitySchema,
        projection: Projection,
    ) -> Result<Self, ProjectError> {
        for field in projection.fields() {
            if registry.resolve(schema, field).is_err() {
                return Err(ProjectError::UnknownField {
                    entity: schema.entity().to_string(),
                    field: field.clone(),
                });
            }
        }
        Ok(Self { projection })
    }

    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.projection.fields
    }

    /// Narrow a row to the projected fields, in projection order.
    /// Fields absent from the source row come through as NULL.
    #[must_use]
    pub fn apply(&self, row: &Row) -> Row {
        self.projection
            .fields
            .iter()
            .map(|field| (field.clone(), row.get_or_null(field)))
            .collect()
    }
}

///
/// FromRow
///
/// Typed extraction from an executor row, for callers that want structs
/// instead of dynamic rows. The accessors below do the per-field work.
///

pub trait FromRow: Sized {
    fn from_row(row: &Row) -> Result<Self, ProjectError>;
}

impl FromRow for Row {
    fn from_row(row: &Row) -> Result<Self, ProjectError> {
        Ok(row.clone())
    }
}

fn required(row: &Row, field: &str) -> Result<Value, ProjectError> {
    let value = row.get_or_null(field);
    if value.is_null() {
        return Err(ProjectError::MissingField {
            field: field.to_string(),
        });
    }
    Ok(value)
}

fn wrong_type(field: &str, expected: ValueKind, actual: &Value) -> ProjectError {
    ProjectError::WrongType {
        field: field.to_string(),
        expected,
        actual: actual.kind(),
    }
}

pub fn text(row: &Row, field: &str) -> Result<String, ProjectError> {
    match required(row, field)? {
        Value::Text(text) => Ok(text),
        other => Err(wrong_type(field, ValueKind::Text, &other)),
    }
}

pub fn int(row: &Row, field: &str) -> Result<i64, ProjectError> {
    match required(row, field)? {
        Value::Int(n) => Ok(n),
        other => Err(wrong_type(field, ValueKind::Int, &other)),
    }
}

pub fn float(row: &Row, field: &str) -> Result<f64, ProjectError> {
    match required(row, field)? {
        Value::Float(n) => Ok(n),
        other => Err(wrong_type(field, ValueKind::Float, &other)),
    }
}

pub fn boolean(row: &Row, field: &str) -> Result<bool, ProjectError> {
    match required(row, field)? {
        Value::Bool(b) => Ok(b),
        other => Err(wrong_type(field, ValueKind::Bool, &other)),
    }
}

pub fn timestamp(row: &Row, field: &str) -> Result<DateTime<Utc>, ProjectError> {
    match required(row, field)? {
        Value::Timestamp(at) => Ok(at),
        other => Err(wrong_type(field, ValueKind::Timestamp, &other)),
    }
}

/// Optional variant: NULL and absent both read as `None`.
pub fn opt_text(row: &Row, field: &str) -> Result<Option<String>, ProjectError> {
    match row.get_or_null(field) {
        Value::Null => Ok(None),
        Value::Text(text) => Ok(Some(text)),
        other => Err(wrong_type(field, ValueKind::Text, &other)),
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;

    fn registry() -> SchemaRegistry {
        let member = EntitySchema::builder("member", "member")
            .field("id", FieldType::Int)
            .field("username", FieldType::Text)
            .field("age", FieldType::Int)
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
    fn rejects_unknown_projection_fields() {
        let registry = registry();
        let schema = registry.get("member").expect("member").clone();

        let result = Projector::new(&registry, &schema, Projection::of(["username", "email"]));
        assert!(matches!(
            result,
            Err(ProjectError::UnknownField { field, .. }) if field == "email"
        ));
    }

    #[test]
    fn apply_narrows_and_reorders() {
        let registry = registry();
        let schema = registry.get("member").expect("member").clone();
        let projector = Projector::new(
            &registry,
            &schema,
            Projection::of(["username", "team.name", "age"]),
        )
        .expect("projector");

        let row = Row::new()
            .with("id", 7i64)
            .with("age", 36i64)
            .with("username", "ada");
        let projected = projector.apply(&row);

        let names: Vec<&str> = projected.field_names().collect();
        assert_eq!(names, vec!["username", "team.name", "age"]);
        assert_eq!(projected.get_or_null("team.name"), Value::Null);
        assert_eq!(projected.get_or_null("username"), Value::Text("ada".into()));
    }

    #[test]
    fn typed_accessors_extract_and_type_check() {
        let row = Row::new().with("username", "ada").with("age", 36i64);

        assert_eq!(text(&row, "username").expect("text"), "ada");
        assert_eq!(int(&row, "age").expect("int"), 36);
        assert_eq!(opt_text(&row, "nickname").expect("opt"), None);

        assert!(matches!(
            text(&row, "age"),
            Err(ProjectError::WrongType { expected: ValueKind::Text, .. })
        ));
        assert!(matches!(
            int(&row, "missing"),
            Err(ProjectError::MissingField { field }) if field == "missing"
        ));
    }

    #[test]
    fn structs_build_from_rows() {
        struct MemberName {
            username: String,
            team: Option<String>,
        }

        impl FromRow for MemberName {
            fn from_row(row: &Row) -> Result<Self, ProjectError> {
                Ok(Self {
                    username: text(row, "username")?,
                    team: opt_text(row, "team.name")?,
                })
            }
        }

        let row = Row::new().with("username", "ada").with("team.name", "core");
        let member = MemberName::from_row(&row).expect("member");
        assert_eq!(member.username, "ada");
        assert_eq!(member.team.as_deref(), Some("core"));
    }
}
