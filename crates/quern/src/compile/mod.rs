pub mod sql;

use crate::{
    criteria::{Criteria, Predicate, SortDirection, normalize, validate, validate_sort},
    project::Projection,
    schema::{EntitySchema, ResolveError, SchemaRegistry},
    value::Value,
};
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

///
/// Query compilation
///
/// Turns validated criteria into executable plans: the predicate is
/// normalized, every logical path is resolved to a storage column, joins
/// are collected once each, and the sort gains a primary-key tie-break.
/// Plans are backend-neutral; `sql` renders them to parameterized
/// statements, the in-memory executor interprets them directly.
///

///
/// CompileError
///

#[derive(Debug, ThisError)]
pub enum CompileError {
    #[error(transparent)]
    Criteria(#[from] crate::criteria::ValidateError),

    #[error("no declared join path for '{field}' on entity '{entity}'")]
    NoJoinPath { entity: String, field: String },

    #[error("update requires at least one assignment")]
    EmptyAssignments,

    #[error("mutations cannot filter across relation path '{field}'")]
    MutationAcrossRelation { field: String },
}

///
/// Window
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Window {
    pub limit: Option<u64>,
    pub offset: u64,
}

impl Window {
    #[must_use]
    pub const fn all() -> Self {
        Self {
            limit: None,
            offset: 0,
        }
    }

    #[must_use]
    pub const fn limit(limit: u64) -> Self {
        Self {
            limit: Some(limit),
            offset: 0,
        }
    }

    #[must_use]
    pub const fn page(offset: u64, limit: u64) -> Self {
        Self {
            limit: Some(limit),
            offset,
        }
    }
}

///
/// JoinSpec
///
/// One LEFT JOIN, deduplicated per relation.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JoinSpec {
    pub relation: String,
    pub target_table: String,
    pub local_column: String,
    pub target_column: String,
}

///
/// SelectColumn
///
/// Logical path plus the column expression it reads from.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SelectColumn {
    pub path: String,
    pub column: String,
}

///
/// OrderColumn
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OrderColumn {
    pub path: String,
    pub column: String,
    pub direction: SortDirection,
}

///
/// SelectPlan
///

#[derive(Clone, Debug, PartialEq)]
pub struct SelectPlan {
    pub entity: String,
    pub table: String,
    pub predicate: Predicate,
    pub columns: BTreeMap<String, String>,
    pub joins: Vec<JoinSpec>,
    pub projection: Vec<SelectColumn>,
    pub sort: Vec<OrderColumn>,
    pub window: Window,
    pub read_only: bool,
}

///
/// CountPlan
///

#[derive(Clone, Debug, PartialEq)]
pub struct CountPlan {
    pub entity: String,
    pub table: String,
    pub predicate: Predicate,
    pub columns: BTreeMap<String, String>,
    pub joins: Vec<JoinSpec>,
}

///
/// Assignment
///

#[derive(Clone, Debug, PartialEq)]
pub struct Assignment {
    pub field: String,
    pub column: String,
    pub value: Value,
}

///
/// MutationKind
///

#[derive(Clone, Debug, PartialEq)]
pub enum MutationKind {
    Update(Vec<Assignment>),
    Delete,
}

///
/// MutationPlan
///
/// Mutations filter on root fields only; a relation path in the
/// predicate fails compilation rather than rendering a joined write.
///

#[derive(Clone, Debug, PartialEq)]
pub struct MutationPlan {
    pub entity: String,
    pub table: String,
    pub predicate: Predicate,
    pub columns: BTreeMap<String, String>,
    pub kind: MutationKind,
}

/// Compile a read plan: validate, normalize, resolve columns and joins,
/// and append the primary-key ascending tie-break.
pub fn compile_select(
    registry: &SchemaRegistry,
    schema: &EntitySchema,
    criteria: &Criteria,
    window: Window,
    projection: Option<&Projection>,
    read_only: bool,
) -> Result<SelectPlan, CompileError> {
    validate(registry, schema, &criteria.predicate)?;
    validate_sort(registry, schema, &criteria.sort)?;

    let predicate = normalize(&criteria.predicate);

    let mut paths = referenced_paths(&predicate);
    for key in criteria.sort.keys() {
        push_unique(&mut paths, key.field.clone());
    }

    let projection_paths: Vec<String> = match projection {
        Some(projection) => projection.fields().to_vec(),
        None => schema
            .fields()
            .iter()
            .map(|field| field.name.clone())
            .collect(),
    };
    for path in &projection_paths {
        push_unique(&mut paths, path.clone());
    }

    let resolved = resolve_paths(registry, schema, &paths)?;
    let joins = collect_joins(registry, &resolved);
    let columns = column_map(schema, &resolved, !joins.is_empty());

    let projection = projection_paths
        .iter()
        .map(|path| SelectColumn {
            path: path.clone(),
            column: columns[path].clone(),
        })
        .collect();

    let mut sort: Vec<OrderColumn> = criteria
        .sort
        .keys()
        .iter()
        .map(|key| OrderColumn {
            path: key.field.clone(),
            column: columns[&key.field].clone(),
            direction: key.direction,
        })
        .collect();

    // Deterministic page boundaries: the primary key breaks all ties.
    let pk = schema.primary_key().name.clone();
    if !criteria.sort.references(&pk) {
        let column = columns.get(&pk).cloned().unwrap_or_else(|| {
            qualify(schema, &schema.primary_key().column, !joins.is_empty())
        });
        sort.push(OrderColumn {
            path: pk,
            column,
            direction: SortDirection::Asc,
        });
    }

    Ok(SelectPlan {
        entity: schema.entity().to_string(),
        table: schema.table().to_string(),
        predicate,
        columns,
        joins,
        projection,
        sort,
        window,
        read_only,
    })
}

/// Compile a count plan: same predicate and joins, no sort or window.
pub fn compile_count(
    registry: &SchemaRegistry,
    schema: &EntitySchema,
    criteria: &Criteria,
) -> Result<CountPlan, CompileError> {
    validate(registry, schema, &criteria.predicate)?;

    let predicate = normalize(&criteria.predicate);
    let paths = referenced_paths(&predicate);
    let resolved = resolve_paths(registry, schema, &paths)?;
    let joins = collect_joins(registry, &resolved);
    let columns = column_map(schema, &resolved, !joins.is_empty());

    Ok(CountPlan {
        entity: schema.entity().to_string(),
        table: schema.table().to_string(),
        predicate,
        columns,
        joins,
    })
}

/// Compile a bulk update touching every row the predicate matches.
pub fn compile_update(
    registry: &SchemaRegistry,
    schema: &EntitySchema,
    predicate: &Predicate,
    assignments: Vec<(String, Value)>,
) -> Result<MutationPlan, CompileError> {
    if assignments.is_empty() {
        return Err(CompileError::EmptyAssignments);
    }

    let mut compiled = Vec::with_capacity(assignments.len());
    for (field, value) in assignments {
        let resolved = registry
            .resolve(schema, &field)
            .map_err(map_resolve(schema))?;
        if resolved.join.is_some() {
            return Err(CompileError::MutationAcrossRelation { field });
        }
        compiled.push(Assignment {
            field,
            column: resolved.column,
            value,
        });
    }

    mutation_plan(registry, schema, predicate, MutationKind::Update(compiled))
}

/// Compile a bulk delete.
pub fn compile_delete(
    registry: &SchemaRegistry,
    schema: &EntitySchema,
    predicate: &Predicate,
) -> Result<MutationPlan, CompileError> {
    mutation_plan(registry, schema, predicate, MutationKind::Delete)
}

fn mutation_plan(
    registry: &SchemaRegistry,
    schema: &EntitySchema,
    predicate: &Predicate,
    kind: MutationKind,
) -> Result<MutationPlan, CompileError> {
    validate(registry, schema, predicate)?;

    let predicate = normalize(predicate);
    let paths = referenced_paths(&predicate);
    let resolved = resolve_paths(registry, schema, &paths)?;
    if let Some(field) = resolved
        .iter()
        .find(|(_, resolved)| resolved.join.is_some())
        .map(|(path, _)| path.clone())
    {
        return Err(CompileError::MutationAcrossRelation { field });
    }
    let columns = column_map(schema, &resolved, false);

    Ok(MutationPlan {
        entity: schema.entity().to_string(),
        table: schema.table().to_string(),
        predicate,
        columns,
        kind,
    })
}

fn referenced_paths(predicate: &Predicate) -> Vec<String> {
    let mut paths = Vec::new();
    predicate.for_each_field(&mut |field| push_unique(&mut paths, field.to_string()));
    paths
}

fn push_unique(paths: &mut Vec<String>, path: String) {
    if !paths.contains(&path) {
        paths.push(path);
    }
}

type Resolved<'a> = Vec<(String, crate::schema::ResolvedField<'a>)>;

fn resolve_paths<'a>(
    registry: &'a SchemaRegistry,
    schema: &'a EntitySchema,
    paths: &[String],
) -> Result<Resolved<'a>, CompileError> {
    paths
        .iter()
        .map(|path| {
            registry
                .resolve(schema, path)
                .map(|resolved| (path.clone(), resolved))
                .map_err(map_resolve(schema))
        })
        .collect()
}

fn map_resolve(schema: &EntitySchema) -> impl Fn(ResolveError) -> CompileError + '_ {
    move |err| match err {
        ResolveError::UnknownField { entity, field } => {
            CompileError::Criteria(crate::criteria::ValidateError::UnknownField { entity, field })
        }
        ResolveError::UnknownRelation { field, .. } => CompileError::NoJoinPath {
            entity: schema.entity().to_string(),
            field,
        },
    }
}

fn collect_joins(registry: &SchemaRegistry, resolved: &Resolved<'_>) -> Vec<JoinSpec> {
    let mut joins: Vec<JoinSpec> = Vec::new();
    for (_, field) in resolved {
        if let Some(relation) = field.join {
            if joins.iter().any(|join| join.relation == relation.name) {
                continue;
            }
            let target_table = registry
                .get(&relation.target)
                .map_or_else(|| relation.target.clone(), |target| target.table().to_string());
            joins.push(JoinSpec {
                relation: relation.name.clone(),
                target_table,
                local_column: relation.local_column.clone(),
                target_column: relation.target_column.clone(),
            });
        }
    }
    joins
}

// Root columns are qualified with the root table only when a join makes
// bare column names ambiguous.
fn column_map(
    schema: &EntitySchema,
    resolved: &Resolved<'_>,
    qualified: bool,
) -> BTreeMap<String, String> {
    resolved
        .iter()
        .map(|(path, field)| {
            let column = if field.join.is_some() {
                field.column.clone()
            } else {
                qualify(schema, &field.column, qualified)
            };
            (path.clone(), column)
        })
        .collect()
}

fn qualify(schema: &EntitySchema, column: &str, qualified: bool) -> String {
    if qualified {
        format!("{}.{column}", schema.table())
    } else {
        column.to_string()
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
        let member = EntitySchema::builder("member", "members")
            .field("id", FieldType::Int)
            .field("username", FieldType::Text)
            .field("age", FieldType::Int)
            .field("team_id", FieldType::Int)
            .relation("team", "team", "team_id", "id")
            .primary_key("id")
            .build()
            .expect("member schema");
        let team = EntitySchema::builder("team", "teams")
            .field("id", FieldType::Int)
            .field("name", FieldType::Text)
            .primary_key("id")
            .build()
            .expect("team schema");

        SchemaRegistry::new(vec![member, team]).expect("registry")
    }

    #[test]
    fn select_appends_primary_key_tie_break() {
        let registry = registry();
        let schema = registry.get("member").expect("member").clone();
        let criteria = Criteria::new(Predicate::gt("age", 30i64)).order_by_desc("username");

        let plan = compile_select(&registry, &schema, &criteria, Window::all(), None, true)
            .expect("plan");

        assert_eq!(plan.sort.len(), 2);
        assert_eq!(plan.sort[0].path, "username");
        assert!(plan.sort[0].direction.is_descending());
        assert_eq!(plan.sort[1].path, "id");
        assert!(!plan.sort[1].direction.is_descending());
        assert!(plan.read_only);
        assert!(plan.joins.is_empty());
    }

    #[test]
    fn sorting_by_the_primary_key_adds_no_duplicate() {
        let registry = registry();
        let schema = registry.get("member").expect("member").clone();
        let criteria = Criteria::match_all().order_by_desc("id");

        let plan = compile_select(&registry, &schema, &criteria, Window::all(), None, true)
            .expect("plan");
        assert_eq!(plan.sort.len(), 1);
    }

    #[test]
    fn relation_paths_produce_one_join_and_qualified_columns() {
        let registry = registry();
        let schema = registry.get("member").expect("member").clone();
        let criteria = Criteria::new(
            Predicate::eq("team.name", "core") & Predicate::is_not_null("team.name"),
        )
        .order_by("team.name");

        let plan = compile_select(&registry, &schema, &criteria, Window::all(), None, true)
            .expect("plan");

        assert_eq!(plan.joins.len(), 1);
        assert_eq!(plan.joins[0].target_table, "teams");
        assert_eq!(plan.columns["team.name"], "teams.name");
        assert_eq!(plan.columns["username"], "members.username");
    }

    #[test]
    fn projection_narrows_select_columns() {
        let registry = registry();
        let schema = registry.get("member").expect("member").clone();
        let projection = Projection::of(["username", "age"]);

        let plan = compile_select(
            &registry,
            &schema,
            &Criteria::match_all(),
            Window::page(3, 3),
            Some(&projection),
            true,
        )
        .expect("plan");

        let paths: Vec<&str> = plan.projection.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["username", "age"]);
        assert_eq!(plan.window, Window::page(3, 3));
    }

    #[test]
    fn invalid_criteria_fail_before_planning() {
        let registry = registry();
        let schema = registry.get("member").expect("member").clone();
        let criteria = Criteria::new(Predicate::eq("nickname", "ada"));

        assert!(matches!(
            compile_select(&registry, &schema, &criteria, Window::all(), None, true),
            Err(CompileError::Criteria(_))
        ));
    }

    #[test]
    fn updates_validate_assignments() {
        let registry = registry();
        let schema = registry.get("member").expect("member").clone();
        let predicate = Predicate::gt("age", 30i64);

        assert!(matches!(
            compile_update(&registry, &schema, &predicate, vec![]),
            Err(CompileError::EmptyAssignments)
        ));

        let plan = compile_update(
            &registry,
            &schema,
            &predicate,
            vec![("age".to_string(), Value::Int(0))],
        )
        .expect("plan");
        assert!(matches!(&plan.kind, MutationKind::Update(a) if a.len() == 1));
    }

    #[test]
    fn mutations_reject_relation_predicates() {
        let registry = registry();
        let schema = registry.get("member").expect("member").clone();
        let predicate = Predicate::eq("team.name", "core");

        assert!(matches!(
            compile_delete(&registry, &schema, &predicate),
            Err(CompileError::MutationAcrossRelation { field }) if field == "team.name"
        ));
    }
}
