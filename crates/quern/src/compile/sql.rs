use crate::{
    compile::{CountPlan, JoinSpec, MutationKind, MutationPlan, SelectPlan},
    criteria::{ComparePredicate, CompareOp, Predicate},
    value::Value,
};
use std::collections::BTreeMap;

///
/// SQL rendering
///
/// Renders compiled plans to Postgres-style statements with `$n`
/// placeholders. Values travel exclusively through the bind list; no
/// literal is ever interpolated into the SQL text, including LIMIT and
/// OFFSET.
///

///
/// Statement
///

#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub binds: Vec<Value>,
}

/// Render a select plan.
#[must_use]
pub fn select(plan: &SelectPlan) -> Statement {
    let mut binds = Vec::new();
    let mut sql = String::new();

    if plan.read_only {
        sql.push_str("/* read-only */ ");
    }

    sql.push_str("SELECT ");
    let columns: Vec<String> = plan
        .projection
        .iter()
        .map(|column| {
            if column.column == column.path {
                column.column.clone()
            } else {
                format!("{} AS \"{}\"", column.column, column.path)
            }
        })
        .collect();
    sql.push_str(&columns.join(", "));

    sql.push_str(" FROM ");
    sql.push_str(&plan.table);
    render_joins(&mut sql, &plan.table, &plan.joins);
    render_where(&mut sql, &mut binds, &plan.predicate, &plan.columns);

    if !plan.sort.is_empty() {
        sql.push_str(" ORDER BY ");
        let keys: Vec<String> = plan
            .sort
            .iter()
            .map(|key| {
                let direction = if key.direction.is_descending() {
                    "DESC"
                } else {
                    "ASC"
                };
                format!("{} {direction}", key.column)
            })
            .collect();
        sql.push_str(&keys.join(", "));
    }

    if let Some(limit) = plan.window.limit {
        sql.push_str(&format!(" LIMIT ${}", push_bind(&mut binds, int(limit))));
    }
    if plan.window.offset > 0 {
        sql.push_str(&format!(
            " OFFSET ${}",
            push_bind(&mut binds, int(plan.window.offset))
        ));
    }

    Statement { sql, binds }
}

/// Render a count plan.
#[must_use]
pub fn count(plan: &CountPlan) -> Statement {
    let mut binds = Vec::new();
    let mut sql = format!("SELECT COUNT(*) FROM {}", plan.table);

    render_joins(&mut sql, &plan.table, &plan.joins);
    render_where(&mut sql, &mut binds, &plan.predicate, &plan.columns);

    Statement { sql, binds }
}

/// Render an update or delete plan.
#[must_use]
pub fn mutation(plan: &MutationPlan) -> Statement {
    let mut binds = Vec::new();
    let mut sql = match &plan.kind {
        MutationKind::Update(assignments) => {
            let mut sql = format!("UPDATE {} SET ", plan.table);
            let sets: Vec<String> = assignments
                .iter()
                .map(|assignment| {
                    format!(
                        "{} = ${}",
                        assignment.column,
                        push_bind(&mut binds, assignment.value.clone())
                    )
                })
                .collect();
            sql.push_str(&sets.join(", "));
            sql
        }
        MutationKind::Delete => format!("DELETE FROM {}", plan.table),
    };

    render_where(&mut sql, &mut binds, &plan.predicate, &plan.columns);

    Statement { sql, binds }
}

fn render_joins(sql: &mut String, root: &str, joins: &[JoinSpec]) {
    for join in joins {
        sql.push_str(&format!(
            " LEFT JOIN {} ON {root}.{} = {}.{}",
            join.target_table, join.local_column, join.target_table, join.target_column
        ));
    }
}

fn render_where(
    sql: &mut String,
    binds: &mut Vec<Value>,
    predicate: &Predicate,
    columns: &BTreeMap<String, String>,
) {
    if matches!(predicate, Predicate::True) {
        return;
    }
    sql.push_str(" WHERE ");
    sql.push_str(&render_predicate(binds, predicate, columns));
}

fn render_predicate(
    binds: &mut Vec<Value>,
    predicate: &Predicate,
    columns: &BTreeMap<String, String>,
) -> String {
    match predicate {
        Predicate::True => "TRUE".to_string(),
        Predicate::And(children) => render_connective(binds, children, columns, " AND "),
        Predicate::Or(children) => render_connective(binds, children, columns, " OR "),
        Predicate::Not(inner) => {
            format!("NOT ({})", render_predicate(binds, inner, columns))
        }
        Predicate::Compare(cmp) => render_compare(binds, cmp, columns),
        Predicate::IsNull { field } => format!("{} IS NULL", columns[field]),
        Predicate::IsNotNull { field } => format!("{} IS NOT NULL", columns[field]),
    }
}

fn render_connective(
    binds: &mut Vec<Value>,
    children: &[Predicate],
    columns: &BTreeMap<String, String>,
    joiner: &str,
) -> String {
    let parts: Vec<String> = children
        .iter()
        .map(|child| render_predicate(binds, child, columns))
        .collect();
    format!("({})", parts.join(joiner))
}

fn render_compare(
    binds: &mut Vec<Value>,
    cmp: &ComparePredicate,
    columns: &BTreeMap<String, String>,
) -> String {
    let column = &columns[&cmp.field];

    match cmp.op {
        CompareOp::Eq => format!("{column} = ${}", push_bind(binds, cmp.value.clone())),
        CompareOp::Ne => format!("{column} <> ${}", push_bind(binds, cmp.value.clone())),
        CompareOp::Lt => format!("{column} < ${}", push_bind(binds, cmp.value.clone())),
        CompareOp::Lte => format!("{column} <= ${}", push_bind(binds, cmp.value.clone())),
        CompareOp::Gt => format!("{column} > ${}", push_bind(binds, cmp.value.clone())),
        CompareOp::Gte => format!("{column} >= ${}", push_bind(binds, cmp.value.clone())),
        CompareOp::In => render_list(binds, column, &cmp.value, false),
        CompareOp::NotIn => render_list(binds, column, &cmp.value, true),
        CompareOp::StartsWith => render_like(binds, column, &cmp.value, false, true),
        CompareOp::EndsWith => render_like(binds, column, &cmp.value, true, false),
        CompareOp::Contains => render_like(binds, column, &cmp.value, true, true),
    }
}

// Each list element becomes its own placeholder. An empty IN list can
// never match; it renders as a constant FALSE (TRUE for NOT IN).
fn render_list(binds: &mut Vec<Value>, column: &str, value: &Value, negated: bool) -> String {
    let items = match value {
        Value::List(items) => items,
        _ => return "FALSE".to_string(),
    };
    if items.is_empty() {
        return if negated { "TRUE" } else { "FALSE" }.to_string();
    }

    let placeholders: Vec<String> = items
        .iter()
        .map(|item| format!("${}", push_bind(binds, item.clone())))
        .collect();
    let keyword = if negated { "NOT IN" } else { "IN" };
    format!("{column} {keyword} ({})", placeholders.join(", "))
}

// Pattern metacharacters in the needle are escaped so user text only
// ever matches literally.
fn render_like(
    binds: &mut Vec<Value>,
    column: &str,
    value: &Value,
    leading: bool,
    trailing: bool,
) -> String {
    let needle = match value {
        Value::Text(text) => escape_like(text),
        _ => String::new(),
    };
    let mut pattern = String::new();
    if leading {
        pattern.push('%');
    }
    pattern.push_str(&needle);
    if trailing {
        pattern.push('%');
    }
    format!(
        "{column} LIKE ${} ESCAPE '\\'",
        push_bind(binds, Value::Text(pattern))
    )
}

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn push_bind(binds: &mut Vec<Value>, value: Value) -> usize {
    binds.push(value);
    binds.len()
}

fn int(value: u64) -> Value {
    Value::Int(i64::try_from(value).unwrap_or(i64::MAX))
}

///
/// TESTS
///
