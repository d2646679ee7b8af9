use crate::{
    compile::{CountPlan, MutationKind, MutationPlan, SelectPlan},
    criteria::{Predicate, eval},
    executor::{CancelToken, ExecuteError, QueryExecutor},
    row::Row,
};
use std::{
    cmp::Ordering,
    collections::BTreeMap,
    sync::{Mutex, PoisonError},
};

///
/// MemoryExecutor
///
/// Plan interpreter over in-memory tables, used by tests and demos.
/// Tables are keyed by table name and hold plain rows whose field names
/// equal their column names. Joined paths (`team.name`) are materialized
/// per row before evaluation, so predicates and sorts behave exactly as
/// their SQL rendering would under a left join.
///
/// NOTE: shared mutability is deliberate; the row store is the one
/// mutable thing in the crate and it is guarded by a single mutex.
///

#[derive(Debug, Default)]
pub struct MemoryExecutor {
    tables: Mutex<BTreeMap<String, Vec<Row>>>,
}

impl MemoryExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row to a table, creating the table on first use.
    pub fn insert(&self, table: impl Into<String>, row: Row) {
        self.lock().entry(table.into()).or_default().push(row);
    }

    pub fn insert_many(&self, table: impl Into<String>, rows: impl IntoIterator<Item = Row>) {
        self.lock().entry(table.into()).or_default().extend(rows);
    }

    /// Snapshot of a table's rows; missing tables read as empty.
    #[must_use]
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.lock().get(table).cloned().unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<Row>>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Materialize the dotted paths a plan references onto each root row,
    // resolving each declared join by key equality. Unmatched joins leave
    // the path absent, which reads as NULL downstream.
    fn joined_rows(&self, plan: &SelectPlan) -> Vec<Row> {
        let tables = self.lock();
        let roots = tables.get(&plan.table).cloned().unwrap_or_default();
        if plan.joins.is_empty() {
            return roots;
        }

        let dotted: Vec<(&str, &str)> = plan
            .columns
            .keys()
            .filter_map(|path| path.split_once('.'))
            .collect();

        roots
            .into_iter()
            .map(|mut row| {
                for join in &plan.joins {
                    let key = row.get_or_null(&join.local_column);
                    let target = tables.get(&join.target_table).and_then(|rows| {
                        rows.iter()
                            .find(|candidate| candidate.get_or_null(&join.target_column).same_as(&key))
                    });
                    let Some(target) = target else { continue };
                    for (relation, field) in &dotted {
                        if *relation == join.relation {
                            row.set(format!("{relation}.{field}"), target.get_or_null(field));
                        }
                    }
                }
                row
            })
            .collect()
    }
}

impl QueryExecutor for MemoryExecutor {
    fn fetch(&self, plan: &SelectPlan, cancel: &CancelToken) -> Result<Vec<Row>, ExecuteError> {
        cancel.checkpoint()?;

        let mut matched = Vec::new();
        for row in self.joined_rows(plan) {
            cancel.checkpoint()?;
            if eval(&row, &plan.predicate) {
                matched.push(row);
            }
        }

        matched.sort_by(|a, b| compare_rows(a, b, plan));

        let offset = usize::try_from(plan.window.offset).unwrap_or(usize::MAX);
        let limit = plan
            .window
            .limit
            .map_or(usize::MAX, |limit| usize::try_from(limit).unwrap_or(usize::MAX));

        Ok(matched
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| project(&row, plan))
            .collect())
    }

    fn fetch_count(&self, plan: &CountPlan, cancel: &CancelToken) -> Result<u64, ExecuteError> {
        cancel.checkpoint()?;

        // Counting shares the join/filter path with fetching.
        let select = SelectPlan {
            entity: plan.entity.clone(),
            table: plan.table.clone(),
            predicate: Predicate::True,
            columns: plan.columns.clone(),
            joins: plan.joins.clone(),
            projection: Vec::new(),
            sort: Vec::new(),
            window: crate::compile::Window::all(),
            read_only: true,
        };

        let mut count = 0u64;
        for row in self.joined_rows(&select) {
            cancel.checkpoint()?;
            if eval(&row, &plan.predicate) {
                count += 1;
            }
        }
        Ok(count)
    }

    fn execute(&self, plan: &MutationPlan, cancel: &CancelToken) -> Result<u64, ExecuteError> {
        cancel.checkpoint()?;

        let mut tables = self.lock();
        let Some(rows) = tables.get_mut(&plan.table) else {
            return Ok(0);
        };

        match &plan.kind {
            MutationKind::Update(assignments) => {
                let mut affected = 0u64;
                for row in rows.iter_mut() {
                    if eval(row, &plan.predicate) {
                        for assignment in assignments {
                            row.set(assignment.field.clone(), assignment.value.clone());
                        }
                        affected += 1;
                    }
                }
                Ok(affected)
            }
            MutationKind::Delete => {
                let before = rows.len();
                rows.retain(|row| !eval(row, &plan.predicate));
                Ok((before - rows.len()) as u64)
            }
        }
    }
}

fn compare_rows(a: &Row, b: &Row, plan: &SelectPlan) -> Ordering {
    for key in &plan.sort {
        let left = a.get_or_null(&key.path);
        let right = b.get_or_null(&key.path);
        // NULLs sort last, matching Postgres default ascending order.
        let ordering = match (left.is_null(), right.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => left.compare(&right).unwrap_or(Ordering::Equal),
        };
        let ordering = if key.direction.is_descending() && !left.is_null() && !right.is_null() {
            ordering.reverse()
        } else {
            ordering
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn project(row: &Row, plan: &SelectPlan) -> Row {
    if plan.projection.is_empty() {
        return row.clone();
    }
    plan.projection
        .iter()
        .map(|column| (column.path.clone(), row.get_or_null(&column.path)))
        .collect()
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        compile::{Window, compile_count, compile_delete, compile_select, compile_update},
        criteria::Criteria,
        project::Projection,
        schema::{EntitySchema, FieldType, SchemaRegistry},
        value::Value,
    };

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

    fn seeded() -> MemoryExecutor {
        let executor = MemoryExecutor::new();
        executor.insert_many(
            "members",
            [
                Row::new().with("id", 1i64).with("username", "ada").with("age", 36i64).with("team_id", 1i64),
                Row::new().with("id", 2i64).with("username", "brian").with("age", 41i64).with("team_id", 1i64),
                Row::new().with("id", 3i64).with("username", "carol").with("age", 29i64).with("team_id", 2i64),
                Row::new().with("id", 4i64).with("username", "dan").with("age", 33i64).with("team_id", 9i64),
                Row::new().with("id", 5i64).with("username", "erin").with("age", 36i64),
            ],
        );
        executor.insert_many(
            "teams",
            [
                Row::new().with("id", 1i64).with("name", "core"),
                Row::new().with("id", 2i64).with("name", "infra"),
            ],
        );
        executor
    }

    #[test]
    fn fetch_filters_sorts_and_windows() {
        let registry = registry();
        let schema = registry.get("member").expect("member").clone();
        let executor = seeded();

        let criteria = Criteria::new(Predicate::gte("age", 30i64)).order_by_desc("username");
        let plan = compile_select(
            &registry,
            &schema,
            &criteria,
            Window::page(0, 3),
            Some(&Projection::of(["username"])),
            true,
        )
        .expect("plan");

        let rows = executor.fetch(&plan, &CancelToken::new()).expect("fetch");
        let names: Vec<Value> = rows.iter().map(|row| row.get_or_null("username")).collect();
        assert_eq!(
            names,
            vec![
                Value::Text("erin".into()),
                Value::Text("dan".into()),
                Value::Text("brian".into()),
            ]
        );
        // Projection narrowed the rows.
        assert_eq!(rows[0].len(), 1);
    }

    #[test]
    fn ties_break_on_the_primary_key() {
        let registry = registry();
        let schema = registry.get("member").expect("member").clone();
        let executor = seeded();

        // ada and erin share age 36; ids 1 and 5 decide the order.
        let criteria = Criteria::new(Predicate::eq("age", 36i64)).order_by("age");
        let plan = compile_select(&registry, &schema, &criteria, Window::all(), None, true)
            .expect("plan");

        let rows = executor.fetch(&plan, &CancelToken::new()).expect("fetch");
        let ids: Vec<Value> = rows.iter().map(|row| row.get_or_null("id")).collect();
        assert_eq!(ids, vec![Value::Int(1), Value::Int(5)]);
    }

    #[test]
    fn joins_materialize_with_left_join_semantics() {
        let registry = registry();
        let schema = registry.get("member").expect("member").clone();
        let executor = seeded();

        let criteria = Criteria::new(Predicate::eq("team.name", "core"));
        let plan = compile_select(&registry, &schema, &criteria, Window::all(), None, true)
            .expect("plan");
        let rows = executor.fetch(&plan, &CancelToken::new()).expect("fetch");
        assert_eq!(rows.len(), 2);

        // dan points at a missing team, erin has none: both count as NULL.
        let criteria = Criteria::new(Predicate::is_null("team.name"));
        let plan = compile_count(&registry, &schema, &criteria).expect("plan");
        assert_eq!(
            executor.fetch_count(&plan, &CancelToken::new()).expect("count"),
            2
        );
    }

    #[test]
    fn update_touches_only_matching_rows() {
        let registry = registry();
        let schema = registry.get("member").expect("member").clone();
        let executor = seeded();

        let plan = compile_update(
            &registry,
            &schema,
            &Predicate::gte("age", 36i64),
            vec![("age".to_string(), Value::Int(0))],
        )
        .expect("plan");

        let affected = executor.execute(&plan, &CancelToken::new()).expect("execute");
        assert_eq!(affected, 3);

        let zeroed = executor
            .rows("members")
            .iter()
            .filter(|row| row.get_or_null("age").same_as(&Value::Int(0)))
            .count();
        assert_eq!(zeroed, 3);
    }

    #[test]
    fn delete_removes_matching_rows() {
        let registry = registry();
        let schema = registry.get("member").expect("member").clone();
        let executor = seeded();

        let plan = compile_delete(&registry, &schema, &Predicate::lt("age", 34i64)).expect("plan");
        assert_eq!(
            executor.execute(&plan, &CancelToken::new()).expect("execute"),
            2
        );
        assert_eq!(executor.rows("members").len(), 3);
    }

    #[test]
    fn cancelled_tokens_abort_before_any_work() {
        let registry = registry();
        let schema = registry.get("member").expect("member").clone();
        let executor = seeded();
        let token = CancelToken::new();
        token.cancel();

        let plan = compile_delete(&registry, &schema, &Predicate::True).expect("plan");
        assert!(matches!(
            executor.execute(&plan, &token),
            Err(ExecuteError::Cancelled)
        ));
        assert_eq!(executor.rows("members").len(), 5);
    }
}
