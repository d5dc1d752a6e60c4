//! Runs normalized statements against a [`SchemaProvider`].
//!
//! Pipeline per query: nested CTEs, qualify FROM, joins left to right, WHERE,
//! GROUP BY + HAVING, ORDER BY, LIMIT, projection, then the set operation.
//! Every intermediate relation is kept in a [`QueryTrace`] for the step builder.

use std::collections::HashMap;

use super::errors::QueryAstError;
use super::logical::{
    AggregateRef, DeleteStatement, FilterOperand, InsertSource, InsertStatement, JoinClause,
    JoinCondition, NormalizedQuery, NormalizedStatement, Predicate, TableSource, UpdateStatement,
};
use super::operators::{self, AggregationPlan, JoinOutcome, Projection};
use crate::config::VisualizerConfig;
use crate::models::{Row, RowState, SetOpKind, TableData, Value};
use crate::schema::SchemaProvider;

/// CTE name -> evaluated relation. Lookups ignore case.
///
/// Each nesting level works on its own copy, so names defined inside a
/// subquery never leak to the outer query.
#[derive(Debug, Clone, Default)]
pub struct CteRegistry {
    tables: HashMap<String, TableData>,
}

impl CteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, table: TableData) {
        self.tables.insert(name.to_ascii_lowercase(), table);
    }

    pub fn get(&self, name: &str) -> Option<&TableData> {
        self.tables.get(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamedRelation {
    pub name: String,
    pub table: TableData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinTrace {
    pub clause: JoinClause,
    /// ON condition with its sides matched to the left/right relations.
    pub condition: Option<JoinCondition>,
    /// Display name of the left input: the FROM relation for the first join.
    pub left_name: String,
    /// Left input as shown to the reader: the unqualified FROM table for the
    /// first join, the accumulated rows afterwards.
    pub left_source: TableData,
    pub left: TableData,
    /// Right input as loaded, before qualification.
    pub right_source: TableData,
    pub right: TableData,
    pub outcome: JoinOutcome,
}

/// A row-removing stage: its input annotated per row, and what survived.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterTrace {
    pub input: TableData,
    pub states: Vec<RowState>,
    pub output: TableData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortTrace {
    pub input: TableData,
    pub output: TableData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetTrace {
    pub kind: SetOpKind,
    pub left: TableData,
    pub right: TableData,
    pub output: TableData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryTrace {
    /// This query's own WITH definitions, in order.
    pub ctes: Vec<NamedRelation>,
    /// FROM/JOIN subqueries, evaluated before the sources load.
    pub subqueries: Vec<NamedRelation>,
    /// Raw FROM and JOIN inputs.
    pub sources: Vec<NamedRelation>,
    pub joins: Vec<JoinTrace>,
    pub filter: Option<FilterTrace>,
    pub grouped: Option<TableData>,
    pub having: Option<FilterTrace>,
    pub sorted: Option<SortTrace>,
    pub limited: Option<FilterTrace>,
    pub projection_input: TableData,
    pub projection: Projection,
    pub set_operation: Option<SetTrace>,
    pub output: TableData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Insert,
    Update,
    Delete,
}

/// Before/after view of a write. Nothing is written to the schema.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationPreview {
    pub kind: MutationKind,
    pub table: String,
    pub before: TableData,
    pub before_states: Vec<RowState>,
    pub after: TableData,
    pub after_states: Option<Vec<RowState>>,
    /// Rows inserted, updated or deleted.
    pub affected: usize,
}

pub struct QueryExecutor<'a> {
    schema: &'a dyn SchemaProvider,
    placeholder: Value,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(schema: &'a dyn SchemaProvider, config: &VisualizerConfig) -> Self {
        Self { schema, placeholder: Value::text(config.empty_placeholder.clone()) }
    }

    /// Final relation only.
    pub fn evaluate(
        &self,
        query: &NormalizedQuery,
        registry: &CteRegistry,
    ) -> Result<TableData, QueryAstError> {
        Ok(self.trace(query, registry)?.output)
    }

    pub fn trace(
        &self,
        query: &NormalizedQuery,
        registry: &CteRegistry,
    ) -> Result<QueryTrace, QueryAstError> {
        let mut local = registry.clone();
        let mut ctes = Vec::with_capacity(query.ctes.len());
        for cte in &query.ctes {
            let table = self.evaluate(&cte.query, &local)?;
            log::debug!("CTE {} evaluated: {} rows", cte.name, table.len());
            local.register(&cte.name, table.clone());
            ctes.push(NamedRelation { name: cte.name.clone(), table });
        }

        let mut subqueries = Vec::new();
        let mut sources = Vec::new();

        let from_raw = self.load(&query.from, &local, &mut subqueries)?;
        sources.push(NamedRelation {
            name: query.from.display_name().to_string(),
            table: from_raw.clone(),
        });
        let mut current = operators::qualify(&from_raw, query.from.qualifier());

        let mut joins = Vec::with_capacity(query.joins.len());
        for (index, clause) in query.joins.iter().enumerate() {
            let right_raw = self.load(&clause.source, &local, &mut subqueries)?;
            sources.push(NamedRelation {
                name: clause.table().to_string(),
                table: right_raw.clone(),
            });
            let right = operators::qualify(&right_raw, clause.source.qualifier());
            let condition =
                clause.on.as_ref().map(|c| operators::orient_condition(&current, &right, c));
            let outcome = operators::join(
                &current,
                &right,
                clause.join_type,
                condition.as_ref(),
                &self.placeholder,
            );
            log::debug!(
                "{} JOIN {}: {} x {} -> {} rows",
                clause.join_type.keyword(),
                clause.table(),
                current.len(),
                right.len(),
                outcome.table.len()
            );
            let (left_name, left_source) = if index == 0 {
                (query.from.display_name().to_string(), from_raw.clone())
            } else {
                ("Joined rows".to_string(), current.clone())
            };
            let next = outcome.table.clone();
            joins.push(JoinTrace {
                clause: clause.clone(),
                condition,
                left_name,
                left_source,
                left: current,
                right_source: right_raw,
                right,
                outcome,
            });
            current = next;
        }

        let filter = query.where_clause.as_ref().map(|predicate| {
            let trace = filter_trace(&current, predicate);
            log::debug!("WHERE {}: {} -> {} rows", predicate, current.len(), trace.output.len());
            trace
        });
        if let Some(trace) = &filter {
            current = trace.output.clone();
        }

        let mut grouped = None;
        let mut having = None;
        if query.needs_aggregation() {
            let hidden = hidden_aggregates(query);
            let plan = AggregationPlan {
                group_by: &query.group_by,
                select: &query.select,
                hidden: &hidden,
            };
            let table = operators::aggregate(&current, plan, &self.placeholder);
            log::debug!("GROUP BY: {} rows -> {} groups", current.len(), table.len());
            current = table.clone();
            grouped = Some(table);

            if let Some(predicate) = &query.having {
                let trace = filter_trace(&current, predicate);
                log::debug!(
                    "HAVING {}: {} -> {} groups",
                    predicate,
                    current.len(),
                    trace.output.len()
                );
                current = trace.output.clone();
                having = Some(trace);
            }
        }

        let sorted = query.order_by.as_ref().map(|clause| SortTrace {
            input: current.clone(),
            output: operators::order(&current, clause),
        });
        if let Some(trace) = &sorted {
            current = trace.output.clone();
        }

        let limited = query.limit.map(|n| FilterTrace {
            input: current.clone(),
            states: operators::limit_states(current.len(), n),
            output: operators::limit(&current, n),
        });
        if let Some(trace) = &limited {
            current = trace.output.clone();
        }

        let single_source = if query.joins.is_empty() && grouped.is_none() {
            Some(query.from.qualifier())
        } else {
            None
        };
        let projection = operators::project(&current, &query.select, single_source);
        let mut output = projection.table.clone();

        let set_operation = match &query.set_operation {
            Some(set) => {
                let right = self.evaluate(&set.right, &local)?;
                let combined = operators::set_operation(&output, &right, set.kind);
                log::debug!(
                    "{}: {} + {} -> {} rows",
                    set.kind.keyword(),
                    output.len(),
                    right.len(),
                    combined.len()
                );
                let trace = SetTrace {
                    kind: set.kind,
                    left: output,
                    right,
                    output: combined.clone(),
                };
                output = combined;
                Some(trace)
            }
            None => None,
        };

        Ok(QueryTrace {
            ctes,
            subqueries,
            sources,
            joins,
            filter,
            grouped,
            having,
            sorted,
            limited,
            projection_input: current,
            projection,
            set_operation,
            output,
        })
    }

    fn base_table(&self, name: &str) -> Result<TableData, QueryAstError> {
        self.schema
            .get_table(name)
            .ok_or_else(|| QueryAstError::UnknownRelation(name.to_string()))
    }

    fn load(
        &self,
        source: &TableSource,
        registry: &CteRegistry,
        subqueries: &mut Vec<NamedRelation>,
    ) -> Result<TableData, QueryAstError> {
        match source {
            TableSource::Table { name, .. } => self.base_table(name),
            TableSource::Cte { name, .. } => registry
                .get(name)
                .cloned()
                .ok_or_else(|| QueryAstError::UnknownRelation(name.clone())),
            TableSource::Subquery { name, query } => {
                let table = self.evaluate(query, registry)?;
                log::debug!("subquery {} evaluated: {} rows", name, table.len());
                subqueries.push(NamedRelation { name: name.clone(), table: table.clone() });
                Ok(table)
            }
        }
    }

    pub fn preview_mutation(
        &self,
        statement: &NormalizedStatement,
    ) -> Result<MutationPreview, QueryAstError> {
        match statement {
            NormalizedStatement::Insert(insert) => self.preview_insert(insert),
            NormalizedStatement::Update(update) => self.preview_update(update),
            NormalizedStatement::Delete(delete) => self.preview_delete(delete),
            NormalizedStatement::Query(_) => {
                Err(QueryAstError::shape("a SELECT is not a mutation"))
            }
        }
    }

    fn preview_insert(&self, insert: &InsertStatement) -> Result<MutationPreview, QueryAstError> {
        let table = self.base_table(&insert.table)?;
        let targets: Vec<String> = if insert.columns.is_empty() {
            table.columns.clone()
        } else {
            insert
                .columns
                .iter()
                .map(|c| table_column(&table, &insert.table, c))
                .collect::<Result<_, _>>()?
        };

        let tuples: Vec<Vec<Value>> = match &insert.source {
            InsertSource::Values(rows) => rows.clone(),
            InsertSource::Query(query) => {
                let result = self.evaluate(query, &CteRegistry::new())?;
                result
                    .rows
                    .iter()
                    .map(|row| {
                        result
                            .columns
                            .iter()
                            .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
                            .collect()
                    })
                    .collect()
            }
        };

        let mut new_rows = Vec::with_capacity(tuples.len());
        for tuple in tuples {
            if tuple.len() != targets.len() {
                return Err(QueryAstError::shape(format!(
                    "INSERT into {} supplies {} value(s) for {} column(s)",
                    insert.table,
                    tuple.len(),
                    targets.len()
                )));
            }
            let mut row: Row = table.columns.iter().map(|c| (c.clone(), Value::Null)).collect();
            row.extend(targets.iter().cloned().zip(tuple));
            new_rows.push(row);
        }

        let affected = new_rows.len();
        let mut rows = table.rows.clone();
        rows.extend(new_rows);
        let mut states = vec![RowState::Default; table.len()];
        states.extend(std::iter::repeat(RowState::Inserted).take(affected));
        log::debug!("INSERT into {}: {} new row(s)", insert.table, affected);

        Ok(MutationPreview {
            kind: MutationKind::Insert,
            table: insert.table.clone(),
            before_states: vec![RowState::Default; table.len()],
            after: table.with_rows(rows),
            after_states: Some(states),
            before: table,
            affected,
        })
    }

    fn preview_update(&self, update: &UpdateStatement) -> Result<MutationPreview, QueryAstError> {
        let table = self.base_table(&update.table)?;
        let assignments: Vec<(String, Value)> = update
            .assignments
            .iter()
            .map(|(column, value)| -> Result<(String, Value), QueryAstError> {
                Ok((table_column(&table, &update.table, column)?, value.clone()))
            })
            .collect::<Result<_, _>>()?;

        let states = mark_rows(&table, update.selection.as_ref(), RowState::Updated);
        let rows = table
            .rows
            .iter()
            .zip(&states)
            .map(|(row, state)| {
                let mut row = row.clone();
                if *state == RowState::Updated {
                    row.extend(assignments.iter().cloned());
                }
                row
            })
            .collect();
        let affected = states.iter().filter(|s| **s == RowState::Updated).count();
        log::debug!("UPDATE {}: {} row(s) match", update.table, affected);

        Ok(MutationPreview {
            kind: MutationKind::Update,
            table: update.table.clone(),
            after: table.with_rows(rows),
            after_states: Some(states.clone()),
            before_states: states,
            before: table,
            affected,
        })
    }

    fn preview_delete(&self, delete: &DeleteStatement) -> Result<MutationPreview, QueryAstError> {
        let table = self.base_table(&delete.table)?;
        let states = mark_rows(&table, delete.selection.as_ref(), RowState::Deleted);
        let remaining = table
            .rows
            .iter()
            .zip(&states)
            .filter(|(_, state)| **state != RowState::Deleted)
            .map(|(row, _)| row.clone())
            .collect();
        let affected = states.iter().filter(|s| **s == RowState::Deleted).count();
        log::debug!("DELETE from {}: {} row(s) match", delete.table, affected);

        Ok(MutationPreview {
            kind: MutationKind::Delete,
            table: delete.table.clone(),
            after: table.with_rows(remaining),
            after_states: None,
            before_states: states,
            before: table,
            affected,
        })
    }
}

fn filter_trace(input: &TableData, predicate: &Predicate) -> FilterTrace {
    FilterTrace {
        input: input.clone(),
        states: operators::filter_states(input, predicate),
        output: operators::filter(input, predicate),
    }
}

/// HAVING aggregates that the select list does not compute.
fn hidden_aggregates(query: &NormalizedQuery) -> Vec<AggregateRef> {
    let selected: Vec<String> = query.aggregates().iter().map(|a| a.output_label()).collect();
    let mut hidden: Vec<AggregateRef> = Vec::new();
    if let Some(having) = &query.having {
        for clause in having.clauses() {
            if let FilterOperand::Aggregate(agg) = &clause.left {
                let label = agg.output_label();
                if !selected.contains(&label) && !hidden.iter().any(|h| h.output_label() == label) {
                    hidden.push(agg.clone());
                }
            }
        }
    }
    hidden
}

/// `hit` for rows matching the predicate (all rows without one), else `default`.
fn mark_rows(table: &TableData, predicate: Option<&Predicate>, hit: RowState) -> Vec<RowState> {
    table
        .rows
        .iter()
        .map(|row| match predicate {
            Some(p) if !operators::row_matches(table, row, p) => RowState::Default,
            _ => hit,
        })
        .collect()
}

fn table_column(
    table: &TableData,
    table_name: &str,
    column: &str,
) -> Result<String, QueryAstError> {
    table
        .columns
        .iter()
        .find(|c| c.eq_ignore_ascii_case(column))
        .cloned()
        .ok_or_else(|| QueryAstError::shape(format!("{} has no column {}", table_name, column)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_ast::normalize::normalize_statement;
    use crate::query_ast::parser::parse_sql;
    use crate::schema::MockSchema;

    fn statement(sql: &str) -> NormalizedStatement {
        normalize_statement(&parse_sql(sql).expect("parse")).expect("normalize").statement
    }

    fn trace(sql: &str) -> QueryTrace {
        let schema = MockSchema::sample();
        let config = VisualizerConfig::default();
        match statement(sql) {
            NormalizedStatement::Query(q) => QueryExecutor::new(&schema, &config)
                .trace(&q, &CteRegistry::new())
                .expect("trace"),
            other => panic!("expected query, got {:?}", other),
        }
    }

    #[test]
    fn registry_is_case_insensitive() {
        let mut registry = CteRegistry::new();
        registry.register("Recent", TableData::empty(vec!["id".into()]));
        assert!(registry.get("RECENT").is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unknown_table_aborts() {
        let schema = MockSchema::sample();
        let config = VisualizerConfig::default();
        let NormalizedStatement::Query(q) = statement("SELECT * FROM Teachers") else {
            panic!("query")
        };
        let err = QueryExecutor::new(&schema, &config)
            .evaluate(&q, &CteRegistry::new())
            .unwrap_err();
        assert_eq!(err, QueryAstError::UnknownRelation("Teachers".into()));
    }

    #[test]
    fn pipeline_records_each_stage() {
        let t = trace(
            "SELECT Students.cohort, COUNT(*) FROM Students \
             JOIN Grades ON Students.id = Grades.student_id \
             WHERE Grades.score > 80 GROUP BY Students.cohort HAVING COUNT(*) > 1 \
             ORDER BY Students.cohort LIMIT 1",
        );
        assert_eq!(t.sources.len(), 2);
        assert_eq!(t.joins.len(), 1);
        assert_eq!(t.joins[0].outcome.table.len(), 5);
        let filter = t.filter.expect("filter");
        assert_eq!(filter.output.len(), 3);
        assert_eq!(t.grouped.expect("grouped").len(), 2);
        assert_eq!(t.having.expect("having").output.len(), 1);
        assert!(t.sorted.is_some());
        assert_eq!(t.limited.expect("limit").output.len(), 1);
        assert_eq!(t.output.columns, vec!["cohort", "COUNT(*)"]);
        assert_eq!(t.output.value(0, "cohort"), Value::from(2023));
        assert_eq!(t.output.value(0, "COUNT(*)"), Value::from(2));
    }

    #[test]
    fn hidden_having_aggregate_is_projected_away() {
        let t = trace("SELECT cohort FROM Students GROUP BY cohort HAVING COUNT(*) > 1");
        let grouped = t.grouped.expect("grouped");
        assert!(grouped.columns.contains(&"COUNT(*)".to_string()));
        assert_eq!(t.output.columns, vec!["cohort"]);
        assert_eq!(t.output.len(), 1);
    }

    #[test]
    fn ctes_and_subqueries_evaluate_first() {
        let t = trace(
            "WITH early AS (SELECT id, name FROM Students WHERE cohort = 2023) \
             SELECT early.name, g.score FROM early \
             JOIN (SELECT * FROM Grades WHERE score > 90) g ON early.id = g.student_id",
        );
        assert_eq!(t.ctes.len(), 1);
        assert_eq!(t.ctes[0].table.columns, vec!["id", "name"]);
        assert_eq!(t.subqueries.len(), 1);
        assert_eq!(t.subqueries[0].name, "g");
        assert_eq!(t.output.len(), 1);
        assert_eq!(t.output.value(0, "name"), Value::from("Ada"));
    }

    #[test]
    fn select_star_keeps_source_columns() {
        let t = trace("SELECT * FROM Courses");
        assert_eq!(t.output, MockSchema::sample().get_table("Courses").expect("courses"));
    }

    #[test]
    fn set_operation_runs_after_projection() {
        let t = trace("SELECT id FROM Students EXCEPT SELECT student_id FROM Enrollments");
        let set = t.set_operation.expect("set");
        assert_eq!(set.left.len(), 3);
        assert_eq!(set.output.rows, vec![Row::from([("id".to_string(), Value::from(3))])]);
    }

    #[test]
    fn update_and_delete_previews() {
        let schema = MockSchema::sample();
        let config = VisualizerConfig::default();
        let executor = QueryExecutor::new(&schema, &config);

        let update = executor
            .preview_mutation(&statement("UPDATE Students SET cohort = 2025 WHERE id = 2"))
            .expect("update");
        assert_eq!(update.affected, 1);
        assert_eq!(
            update.before_states,
            vec![RowState::Default, RowState::Updated, RowState::Default]
        );
        assert_eq!(update.after.value(1, "cohort"), Value::from(2025));
        assert_eq!(update.before.value(1, "cohort"), Value::from(2023));

        let delete = executor.preview_mutation(&statement("DELETE FROM Students")).expect("delete");
        assert_eq!(delete.affected, 3);
        assert!(delete.after.is_empty());
    }

    #[test]
    fn insert_fills_unlisted_columns_with_null() {
        let schema = MockSchema::sample();
        let config = VisualizerConfig::default();
        let preview = QueryExecutor::new(&schema, &config)
            .preview_mutation(&statement("INSERT INTO Students (name, id) VALUES ('Edsger', 4)"))
            .expect("insert");
        assert_eq!(preview.after.len(), 4);
        assert_eq!(preview.after.value(3, "id"), Value::from(4));
        assert_eq!(preview.after.value(3, "cohort"), Value::Null);
        assert_eq!(preview.after_states.as_ref().map(|s| s[3]), Some(RowState::Inserted));
    }

    #[test]
    fn insert_arity_mismatch_is_rejected() {
        let schema = MockSchema::sample();
        let config = VisualizerConfig::default();
        let err = QueryExecutor::new(&schema, &config)
            .preview_mutation(&statement("INSERT INTO Students (id, name) VALUES (4)"))
            .unwrap_err();
        assert!(matches!(err, QueryAstError::ParseShape(_)));
    }
}
